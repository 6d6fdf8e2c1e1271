//! The shared lavatory: a single-occupancy resource whose surfaces carry a
//! contamination risk that decays after each contagious visit.
//!
//! Every passenger runs a loop for the length of the flight: wait an
//! exponentially distributed interval, queue for the lavatory, occupy it for
//! two minutes, leave. Contamination is never cleared; the probability of
//! picking up an infection only decays with time since the most recent
//! contagious occupant.
use log::trace;
use rand_distr::Exp;

use crate::context::Context;
use crate::define_rng;
use crate::flight::{ContextFlightsExt, FlightId};
use crate::infection_manager::infect_passenger;
use crate::passenger::{InfectionSource, PassengerId};
use crate::random::ContextRandomExt;
use crate::resource::{Resource, ResourceGrant};

define_rng!(LavatoryRng);

/// Visits per minute for contagious passengers.
pub const CONTAGIOUS_VISIT_RATE: f64 = 2.0;
/// Visits per minute for everyone else.
pub const VISIT_RATE: f64 = 0.5;
/// Minutes each visit holds the lavatory.
pub const OCCUPANCY_TIME: f64 = 2.0;
pub const INITIAL_CONTAMINATION_PROBABILITY: f64 = 0.5;
/// Per-minute decay of the contamination probability.
pub const CONTAMINATION_DECAY: f64 = 0.00153;

/// Probability of infection for an occupant `elapsed` minutes after the last
/// contagious visit.
#[must_use]
pub fn contamination_probability(elapsed: f64) -> f64 {
    INITIAL_CONTAMINATION_PROBABILITY * (-CONTAMINATION_DECAY * elapsed).exp()
}

#[derive(Debug)]
pub struct Lavatory {
    resource: Resource,
    contaminated_at: Option<f64>,
}

impl Lavatory {
    #[must_use]
    pub fn new() -> Lavatory {
        Lavatory {
            resource: Resource::new(1),
            contaminated_at: None,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    #[must_use]
    pub fn is_contaminated(&self) -> bool {
        self.contaminated_at.is_some()
    }

    /// Time of the most recent contagious visit.
    #[must_use]
    pub fn contamination_time(&self) -> Option<f64> {
        self.contaminated_at
    }

    pub(crate) fn contaminate(&mut self, now: f64) {
        self.contaminated_at = Some(now);
    }

    /// Infection probability for someone entering at `now`; zero while the
    /// lavatory has never been contaminated.
    #[must_use]
    pub fn infection_probability(&self, now: f64) -> f64 {
        self.contaminated_at
            .map_or(0.0, |time| contamination_probability(now - time))
    }
}

impl Default for Lavatory {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts the visit loop for one passenger of a flight that has just
/// departed. Nothing starts once the clock has reached the flight's duration.
pub(crate) fn start_lavatory_visits(context: &mut Context, flight_id: FlightId, pid: PassengerId) {
    let now = context.get_current_time();
    if context.flight(flight_id).in_progress(now) {
        schedule_visit(context, flight_id, pid);
    }
}

fn schedule_visit(context: &mut Context, flight_id: FlightId, pid: PassengerId) {
    let contagious = context.flight(flight_id).passenger(pid).is_contagious();
    let rate = if contagious {
        CONTAGIOUS_VISIT_RATE
    } else {
        VISIT_RATE
    };
    let wait = context.sample_distr(
        LavatoryRng,
        Exp::new(rate).expect("visit rates are positive"),
    );
    context.add_plan_after(wait, move |context| queue_for_lavatory(context, flight_id, pid));
}

fn queue_for_lavatory(context: &mut Context, flight_id: FlightId, pid: PassengerId) {
    if !context.flight(flight_id).is_airborne() {
        return;
    }
    let resource = context.flight(flight_id).lavatory().resource().clone();
    resource.request(context, move |context, grant| {
        enter(context, flight_id, pid, grant);
    });
}

fn enter(context: &mut Context, flight_id: FlightId, pid: PassengerId, grant: ResourceGrant) {
    if !context.flight(flight_id).is_airborne() {
        return;
    }
    let now = context.get_current_time();
    let flight = context.flight_mut(flight_id);
    let passenger = flight.passenger(pid);
    let contagious = passenger.is_contagious();
    let exposed = passenger.can_be_infected();

    if contagious {
        flight.lavatory_mut().contaminate(now);
        trace!("flight {flight_id}: lavatory contaminated by {pid} at {now:.1}");
    }
    if exposed && flight.lavatory().is_contaminated() {
        let p = flight.lavatory().infection_probability(now);
        if context.sample_chance(LavatoryRng, p) {
            infect_passenger(context, flight_id, pid, InfectionSource::Lavatory);
        }
    }

    context.add_plan_after(OCCUPANCY_TIME, move |context| {
        drop(grant);
        let now = context.get_current_time();
        if context.flight(flight_id).in_progress(now) {
            schedule_visit(context, flight_id, pid);
        }
    });
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::flight::FlightStatus;
    use assert_approx_eq::assert_approx_eq;

    fn boarded(occupancy: usize, duration: f64, seed: u64) -> (Context, FlightId) {
        let mut context = Context::new();
        context.init_random(seed);
        let id = context.register_flight(0.0, duration, occupancy, vec![]);
        let boarding = context.flight(id).draw_boarding(&context).unwrap();
        context.flight_mut(id).board(boarding);
        context.flight_mut(id).depart();
        (context, id)
    }

    /// Over many seeds, how often a susceptible passenger entering at `entry`
    /// catches it from a lavatory contaminated at time 0.
    fn infections_after_contamination(entry: f64, trials: u64) -> u64 {
        let visitor = PassengerId(2);
        let mut infected = 0;
        for seed in 0..trials {
            let (mut context, id) = boarded(6, 600.0, seed);
            context.flight_mut(id).lavatory_mut().contaminate(0.0);
            context.add_plan(entry, move |context| queue_for_lavatory(context, id, visitor));
            context.execute_until(entry + 1.0);

            let flight = context.flight(id);
            if flight.passenger(visitor).is_infected() {
                assert!(flight.passenger(visitor).is_newly_infected());
                assert!(flight.passenger(visitor).is_incubating());
                assert_eq!(flight.infected_passengers(), &[visitor]);
                assert_eq!(flight.new_infected_count(), 1);
                infected += 1;
            } else {
                assert_eq!(flight.new_infected_count(), 0);
            }
        }
        infected
    }

    #[test]
    fn probability_starts_at_one_half() {
        assert_eq!(contamination_probability(0.0), 0.5);
        assert_approx_eq!(contamination_probability(100.0), 0.5 * (-0.153_f64).exp());
    }

    #[test]
    fn probability_never_increases() {
        let mut previous = contamination_probability(0.0);
        for minute in 1..2000 {
            let p = contamination_probability(f64::from(minute));
            assert!(p <= previous);
            assert!(p > 0.0);
            previous = p;
        }
    }

    #[test]
    fn clean_lavatory_is_harmless() {
        let lavatory = Lavatory::new();
        assert!(!lavatory.is_contaminated());
        assert_eq!(lavatory.infection_probability(50.0), 0.0);
        assert_eq!(lavatory.resource().capacity(), 1);
    }

    #[test]
    fn latest_contagious_visit_wins() {
        let mut lavatory = Lavatory::new();
        lavatory.contaminate(10.0);
        lavatory.contaminate(40.0);
        assert_eq!(lavatory.contamination_time(), Some(40.0));
        assert_eq!(lavatory.infection_probability(40.0), 0.5);
    }

    #[test]
    fn contagious_occupant_contaminates() {
        let (mut context, id) = boarded(6, 60.0, 2);
        let flight = context.flight_mut(id);
        flight.record_infection(PassengerId(1), InfectionSource::Proximity);
        flight.finish_incubation(PassengerId(1));

        context.add_plan(7.0, move |context| queue_for_lavatory(context, id, PassengerId(1)));
        context.execute_until(8.0);
        assert_eq!(context.flight(id).lavatory().contamination_time(), Some(7.0));
        assert_eq!(context.flight(id).lavatory().resource().in_use(), 1);
    }

    #[test]
    fn visits_are_exclusive_and_fifo() {
        // Short enough that nobody comes back for a second visit.
        let (mut context, id) = boarded(6, 2.5, 3);
        context.add_plan(1.0, move |context| {
            for pid in 0..3 {
                queue_for_lavatory(context, id, PassengerId(pid));
            }
        });
        context.execute_until(1.5);
        let resource = context.flight(id).lavatory().resource().clone();
        assert_eq!(resource.in_use(), 1);
        assert_eq!(resource.queue_len(), 2);

        context.execute_until(3.5);
        assert_eq!(resource.in_use(), 1);
        assert_eq!(resource.queue_len(), 1);
    }

    #[test]
    fn loops_end_with_the_flight() {
        let (mut context, id) = boarded(6, 30.0, 4);
        for pid in 0..6 {
            start_lavatory_visits(&mut context, id, PassengerId(pid));
        }
        context.add_plan(30.0, move |context| context.flight_mut(id).land());
        context.execute();

        let flight = context.flight(id);
        assert_eq!(flight.status(), FlightStatus::Landed);
        assert_eq!(flight.lavatory().resource().in_use(), 0);
        assert_eq!(flight.lavatory().resource().queue_len(), 0);
        // Nobody was contagious, so nothing was ever contaminated.
        assert!(!flight.lavatory().is_contaminated());
        assert_eq!(flight.new_infected_count(), 0);
    }

    #[test]
    fn contaminated_lavatory_infects_at_one_half() {
        let infected = infections_after_contamination(0.0, 400);
        // Expected 200.
        assert!((160..=240).contains(&infected), "{infected}");
    }

    #[test]
    fn contamination_risk_decays() {
        // 0.5 * exp(-0.00153 * 500) is about 0.233, so about 93 of 400.
        let infected = infections_after_contamination(500.0, 400);
        assert!((55..=135).contains(&infected), "{infected}");
    }

    #[test]
    fn departure_after_duration_has_no_visits() {
        let mut context = Context::new();
        context.init_random(6);
        let id = context.register_flight(100.0, 60.0, 6, vec![]);
        let boarding = context.flight(id).draw_boarding(&context).unwrap();
        context.flight_mut(id).board(boarding);
        context.add_plan(100.0, move |context| {
            context.flight_mut(id).depart();
            for pid in 0..6 {
                start_lavatory_visits(context, id, PassengerId(pid));
            }
        });
        context.execute();
        assert_eq!(context.get_current_time(), 100.0);
        assert_eq!(context.pending_plans(), 0);
    }

    #[test]
    fn zero_length_flight_has_no_visits() {
        let (mut context, id) = boarded(6, 0.0, 5);
        for pid in 0..6 {
            start_lavatory_visits(&mut context, id, PassengerId(pid));
        }
        assert_eq!(context.pending_plans(), 0);
    }
}
