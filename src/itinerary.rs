//! Chains flights together.
//!
//! When a flight lands, each of its infected passengers samples a layover
//! and passengers whose next departure times coincide are grouped onto one
//! successor flight. The successor is boarded and seeded at that landing,
//! even though it departs later. Successor flights departing at or after the
//! horizon are never spawned, which bounds the recursion.
use indexmap::IndexMap;
use log::{debug, info};
use rand_distr::Normal;
use rustc_hash::FxHashSet;

use crate::context::Context;
use crate::error::SimError;
use crate::flight::{board_flight, depart_flight, ContextFlightsExt, FlightId, FlightSummary};
use crate::flight_duration::ContextFlightDurationExt;
use crate::passenger::{Passenger, PassengerId};
use crate::random::ContextRandomExt;
use crate::report::{ContextReportExt, FlightReport};
use crate::{define_data_plugin, define_rng};

define_rng!(LayoverRng);

pub const LAYOVER_MEAN: f64 = 105.0;
pub const LAYOVER_SD: f64 = 25.0;
pub const LAYOVER_MIN: f64 = 30.0;
pub const LAYOVER_MAX: f64 = 180.0;

#[must_use]
pub fn clamp_layover(draw: f64) -> f64 {
    draw.clamp(LAYOVER_MIN, LAYOVER_MAX)
}

/// Minutes between landing and the next departure.
pub fn sample_layover(context: &Context) -> f64 {
    let normal = Normal::new(LAYOVER_MEAN, LAYOVER_SD).expect("layover deviation is positive");
    clamp_layover(context.sample_distr(LayoverRng, normal))
}

/// Cumulative results of one run.
#[derive(Debug, Default)]
pub struct ItineraryState {
    pub horizon: f64,
    pub occupancy: usize,
    pub newly_infected: usize,
    /// Every pid ever reported infected. Pids are per-flight labels, so this
    /// can never exceed the occupancy.
    pub infected_pids: FxHashSet<PassengerId>,
    error: Option<SimError>,
}

define_data_plugin!(pub(crate) ItineraryPlugin, ItineraryState, ItineraryState::default());

pub trait ContextItineraryExt {
    /// Resets the run state for a new simulation.
    fn init_itinerary(&mut self, horizon: f64, occupancy: usize);

    fn itinerary(&self) -> Option<&ItineraryState>;

    /// Records the first fatal error raised inside an event and stops the
    /// event loop.
    fn fail(&mut self, error: SimError);

    fn take_error(&mut self) -> Option<SimError>;
}

impl ContextItineraryExt for Context {
    fn init_itinerary(&mut self, horizon: f64, occupancy: usize) {
        *self.get_data_mut(ItineraryPlugin) = ItineraryState {
            horizon,
            occupancy,
            ..ItineraryState::default()
        };
    }

    fn itinerary(&self) -> Option<&ItineraryState> {
        self.get_data(ItineraryPlugin)
    }

    fn fail(&mut self, error: SimError) {
        let state = self.get_data_mut(ItineraryPlugin);
        if state.error.is_none() {
            state.error = Some(error);
        }
        self.shutdown();
    }

    fn take_error(&mut self) -> Option<SimError> {
        self.get_data_mut(ItineraryPlugin).error.take()
    }
}

/// Registers and boards a flight now, then schedules its departure and
/// landing.
///
/// Departure is scheduled ahead of landing so that a zero-length flight
/// takes off before it lands. Landing is scheduled before departure starts
/// any of the flight's cabin processes, so at `departure + duration` it runs
/// ahead of them.
///
/// # Errors
///
/// Returns a `SamplingError` if the flight cannot be boarded. Nothing is
/// scheduled for it in that case.
pub fn spawn_flight(
    context: &mut Context,
    departure: f64,
    duration: f64,
    seed_passengers: Vec<Passenger>,
) -> Result<FlightId, SimError> {
    let occupancy = context.get_data_mut(ItineraryPlugin).occupancy;
    let flight_id = context.register_flight(departure, duration, occupancy, seed_passengers);
    debug!("spawned flight {flight_id}: departs {departure:.1}, lasts {duration:.1}");
    board_flight(context, flight_id)?;

    context.add_plan(departure, move |context| depart_flight(context, flight_id));
    context.add_plan(departure + duration, move |context| {
        if let Err(error) = land_flight(context, flight_id) {
            context.fail(error);
        }
    });
    Ok(flight_id)
}

fn land_flight(context: &mut Context, flight_id: FlightId) -> Result<(), SimError> {
    let flight = context.flight_mut(flight_id);
    flight.land();
    let summary = flight.summary();
    info!(
        "flight {} landed at {:.1}: {} infected ({} new), {} not yet contagious",
        summary.flight_id,
        summary.landing_time(),
        summary.infected_pids.len(),
        summary.new_infections,
        summary.not_contagious
    );
    if context.has_report::<FlightReport>() {
        context.send_report(FlightReport::from(&summary))?;
    }

    let state = context.get_data_mut(ItineraryPlugin);
    state.newly_infected += summary.new_infections;
    state.infected_pids.extend(summary.infected_pids.iter().copied());

    for (departure, seeds) in continuing_groups(context, flight_id, &summary) {
        let duration = context.sample_flight_duration()?;
        spawn_flight(context, departure, duration, seeds)?;
    }
    Ok(())
}

/// Infected passengers who continue before the horizon, grouped by next
/// departure time in the order the groups were first seen.
fn continuing_groups(
    context: &Context,
    flight_id: FlightId,
    summary: &FlightSummary,
) -> Vec<(f64, Vec<Passenger>)> {
    let horizon = context.itinerary().map_or(0.0, |state| state.horizon);
    let flight = context.flight(flight_id);
    let mut groups: IndexMap<u64, (f64, Vec<Passenger>)> = IndexMap::new();

    for pid in &summary.infected_pids {
        let next_departure = summary.landing_time() + sample_layover(context);
        if next_departure >= horizon {
            continue;
        }
        groups
            .entry(next_departure.to_bits())
            .or_insert_with(|| (next_departure, Vec::new()))
            .1
            .push(flight.passenger(*pid).clone());
    }
    groups.into_values().collect()
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::flight::FlightStatus;
    use crate::flight_duration::FlightDurations;

    fn context_with(durations: Vec<f64>, horizon: f64, occupancy: usize) -> Context {
        let mut context = Context::new();
        context.init_random(21);
        context.set_flight_durations(FlightDurations::new(durations).unwrap());
        context.init_itinerary(horizon, occupancy);
        context
    }

    fn seeds(count: usize) -> Vec<Passenger> {
        (0..count)
            .map(|pid| Passenger::index_case(PassengerId(pid), 1))
            .collect()
    }

    #[test]
    fn clamp_keeps_layovers_in_bounds() {
        assert_eq!(clamp_layover(-40.0), LAYOVER_MIN);
        assert_eq!(clamp_layover(29.9), LAYOVER_MIN);
        assert_eq!(clamp_layover(105.0), 105.0);
        assert_eq!(clamp_layover(500.0), LAYOVER_MAX);
    }

    #[test]
    fn sampled_layovers_in_bounds() {
        let context = context_with(vec![60.0], 1000.0, 6);
        for _ in 0..500 {
            let layover = sample_layover(&context);
            assert!((LAYOVER_MIN..=LAYOVER_MAX).contains(&layover));
        }
    }

    #[test]
    fn zero_length_flight_reports_only_its_seed() {
        let mut context = context_with(vec![0.0], 10.0, 6);
        let id = spawn_flight(&mut context, 0.0, 0.0, seeds(1)).unwrap();
        context.execute_until(10.0);

        let flight = context.flight(id);
        assert_eq!(flight.status(), FlightStatus::Landed);
        let summary = flight.summary();
        assert_eq!(summary.new_infections, 0);
        assert_eq!(summary.infected_pids.len(), 1);
        // The earliest possible successor departs at 30.
        assert_eq!(context.flight_count(), 1);
        assert_eq!(context.itinerary().unwrap().infected_pids.len(), 1);
    }

    #[test]
    fn successors_depart_after_layover() {
        let mut context = context_with(vec![20.0], 1000.0, 12);
        spawn_flight(&mut context, 0.0, 20.0, seeds(3)).unwrap();
        context.execute_until(21.0);

        let successors: Vec<_> = (2..=context.flight_count())
            .map(|id| context.flight(FlightId(id)))
            .collect();
        assert!(!successors.is_empty());
        let seeded: usize = successors.iter().map(|f| f.seed_passengers().len()).sum();
        assert!(seeded >= 3);
        for flight in successors {
            assert_eq!(flight.status(), FlightStatus::Scheduled);
            assert!((20.0 + LAYOVER_MIN..=20.0 + LAYOVER_MAX).contains(&flight.departure()));
            assert_eq!(flight.occupancy(), 12);
        }
    }

    #[test]
    fn successors_are_seeded_at_the_parent_landing() {
        let mut context = context_with(vec![60.0], 1000.0, 12);
        spawn_flight(&mut context, 0.0, 10.0, seeds(2)).unwrap();
        context.execute_until(10.5);

        let successors: Vec<FlightId> = (2..=context.flight_count()).map(FlightId).collect();
        assert!(!successors.is_empty());
        for id in &successors {
            let flight = context.flight(*id);
            assert_eq!(flight.status(), FlightStatus::Scheduled);
            assert_eq!(flight.passengers().len(), 12);
            assert_eq!(
                flight.summary().infected_pids.len(),
                flight.seed_passengers().len()
            );
        }

        // Incubation started at 10, so every seeded pool member is contagious
        // by 10 + 240 whenever its flight departs.
        context.execute_until(10.0 + 240.5);
        for id in &successors {
            let flight = context.flight(*id);
            let contagious = flight.passengers().iter().filter(|p| p.is_contagious()).count();
            assert!(contagious >= flight.seed_passengers().len());
        }
    }

    #[test]
    fn late_successor_keeps_its_pool_untouched() {
        // Departs at 100 but lasts only 60, so no cabin process ever runs.
        let mut context = context_with(vec![60.0], 1000.0, 12);
        context.execute_until(50.0);
        let id = spawn_flight(&mut context, 100.0, 60.0, seeds(3)).unwrap();
        context.execute_until(159.0);

        let flight = context.flight(id);
        assert!(flight.is_airborne());
        assert_eq!(flight.new_infected_count(), 0);
        assert_eq!(flight.lavatory().contamination_time(), None);
        // Three incubation timers and the landing.
        assert_eq!(context.pending_plans(), 4);
    }

    #[test]
    fn boarding_failure_is_returned() {
        let mut context = context_with(vec![60.0], 1000.0, 4);
        let result = spawn_flight(&mut context, 0.0, 60.0, seeds(5));
        assert!(matches!(result, Err(SimError::SamplingError(_))));
        assert_eq!(context.pending_plans(), 0);
    }

    #[test]
    fn nothing_departs_at_or_after_horizon() {
        let mut context = context_with(vec![40.0], 200.0, 6);
        spawn_flight(&mut context, 0.0, 40.0, seeds(2)).unwrap();
        context.execute_until(200.0);

        for id in 1..=context.flight_count() {
            assert!(context.flight(FlightId(id)).departure() < 200.0);
        }
    }

    #[test]
    fn missing_duration_source_fails_the_run() {
        let mut context = Context::new();
        context.init_random(4);
        context.init_itinerary(1000.0, 6);
        spawn_flight(&mut context, 0.0, 5.0, seeds(1)).unwrap();
        context.execute_until(1000.0);

        assert!(context.is_shutdown());
        assert!(matches!(
            context.take_error(),
            Some(SimError::ConfigError(_))
        ));
    }

    #[test]
    fn first_error_is_kept() {
        let mut context = Context::new();
        context.fail(SimError::ConfigError("first".to_string()));
        context.fail(SimError::SamplingError("second".to_string()));
        match context.take_error() {
            Some(SimError::ConfigError(message)) => assert_eq!(message, "first"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(context.take_error().is_none());
    }

    #[test]
    fn cumulative_counters_grow_on_landing() {
        let mut context = context_with(vec![30.0], 50.0, 6);
        spawn_flight(&mut context, 0.0, 30.0, seeds(2)).unwrap();
        context.execute_until(50.0);

        let state = context.itinerary().unwrap();
        assert_eq!(
            state.newly_infected,
            context.flight(FlightId(1)).summary().new_infections
        );
        assert!(state.infected_pids.len() >= 2);
    }
}
