//! Airborne transmission between passengers sharing a row.
//!
//! Every five minutes while a flight is airborne each row is checked: every
//! susceptible passenger is evaluated once against each contagious passenger
//! in the same row, with a probability that depends on their column distance
//! and grows with the flight's duration. Rows never interact.
use log::trace;

use crate::context::Context;
use crate::define_rng;
use crate::flight::{ContextFlightsExt, FlightId};
use crate::infection_manager::infect_passenger;
use crate::passenger::{InfectionSource, PassengerId};
use crate::random::ContextRandomExt;

define_rng!(ProximityRng);

/// Minutes of flight time between row checks.
pub const CHECK_INTERVAL: f64 = 5.0;

/// Per-check infection probability for two passengers `distance` seats
/// apart on a flight lasting `flight_time` minutes. This can exceed 1 on
/// long flights, in which case every draw succeeds.
#[must_use]
pub fn proximity_probability(distance: usize, flight_time: f64) -> f64 {
    match distance {
        1 => 0.02 * flight_time,
        2 => 0.01 * flight_time,
        3 => 0.005 * flight_time,
        _ => 0.0,
    }
}

/// Runs one row check on an airborne flight. Returns how many passengers
/// were infected.
pub fn evaluate_rows(context: &mut Context, flight_id: FlightId) -> usize {
    let candidates = exposures(context, flight_id);

    let mut infected = 0;
    for (pid, probabilities) in candidates {
        for p in probabilities {
            if context.sample_chance(ProximityRng, p) {
                if infect_passenger(context, flight_id, pid, InfectionSource::Proximity) {
                    infected += 1;
                }
                break;
            }
        }
    }
    if infected > 0 {
        trace!("flight {flight_id}: {infected} proximity infections");
    }
    infected
}

/// Each susceptible passenger with at least one contagious row neighbor in
/// range, paired with one probability per such neighbor.
fn exposures(context: &Context, flight_id: FlightId) -> Vec<(PassengerId, Vec<f64>)> {
    let flight = context.flight(flight_id);
    let flight_time = flight.duration();
    let mut candidates = Vec::new();

    for row in 0..flight.rows() {
        let members = flight.row(row);
        let contagious: Vec<_> = members
            .iter()
            .map(|pid| flight.passenger(*pid))
            .filter(|p| p.is_contagious())
            .filter_map(|p| p.seat())
            .collect();
        if contagious.is_empty() {
            continue;
        }

        for passenger in members.iter().map(|pid| flight.passenger(*pid)) {
            if !passenger.can_be_infected() {
                continue;
            }
            let Some(seat) = passenger.seat() else {
                continue;
            };
            let probabilities: Vec<f64> = contagious
                .iter()
                .map(|other| proximity_probability(seat.column_distance(*other), flight_time))
                .filter(|p| *p > 0.0)
                .collect();
            if !probabilities.is_empty() {
                candidates.push((passenger.pid(), probabilities));
            }
        }
    }
    candidates
}

/// Starts the periodic row check for a flight that has just departed.
pub(crate) fn start_row_checks(context: &mut Context, flight_id: FlightId) {
    let now = context.get_current_time();
    if context.flight(flight_id).in_progress(now) {
        context.add_plan_after(CHECK_INTERVAL, move |context| row_check(context, flight_id));
    }
}

fn row_check(context: &mut Context, flight_id: FlightId) {
    if !context.flight(flight_id).is_airborne() {
        return;
    }
    evaluate_rows(context, flight_id);
    start_row_checks(context, flight_id);
}
