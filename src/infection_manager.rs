//! Applies infections and runs each infected passenger's incubation timer.
use log::trace;

use crate::context::Context;
use crate::define_rng;
use crate::flight::{ContextFlightsExt, FlightId};
use crate::passenger::{InfectionSource, PassengerId};
use crate::random::ContextRandomExt;

define_rng!(IncubationRng);

/// Incubation lasts between two and four hours.
pub const INCUBATION_MIN: f64 = 120.0;
pub const INCUBATION_MAX: f64 = 240.0;

/// Infects `pid` on `flight_id` and starts its incubation timer. Returns
/// `false` without side effects if the passenger was already infected.
pub fn infect_passenger(
    context: &mut Context,
    flight_id: FlightId,
    pid: PassengerId,
    source: InfectionSource,
) -> bool {
    if !context.flight_mut(flight_id).record_infection(pid, source) {
        return false;
    }
    trace!(
        "flight {flight_id}: passenger {pid} infected ({source:?}) at {:.1}",
        context.get_current_time()
    );
    schedule_incubation(context, flight_id, pid);
    true
}

/// Marks a boarding passenger infected by a carried-over seed case.
pub(crate) fn seed_infection(context: &mut Context, flight_id: FlightId, pid: PassengerId) {
    infect_passenger(context, flight_id, pid, InfectionSource::Seeded);
}

fn schedule_incubation(context: &mut Context, flight_id: FlightId, pid: PassengerId) {
    let incubation = context.sample_range(IncubationRng, INCUBATION_MIN..=INCUBATION_MAX);
    context.add_plan_after(incubation, move |context| {
        if context.flight_mut(flight_id).finish_incubation(pid) {
            trace!(
                "flight {flight_id}: passenger {pid} contagious at {:.1}",
                context.get_current_time()
            );
        }
    });
}
