//! A discrete-event simulation of contagion spreading through air travelers
//! whose itineraries chain several flights together.
//!
//! The central object of a simulation is the `Context`, which owns the
//! virtual clock and the queue of scheduled plans and holds the data of
//! every module. A run consists of:
//! * A first flight seeded with a handful of index cases.
//! * Per flight, a periodic check of airborne transmission between row
//!   neighbors and a shared, single-occupancy lavatory whose contamination
//!   decays over time.
//! * An incubation timer for each infected passenger.
//! * An itinerary controller that, at each landing, samples layovers for the
//!   infected passengers and spawns the follow-on flights that depart before
//!   the horizon.
//!
//! [`engine::run_simulation`] performs one run and [`runner`] drives many
//! runs from the command line.
pub mod context;
pub mod data_plugin;
pub mod engine;
pub mod error;
pub mod flight;
pub mod flight_duration;
pub mod global_properties;
pub mod infection_manager;
pub mod itinerary;
pub mod lavatory;
pub mod log;
pub mod parameters;
pub mod passenger;
pub mod plan;
pub mod proximity;
pub mod random;
pub mod report;
pub mod resource;
pub mod runner;

// Re-exported for use in macros
pub use csv;
pub use rand;

pub mod prelude {
    pub use crate::context::Context;
    pub use crate::engine::{run_simulation, run_with_parameters, EngineConfig, SimulationOutcome};
    pub use crate::error::SimError;
    pub use crate::flight::{ContextFlightsExt, FlightId, FlightSummary};
    pub use crate::flight_duration::{ContextFlightDurationExt, FlightDurations};
    pub use crate::global_properties::ContextGlobalPropertiesExt;
    pub use crate::itinerary::ContextItineraryExt;
    pub use crate::parameters::{Parameters, ParametersValues};
    pub use crate::random::ContextRandomExt;
    pub use crate::report::ContextReportExt;
    pub use crate::{define_data_plugin, define_global_property, define_rng};
}
