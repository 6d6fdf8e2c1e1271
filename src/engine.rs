//! One simulation run: seed the first flight, run the clock to the horizon,
//! collect the totals.
use log::info;

use crate::context::Context;
use crate::error::SimError;
use crate::flight::{draw_connections, ContextFlightsExt};
use crate::flight_duration::ContextFlightDurationExt;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::itinerary::{spawn_flight, ContextItineraryExt, ItineraryPlugin};
use crate::parameters::{Parameters, ParametersValues, DEFAULT_INDEX_CASES};
use crate::passenger::{Passenger, PassengerId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Minutes of virtual time to simulate. No flight departs at or after it.
    pub horizon: f64,
    pub occupancy: usize,
    /// Contagious passengers seeded onto the first flight.
    pub index_cases: usize,
}

impl EngineConfig {
    #[must_use]
    pub fn new(horizon: f64, occupancy: usize) -> EngineConfig {
        EngineConfig {
            horizon,
            occupancy,
            index_cases: DEFAULT_INDEX_CASES,
        }
    }

    /// # Errors
    ///
    /// Returns a `ConfigError` for a horizon that is negative or not finite
    /// or an empty flight, and a `SamplingError` when the index cases do not
    /// fit on the first flight.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.horizon.is_finite() || self.horizon < 0.0 {
            return Err(SimError::ConfigError(format!(
                "horizon must be a finite non-negative number of minutes, got {}",
                self.horizon
            )));
        }
        if self.occupancy == 0 {
            return Err(SimError::ConfigError(
                "occupancy must be positive".to_string(),
            ));
        }
        if self.index_cases > self.occupancy {
            return Err(SimError::SamplingError(format!(
                "cannot seed {} index cases onto a flight of {}",
                self.index_cases, self.occupancy
            )));
        }
        Ok(())
    }
}

impl From<&ParametersValues> for EngineConfig {
    fn from(parameters: &ParametersValues) -> Self {
        EngineConfig {
            horizon: parameters.horizon,
            occupancy: parameters.occupancy,
            index_cases: parameters.index_cases,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub total_flights: usize,
    pub newly_infected: usize,
    /// Distinct pids ever reported infected, index cases included.
    pub total_infected: usize,
}

/// Runs one simulation on `context`, which must already have a random seed
/// and a flight-duration source.
///
/// # Errors
///
/// Fails before anything is scheduled if `config` is invalid or no duration
/// source is installed, and returns the first error raised while the
/// simulation runs.
pub fn run_simulation(
    context: &mut Context,
    config: &EngineConfig,
) -> Result<SimulationOutcome, SimError> {
    config.validate()?;
    if !context.has_flight_durations() {
        return Err(SimError::ConfigError(
            "no flight duration source installed".to_string(),
        ));
    }

    context.init_itinerary(config.horizon, config.occupancy);
    let mut index_cases = Vec::with_capacity(config.index_cases);
    for pid in 0..config.index_cases {
        index_cases.push(Passenger::index_case(PassengerId(pid), draw_connections(context)?));
    }
    context
        .get_data_mut(ItineraryPlugin)
        .infected_pids
        .extend(index_cases.iter().map(Passenger::pid));

    let duration = context.sample_flight_duration()?;
    spawn_flight(context, 0.0, duration, index_cases)?;

    context.execute_until(config.horizon);
    if let Some(error) = context.take_error() {
        return Err(error);
    }

    let state = context
        .itinerary()
        .ok_or_else(|| SimError::ConfigError("itinerary state missing".to_string()))?;
    let outcome = SimulationOutcome {
        total_flights: context.flight_count(),
        newly_infected: state.newly_infected,
        total_infected: state.infected_pids.len(),
    };
    info!(
        "simulation finished at {:.1}: {} flights, {} newly infected, {} total infected",
        context.get_current_time(),
        outcome.total_flights,
        outcome.newly_infected,
        outcome.total_infected
    );
    Ok(outcome)
}

/// Runs one simulation configured by the `Parameters` global property.
///
/// # Errors
///
/// Returns a `ConfigError` if the property was never set, and otherwise
/// whatever `run_simulation` returns.
pub fn run_with_parameters(context: &mut Context) -> Result<SimulationOutcome, SimError> {
    let config = context
        .get_global_property_value(Parameters)
        .map(EngineConfig::from)
        .ok_or_else(|| SimError::ConfigError("parameters were never initialized".to_string()))?;
    run_simulation(context, &config)
}
