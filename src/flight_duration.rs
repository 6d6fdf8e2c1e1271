//! Historical flight durations, sampled to set the length of each new flight.
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde_derive::Deserialize;

use crate::context::Context;
use crate::error::SimError;
use crate::rand::Rng;
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng};

define_rng!(FlightDurationRng);

#[derive(Deserialize)]
struct AirTimeRecord {
    air_time: Option<f64>,
}

/// A non-empty set of observed air times in minutes. Cloning shares the
/// underlying data.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightDurations {
    air_times: Arc<[f64]>,
}

impl FlightDurations {
    /// # Errors
    ///
    /// Returns a `ConfigError` if `air_times` is empty or holds a negative or
    /// non-finite value.
    pub fn new(air_times: Vec<f64>) -> Result<FlightDurations, SimError> {
        if air_times.is_empty() {
            return Err(SimError::ConfigError(
                "no flight durations available".to_string(),
            ));
        }
        if let Some(bad) = air_times.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(SimError::ConfigError(format!(
                "flight durations must be non-negative finite minutes, got {bad}"
            )));
        }
        Ok(FlightDurations {
            air_times: air_times.into(),
        })
    }

    /// Reads the `air_time` column of a CSV file with headers. Rows with a
    /// blank or `NaN` air time are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value is not a number,
    /// or no usable values remain.
    pub fn from_csv(path: &Path) -> Result<FlightDurations, SimError> {
        let file = std::fs::File::open(path)?;
        let durations = FlightDurations::from_reader(file)?;
        debug!(
            "loaded {} flight durations from {}",
            durations.len(),
            path.display()
        );
        Ok(durations)
    }

    /// # Errors
    ///
    /// See [`FlightDurations::from_csv`].
    pub fn from_reader<R: Read>(reader: R) -> Result<FlightDurations, SimError> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut air_times = Vec::new();
        for record in reader.deserialize() {
            let record: AirTimeRecord = record?;
            match record.air_time {
                Some(air_time) if !air_time.is_nan() => air_times.push(air_time),
                _ => {}
            }
        }
        FlightDurations::new(air_times)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.air_times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.air_times.is_empty()
    }

    /// One observed air time, chosen uniformly.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.air_times[rng.random_range(0..self.air_times.len())]
    }
}

define_data_plugin!(
    FlightDurationsPlugin,
    Option<FlightDurations>,
    None
);

pub trait ContextFlightDurationExt {
    fn set_flight_durations(&mut self, durations: FlightDurations);

    fn has_flight_durations(&self) -> bool;

    /// Draws the duration of a new flight.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no durations were installed.
    fn sample_flight_duration(&self) -> Result<f64, SimError>;
}

impl ContextFlightDurationExt for Context {
    fn set_flight_durations(&mut self, durations: FlightDurations) {
        *self.get_data_mut(FlightDurationsPlugin) = Some(durations);
    }

    fn has_flight_durations(&self) -> bool {
        self.get_data(FlightDurationsPlugin)
            .is_some_and(Option::is_some)
    }

    fn sample_flight_duration(&self) -> Result<f64, SimError> {
        let durations = self
            .get_data(FlightDurationsPlugin)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                SimError::ConfigError("no flight duration source installed".to_string())
            })?;
        Ok(self.sample(FlightDurationRng, |rng| durations.sample(rng)))
    }
}
