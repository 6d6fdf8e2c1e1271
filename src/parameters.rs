use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_global_property;
use crate::error::SimError;
use crate::global_properties::{load_json_file, ContextGlobalPropertiesExt};

/// 48 hours.
pub const DEFAULT_HORIZON: f64 = 48.0 * 60.0;
pub const DEFAULT_OCCUPANCY: usize = 175;
/// Passengers who start the first flight already contagious.
pub const DEFAULT_INDEX_CASES: usize = 5;
pub const DEFAULT_RUNS: u64 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ParametersValues {
    /// Simulation horizon in minutes. No flight departs at or after it.
    pub horizon: f64,
    pub occupancy: usize,
    pub index_cases: usize,
    /// Number of independent replicates.
    pub runs: u64,
    /// Replicate `i` is seeded with `base_seed + i`.
    pub base_seed: u64,
    /// CSV with an `air_time` column, in minutes.
    pub flight_durations_file: PathBuf,
    /// Also write one row per landed flight.
    pub flight_report: bool,
}

impl Default for ParametersValues {
    fn default() -> Self {
        ParametersValues {
            horizon: DEFAULT_HORIZON,
            occupancy: DEFAULT_OCCUPANCY,
            index_cases: DEFAULT_INDEX_CASES,
            runs: DEFAULT_RUNS,
            base_seed: 0,
            flight_durations_file: PathBuf::from("flights_southwest.csv"),
            flight_report: false,
        }
    }
}

define_global_property!(pub Parameters, ParametersValues);

impl ParametersValues {
    /// Check whether parameters are usable before anything is loaded or
    /// simulated, so that a bad input file fails immediately instead of
    /// producing a silently degenerate run.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(SimError::ConfigError(format!(
                "horizon must be a positive number of minutes, got {}",
                self.horizon
            )));
        }
        if self.occupancy == 0 {
            return Err(SimError::ConfigError(
                "occupancy must be positive".to_string(),
            ));
        }
        if self.index_cases > self.occupancy {
            return Err(SimError::ConfigError(format!(
                "{} index cases do not fit on a flight of {}",
                self.index_cases, self.occupancy
            )));
        }
        if self.runs == 0 {
            return Err(SimError::ConfigError(
                "at least one run is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads parameters from `file_path` and validates them. Fields missing from
/// the file keep their defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any value is
/// invalid.
pub fn load_parameters(file_path: &Path) -> Result<ParametersValues, SimError> {
    let parameters: ParametersValues = load_json_file(file_path)?;
    parameters.validate()?;
    Ok(parameters)
}

/// Validates `parameters` and stores them as the `Parameters` global
/// property, where the engine reads its configuration from.
///
/// # Errors
///
/// Returns a `ConfigError` if any value is invalid; nothing is stored then.
pub fn init_parameters(
    context: &mut Context,
    parameters: ParametersValues,
) -> Result<(), SimError> {
    parameters.validate()?;
    context.set_global_property_value(Parameters, parameters);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        assert!(ParametersValues::default().validate().is_ok());
    }

    #[test]
    fn test_validate_horizon() {
        for horizon in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let parameters = ParametersValues {
                horizon,
                ..ParametersValues::default()
            };
            assert!(parameters.validate().is_err(), "horizon {horizon}");
        }
    }

    #[test]
    fn test_validate_occupancy() {
        let parameters = ParametersValues {
            occupancy: 0,
            index_cases: 0,
            ..ParametersValues::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn test_validate_index_cases() {
        let parameters = ParametersValues {
            occupancy: 4,
            index_cases: 5,
            ..ParametersValues::default()
        };
        assert!(matches!(
            parameters.validate(),
            Err(SimError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_runs() {
        let parameters = ParametersValues {
            runs: 0,
            ..ParametersValues::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"horizon": 600.0, "runs": 3}}"#).unwrap();

        let parameters = load_parameters(file.path()).unwrap();
        assert_eq!(parameters.runs, 3);
        assert_eq!(parameters.occupancy, DEFAULT_OCCUPANCY);
    }

    #[test]
    fn init_stores_the_global_property() {
        let mut context = Context::new();
        let parameters = ParametersValues {
            horizon: 600.0,
            ..ParametersValues::default()
        };
        init_parameters(&mut context, parameters.clone()).unwrap();
        assert_eq!(
            context.get_global_property_value(Parameters),
            Some(&parameters)
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"horizn": 600.0}}"#).unwrap();

        assert!(matches!(
            load_parameters(file.path()),
            Err(SimError::JsonError(_))
        ));
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"occupancy": 0}}"#).unwrap();
        assert!(matches!(
            load_parameters(file.path()),
            Err(SimError::ConfigError(_))
        ));
    }

    #[test]
    fn invalid_values_are_not_stored() {
        let mut context = Context::new();
        let parameters = ParametersValues {
            runs: 0,
            ..ParametersValues::default()
        };
        assert!(init_parameters(&mut context, parameters).is_err());
        assert!(context.get_global_property_value(Parameters).is_none());
    }
}
