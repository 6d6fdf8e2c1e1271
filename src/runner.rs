use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Command, FromArgMatches as _};
use log::info;
use serde_derive::{Deserialize, Serialize};

use crate::context::Context;
use crate::engine::run_with_parameters;
use crate::error::SimError;
use crate::flight_duration::{ContextFlightDurationExt, FlightDurations};
use crate::log::apply_log_spec;
use crate::parameters::{init_parameters, load_parameters, ParametersValues};
use crate::random::ContextRandomExt;
use crate::report::{ContextReportExt, FlightReport};

/// File the per-run summary is written to, inside the output directory.
pub const SUMMARY_FILE: &str = "results.csv";

/// Command line arguments. Anything given here overrides the config file.
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Base random seed; run `i` uses `seed + i`
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a JSON parameters file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the results and any flight reports
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// CSV file with an `air_time` column
    #[arg(short, long)]
    pub durations: Option<PathBuf>,

    /// Number of independent runs
    #[arg(long)]
    pub runs: Option<u64>,

    /// Simulation horizon in minutes
    #[arg(long)]
    pub horizon: Option<f64>,

    /// Passengers per flight
    #[arg(long)]
    pub occupancy: Option<usize>,

    /// Log level, or comma separated `module=level` filters
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also write one CSV row per landed flight for each run
    #[arg(long)]
    pub flight_report: bool,
}

fn create_cli() -> Command {
    let cli = Command::new("flight-contagion")
        .about("Simulates contagion spread across chained air travel itineraries");
    BaseArgs::augment_args(cli)
}

/// The outcome of one run, as written to the summary file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRecord {
    /// 1-based run number.
    pub run: u64,
    pub total_flights: usize,
    pub newly_infected: usize,
    pub total_infected: usize,
}

/// Runs `parameters.runs` independent simulations, each in a fresh context.
/// Flight reports, when enabled, are written to `output_dir`.
///
/// # Errors
///
/// Stops at the first run that fails and returns its error.
pub fn run_replicates(
    parameters: &ParametersValues,
    durations: &FlightDurations,
    output_dir: &Path,
) -> Result<Vec<RunRecord>, SimError> {
    let mut records = Vec::new();
    for i in 0..parameters.runs {
        let run = i + 1;
        let mut context = Context::new();
        context.init_random(parameters.base_seed.wrapping_add(i));
        init_parameters(&mut context, parameters.clone())?;
        context.set_flight_durations(durations.clone());
        if parameters.flight_report {
            context.add_report::<FlightReport>(&output_dir.join(format!("flights_run_{run}.csv")))?;
        }

        let outcome = run_with_parameters(&mut context)?;
        info!(
            "run {run}: {} flights, {} newly infected, {} total infected",
            outcome.total_flights, outcome.newly_infected, outcome.total_infected
        );
        records.push(RunRecord {
            run,
            total_flights: outcome.total_flights,
            newly_infected: outcome.newly_infected,
            total_infected: outcome.total_infected,
        });
    }
    Ok(records)
}

/// Writes one row per run under the header
/// `run,total_flights,newly_infected,total_infected`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_summary(path: &Path, records: &[RunRecord]) -> Result<(), SimError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        writer.write_record(["run", "total_flights", "newly_infected", "total_infected"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Resolves parameters from the config file (or defaults) and the command
/// line overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the final values
/// are invalid.
pub fn resolve_parameters(args: &BaseArgs) -> Result<ParametersValues, SimError> {
    let mut parameters = match &args.config {
        Some(path) => {
            println!("Loading parameters from: {}", path.display());
            load_parameters(path)?
        }
        None => ParametersValues::default(),
    };

    if let Some(seed) = args.random_seed {
        parameters.base_seed = seed;
    }
    if let Some(durations) = &args.durations {
        parameters.flight_durations_file.clone_from(durations);
    }
    if let Some(runs) = args.runs {
        parameters.runs = runs;
    }
    if let Some(horizon) = args.horizon {
        parameters.horizon = horizon;
    }
    if let Some(occupancy) = args.occupancy {
        parameters.occupancy = occupancy;
    }
    if args.flight_report {
        parameters.flight_report = true;
    }
    parameters.validate()?;
    Ok(parameters)
}

/// Runs every replicate described by `args` and writes the summary file.
///
/// # Errors
///
/// Returns an error if logging, parameters or duration data are invalid, a
/// run fails, or the output cannot be written.
pub fn run_with_args(args: &BaseArgs) -> Result<Vec<RunRecord>, SimError> {
    if let Some(spec) = &args.log_level {
        apply_log_spec(spec)?;
    }
    let parameters = resolve_parameters(args)?;
    let durations = FlightDurations::from_csv(&parameters.flight_durations_file)?;

    let started = Instant::now();
    let records = run_replicates(&parameters, &durations, &args.output_dir)?;
    let summary_path = args.output_dir.join(SUMMARY_FILE);
    write_summary(&summary_path, &records)?;
    info!(
        "{} runs finished in {}",
        records.len(),
        humantime::format_duration(started.elapsed())
    );
    println!("Wrote {}", summary_path.display());
    Ok(records)
}

/// Parses the process command line and runs it.
///
/// # Errors
///
/// Returns an error if argument parsing or any run fails.
pub fn run() -> Result<Vec<RunRecord>, Box<dyn std::error::Error>> {
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_with_args(&args)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn durations() -> FlightDurations {
        FlightDurations::new(vec![40.0, 55.0, 70.0]).unwrap()
    }

    fn small_parameters(runs: u64) -> ParametersValues {
        ParametersValues {
            horizon: 400.0,
            occupancy: 30,
            runs,
            base_seed: 8,
            ..ParametersValues::default()
        }
    }

    #[test]
    fn runs_are_numbered_from_one() {
        let dir = tempdir().unwrap();
        let records = run_replicates(&small_parameters(3), &durations(), dir.path()).unwrap();
        let runs: Vec<u64> = records.iter().map(|r| r.run).collect();
        assert_eq!(runs, vec![1, 2, 3]);
        assert!(records.iter().all(|r| r.total_flights >= 1));
    }

    #[test]
    fn replicate_seeds_follow_the_base_seed() {
        let dir = tempdir().unwrap();
        let parameters = small_parameters(2);
        let records = run_replicates(&parameters, &durations(), dir.path()).unwrap();

        let second_alone = ParametersValues {
            base_seed: parameters.base_seed + 1,
            runs: 1,
            ..parameters
        };
        let rerun = run_replicates(&second_alone, &durations(), dir.path()).unwrap();
        assert_eq!(records[1].total_flights, rerun[0].total_flights);
        assert_eq!(records[1].newly_infected, rerun[0].newly_infected);
        assert_eq!(records[1].total_infected, rerun[0].total_infected);
    }

    #[test]
    fn flight_reports_are_written_per_run() {
        let dir = tempdir().unwrap();
        let parameters = ParametersValues {
            flight_report: true,
            ..small_parameters(2)
        };
        run_replicates(&parameters, &durations(), dir.path()).unwrap();
        for run in 1..=2 {
            let path = dir.path().join(format!("flights_run_{run}.csv"));
            let contents = std::fs::read_to_string(path).unwrap();
            assert!(contents.starts_with("flight_id,departure,duration"));
        }
    }

    #[test]
    fn summary_has_a_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join(SUMMARY_FILE);
        let records = vec![RunRecord {
            run: 1,
            total_flights: 12,
            newly_infected: 3,
            total_infected: 9,
        }];
        write_summary(&path, &records).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "run,total_flights,newly_infected,total_infected\n1,12,3,9\n"
        );
    }

    #[test]
    fn empty_summary_still_has_a_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        write_summary(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "run,total_flights,newly_infected,total_infected\n"
        );
    }

    #[test]
    fn command_line_overrides_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"horizon": 600.0, "runs": 4, "base_seed": 3}}"#).unwrap();
        let args = BaseArgs {
            config: Some(file.path().to_path_buf()),
            runs: Some(2),
            occupancy: Some(60),
            ..BaseArgs::default()
        };
        let parameters = resolve_parameters(&args).unwrap();
        assert_eq!(parameters.runs, 2);
        assert_eq!(parameters.occupancy, 60);
        assert_eq!(parameters.base_seed, 3);
        assert!((parameters.horizon - 600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = BaseArgs {
            horizon: Some(-10.0),
            ..BaseArgs::default()
        };
        assert!(matches!(
            resolve_parameters(&args),
            Err(SimError::ConfigError(_))
        ));
    }

    #[test]
    fn missing_durations_file_fails() {
        let dir = tempdir().unwrap();
        let args = BaseArgs {
            durations: Some(dir.path().join("missing.csv")),
            output_dir: dir.path().to_path_buf(),
            runs: Some(1),
            ..BaseArgs::default()
        };
        assert!(matches!(run_with_args(&args), Err(SimError::IoError(_))));
        assert!(!dir.path().join(SUMMARY_FILE).exists());
    }
}
