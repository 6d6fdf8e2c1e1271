use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::Path;

use csv::Writer;
use serde_derive::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::SimError;
use crate::flight::FlightSummary;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), SimError>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! create_report_trait {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::SimError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}

/// One row per landed flight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlightReport {
    pub flight_id: usize,
    pub departure: f64,
    pub duration: f64,
    pub seeded: usize,
    pub new_infections: usize,
    pub infected: usize,
    pub not_contagious: usize,
}

create_report_trait!(FlightReport);

impl From<&FlightSummary> for FlightReport {
    fn from(summary: &FlightSummary) -> Self {
        FlightReport {
            flight_id: summary.flight_id.0,
            departure: summary.departure,
            duration: summary.duration,
            seeded: summary.seeded,
            new_infections: summary.new_infections,
            infected: summary.infected_pids.len(),
            not_contagious: summary.not_contagious,
        }
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
}

// Maps each report type to its file writer.
crate::define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::new()),
    }
);

// Checks that the path is valid. Creates the file and all parent directories if
// they do not exist. Returns the file if successful. Called by `add_report`
fn generate_validate_filepath(path: &Path) -> Result<File, SimError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(SimError::ReportError(
            "Report output files must be CSVs at this time".to_string(),
        )),
    }
}

pub trait ContextReportExt {
    /// Call `add_report` with each report type, passing the complete path
    /// the report is written to.
    ///
    /// # Errors
    ///
    /// Returns a `SimError` if the path is not a `.csv` file or cannot be
    /// created.
    fn add_report<T: Report + 'static>(&mut self, filepath: &Path) -> Result<(), SimError>;

    /// Whether a writer was added for report type `T`.
    fn has_report<T: Report + 'static>(&self) -> bool;

    /// Write a new row with columns following items in the report struct
    /// to the report file associated with the report type struct.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if no writer was added for the report type, or
    /// the underlying error if the row cannot be written.
    fn send_report<T: Report>(&self, report: T) -> Result<(), SimError>;
}

impl ContextReportExt for Context {
    fn add_report<T: Report + 'static>(&mut self, filepath: &Path) -> Result<(), SimError> {
        let file = generate_validate_filepath(filepath)?;

        let data_container = self.get_data_mut(ReportPlugin);
        let writer = Writer::from_writer(file);
        let mut file_writer = data_container.file_writers.borrow_mut();
        file_writer.insert(TypeId::of::<T>(), writer);
        Ok(())
    }

    fn has_report<T: Report + 'static>(&self) -> bool {
        self.get_data(ReportPlugin).is_some_and(|data| {
            data.file_writers
                .borrow()
                .contains_key(&TypeId::of::<T>())
        })
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), SimError> {
        let missing = || SimError::ReportError("No writer found for the report type".to_string());
        // No data container will exist if no reports have been added
        let data_container = self.get_data(ReportPlugin).ok_or_else(missing)?;
        let mut writer_cell = data_container.file_writers.borrow_mut();
        let writer = writer_cell.get_mut(&report.type_id()).ok_or_else(missing)?;
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }
}
