//! CSV trend log.
//!
//! One header row per suite run and one row per scenario. The file is opened,
//! appended and closed for every row; no handle is kept between rows.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;
use crate::metrics::{Metric, Metrics};

pub const HEADER: [&str; 7] = [
    "Test Name",
    "read bw KiB/s",
    "read iops",
    "read lat ns",
    "write bw KiB/s",
    "write iops",
    "write lat ns",
];

/// Which metric groups a scenario reports in its trend row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Columns {
    Read,
    Write,
    Both,
}

/// Build the cells of one trend row. Absent metrics become empty cells.
pub fn row(scenario: &str, columns: Columns, metrics: &Metrics) -> Vec<String> {
    let cell = |metric: Metric| {
        metrics
            .get(metric)
            .map(|v| v.to_string())
            .unwrap_or_default()
    };

    let mut cells = vec![scenario.to_string()];
    match columns {
        Columns::Read => cells.extend(Metric::READ.map(cell)),
        Columns::Write => {
            cells.extend(Metric::READ.map(|_| String::new()));
            cells.extend(Metric::WRITE.map(cell));
        }
        Columns::Both => cells.extend(Metric::ALL.map(cell)),
    }
    cells
}

pub struct CsvTrendLog {
    path: PathBuf,
}

impl CsvTrendLog {
    /// Create (or truncate) the log file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, HarnessError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&path)?;
        Ok(CsvTrendLog { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<I, S>(&self, cells: I) -> Result<(), HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
        wtr.write_record(cells).map_err(std::io::Error::from)?;
        wtr.flush()?;
        Ok(())
    }
}

/// Where scenario rows go. Without a CSV log every call is a no-op.
#[derive(Default)]
pub struct TrendSink {
    log: Option<CsvTrendLog>,
}

impl TrendSink {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn csv(log: CsvTrendLog) -> Self {
        TrendSink { log: Some(log) }
    }

    pub fn header(&self) -> Result<(), HarnessError> {
        match &self.log {
            Some(log) => log.append(HEADER),
            None => Ok(()),
        }
    }

    pub fn record(
        &self,
        scenario: &str,
        columns: Columns,
        metrics: &Metrics,
    ) -> Result<(), HarnessError> {
        match &self.log {
            Some(log) => log.append(row(scenario, columns, metrics)),
            None => Ok(()),
        }
    }
}
