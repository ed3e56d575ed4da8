//! Baseline comparison.
//!
//! A baseline table is a CSV file in the trend log layout: one row per
//! scenario, the first cell naming it. Each cell becomes an expected value with
//! an allowed deviation of `tolerance` percent of that value.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{HarnessError, ScenarioFailure};
use crate::metrics::{Metric, Metrics};

pub const DEFAULT_TOLERANCE_PERCENT: u8 = 10;

const HEADER_MARKER: &str = "Test Name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub expected: i64,
    pub deviation: i64,
}

impl Expectation {
    /// `None` when the deviation does not fit in an `i64`.
    pub fn with_tolerance(expected: i64, tolerance_percent: u8) -> Option<Self> {
        let deviation = i128::from(expected).abs() * i128::from(tolerance_percent) / 100;
        Some(Expectation {
            expected,
            deviation: i64::try_from(deviation).ok()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineEntry {
    fields: BTreeMap<Metric, Expectation>,
}

impl BaselineEntry {
    pub fn get(&self, metric: Metric) -> Option<Expectation> {
        self.fields.get(&metric).copied()
    }
}

#[derive(Debug, Default)]
pub struct BaselineTable {
    entries: BTreeMap<String, BaselineEntry>,
}

impl BaselineTable {
    pub fn load(path: &Path, tolerance_percent: u8) -> Result<Self, HarnessError> {
        let file = std::fs::File::open(path).map_err(|e| HarnessError::BaselineFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_reader(file, tolerance_percent).map_err(|reason| HarnessError::BaselineFile {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_reader<R: std::io::Read>(reader: R, tolerance_percent: u8) -> Result<Self, String> {
        if tolerance_percent > 100 {
            return Err(format!("tolerance {tolerance_percent}% is outside 0-100"));
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = BTreeMap::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| format!("row {}: {e}", idx + 1))?;
            let Some(name) = record.get(0).filter(|n| !n.is_empty()) else {
                continue;
            };
            if name == HEADER_MARKER {
                continue;
            }

            let mut fields = BTreeMap::new();
            for (col, metric) in Metric::ALL.iter().enumerate() {
                let cell = record.get(col + 1).unwrap_or("");
                let expectation = if cell.is_empty() {
                    Expectation {
                        expected: 0,
                        deviation: 0,
                    }
                } else {
                    let expected: i64 = cell.parse().map_err(|_| {
                        format!("row {} ({name}): {metric} value '{cell}' is not an integer", idx + 1)
                    })?;
                    Expectation::with_tolerance(expected, tolerance_percent).ok_or_else(|| {
                        format!(
                            "row {} ({name}): {metric} value {expected} is out of range for a {tolerance_percent}% tolerance",
                            idx + 1
                        )
                    })?
                };
                fields.insert(*metric, expectation);
            }
            entries.insert(name.to_string(), BaselineEntry { fields });
        }

        Ok(BaselineTable { entries })
    }

    pub fn entry(&self, scenario: &str) -> Option<&BaselineEntry> {
        self.entries.get(scenario)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check every metric present in `result` against the baseline entry.
///
/// A metric the entry does not know is compared against `{0, 0}`.
pub fn compare(
    result: &Metrics,
    entry: &BaselineEntry,
    scenario: &str,
) -> Result<(), ScenarioFailure> {
    for (metric, observed) in result.iter() {
        let Expectation {
            expected,
            deviation,
        } = entry.get(metric).unwrap_or(Expectation {
            expected: 0,
            deviation: 0,
        });
        tracing::debug!(
            scenario,
            metric = metric.as_str(),
            observed,
            expected,
            deviation,
            "baseline check"
        );
        if observed.abs_diff(expected) > deviation.unsigned_abs() {
            return Err(ScenarioFailure::Divergence {
                scenario: scenario.to_string(),
                metric,
                observed,
                expected,
                deviation,
            });
        }
    }
    Ok(())
}
