//! Error kinds.
//!
//! Two families:
//!   HarnessError    → the harness itself broke (fio missing, bad JSON, unreadable files)
//!   ScenarioFailure → the benchmark ran fine but the numbers were not good enough

use std::path::PathBuf;

use crate::metrics::Metric;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("no stored fio job named '{name}' in {}", dir.display())]
    ConfigNotFound { name: String, dir: PathBuf },

    #[error("cannot write temporary job file {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fio invocation failed ({status}): {stderr}")]
    Invocation { status: String, stderr: String },

    #[error("cannot parse fio output ({reason}): {raw}")]
    Parse { reason: String, raw: String },

    #[error("baseline file {}: {reason}", path.display())]
    BaselineFile { path: PathBuf, reason: String },

    #[error("invalid job parameters: {0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min(i64),
    Max(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioFailure {
    #[error("{}", threshold_message(scenario, *metric, *observed, *bound, *percent))]
    Threshold {
        scenario: String,
        metric: Metric,
        observed: i64,
        bound: Bound,
        /// Scaling scenarios compare percentages rather than raw units.
        percent: bool,
    },

    #[error(
        "{scenario} {metric} {observed} diverges from baseline {expected} (allowed deviation {deviation})"
    )]
    Divergence {
        scenario: String,
        metric: Metric,
        observed: i64,
        expected: i64,
        deviation: i64,
    },

    #[error("{scenario} produced no {metric} value to check")]
    MissingMetric { scenario: String, metric: Metric },
}

fn threshold_message(
    scenario: &str,
    metric: Metric,
    observed: i64,
    bound: Bound,
    percent: bool,
) -> String {
    let (relation, limit) = match bound {
        Bound::Min(limit) => ("less than", limit),
        Bound::Max(limit) => ("bigger than", limit),
    };
    let unit = if percent { "%" } else { metric.unit() };
    format!(
        "{scenario} {} {observed}{unit} {relation} {limit}{unit}",
        metric.describe()
    )
}

/// Outcome of a scenario that did not pass.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Failed(#[from] ScenarioFailure),
    #[error(transparent)]
    Harness(#[from] HarnessError),
}

impl ScenarioError {
    pub fn is_test_failure(&self) -> bool {
        matches!(self, ScenarioError::Failed(_))
    }
}
