//! Suite driver: runs scenarios in order and applies the no-fail policy.

use crate::baseline::BaselineTable;
use crate::error::{HarnessError, ScenarioError};
use crate::metrics::Metrics;
use crate::runner::JobRunner;
use crate::scenario::Scenario;
use crate::store::ParamSet;
use crate::trend::TrendSink;

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("test {scenario} failed")]
    Aborted {
        scenario: String,
        #[source]
        source: ScenarioError,
    },
    #[error(transparent)]
    Harness(#[from] HarnessError),
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub result: Result<Metrics, ScenarioError>,
}

#[derive(Debug, Default)]
pub struct SuiteSummary {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteSummary {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

pub struct Suite<'a> {
    pub scenarios: &'a [Scenario],
    pub runner: &'a dyn JobRunner,
    pub baseline: Option<&'a BaselineTable>,
    pub trend: &'a TrendSink,
    /// Keep going after a failed scenario instead of stopping the suite.
    pub no_fail: bool,
}

impl Suite<'_> {
    pub fn run(&self, common: &ParamSet) -> Result<SuiteSummary, SuiteError> {
        self.trend.header()?;

        let mut summary = SuiteSummary::default();
        for scenario in self.scenarios {
            let entry = self.baseline.and_then(|table| table.entry(scenario.name));
            if self.baseline.is_some() && entry.is_none() {
                tracing::debug!(
                    scenario = scenario.name,
                    "no baseline row, using fixed thresholds"
                );
            }

            tracing::debug!(scenario = scenario.name, "starting test");
            match scenario.run(self.runner, common, entry, self.trend) {
                Ok(metrics) => {
                    tracing::info!("test {} passed", scenario.name);
                    summary.outcomes.push(ScenarioOutcome {
                        name: scenario.name,
                        result: Ok(metrics),
                    });
                }
                Err(err) => {
                    if !self.no_fail {
                        return Err(SuiteError::Aborted {
                            scenario: scenario.name.to_string(),
                            source: err,
                        });
                    }
                    tracing::error!(
                        harness_error = !err.is_test_failure(),
                        "test {} failed reason {err}",
                        scenario.name
                    );
                    summary.outcomes.push(ScenarioOutcome {
                        name: scenario.name,
                        result: Err(err),
                    });
                }
            }
        }

        tracing::info!(
            passed = summary.passed(),
            failed = summary.failed(),
            "suite finished"
        );
        Ok(summary)
    }
}
