//! The canonical benchmark scenarios.
//!
//! Each scenario layers its I/O pattern on top of the shared common parameters,
//! runs fio once (or twice for thread scaling), and then checks the numbers
//! against either its fixed thresholds or a baseline entry.

use crate::baseline::{self, BaselineEntry};
use crate::error::{Bound, ScenarioError, ScenarioFailure};
use crate::metrics::Metric::{ReadBw, ReadIops, ReadLat, WriteBw, WriteIops, WriteLat};
use crate::metrics::{self, Metric, Metrics};
use crate::runner::JobRunner;
use crate::store::ParamSet;
use crate::trend::{Columns, TrendSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub metric: Metric,
    pub bound: Bound,
}

const fn min(metric: Metric, value: i64) -> Threshold {
    Threshold {
        metric,
        bound: Bound::Min(value),
    }
}

const fn max(metric: Metric, value: i64) -> Threshold {
    Threshold {
        metric,
        bound: Bound::Max(value),
    }
}

impl Threshold {
    pub fn holds(&self, value: i64) -> bool {
        match self.bound {
            Bound::Min(limit) => value >= limit,
            Bound::Max(limit) => value <= limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Single,
    /// Run with one worker, then with `workers`, and report the percentage change.
    Scaling { workers: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub rw: &'static str,
    /// 70% reads / 30% writes.
    pub mixed: bool,
    pub kind: Kind,
    pub columns: Columns,
    pub thresholds: &'static [Threshold],
}

const READ_LIMITS: &[Threshold] = &[
    min(ReadBw, 500_000),
    min(ReadIops, 150_000),
    max(ReadLat, 10_000),
];

const WRITE_LIMITS: &[Threshold] = &[
    min(WriteBw, 500_000),
    min(WriteIops, 130_000),
    max(WriteLat, 10_000),
];

const MIXED_LIMITS: &[Threshold] = &[
    min(WriteBw, 150_000),
    min(WriteIops, 40_000),
    max(WriteLat, 10_000),
    min(ReadBw, 400_000),
    min(ReadIops, 90_000),
    max(ReadLat, 10_000),
];

const READ_SCALING3: &[Threshold] = &[min(ReadBw, 80), min(ReadIops, 80), max(ReadLat, 70)];

const READ_SCALING30: &[Threshold] = &[min(ReadBw, 180), min(ReadIops, 180), max(ReadLat, 900)];

const WRITE_SCALING: &[Threshold] = &[min(WriteBw, 80), min(WriteIops, 80), max(WriteLat, 70)];

const MIXED_SCALING: &[Threshold] = &[
    min(ReadBw, 80),
    min(ReadIops, 80),
    max(ReadLat, 70),
    min(WriteBw, 80),
    min(WriteIops, 80),
    max(WriteLat, 70),
];

const fn scenario(
    name: &'static str,
    rw: &'static str,
    mixed: bool,
    kind: Kind,
    columns: Columns,
    thresholds: &'static [Threshold],
) -> Scenario {
    Scenario {
        name,
        rw,
        mixed,
        kind,
        columns,
        thresholds,
    }
}

const fn scaling(workers: u32) -> Kind {
    Kind::Scaling { workers }
}

/// The suite, in execution order.
#[rustfmt::skip]
pub const SCENARIOS: [Scenario; 12] = [
    scenario("rand_read", "randread", false, Kind::Single, Columns::Read, READ_LIMITS),
    scenario("seq_read", "read", false, Kind::Single, Columns::Read, READ_LIMITS),
    scenario("rand_write", "randwrite", false, Kind::Single, Columns::Write, WRITE_LIMITS),
    scenario("seq_write", "write", false, Kind::Single, Columns::Write, WRITE_LIMITS),
    scenario("rand_R70_W30", "randrw", true, Kind::Single, Columns::Both, MIXED_LIMITS),
    scenario("seq_R70_W30", "rw", true, Kind::Single, Columns::Both, MIXED_LIMITS),
    scenario("thread_rand_read_scaling3", "randread", false, scaling(3), Columns::Read, READ_SCALING3),
    scenario("thread_rand_read_scaling30", "randread", false, scaling(30), Columns::Read, READ_SCALING30),
    scenario("thread_rand_write_scaling3", "randwrite", false, scaling(3), Columns::Write, WRITE_SCALING),
    scenario("thread_rand_write_scaling30", "randwrite", false, scaling(30), Columns::Write, WRITE_SCALING),
    scenario("thread_rand_R70_W30_scaling3", "randrw", true, scaling(3), Columns::Both, MIXED_SCALING),
    scenario("thread_rand_R70_W30_scaling30", "randrw", true, scaling(30), Columns::Both, MIXED_SCALING),
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Parameters shared by every scenario.
pub fn common_params(device: &str) -> ParamSet {
    [
        ("filename", device),
        ("size", "4GB"),
        ("runtime", "5"),
        ("time_based", "1"),
        ("direct", "1"),
        ("ioengine", "libaio"),
        ("bs", "4k"),
        ("numjobs", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Scenario {
    pub fn is_scaling(&self) -> bool {
        matches!(self.kind, Kind::Scaling { .. })
    }

    /// The scenario's parameters layered on top of `common`.
    pub fn params(&self, common: &ParamSet) -> ParamSet {
        let mut params = common.clone();
        params.insert("rw".to_string(), self.rw.to_string());
        if self.mixed {
            params.insert("rwmixread".to_string(), "70".to_string());
            params.insert("rwmixwrite".to_string(), "30".to_string());
        }
        params
    }

    /// Run fio for this scenario and return the metrics to evaluate.
    pub fn measure(
        &self,
        runner: &dyn JobRunner,
        common: &ParamSet,
    ) -> Result<Metrics, ScenarioError> {
        let mut params = self.params(common);
        match self.kind {
            Kind::Single => Ok(runner.run_params(self.name, &params)?.metrics),
            Kind::Scaling { workers } => {
                params.insert("group_reporting".to_string(), "1".to_string());
                params.insert("numjobs".to_string(), "1".to_string());
                let single = runner.run_params(self.name, &params)?;
                params.insert("numjobs".to_string(), workers.to_string());
                let multi = runner.run_params(self.name, &params)?;
                Ok(metrics::scaling(&single.metrics, &multi.metrics))
            }
        }
    }

    /// Check metrics against the fixed thresholds.
    pub fn check_thresholds(&self, result: &Metrics) -> Result<(), ScenarioFailure> {
        for threshold in self.thresholds {
            let observed = result.get(threshold.metric).ok_or_else(|| {
                ScenarioFailure::MissingMetric {
                    scenario: self.name.to_string(),
                    metric: threshold.metric,
                }
            })?;
            tracing::debug!(
                scenario = self.name,
                metric = threshold.metric.as_str(),
                observed,
                bound = ?threshold.bound,
                "threshold check"
            );
            if !threshold.holds(observed) {
                return Err(ScenarioFailure::Threshold {
                    scenario: self.name.to_string(),
                    metric: threshold.metric,
                    observed,
                    bound: threshold.bound,
                    percent: self.is_scaling(),
                });
            }
        }
        Ok(())
    }

    /// Judge metrics against the baseline entry when one is given, otherwise
    /// against the fixed thresholds.
    pub fn evaluate(
        &self,
        result: &Metrics,
        baseline: Option<&BaselineEntry>,
    ) -> Result<(), ScenarioFailure> {
        match baseline {
            Some(entry) => baseline::compare(result, entry, self.name),
            None => self.check_thresholds(result),
        }
    }

    /// Measure, record the trend row, and evaluate.
    pub fn run(
        &self,
        runner: &dyn JobRunner,
        common: &ParamSet,
        baseline: Option<&BaselineEntry>,
        trend: &TrendSink,
    ) -> Result<Metrics, ScenarioError> {
        let result = self.measure(runner, common)?;
        trend.record(self.name, self.columns, &result)?;
        self.evaluate(&result, baseline)?;
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::error::HarnessError;
    use crate::metrics::ResultRecord;

    /// Returns canned metrics keyed by (job name, numjobs) and records every call.
    /// Jobs registered with `with_output` go through the real extractor instead.
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        pub results: HashMap<(String, String), Metrics>,
        pub outputs: HashMap<String, String>,
        pub calls: RefCell<Vec<ParamSet>>,
    }

    impl FakeRunner {
        pub fn with(mut self, job: &str, numjobs: &str, values: &[(Metric, i64)]) -> Self {
            self.results.insert(
                (job.to_string(), numjobs.to_string()),
                values.iter().copied().collect(),
            );
            self
        }

        pub fn with_output(mut self, job: &str, raw: &str) -> Self {
            self.outputs.insert(job.to_string(), raw.to_string());
            self
        }
    }

    impl JobRunner for FakeRunner {
        fn run_params(
            &self,
            job_name: &str,
            params: &ParamSet,
        ) -> Result<ResultRecord, HarnessError> {
            self.calls.borrow_mut().push(params.clone());
            if let Some(raw) = self.outputs.get(job_name) {
                return metrics::extract(raw);
            }
            let numjobs = params.get("numjobs").cloned().unwrap_or_default();
            let metrics = self
                .results
                .get(&(job_name.to_string(), numjobs))
                .cloned()
                .ok_or_else(|| HarnessError::Invocation {
                    status: "fake fio exited with exit status: 1".to_string(),
                    stderr: format!("no canned result for {job_name}"),
                })?;
            Ok(ResultRecord {
                metrics,
                raw: "{}".to_string(),
            })
        }
    }

    fn rand_read() -> &'static Scenario {
        find("rand_read").expect("rand_read scenario")
    }

    fn values(pairs: &[(Metric, i64)]) -> Metrics {
        pairs.iter().copied().collect()
    }

    #[test]
    fn suite_has_twelve_uniquely_named_scenarios() {
        let mut names: Vec<_> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 12);
        assert_eq!(SCENARIOS[0].name, "rand_read");
        assert_eq!(SCENARIOS[11].name, "thread_rand_R70_W30_scaling30");
    }

    #[test]
    fn rand_read_passes_within_thresholds() {
        let result = values(&[(ReadBw, 600_000), (ReadIops, 160_000), (ReadLat, 9_000)]);
        rand_read().check_thresholds(&result).expect("within thresholds");
    }

    #[test]
    fn rand_read_fails_on_latency_ceiling() {
        let result = values(&[(ReadBw, 600_000), (ReadIops, 160_000), (ReadLat, 11_000)]);
        let err = rand_read().check_thresholds(&result).expect_err("latency too high");
        assert_eq!(
            err,
            ScenarioFailure::Threshold {
                scenario: "rand_read".to_string(),
                metric: ReadLat,
                observed: 11_000,
                bound: Bound::Max(10_000),
                percent: false,
            }
        );
        assert_eq!(
            err.to_string(),
            "rand_read read latency 11000 ns bigger than 10000 ns"
        );
    }

    #[test]
    fn scaling_threshold_uses_numeric_latency_limit() {
        let scenario = find("thread_rand_read_scaling3").expect("scenario");
        let result = values(&[(ReadBw, 90), (ReadIops, 90), (ReadLat, 75)]);
        let err = scenario.check_thresholds(&result).expect_err("75% > 70%");
        assert_eq!(
            err.to_string(),
            "thread_rand_read_scaling3 read latency 75% bigger than 70%"
        );
    }

    #[test]
    fn missing_scaling_metric_is_a_failure() {
        let scenario = find("thread_rand_write_scaling3").expect("scenario");
        let err = scenario
            .check_thresholds(&values(&[(WriteBw, 100)]))
            .expect_err("write_iops absent");
        assert!(matches!(err, ScenarioFailure::MissingMetric { metric: WriteIops, .. }));
    }

    #[test]
    fn mixed_params_layer_on_common_params() {
        let scenario = find("seq_R70_W30").expect("scenario");
        let params = scenario.params(&common_params("/dev/nvme0n1"));
        assert_eq!(params["rw"], "rw");
        assert_eq!(params["rwmixread"], "70");
        assert_eq!(params["rwmixwrite"], "30");
        assert_eq!(params["filename"], "/dev/nvme0n1");
        assert_eq!(params["ioengine"], "libaio");
    }

    #[test]
    fn scaling_runs_single_then_multi_worker() {
        let runner = FakeRunner::default()
            .with(
                "thread_rand_read_scaling3",
                "1",
                &[(ReadBw, 1000), (ReadIops, 100), (ReadLat, 50), (WriteBw, 0)],
            )
            .with(
                "thread_rand_read_scaling3",
                "3",
                &[(ReadBw, 1800), (ReadIops, 190), (ReadLat, 80), (WriteBw, 0)],
            );
        let scenario = find("thread_rand_read_scaling3").expect("scenario");

        let result = scenario
            .run(&runner, &common_params("/dev/zero"), None, &TrendSink::disabled())
            .expect("scaling passes");
        assert_eq!(result.get(ReadBw), Some(80));
        assert_eq!(result.get(ReadIops), Some(90));
        assert_eq!(result.get(ReadLat), Some(60));
        assert_eq!(result.get(WriteBw), None);

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["numjobs"], "1");
        assert_eq!(calls[0]["group_reporting"], "1");
        assert_eq!(calls[1]["numjobs"], "3");
    }

    #[test]
    fn baseline_replaces_thresholds() {
        let table = crate::baseline::BaselineTable::from_reader(
            "rand_read,1050,100,19000\n".as_bytes(),
            10,
        )
        .expect("baseline");
        let common = common_params("/dev/zero");

        // Far below the fixed thresholds, but close to the baseline.
        let runner = FakeRunner::default().with(
            "rand_read",
            "1",
            &[(ReadBw, 1_000), (ReadIops, 100), (ReadLat, 20_000)],
        );
        rand_read()
            .run(&runner, &common, table.entry("rand_read"), &TrendSink::disabled())
            .expect("within baseline tolerance");

        let runner = FakeRunner::default().with(
            "rand_read",
            "1",
            &[(ReadBw, 1_000), (ReadIops, 100), (ReadLat, 25_000)],
        );
        let err = rand_read()
            .run(&runner, &common, table.entry("rand_read"), &TrendSink::disabled())
            .expect_err("latency diverges");
        assert!(err.is_test_failure());
        assert!(err.to_string().contains("read_lat 25000"), "unexpected: {err}");
    }

    #[test]
    fn harness_errors_are_not_test_failures() {
        let err = rand_read()
            .run(
                &FakeRunner::default(),
                &common_params("/dev/zero"),
                None,
                &TrendSink::disabled(),
            )
            .expect_err("no canned result");
        assert!(!err.is_test_failure());
    }
}
