//! fio result extraction and scaling math.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    ReadBw,
    ReadIops,
    ReadLat,
    WriteBw,
    WriteIops,
    WriteLat,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::ReadBw,
        Metric::ReadIops,
        Metric::ReadLat,
        Metric::WriteBw,
        Metric::WriteIops,
        Metric::WriteLat,
    ];

    pub const READ: [Metric; 3] = [Metric::ReadBw, Metric::ReadIops, Metric::ReadLat];
    pub const WRITE: [Metric; 3] = [Metric::WriteBw, Metric::WriteIops, Metric::WriteLat];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::ReadBw => "read_bw",
            Metric::ReadIops => "read_iops",
            Metric::ReadLat => "read_lat",
            Metric::WriteBw => "write_bw",
            Metric::WriteIops => "write_iops",
            Metric::WriteLat => "write_lat",
        }
    }

    /// Human wording used in threshold diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Metric::ReadBw => "read bandwidth",
            Metric::ReadIops => "read iops",
            Metric::ReadLat => "read latency",
            Metric::WriteBw => "write bandwidth",
            Metric::WriteIops => "write iops",
            Metric::WriteLat => "write latency",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::ReadBw | Metric::WriteBw => " KiB/s",
            Metric::ReadLat | Metric::WriteLat => " ns",
            Metric::ReadIops | Metric::WriteIops => "",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of metric values. Result records carry all six; scaling results may
/// leave some out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics(BTreeMap<Metric, i64>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> Option<i64> {
        self.0.get(&metric).copied()
    }

    pub fn set(&mut self, metric: Metric, value: i64) {
        self.0.insert(metric, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, i64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }
}

impl FromIterator<(Metric, i64)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (Metric, i64)>>(iter: I) -> Self {
        Metrics(iter.into_iter().collect())
    }
}

/// One parsed fio run.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub metrics: Metrics,
    /// fio's JSON document, verbatim.
    pub raw: String,
}

impl ResultRecord {
    /// Value of a metric that every record carries.
    pub fn value(&self, metric: Metric) -> i64 {
        self.metrics.get(metric).unwrap_or(0)
    }

    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!(
                "read: bw {} KiB/s lat {} ns iops {}",
                self.value(Metric::ReadBw),
                self.value(Metric::ReadLat),
                self.value(Metric::ReadIops)
            ),
            format!(
                "write: bw {} KiB/s lat {} ns iops {}",
                self.value(Metric::WriteBw),
                self.value(Metric::WriteLat),
                self.value(Metric::WriteIops)
            ),
        ]
    }
}

// ─── fio JSON shape ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FioOutput {
    jobs: Vec<FioJob>,
}

#[derive(Deserialize)]
struct FioJob {
    read: FioDirection,
    write: FioDirection,
}

#[derive(Deserialize)]
struct FioDirection {
    bw: f64,
    iops: f64,
    lat_ns: FioLatency,
}

#[derive(Deserialize)]
struct FioLatency {
    mean: f64,
}

pub fn extract(raw: &str) -> Result<ResultRecord, HarnessError> {
    let parse_error = |reason: String| HarnessError::Parse {
        reason,
        raw: raw.to_string(),
    };

    let output: FioOutput =
        serde_json::from_str(raw).map_err(|e| parse_error(e.to_string()))?;
    let job = output
        .jobs
        .first()
        .ok_or_else(|| parse_error("no jobs in output".to_string()))?;

    let mut metrics = Metrics::new();
    for (direction, ids) in [(&job.read, Metric::READ), (&job.write, Metric::WRITE)] {
        let [bw, iops, lat] = ids;
        for (metric, value) in [
            (bw, direction.bw),
            (iops, direction.iops),
            (lat, direction.lat_ns.mean),
        ] {
            metrics.set(metric, to_count(metric, value).map_err(parse_error)?);
        }
    }

    Ok(ResultRecord {
        metrics,
        raw: raw.to_string(),
    })
}

fn to_count(metric: Metric, value: f64) -> Result<i64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{metric} has invalid value {value}"));
    }
    Ok(value.round() as i64)
}

/// Percentage change from a single-worker run to a multi-worker run.
///
/// Fields whose single-worker value is zero are left out.
pub fn scaling(single: &Metrics, multi: &Metrics) -> Metrics {
    single
        .iter()
        .filter(|(_, base)| *base != 0)
        .filter_map(|(metric, base)| {
            let value = multi.get(metric)?;
            Some((metric, ((value - base) * 100).div_euclid(base)))
        })
        .collect()
}
