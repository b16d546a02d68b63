//! Time-windowed aggregation of matching records
//!
//! An aggregator owns a spawned worker that ingests pre-split records from
//! a bounded intake channel, folds values into buckets keyed by a capture
//! of the metric name and a quantized timestamp, and emits synthesized
//! records into the table's feedback channel once a bucket's window plus
//! grace period has passed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::domain_types::{AggregationInterval, AggregationWait, ChannelCapacity};
use crate::error::{AggregatorError, ConfigError};

/// Fold applied to the values collected in one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl std::fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

/// Declarative description of one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub function: AggregationFunction,
    /// Regex over the metric name; capture groups feed `format`
    pub regex: String,
    /// Optional cheap pre-filter checked on the dispatch path
    #[serde(default)]
    pub prefix: String,
    /// Optional cheap substring pre-filter checked on the dispatch path
    #[serde(default)]
    pub sub: String,
    /// Output name template with `$1`-style capture references
    pub format: String,
    #[serde(default)]
    pub interval: AggregationInterval,
    #[serde(default)]
    pub wait: AggregationWait,
}

/// Handle to a running aggregation worker
///
/// The table adopts ownership of shutdown once the aggregator is added.
#[derive(Debug)]
pub struct Aggregator {
    spec: AggregationSpec,
    regex: Regex,
    input: mpsc::Sender<WorkerCommand>,
    dropped: Arc<AtomicU64>,
}

#[derive(Debug)]
enum WorkerCommand {
    Record(Vec<Bytes>),
    Shutdown(oneshot::Sender<()>),
}

impl Aggregator {
    /// Compiles the spec and spawns the bucket worker
    ///
    /// `out` is the shared feedback channel; synthesized records re-enter
    /// the routing half of the pipeline through it.
    pub fn start(
        spec: AggregationSpec,
        capacity: ChannelCapacity,
        out: mpsc::Sender<Bytes>,
    ) -> Result<Arc<Self>, ConfigError> {
        let regex = Regex::new(&spec.regex).map_err(|source| ConfigError::InvalidRegex {
            pattern: spec.regex.clone(),
            source: Box::new(source),
        })?;
        let (input, rx) = mpsc::channel(capacity.as_usize());
        let dropped = Arc::new(AtomicU64::new(0));
        let worker = Worker {
            function: spec.function,
            regex: regex.clone(),
            out_format: spec.format.as_bytes().to_vec(),
            interval: spec.interval.as_secs(),
            wait: spec.wait.as_secs(),
            out,
            buckets: HashMap::new(),
            dropped: Arc::clone(&dropped),
        };
        tokio::spawn(worker.run(rx));
        Ok(Arc::new(Self {
            spec,
            regex,
            input,
            dropped,
        }))
    }

    /// Cheap acceptance test run on the dispatch path
    ///
    /// Uses the configured prefix/substring pre-filter when present, the
    /// full regex otherwise. The worker re-applies the regex, so a broad
    /// pre-filter only costs discarded channel traffic.
    #[must_use]
    pub fn pre_match(&self, name: &[u8]) -> bool {
        let prefix = self.spec.prefix.as_bytes();
        let sub = self.spec.sub.as_bytes();
        if prefix.is_empty() && sub.is_empty() {
            return self.regex.is_match(name);
        }
        if !prefix.is_empty() && !name.starts_with(prefix) {
            return false;
        }
        if !sub.is_empty() && !name.windows(sub.len()).any(|window| window == sub) {
            return false;
        }
        true
    }

    /// Hands a pre-split record to the worker
    ///
    /// Blocks when the intake is full; that backpressure is deliberate.
    pub async fn feed(&self, row: Vec<Bytes>) {
        if self.input.send(WorkerCommand::Record(row)).await.is_err() {
            debug!("aggregator intake closed, record dropped");
        }
    }

    /// Flushes all remaining buckets and stops the worker
    pub async fn shutdown(&self) -> Result<(), AggregatorError> {
        let (ack, done) = oneshot::channel();
        if self
            .input
            .send(WorkerCommand::Shutdown(ack))
            .await
            .is_err()
        {
            return Err(AggregatorError::WorkerGone);
        }
        done.await.map_err(|_| AggregatorError::WorkerGone)
    }

    /// Number of records discarded for unparseable value or timestamp
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Captures the declarative fields
    #[must_use]
    pub fn snapshot(&self) -> AggregatorSnapshot {
        AggregatorSnapshot {
            function: self.spec.function,
            regex: self.spec.regex.clone(),
            prefix: self.spec.prefix.clone(),
            sub: self.spec.sub.clone(),
            format: self.spec.format.clone(),
            interval_secs: self.spec.interval.as_secs(),
            wait_secs: self.spec.wait.as_secs(),
        }
    }
}

/// Read-only view of an aggregator's declarative fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorSnapshot {
    pub function: AggregationFunction,
    pub regex: String,
    pub prefix: String,
    pub sub: String,
    pub format: String,
    pub interval_secs: u64,
    pub wait_secs: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl Bucket {
    fn update(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn value(&self, function: AggregationFunction) -> f64 {
        match function {
            AggregationFunction::Sum => self.sum,
            AggregationFunction::Avg => self.sum / self.count as f64,
            AggregationFunction::Min => self.min,
            AggregationFunction::Max => self.max,
            AggregationFunction::Count => self.count as f64,
        }
    }
}

struct Worker {
    function: AggregationFunction,
    regex: Regex,
    out_format: Vec<u8>,
    interval: u64,
    wait: u64,
    out: mpsc::Sender<Bytes>,
    buckets: HashMap<(Vec<u8>, u64), Bucket>,
    dropped: Arc<AtomicU64>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<WorkerCommand>) {
        debug!("aggregation worker started");
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(WorkerCommand::Record(row)) => self.ingest(&row),
                    Some(WorkerCommand::Shutdown(ack)) => {
                        self.flush(None).await;
                        let _ = ack.send(());
                        debug!("aggregation worker stopped");
                        return;
                    }
                    None => {
                        self.flush(None).await;
                        debug!("aggregation worker stopped, intake closed");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    let cutoff = unix_now().saturating_sub(self.interval + self.wait);
                    self.flush(Some(cutoff)).await;
                }
            }
        }
    }

    fn ingest(&mut self, row: &[Bytes]) {
        let (Some(name), Some(value), Some(ts)) = (row.first(), row.get(1), row.get(2)) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        // pre_match may be broader than the regex; non-captures are not an anomaly
        let Some(caps) = self.regex.captures(name) else {
            return;
        };
        let Some(value) = parse_f64(value) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let Some(ts) = parse_u64(ts) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let mut out_name = Vec::with_capacity(self.out_format.len());
        caps.expand(&self.out_format, &mut out_name);
        let bucket_ts = ts - ts % self.interval;
        self.buckets.entry((out_name, bucket_ts)).or_default().update(value);
    }

    /// Emits and removes buckets at or below `cutoff`; all of them for `None`
    async fn flush(&mut self, cutoff: Option<u64>) {
        let due: Vec<(Vec<u8>, u64)> = self
            .buckets
            .keys()
            .filter(|(_, ts)| cutoff.is_none_or(|cutoff| *ts <= cutoff))
            .cloned()
            .collect();
        for key in due {
            let Some(bucket) = self.buckets.remove(&key) else {
                continue;
            };
            let (out_name, bucket_ts) = key;
            let mut line = out_name;
            line.extend_from_slice(
                format!(" {} {}", bucket.value(self.function), bucket_ts).as_bytes(),
            );
            trace!(line = %String::from_utf8_lossy(&line), "aggregation bucket flushed");
            if self.out.send(Bytes::from(line)).await.is_err() {
                debug!("feedback channel closed, aggregation output dropped");
                return;
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn parse_f64(token: &[u8]) -> Option<f64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn parse_u64(token: &[u8]) -> Option<u64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}
