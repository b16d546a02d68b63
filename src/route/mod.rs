//! Downstream delivery abstractions
//!
//! The table only sees the [`Route`] contract; concrete routes apply their
//! own matcher and destination policy. The wire side of every destination
//! sits behind the [`Transport`] seam, so the routing core stays
//! independent of TCP writers, HTTP batchers and Kafka producers.

mod base;
mod consistent_hash;
mod destination;
mod grafana_net;
mod kafka_mdm;
mod send;

pub use consistent_hash::ConsistentHashRoute;
pub use destination::Destination;
pub use grafana_net::{GrafanaNetOptions, GrafanaNetRoute};
pub use kafka_mdm::{KafkaMdmOptions, KafkaMdmRoute, PartitionBy};
pub use send::{SendAllMatchRoute, SendFirstMatchRoute};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain_types::RouteKey;
use crate::error::RouteError;
use crate::matcher::{Matcher, MatcherSnapshot};

/// Discriminates the destination policy of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    #[serde(rename = "send-all-match")]
    SendAllMatch,
    #[serde(rename = "send-first-match")]
    SendFirstMatch,
    #[serde(rename = "consistent-hash")]
    ConsistentHash,
    #[serde(rename = "grafana-net")]
    GrafanaNet,
    #[serde(rename = "kafka-mdm")]
    KafkaMdm,
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SendAllMatch => "send-all-match",
            Self::SendFirstMatch => "send-first-match",
            Self::ConsistentHash => "consistent-hash",
            Self::GrafanaNet => "grafana-net",
            Self::KafkaMdm => "kafka-mdm",
        };
        f.write_str(name)
    }
}

/// Matcher overrides applied to a running route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOpts {
    pub prefix: Option<String>,
    pub sub: Option<String>,
    pub regex: Option<String>,
}

/// Overrides applied to a running destination
///
/// Addresses are deliberately absent: a destination is replaced, never
/// re-pointed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationOpts {
    pub prefix: Option<String>,
    pub sub: Option<String>,
    pub regex: Option<String>,
    pub spool_dir: Option<String>,
}

/// Read-only view of a route and its destinations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSnapshot {
    pub key: String,
    pub kind: RouteKind,
    pub matcher: MatcherSnapshot,
    pub destinations: Vec<DestinationSnapshot>,
}

/// Read-only view of one destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationSnapshot {
    pub addr: String,
    pub matcher: MatcherSnapshot,
    pub spool_dir: String,
    pub spool: bool,
    pub pickle: bool,
    pub online: bool,
}

/// Contract between the table and a running route
///
/// Routes arrive at the table with their workers already started; the
/// table adopts ownership of their shutdown.
#[async_trait]
pub trait Route: Send + Sync {
    /// Operator-chosen identifier, unique within a table
    fn key(&self) -> &RouteKey;

    /// The destination policy tag
    fn kind(&self) -> RouteKind;

    /// Tests the (rewritten) metric name against the route's matcher
    fn matches(&self, name: &[u8]) -> bool;

    /// Hands a complete record line to the route's destinations
    ///
    /// Never blocks the caller; routes queue internally and shed load on
    /// overflow.
    async fn dispatch(&self, line: Bytes);

    /// Drains internal queues through to the transports
    async fn flush(&self) -> Result<(), RouteError>;

    /// Stops all destination workers, draining queued lines first
    async fn shutdown(&self) -> Result<(), RouteError>;

    /// Captures a deep view decoupled from live state
    fn snapshot(&self) -> RouteSnapshot;

    /// Applies matcher overrides
    fn update(&self, opts: RouteOpts) -> Result<(), RouteError>;

    /// Removes the destination at `index`, shutting its worker down
    async fn del_destination(&self, index: usize) -> Result<(), RouteError>;

    /// Applies overrides to the destination at `index`
    fn update_destination(&self, index: usize, opts: DestinationOpts) -> Result<(), RouteError>;
}

/// Wire-side sink behind a destination
///
/// Implementations (plain TCP writers, spooling writers, HTTP batchers,
/// Kafka producers) live outside the routing core.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one record line
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Forces buffered lines out
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Releases the underlying connection
    async fn close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Builds transports during declarative initialization
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Connects a transport for a destination address of the given route kind
    async fn connect(
        &self,
        addr: &str,
        kind: RouteKind,
    ) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Leading portion of a record line up to the first space
#[must_use]
pub(crate) fn metric_name(line: &[u8]) -> &[u8] {
    let end = line.iter().position(|&b| b == b' ').unwrap_or(line.len());
    &line[..end]
}

/// Builds a new matcher from a current one plus overrides
pub(crate) fn apply_matcher_opts(
    current: &Matcher,
    prefix: Option<&str>,
    sub: Option<&str>,
    regex: Option<&str>,
) -> Result<Matcher, RouteError> {
    Matcher::new(
        prefix.unwrap_or(current.prefix_spec()),
        sub.unwrap_or(current.sub_spec()),
        regex.unwrap_or(current.regex_spec()),
    )
    .map_err(|source| RouteError::Matcher { source })
}
