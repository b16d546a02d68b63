//! Error types for the relay routing core
//!
//! One enum per concern: `TableError` for the mutation surface,
//! `RouteError` for failures delegated from routes and their destinations,
//! `ConfigError` for declarative initialization.

use thiserror::Error;

use crate::route::RouteKind;

/// Errors surfaced by the table's administrative operations
///
/// The dispatch path never returns an error; runtime anomalies there are
/// counted or logged instead.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("no route with key {key:?}")]
    RouteNotFound { key: String },

    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("route {key:?}: {source}")]
    Route {
        key: String,
        #[source]
        source: RouteError,
    },

    #[error("aggregator shutdown failed: {source}")]
    Aggregator {
        #[source]
        source: AggregatorError,
    },

    #[error("feedback pump already started")]
    AlreadyStarted,
}

/// Errors from routes and their destinations
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("transport failure: {source}")]
    Transport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("destination index {index} out of range (len {len})")]
    DestinationOutOfRange { index: usize, len: usize },

    #[error("route type {kind} does not support destination operations")]
    Unsupported { kind: RouteKind },

    #[error("route requires at least {min} destinations, removal would leave {remaining}")]
    TooFewDestinations { min: usize, remaining: usize },

    #[error("invalid matcher: {source}")]
    Matcher {
        #[source]
        source: ConfigError,
    },

    #[error("destination worker for {addr} terminated")]
    WorkerGone { addr: String },
}

/// Errors from aggregator control operations
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("aggregator worker terminated before acknowledging shutdown")]
    WorkerGone,
}

/// Errors raised during declarative initialization
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("invalid blacklist entry {entry:?}: {reason}")]
    InvalidBlacklist { entry: String, reason: String },

    #[error("invalid rewriter: {reason}")]
    InvalidRewriter { reason: String },

    #[error("route {key:?} ({kind}) requires at least {need} destinations, got {got}")]
    InsufficientDestinations {
        key: String,
        kind: RouteKind,
        need: usize,
        got: usize,
    },

    #[error("route {key:?} (kafka-mdm) requires partition_by")]
    MissingPartitionBy { key: String },

    #[error("invalid configuration: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("transport for {addr:?} unavailable: {source}")]
    Transport {
        addr: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("initialization command failed: {source}")]
    Command {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}
