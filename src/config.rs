//! Declarative configuration for a relay instance
//!
//! A `RelayConfig` is the serializable description the table is populated
//! from: typed init commands, blacklist entries, aggregations, rewriters
//! and routes. The textual imperatives language operators type at the
//! admin socket is translated into these structures by an outer layer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aggregator::AggregationSpec;
use crate::domain_types::{
    BufferSize, ChannelCapacity, Concurrency, FlushMaxNum, FlushMaxWait, OrgId, RequestTimeout,
    RouteKey,
};
use crate::error::ConfigError;
use crate::matcher::Matcher;
use crate::route::{PartitionBy, RouteKind};

/// Everything needed to populate a table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base directory handed to spooling destinations
    pub spool_dir: String,
    /// Queue capacity for destination and aggregator intakes
    pub queue_size: ChannelCapacity,
    /// Mutation commands applied before any other section
    pub init: Vec<InitCommand>,
    /// Two-token entries: `method pattern` with method prefix, sub or regex
    pub blacklist: Vec<String>,
    pub aggregations: Vec<AggregationSpec>,
    pub rewriters: Vec<RewriterConfig>,
    pub routes: Vec<RouteConfig>,
}

/// Typed form of one administrative command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum InitCommand {
    AddBlacklist {
        entry: String,
    },
    AddRewriter {
        old: String,
        new: String,
        #[serde(default)]
        max: Option<usize>,
    },
    AddAggregation {
        #[serde(flatten)]
        spec: AggregationSpec,
    },
    AddRoute {
        #[serde(flatten)]
        route: RouteConfig,
    },
    DelRoute {
        key: String,
    },
}

/// Declarative description of one rewriter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriterConfig {
    pub old: String,
    pub new: String,
    /// `None` replaces every occurrence
    #[serde(default)]
    pub max: Option<usize>,
}

/// Declarative description of one route
///
/// The per-kind option fields only apply to the kinds that read them; any
/// configured value overrides that kind's default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub key: RouteKey,
    #[serde(rename = "type")]
    pub kind: RouteKind,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub regex: String,
    /// Endpoints for the send-* and consistent-hash kinds
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
    /// Single endpoint for the grafana-net and kafka-mdm kinds
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub spool: Option<bool>,
    #[serde(default)]
    pub ssl_verify: Option<bool>,
    #[serde(default)]
    pub buf_size: Option<BufferSize>,
    #[serde(default)]
    pub flush_max_num: Option<FlushMaxNum>,
    #[serde(default)]
    pub flush_max_wait: Option<FlushMaxWait>,
    #[serde(default)]
    pub timeout: Option<RequestTimeout>,
    #[serde(default)]
    pub concurrency: Option<Concurrency>,
    #[serde(default)]
    pub org_id: Option<OrgId>,
    #[serde(default)]
    pub partition_by: Option<PartitionBy>,
}

/// Declarative description of one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub addr: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub regex: String,
    #[serde(default)]
    pub spool: bool,
    #[serde(default)]
    pub pickle: bool,
    /// Overrides the table-wide spool directory for this endpoint
    #[serde(default)]
    pub spool_dir: Option<String>,
}

impl RelayConfig {
    /// Validates the configuration without building anything
    ///
    /// Initialization re-checks while building; this exists so a bad file
    /// is rejected before any worker is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.blacklist {
            parse_blacklist_entry(entry)?;
        }
        for rewriter in &self.rewriters {
            if rewriter.old.is_empty() {
                return Err(ConfigError::InvalidRewriter {
                    reason: "search pattern must not be empty".to_string(),
                });
            }
        }
        for spec in &self.aggregations {
            Matcher::new("", "", &spec.regex)?;
        }
        for route in &self.routes {
            validate_route(route)?;
        }
        Ok(())
    }

    /// Saves the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

fn validate_route(route: &RouteConfig) -> Result<(), ConfigError> {
    Matcher::new(&route.prefix, &route.sub, &route.regex)?;
    for destination in &route.destinations {
        Matcher::new(&destination.prefix, &destination.sub, &destination.regex)?;
    }
    match route.kind {
        RouteKind::SendAllMatch | RouteKind::SendFirstMatch => {
            if route.destinations.is_empty() {
                return Err(ConfigError::InsufficientDestinations {
                    key: route.key.as_str().to_string(),
                    kind: route.kind,
                    need: 1,
                    got: 0,
                });
            }
        }
        RouteKind::ConsistentHash => {
            if route.destinations.len() < 2 {
                return Err(ConfigError::InsufficientDestinations {
                    key: route.key.as_str().to_string(),
                    kind: route.kind,
                    need: 2,
                    got: route.destinations.len(),
                });
            }
        }
        RouteKind::GrafanaNet => {
            if route.addr.is_none() {
                return Err(ConfigError::Validation {
                    field: format!("routes.{}.addr", route.key),
                    reason: "grafana-net requires an endpoint address".to_string(),
                });
            }
        }
        RouteKind::KafkaMdm => {
            if route.addr.is_none() {
                return Err(ConfigError::Validation {
                    field: format!("routes.{}.addr", route.key),
                    reason: "kafka-mdm requires a broker address".to_string(),
                });
            }
            if route.partition_by.is_none() {
                return Err(ConfigError::MissingPartitionBy {
                    key: route.key.as_str().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Parses a `method pattern` blacklist entry into a matcher
pub(crate) fn parse_blacklist_entry(entry: &str) -> Result<Matcher, ConfigError> {
    let mut tokens = entry.split_whitespace();
    let (Some(method), Some(pattern), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(ConfigError::InvalidBlacklist {
            entry: entry.to_string(),
            reason: "expected exactly two tokens: method and pattern".to_string(),
        });
    };
    match method {
        "prefix" => Ok(Matcher::prefix(pattern)),
        "sub" => Matcher::new("", pattern, ""),
        "regex" => Matcher::new("", "", pattern),
        other => Err(ConfigError::InvalidBlacklist {
            entry: entry.to_string(),
            reason: format!("unknown method {other:?}"),
        }),
    }
}
