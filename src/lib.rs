//! # Metrelay - Line-Oriented Metrics Relay Routing Core
//!
//! Metrelay is the routing core of a metrics relay: it ingests plaintext
//! metric records (one per line, whitespace-separated tokens with a dotted
//! name first), runs them through an ordered pipeline of
//! blacklist → aggregators → rewriters → routes, and fans them out to
//! downstream destinations while the routing configuration changes live
//! under concurrent ingest.
//!
//! The centerpiece is the [`table::Table`]: an atomically swappable
//! pipeline snapshot behind a lock-free read path. Producers call
//! [`table::Table::dispatch`] concurrently; mutations clone the current
//! snapshot under a single writers' mutex and swap a new one in whole, so
//! a record in flight always sees one consistent configuration.
//!
//! Listeners, the textual admin-command parser and the wire transports
//! behind destinations are external collaborators: the first two drive the
//! table through its public API, the last plugs in through the
//! [`route::Transport`] seam.
//!
//! ```rust,no_run
//! use metrelay::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::new(
//!     SpoolDir::from("/var/spool/relay".to_string()),
//!     ChannelCapacity::default(),
//! );
//! table.start().await?;
//!
//! table.add_blacklist(Matcher::prefix("junk.")).await;
//! table.dispatch(b"servers.web1.load 0.72 1700000000").await;
//! table.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod domain_types;
pub mod error;
pub mod matcher;
pub mod rewriter;
pub mod route;
pub mod table;

/// The types most integrations need, importable in one line
pub mod prelude {
    pub use crate::aggregator::{AggregationFunction, AggregationSpec, Aggregator};
    pub use crate::config::RelayConfig;
    pub use crate::domain_types::{ChannelCapacity, RouteKey, SpoolDir};
    pub use crate::error::{ConfigError, RouteError, TableError};
    pub use crate::matcher::Matcher;
    pub use crate::rewriter::Rewriter;
    pub use crate::route::{Route, RouteKind, Transport, TransportFactory};
    pub use crate::table::Table;
}

pub use aggregator::{AggregationFunction, AggregationSpec, Aggregator, AggregatorSnapshot};
pub use config::{DestinationConfig, InitCommand, RelayConfig, RewriterConfig, RouteConfig};
pub use domain_types::{
    AggregationInterval, AggregationWait, BufferSize, ChannelCapacity, Concurrency, FlushMaxNum,
    FlushMaxWait, OrgId, RequestTimeout, RouteKey, SpoolDir,
};
pub use error::{AggregatorError, ConfigError, RouteError, TableError};
pub use matcher::{Matcher, MatcherSnapshot};
pub use rewriter::{Rewriter, RewriterSnapshot};
pub use route::{
    ConsistentHashRoute, Destination, DestinationOpts, DestinationSnapshot, GrafanaNetOptions,
    GrafanaNetRoute, KafkaMdmOptions, KafkaMdmRoute, PartitionBy, Route, RouteKind, RouteOpts,
    RouteSnapshot, SendAllMatchRoute, SendFirstMatchRoute, Transport, TransportFactory,
};
pub use table::{Table, TableSnapshot};
