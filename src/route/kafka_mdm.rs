//! Route for a Kafka metrics-data-model producer

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain_types::{
    BufferSize, ChannelCapacity, FlushMaxNum, FlushMaxWait, OrgId, RequestTimeout, RouteKey,
};
use crate::error::RouteError;
use crate::matcher::Matcher;
use crate::route::base::RouteBase;
use crate::route::{
    Destination, DestinationOpts, Route, RouteKind, RouteOpts, RouteSnapshot, Transport,
};

/// Partitioning scheme for the Kafka producer; there is no default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionBy {
    #[serde(rename = "byOrg")]
    ByOrg,
    #[serde(rename = "bySeries")]
    BySeries,
}

impl std::fmt::Display for PartitionBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ByOrg => "byOrg",
            Self::BySeries => "bySeries",
        };
        f.write_str(name)
    }
}

/// Operator options for a kafka-mdm route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaMdmOptions {
    pub partition_by: PartitionBy,
    pub buf_size: BufferSize,
    pub flush_max_num: FlushMaxNum,
    pub flush_max_wait: FlushMaxWait,
    pub timeout: RequestTimeout,
    pub org_id: OrgId,
}

impl KafkaMdmOptions {
    /// Builds options with the kafka-mdm defaults around the mandatory
    /// partitioning scheme
    #[must_use]
    pub fn new(partition_by: PartitionBy) -> Self {
        Self {
            partition_by,
            buf_size: BufferSize::default(),
            flush_max_num: FlushMaxNum::default(),
            flush_max_wait: FlushMaxWait::default(),
            timeout: RequestTimeout::try_new(2000).unwrap_or_default(),
            org_id: OrgId::default(),
        }
    }
}

/// Single-destination route handing records to a Kafka producer
pub struct KafkaMdmRoute {
    base: RouteBase,
    destination: Arc<Destination>,
    options: KafkaMdmOptions,
}

impl KafkaMdmRoute {
    /// Builds the route around its single endpoint
    pub fn new(
        key: RouteKey,
        matcher: Matcher,
        addr: &str,
        options: KafkaMdmOptions,
        capacity: ChannelCapacity,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let destination = Destination::start(
            addr,
            Matcher::match_all(),
            "",
            false,
            false,
            capacity,
            transport,
        );
        Arc::new(Self {
            base: RouteBase::new(key, RouteKind::KafkaMdm, matcher),
            destination,
            options,
        })
    }

    /// The configured options
    #[must_use]
    pub fn options(&self) -> &KafkaMdmOptions {
        &self.options
    }
}

#[async_trait]
impl Route for KafkaMdmRoute {
    fn key(&self) -> &RouteKey {
        self.base.key()
    }

    fn kind(&self) -> RouteKind {
        self.base.kind()
    }

    fn matches(&self, name: &[u8]) -> bool {
        self.base.matches(name)
    }

    async fn dispatch(&self, line: Bytes) {
        self.destination.dispatch(line);
    }

    async fn flush(&self) -> Result<(), RouteError> {
        self.destination.flush().await
    }

    async fn shutdown(&self) -> Result<(), RouteError> {
        self.destination.shutdown().await
    }

    fn snapshot(&self) -> RouteSnapshot {
        self.base.snapshot_with(vec![self.destination.snapshot()])
    }

    fn update(&self, opts: RouteOpts) -> Result<(), RouteError> {
        self.base.update_matcher(&opts)
    }

    async fn del_destination(&self, _index: usize) -> Result<(), RouteError> {
        Err(RouteError::Unsupported {
            kind: RouteKind::KafkaMdm,
        })
    }

    fn update_destination(&self, _index: usize, _opts: DestinationOpts) -> Result<(), RouteError> {
        Err(RouteError::Unsupported {
            kind: RouteKind::KafkaMdm,
        })
    }
}
