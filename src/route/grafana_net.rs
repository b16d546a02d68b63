//! Route for a grafana.net-style HTTP-batched endpoint

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain_types::{
    BufferSize, ChannelCapacity, Concurrency, FlushMaxNum, FlushMaxWait, OrgId, RequestTimeout,
    RouteKey,
};
use crate::error::RouteError;
use crate::matcher::Matcher;
use crate::route::base::RouteBase;
use crate::route::{
    Destination, DestinationOpts, Route, RouteKind, RouteOpts, RouteSnapshot, Transport,
};

/// Operator options for a grafana-net route
///
/// `ssl_verify` defaults on and `spool` defaults off; any configured value
/// overrides its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrafanaNetOptions {
    pub spool: bool,
    pub ssl_verify: bool,
    pub buf_size: BufferSize,
    pub flush_max_num: FlushMaxNum,
    pub flush_max_wait: FlushMaxWait,
    pub timeout: RequestTimeout,
    pub concurrency: Concurrency,
    pub org_id: OrgId,
}

impl Default for GrafanaNetOptions {
    fn default() -> Self {
        Self {
            spool: false,
            ssl_verify: true,
            buf_size: BufferSize::default(),
            flush_max_num: FlushMaxNum::default(),
            flush_max_wait: FlushMaxWait::default(),
            timeout: RequestTimeout::default(),
            concurrency: Concurrency::default(),
            org_id: OrgId::default(),
        }
    }
}

/// Single-destination route batching records to a hosted metrics endpoint
///
/// The HTTP batcher itself lives behind the transport seam; this route
/// carries its options and owns the destination worker's lifecycle.
pub struct GrafanaNetRoute {
    base: RouteBase,
    destination: Arc<Destination>,
    options: GrafanaNetOptions,
}

impl GrafanaNetRoute {
    /// Builds the route around its single endpoint
    pub fn new(
        key: RouteKey,
        matcher: Matcher,
        addr: &str,
        options: GrafanaNetOptions,
        spool_dir: &str,
        capacity: ChannelCapacity,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let destination = Destination::start(
            addr,
            Matcher::match_all(),
            spool_dir,
            options.spool,
            false,
            capacity,
            transport,
        );
        Arc::new(Self {
            base: RouteBase::new(key, RouteKind::GrafanaNet, matcher),
            destination,
            options,
        })
    }

    /// The configured options
    #[must_use]
    pub fn options(&self) -> &GrafanaNetOptions {
        &self.options
    }
}

#[async_trait]
impl Route for GrafanaNetRoute {
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
            kind: RouteKind::GrafanaNet,
        })
    }

    fn update_destination(&self, _index: usize, _opts: DestinationOpts) -> Result<(), RouteError> {
        Err(RouteError::Unsupported {
            kind: RouteKind::GrafanaNet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let options = GrafanaNetOptions::default();
        assert!(!options.spool);
        assert!(options.ssl_verify);
        assert_eq!(options.buf_size.as_usize(), 10_000_000);
        assert_eq!(options.flush_max_num.as_usize(), 10_000);
        assert_eq!(options.flush_max_wait.as_u64(), 500);
        assert_eq!(options.timeout.as_u64(), 5000);
        assert_eq!(options.concurrency.as_usize(), 10);
        assert_eq!(options.org_id.as_i64(), 1);
    }
}
