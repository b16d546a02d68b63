//! Fan-out routes: send-all-match and send-first-match

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain_types::RouteKey;
use crate::error::{ConfigError, RouteError};
use crate::matcher::Matcher;
use crate::route::base::{DestinationSet, RouteBase};
use crate::route::{
    Destination, DestinationOpts, Route, RouteKind, RouteOpts, RouteSnapshot, metric_name,
};

/// Delivers each record to every destination whose matcher accepts it
pub struct SendAllMatchRoute {
    base: RouteBase,
    destinations: DestinationSet,
}

impl SendAllMatchRoute {
    /// Builds the route; at least one destination is required
    pub fn new(
        key: RouteKey,
        matcher: Matcher,
        destinations: Vec<Arc<Destination>>,
    ) -> Result<Arc<Self>, ConfigError> {
        if destinations.is_empty() {
            return Err(ConfigError::InsufficientDestinations {
                key: key.as_str().to_string(),
                kind: RouteKind::SendAllMatch,
                need: 1,
                got: 0,
            });
        }
        Ok(Arc::new(Self {
            base: RouteBase::new(key, RouteKind::SendAllMatch, matcher),
            destinations: DestinationSet::new(destinations, 1),
        }))
    }
}

#[async_trait]
impl Route for SendAllMatchRoute {
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
        let name = metric_name(&line);
        let destinations = self.destinations.load();
        for destination in destinations.iter() {
            if destination.matches(name) {
                destination.dispatch(line.clone());
            }
        }
    }

    async fn flush(&self) -> Result<(), RouteError> {
        self.destinations.flush_all().await
    }

    async fn shutdown(&self) -> Result<(), RouteError> {
        self.destinations.shutdown_all().await
    }

    fn snapshot(&self) -> RouteSnapshot {
        self.base.snapshot_with(self.destinations.snapshots())
    }

    fn update(&self, opts: RouteOpts) -> Result<(), RouteError> {
        self.base.update_matcher(&opts)
    }

    async fn del_destination(&self, index: usize) -> Result<(), RouteError> {
        self.destinations.remove(index).await
    }

    fn update_destination(&self, index: usize, opts: DestinationOpts) -> Result<(), RouteError> {
        self.destinations.update(index, &opts)
    }
}

/// Delivers each record only to the first destination whose matcher accepts it
pub struct SendFirstMatchRoute {
    base: RouteBase,
    destinations: DestinationSet,
}

impl SendFirstMatchRoute {
    /// Builds the route; at least one destination is required
    pub fn new(
        key: RouteKey,
        matcher: Matcher,
        destinations: Vec<Arc<Destination>>,
    ) -> Result<Arc<Self>, ConfigError> {
        if destinations.is_empty() {
            return Err(ConfigError::InsufficientDestinations {
                key: key.as_str().to_string(),
                kind: RouteKind::SendFirstMatch,
                need: 1,
                got: 0,
            });
        }
        Ok(Arc::new(Self {
            base: RouteBase::new(key, RouteKind::SendFirstMatch, matcher),
            destinations: DestinationSet::new(destinations, 1),
        }))
    }
}

#[async_trait]
impl Route for SendFirstMatchRoute {
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
        let name = metric_name(&line);
        let destinations = self.destinations.load();
        if let Some(destination) = destinations.iter().find(|d| d.matches(name)) {
            destination.dispatch(line);
        }
    }

    async fn flush(&self) -> Result<(), RouteError> {
        self.destinations.flush_all().await
    }

    async fn shutdown(&self) -> Result<(), RouteError> {
        self.destinations.shutdown_all().await
    }

    fn snapshot(&self) -> RouteSnapshot {
        self.base.snapshot_with(self.destinations.snapshots())
    }

    fn update(&self, opts: RouteOpts) -> Result<(), RouteError> {
        self.base.update_matcher(&opts)
    }

    async fn del_destination(&self, index: usize) -> Result<(), RouteError> {
        self.destinations.remove(index).await
    }

    fn update_destination(&self, index: usize, opts: DestinationOpts) -> Result<(), RouteError> {
        self.destinations.update(index, &opts)
    }
}
