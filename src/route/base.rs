//! Shared building blocks for concrete routes

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::domain_types::RouteKey;
use crate::error::RouteError;
use crate::matcher::Matcher;
use crate::route::{
    Destination, DestinationOpts, DestinationSnapshot, RouteKind, RouteOpts, RouteSnapshot,
    apply_matcher_opts,
};

/// Key, kind and swappable matcher common to every route
pub(crate) struct RouteBase {
    key: RouteKey,
    kind: RouteKind,
    matcher: ArcSwap<Matcher>,
}

impl RouteBase {
    pub(crate) fn new(key: RouteKey, kind: RouteKind, matcher: Matcher) -> Self {
        Self {
            key,
            kind,
            matcher: ArcSwap::from_pointee(matcher),
        }
    }

    pub(crate) fn key(&self) -> &RouteKey {
        &self.key
    }

    pub(crate) fn kind(&self) -> RouteKind {
        self.kind
    }

    pub(crate) fn matches(&self, name: &[u8]) -> bool {
        self.matcher.load().matches(name)
    }

    pub(crate) fn update_matcher(&self, opts: &RouteOpts) -> Result<(), RouteError> {
        let merged = apply_matcher_opts(
            &self.matcher.load(),
            opts.prefix.as_deref(),
            opts.sub.as_deref(),
            opts.regex.as_deref(),
        )?;
        self.matcher.store(Arc::new(merged));
        Ok(())
    }

    pub(crate) fn snapshot_with(&self, destinations: Vec<DestinationSnapshot>) -> RouteSnapshot {
        RouteSnapshot {
            key: self.key.as_str().to_string(),
            kind: self.kind,
            matcher: self.matcher.load().snapshot(),
            destinations,
        }
    }
}

/// Copy-on-write destination list shared by the send-* routes
///
/// Dispatch loads the list without locking; mutations clone, modify and
/// swap under the writer mutex, then shut the removed destination down so
/// no new lines can reach it while it drains.
pub(crate) struct DestinationSet {
    destinations: ArcSwap<Vec<Arc<Destination>>>,
    write_lock: Mutex<()>,
    min: usize,
}

impl DestinationSet {
    pub(crate) fn new(destinations: Vec<Arc<Destination>>, min: usize) -> Self {
        Self {
            destinations: ArcSwap::from_pointee(destinations),
            write_lock: Mutex::new(()),
            min,
        }
    }

    pub(crate) fn load(&self) -> Arc<Vec<Arc<Destination>>> {
        self.destinations.load_full()
    }

    pub(crate) async fn remove(&self, index: usize) -> Result<(), RouteError> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let current = self.destinations.load_full();
            if index >= current.len() {
                return Err(RouteError::DestinationOutOfRange {
                    index,
                    len: current.len(),
                });
            }
            if current.len() - 1 < self.min {
                return Err(RouteError::TooFewDestinations {
                    min: self.min,
                    remaining: current.len() - 1,
                });
            }
            let mut next = (*current).clone();
            let removed = next.remove(index);
            self.destinations.store(Arc::new(next));
            removed
        };
        removed.shutdown().await
    }

    pub(crate) fn update(&self, index: usize, opts: &DestinationOpts) -> Result<(), RouteError> {
        let current = self.destinations.load();
        let destination =
            current
                .get(index)
                .ok_or_else(|| RouteError::DestinationOutOfRange {
                    index,
                    len: current.len(),
                })?;
        destination.update(opts)
    }

    pub(crate) async fn flush_all(&self) -> Result<(), RouteError> {
        let current = self.destinations.load_full();
        for destination in current.iter() {
            destination.flush().await?;
        }
        Ok(())
    }

    /// Shuts every destination down, reporting the first failure
    pub(crate) async fn shutdown_all(&self) -> Result<(), RouteError> {
        let current = self.destinations.load_full();
        let mut first_err = None;
        for destination in current.iter() {
            if let Err(error) = destination.shutdown().await {
                first_err.get_or_insert(error);
            }
        }
        match first_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub(crate) fn snapshots(&self) -> Vec<DestinationSnapshot> {
        self.destinations
            .load()
            .iter()
            .map(|destination| destination.snapshot())
            .collect()
    }
}
