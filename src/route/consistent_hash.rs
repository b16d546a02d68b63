//! Consistent-hash route: one destination per record, stable per name

use std::hash::Hasher;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use fnv::FnvHasher;
use tokio::sync::Mutex;

use crate::domain_types::RouteKey;
use crate::error::{ConfigError, RouteError};
use crate::matcher::Matcher;
use crate::route::base::RouteBase;
use crate::route::{
    Destination, DestinationOpts, Route, RouteKind, RouteOpts, RouteSnapshot, metric_name,
};

/// Points per destination on the ring; more points, smoother spread
const RING_REPLICAS: usize = 100;

/// Destination list and its ring, swapped together
///
/// Keeping both in one value means a dispatch can never pair a ring with a
/// destination list it was not built for.
struct HashState {
    destinations: Vec<Arc<Destination>>,
    ring: Vec<(u64, usize)>,
}

impl HashState {
    fn build(destinations: Vec<Arc<Destination>>) -> Self {
        let mut ring = Vec::with_capacity(destinations.len() * RING_REPLICAS);
        for (index, destination) in destinations.iter().enumerate() {
            for replica in 0..RING_REPLICAS {
                let mut hasher = FnvHasher::default();
                hasher.write(destination.addr().as_bytes());
                hasher.write(b":");
                hasher.write(&replica.to_be_bytes());
                ring.push((hasher.finish(), index));
            }
        }
        ring.sort_unstable();
        Self { destinations, ring }
    }

    fn select(&self, name: &[u8]) -> Option<&Arc<Destination>> {
        if self.ring.is_empty() {
            return None;
        }
        let mut hasher = FnvHasher::default();
        hasher.write(name);
        let point = hasher.finish();
        let position = self
            .ring
            .partition_point(|(ring_point, _)| *ring_point < point);
        let (_, index) = self.ring[position % self.ring.len()];
        self.destinations.get(index)
    }
}

/// Hashes each metric name to exactly one destination
pub struct ConsistentHashRoute {
    base: RouteBase,
    state: ArcSwap<HashState>,
    write_lock: Mutex<()>,
}

impl ConsistentHashRoute {
    /// Builds the route; at least two destinations are required
    pub fn new(
        key: RouteKey,
        matcher: Matcher,
        destinations: Vec<Arc<Destination>>,
    ) -> Result<Arc<Self>, ConfigError> {
        if destinations.len() < 2 {
            return Err(ConfigError::InsufficientDestinations {
                key: key.as_str().to_string(),
                kind: RouteKind::ConsistentHash,
                need: 2,
                got: destinations.len(),
            });
        }
        Ok(Arc::new(Self {
            base: RouteBase::new(key, RouteKind::ConsistentHash, matcher),
            state: ArcSwap::from_pointee(HashState::build(destinations)),
            write_lock: Mutex::new(()),
        }))
    }
}

#[async_trait]
impl Route for ConsistentHashRoute {
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
        let state = self.state.load();
        if let Some(destination) = state.select(metric_name(&line)) {
            destination.dispatch(line);
        }
    }

    async fn flush(&self) -> Result<(), RouteError> {
        let state = self.state.load_full();
        for destination in &state.destinations {
            destination.flush().await?;
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), RouteError> {
        let state = self.state.load_full();
        let mut first_err = None;
        for destination in &state.destinations {
            if let Err(error) = destination.shutdown().await {
                first_err.get_or_insert(error);
            }
        }
        match first_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn snapshot(&self) -> RouteSnapshot {
        let state = self.state.load();
        self.base.snapshot_with(
            state
                .destinations
                .iter()
                .map(|destination| destination.snapshot())
                .collect(),
        )
    }

    fn update(&self, opts: RouteOpts) -> Result<(), RouteError> {
        self.base.update_matcher(&opts)
    }

    async fn del_destination(&self, index: usize) -> Result<(), RouteError> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let current = self.state.load_full();
            if index >= current.destinations.len() {
                return Err(RouteError::DestinationOutOfRange {
                    index,
                    len: current.destinations.len(),
                });
            }
            if current.destinations.len() - 1 < 2 {
                return Err(RouteError::TooFewDestinations {
                    min: 2,
                    remaining: current.destinations.len() - 1,
                });
            }
            let mut next = current.destinations.clone();
            let removed = next.remove(index);
            self.state.store(Arc::new(HashState::build(next)));
            removed
        };
        removed.shutdown().await
    }

    fn update_destination(&self, index: usize, opts: DestinationOpts) -> Result<(), RouteError> {
        let state = self.state.load();
        let destination =
            state
                .destinations
                .get(index)
                .ok_or_else(|| RouteError::DestinationOutOfRange {
                    index,
                    len: state.destinations.len(),
                })?;
        destination.update(&opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_types::ChannelCapacity;
    use crate::route::Transport;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CaptureTransport {
        lines: StdMutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Transport for CaptureTransport {
        async fn send(
            &self,
            line: &[u8],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.lines.lock().unwrap().push(line.to_vec());
            Ok(())
        }

        async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn destination(addr: &str) -> (Arc<Destination>, Arc<CaptureTransport>) {
        let transport = Arc::new(CaptureTransport::default());
        let destination = Destination::start(
            addr,
            Matcher::match_all(),
            "",
            false,
            false,
            ChannelCapacity::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        (destination, transport)
    }

    fn route(destinations: Vec<Arc<Destination>>) -> Arc<ConsistentHashRoute> {
        ConsistentHashRoute::new(
            RouteKey::try_new("ring".to_string()).unwrap(),
            Matcher::match_all(),
            destinations,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_same_name_lands_on_same_destination() {
        let (d1, t1) = destination("carbon-a:2003");
        let (d2, t2) = destination("carbon-b:2003");
        let route = route(vec![d1, d2]);

        route.dispatch(Bytes::from_static(b"a.b 1 1")).await;
        route.dispatch(Bytes::from_static(b"a.b 2 2")).await;
        route.shutdown().await.unwrap();

        let first = t1.lines.lock().unwrap().len();
        let second = t2.lines.lock().unwrap().len();
        assert!(
            (first == 2 && second == 0) || (first == 0 && second == 2),
            "both records must land on one destination, got {first}/{second}"
        );
    }

    #[tokio::test]
    async fn test_selection_is_stable_across_ring_rebuilds() {
        let build = |dests: Vec<Arc<Destination>>| HashState::build(dests);
        let (d1, _t1) = destination("carbon-a:2003");
        let (d2, _t2) = destination("carbon-b:2003");
        let state_a = build(vec![Arc::clone(&d1), Arc::clone(&d2)]);
        let state_b = build(vec![d1, d2]);

        for name in [&b"a.b"[..], b"servers.web1.load", b"x"] {
            let pick_a = state_a.select(name).unwrap().addr().to_string();
            let pick_b = state_b.select(name).unwrap().addr().to_string();
            assert_eq!(pick_a, pick_b);
        }
    }

    #[tokio::test]
    async fn test_requires_two_destinations() {
        let (d1, _t1) = destination("carbon-a:2003");
        let result = ConsistentHashRoute::new(
            RouteKey::try_new("ring".to_string()).unwrap(),
            Matcher::match_all(),
            vec![d1],
        );
        assert!(matches!(
            result,
            Err(ConfigError::InsufficientDestinations { need: 2, got: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_del_destination_keeps_two_and_rebuilds_ring() {
        let (d1, _t1) = destination("carbon-a:2003");
        let (d2, _t2) = destination("carbon-b:2003");
        let (d3, _t3) = destination("carbon-c:2003");
        let route = route(vec![d1, d2, d3]);

        route.del_destination(2).await.unwrap();
        assert_eq!(route.snapshot().destinations.len(), 2);
        assert!(matches!(
            route.del_destination(1).await,
            Err(RouteError::TooFewDestinations { min: 2, remaining: 1 })
        ));
    }
}
