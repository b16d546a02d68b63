//! The dispatch table
//!
//! One table per relay instance holds the ordered pipeline
//! blacklist → aggregators → rewriters → routes in an atomically swappable
//! snapshot. The record path loads that snapshot once per record and never
//! takes a lock; every mutation builds a new snapshot under a single
//! writers' mutex and swaps it in whole.

mod init;
mod snapshot;

pub use snapshot::TableSnapshot;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace, warn};

use crate::aggregator::Aggregator;
use crate::domain_types::{ChannelCapacity, RouteKey, SpoolDir};
use crate::error::TableError;
use crate::matcher::Matcher;
use crate::rewriter::Rewriter;
use crate::route::{DestinationOpts, Route, RouteOpts, metric_name};

/// Immutable value held in the table's config cell
///
/// Mutations never modify a published value; they clone, change and swap.
/// Entries are shared handles, so an in-flight dispatch using the prior
/// value keeps every entry alive until it finishes.
#[derive(Clone, Default)]
pub struct TableConfig {
    rewriters: Vec<Rewriter>,
    aggregators: Vec<Arc<Aggregator>>,
    blacklist: Vec<Matcher>,
    routes: Vec<Arc<dyn Route>>,
}

/// The routing core of a relay instance
///
/// Cheap to clone; clones share the config cell, counters and feedback
/// channel.
pub struct Table {
    config: Arc<ArcSwap<TableConfig>>,
    write_lock: Arc<Mutex<()>>,
    spool_dir: SpoolDir,
    num_blacklist: Arc<AtomicU64>,
    num_unroutable: Arc<AtomicU64>,
    feedback_tx: mpsc::Sender<Bytes>,
    feedback_rx: Arc<Mutex<Option<mpsc::Receiver<Bytes>>>>,
}

impl Clone for Table {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            write_lock: Arc::clone(&self.write_lock),
            spool_dir: self.spool_dir.clone(),
            num_blacklist: Arc::clone(&self.num_blacklist),
            num_unroutable: Arc::clone(&self.num_unroutable),
            feedback_tx: self.feedback_tx.clone(),
            feedback_rx: Arc::clone(&self.feedback_rx),
        }
    }
}

impl Table {
    /// Creates an empty table
    ///
    /// `spool_dir` is handed to spooling destinations during declarative
    /// initialization; the table itself never reads it.
    #[must_use]
    pub fn new(spool_dir: SpoolDir, feedback_capacity: ChannelCapacity) -> Self {
        let (feedback_tx, feedback_rx) = mpsc::channel(feedback_capacity.as_usize());
        Self {
            config: Arc::new(ArcSwap::from_pointee(TableConfig::default())),
            write_lock: Arc::new(Mutex::new(())),
            spool_dir,
            num_blacklist: Arc::new(AtomicU64::new(0)),
            num_unroutable: Arc::new(AtomicU64::new(0)),
            feedback_tx,
            feedback_rx: Arc::new(Mutex::new(Some(feedback_rx))),
        }
    }

    /// Sender half of the feedback channel, handed to aggregators at
    /// construction time
    #[must_use]
    pub fn feedback_sender(&self) -> mpsc::Sender<Bytes> {
        self.feedback_tx.clone()
    }

    /// The spool directory configured for this relay instance
    #[must_use]
    pub fn spool_dir(&self) -> &SpoolDir {
        &self.spool_dir
    }

    /// Records suppressed by the blacklist
    #[must_use]
    pub fn num_blacklist(&self) -> u64 {
        self.num_blacklist.load(Ordering::Relaxed)
    }

    /// Records that survived blacklist and aggregation but matched no route
    #[must_use]
    pub fn num_unroutable(&self) -> u64 {
        self.num_unroutable.load(Ordering::Relaxed)
    }

    /// Spawns the feedback pump
    ///
    /// The pump drains aggregator output back into the routing half of the
    /// pipeline and stops once every sender to the feedback channel is
    /// gone. Calling this a second time is an error.
    pub async fn start(&self) -> Result<(), TableError> {
        let mut slot = self.feedback_rx.lock().await;
        let mut feedback_rx = slot.take().ok_or(TableError::AlreadyStarted)?;
        drop(slot);

        let config = Arc::clone(&self.config);
        let num_unroutable = Arc::clone(&self.num_unroutable);
        tokio::spawn(async move {
            debug!("feedback pump started");
            while let Some(line) = feedback_rx.recv().await {
                route_aggregate(&config, &num_unroutable, line).await;
            }
            debug!("feedback pump stopped, channel closed");
        });
        Ok(())
    }

    /// Runs one record through the full pipeline
    ///
    /// `buf` holds one record without trailing whitespace; the table copies
    /// before use, so the caller may reuse the buffer immediately. The only
    /// operation that may block is the send into a full aggregator intake.
    /// Runtime anomalies are counted or logged, never returned.
    pub async fn dispatch(&self, buf: &[u8]) {
        let mut fields: Vec<Vec<u8>> = buf
            .split(|byte| byte.is_ascii_whitespace())
            .filter(|token| !token.is_empty())
            .map(<[u8]>::to_vec)
            .collect();
        if fields.is_empty() {
            trace!("empty record ignored");
            return;
        }

        // one load; the whole pipeline below runs against this snapshot
        let conf = self.config.load_full();

        for matcher in &conf.blacklist {
            if matcher.matches(&fields[0]) {
                self.num_blacklist.fetch_add(1, Ordering::Relaxed);
                trace!(metric = %String::from_utf8_lossy(&fields[0]), "blacklisted");
                return;
            }
        }

        for aggregator in &conf.aggregators {
            if aggregator.pre_match(&fields[0]) {
                let row: Vec<Bytes> = fields
                    .iter()
                    .map(|field| Bytes::copy_from_slice(field))
                    .collect();
                aggregator.feed(row).await;
            }
        }

        for rewriter in &conf.rewriters {
            fields[0] = rewriter.apply(&fields[0]);
        }

        let line = Bytes::from(fields.join(&b' '));
        let mut routed = false;
        for route in &conf.routes {
            if route.matches(&fields[0]) {
                route.dispatch(line.clone()).await;
                routed = true;
            }
        }
        if !routed {
            self.num_unroutable.fetch_add(1, Ordering::Relaxed);
            warn!(metric = %String::from_utf8_lossy(&fields[0]), "no route matched");
        }
    }

    /// Runs an aggregator-synthesized record through routing only
    ///
    /// No blacklist, no aggregation, no rewrite: synthesized records must
    /// not loop back into the aggregation layer.
    pub async fn dispatch_aggregate(&self, line: Bytes) {
        route_aggregate(&self.config, &self.num_unroutable, line).await;
    }

    /// Appends a running route
    pub async fn add_route(&self, route: Arc<dyn Route>) {
        let _guard = self.write_lock.lock().await;
        let mut next = TableConfig::clone(&self.config.load());
        next.routes.push(route);
        self.config.store(Arc::new(next));
    }

    /// Appends a blacklist matcher
    pub async fn add_blacklist(&self, matcher: Matcher) {
        let _guard = self.write_lock.lock().await;
        let mut next = TableConfig::clone(&self.config.load());
        next.blacklist.push(matcher);
        self.config.store(Arc::new(next));
    }

    /// Appends a running aggregator
    pub async fn add_aggregator(&self, aggregator: Arc<Aggregator>) {
        let _guard = self.write_lock.lock().await;
        let mut next = TableConfig::clone(&self.config.load());
        next.aggregators.push(aggregator);
        self.config.store(Arc::new(next));
    }

    /// Appends a rewriter
    pub async fn add_rewriter(&self, rewriter: Rewriter) {
        let _guard = self.write_lock.lock().await;
        let mut next = TableConfig::clone(&self.config.load());
        next.rewriters.push(rewriter);
        self.config.store(Arc::new(next));
    }

    /// Removes the aggregator at `index` and shuts it down
    ///
    /// The swap happens first, so no new dispatch can reach the aggregator
    /// while its shutdown drains the buckets.
    pub async fn del_aggregator(&self, index: usize) -> Result<(), TableError> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let current = self.config.load_full();
            if index >= current.aggregators.len() {
                return Err(TableError::IndexOutOfRange {
                    kind: "aggregator",
                    index,
                    len: current.aggregators.len(),
                });
            }
            let mut next = (*current).clone();
            let removed = next.aggregators.remove(index);
            self.config.store(Arc::new(next));
            removed
        };
        removed
            .shutdown()
            .await
            .map_err(|source| TableError::Aggregator { source })
    }

    /// Removes the blacklist matcher at `index`
    pub async fn del_blacklist(&self, index: usize) -> Result<(), TableError> {
        let _guard = self.write_lock.lock().await;
        let current = self.config.load_full();
        if index >= current.blacklist.len() {
            return Err(TableError::IndexOutOfRange {
                kind: "blacklist",
                index,
                len: current.blacklist.len(),
            });
        }
        let mut next = (*current).clone();
        next.blacklist.remove(index);
        self.config.store(Arc::new(next));
        Ok(())
    }

    /// Removes the rewriter at `index`
    pub async fn del_rewriter(&self, index: usize) -> Result<(), TableError> {
        let _guard = self.write_lock.lock().await;
        let current = self.config.load_full();
        if index >= current.rewriters.len() {
            return Err(TableError::IndexOutOfRange {
                kind: "rewriter",
                index,
                len: current.rewriters.len(),
            });
        }
        let mut next = (*current).clone();
        next.rewriters.remove(index);
        self.config.store(Arc::new(next));
        Ok(())
    }

    /// Removes the route with `key` and shuts it down
    ///
    /// Deleting a key that is not present is a success, which makes the
    /// operation idempotent. The swap happens before the shutdown, so a
    /// producer that already loaded the prior snapshot can still deliver
    /// into the route's draining queues, but no later dispatch will.
    pub async fn del_route(&self, key: &str) -> Result<(), TableError> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let current = self.config.load_full();
            let Some(position) = current
                .routes
                .iter()
                .position(|route| route.key().as_str() == key)
            else {
                return Ok(());
            };
            let mut next = (*current).clone();
            let removed = next.routes.remove(position);
            self.config.store(Arc::new(next));
            removed
        };
        removed.shutdown().await.map_err(|source| TableError::Route {
            key: key.to_string(),
            source,
        })
    }

    /// Removes destination `index` from the route with `key`
    pub async fn del_destination(&self, key: &str, index: usize) -> Result<(), TableError> {
        let route = self.require_route(key)?;
        route
            .del_destination(index)
            .await
            .map_err(|source| TableError::Route {
                key: key.to_string(),
                source,
            })
    }

    /// Applies matcher overrides to the route with `key`
    pub fn update_route(&self, key: &str, opts: RouteOpts) -> Result<(), TableError> {
        let route = self.require_route(key)?;
        route.update(opts).map_err(|source| TableError::Route {
            key: key.to_string(),
            source,
        })
    }

    /// Applies overrides to destination `index` of the route with `key`
    pub fn update_destination(
        &self,
        key: &str,
        index: usize,
        opts: DestinationOpts,
    ) -> Result<(), TableError> {
        let route = self.require_route(key)?;
        route
            .update_destination(index, opts)
            .map_err(|source| TableError::Route {
                key: key.to_string(),
                source,
            })
    }

    /// Looks up the route with `key` in the current snapshot
    #[must_use]
    pub fn get_route(&self, key: &str) -> Option<Arc<dyn Route>> {
        self.config
            .load()
            .routes
            .iter()
            .find(|route| route.key().as_str() == key)
            .cloned()
    }

    fn require_route(&self, key: &str) -> Result<Arc<dyn Route>, TableError> {
        self.get_route(key)
            .ok_or_else(|| TableError::RouteNotFound {
                key: key.to_string(),
            })
    }

    /// Captures a deep read-only view of the current pipeline
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let conf = self.config.load();
        TableSnapshot {
            spool_dir: self.spool_dir.as_str().to_string(),
            rewriters: conf.rewriters.iter().map(Rewriter::snapshot).collect(),
            blacklist: conf.blacklist.iter().map(Matcher::snapshot).collect(),
            aggregators: conf
                .aggregators
                .iter()
                .map(|aggregator| aggregator.snapshot())
                .collect(),
            routes: conf.routes.iter().map(|route| route.snapshot()).collect(),
        }
    }

    /// Flushes every route in order, stopping at the first failure
    pub async fn flush(&self) -> Result<(), TableError> {
        let conf = self.config.load_full();
        for route in &conf.routes {
            route.flush().await.map_err(|source| TableError::Route {
                key: route.key().as_str().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Shuts every route down in order and empties the route sequence
    ///
    /// The first failure is reported, but the swap always completes:
    /// afterwards dispatches still run, they just route nowhere. The
    /// feedback pump keeps running until the feedback channel closes.
    pub async fn shutdown(&self) -> Result<(), TableError> {
        let _guard = self.write_lock.lock().await;
        let current = self.config.load_full();
        let mut first_err = None;
        for route in &current.routes {
            if let Err(source) = route.shutdown().await {
                warn!(route = %route.key(), error = %source, "route shutdown failed");
                first_err.get_or_insert(TableError::Route {
                    key: route.key().as_str().to_string(),
                    source,
                });
            }
        }
        let mut next = (*current).clone();
        next.routes.clear();
        self.config.store(Arc::new(next));
        match first_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Routing half of the pipeline, shared by `dispatch_aggregate` and the
/// feedback pump (which must not hold a feedback sender of its own)
async fn route_aggregate(
    config: &ArcSwap<TableConfig>,
    num_unroutable: &AtomicU64,
    line: Bytes,
) {
    let name = metric_name(&line);
    let conf = config.load_full();
    let mut routed = false;
    for route in &conf.routes {
        if route.matches(name) {
            route.dispatch(line.clone()).await;
            routed = true;
        }
    }
    if !routed {
        num_unroutable.fetch_add(1, Ordering::Relaxed);
        warn!(metric = %String::from_utf8_lossy(name), "no route matched aggregator output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;
    use crate::route::{DestinationSnapshot, RouteKind, RouteSnapshot};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicBool;

    struct TestRoute {
        key: RouteKey,
        matcher: Matcher,
        lines: StdMutex<Vec<Vec<u8>>>,
        fail_flush: bool,
        fail_shutdown: bool,
        shutdown_called: AtomicBool,
    }

    impl TestRoute {
        fn new(key: &str, matcher: Matcher) -> Arc<Self> {
            Arc::new(Self {
                key: RouteKey::try_new(key.to_string()).unwrap(),
                matcher,
                lines: StdMutex::new(Vec::new()),
                fail_flush: false,
                fail_shutdown: false,
                shutdown_called: AtomicBool::new(false),
            })
        }

        fn failing(key: &str, fail_flush: bool, fail_shutdown: bool) -> Arc<Self> {
            Arc::new(Self {
                key: RouteKey::try_new(key.to_string()).unwrap(),
                matcher: Matcher::match_all(),
                lines: StdMutex::new(Vec::new()),
                fail_flush,
                fail_shutdown,
                shutdown_called: AtomicBool::new(false),
            })
        }

        fn received(&self) -> Vec<String> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .collect()
        }
    }

    #[async_trait]
    impl Route for TestRoute {
        fn key(&self) -> &RouteKey {
            &self.key
        }

        fn kind(&self) -> RouteKind {
            RouteKind::SendAllMatch
        }

        fn matches(&self, name: &[u8]) -> bool {
            self.matcher.matches(name)
        }

        async fn dispatch(&self, line: Bytes) {
            self.lines.lock().unwrap().push(line.to_vec());
        }

        async fn flush(&self) -> Result<(), RouteError> {
            if self.fail_flush {
                return Err(RouteError::WorkerGone {
                    addr: "test".to_string(),
                });
            }
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), RouteError> {
            self.shutdown_called.store(true, Ordering::Relaxed);
            if self.fail_shutdown {
                return Err(RouteError::WorkerGone {
                    addr: "test".to_string(),
                });
            }
            Ok(())
        }

        fn snapshot(&self) -> RouteSnapshot {
            RouteSnapshot {
                key: self.key.as_str().to_string(),
                kind: RouteKind::SendAllMatch,
                matcher: self.matcher.snapshot(),
                destinations: Vec::<DestinationSnapshot>::new(),
            }
        }

        fn update(&self, _opts: RouteOpts) -> Result<(), RouteError> {
            Ok(())
        }

        async fn del_destination(&self, _index: usize) -> Result<(), RouteError> {
            Ok(())
        }

        fn update_destination(
            &self,
            _index: usize,
            _opts: DestinationOpts,
        ) -> Result<(), RouteError> {
            Ok(())
        }
    }

    fn table() -> Table {
        Table::new(SpoolDir::default(), ChannelCapacity::default())
    }

    #[tokio::test]
    async fn test_empty_table_counts_unroutable() {
        let table = table();
        table.dispatch(b"foo.bar 1 1000").await;
        assert_eq!(table.num_unroutable(), 1);
        assert_eq!(table.num_blacklist(), 0);
    }

    #[tokio::test]
    async fn test_blacklist_short_circuits_routing() {
        let table = table();
        let route = TestRoute::new("all", Matcher::match_all());
        table.add_route(route.clone()).await;
        table.add_blacklist(Matcher::prefix("junk.")).await;

        table.dispatch(b"junk.a 1 1").await;
        table.dispatch(b"ok.b 2 2").await;

        assert_eq!(route.received(), vec!["ok.b 2 2"]);
        assert_eq!(table.num_blacklist(), 1);
        assert_eq!(table.num_unroutable(), 0);
    }

    #[tokio::test]
    async fn test_rewriters_compose_before_routing() {
        let table = table();
        let route = TestRoute::new("p", Matcher::prefix("p."));
        table.add_route(route.clone()).await;
        table
            .add_rewriter(Rewriter::new("prod.", "p.", Some(1)).unwrap())
            .await;

        table.dispatch(b"prod.prod.svc 3 3").await;
        assert_eq!(route.received(), vec!["p.prod.svc 3 3"]);
    }

    #[tokio::test]
    async fn test_every_matching_route_receives_the_record() {
        let table = table();
        let first = TestRoute::new("first", Matcher::prefix("foo."));
        let second = TestRoute::new("second", Matcher::match_all());
        let third = TestRoute::new("third", Matcher::prefix("bar."));
        table.add_route(first.clone()).await;
        table.add_route(second.clone()).await;
        table.add_route(third.clone()).await;

        table.dispatch(b"foo.x 2 1000").await;

        assert_eq!(first.received(), vec!["foo.x 2 1000"]);
        assert_eq!(second.received(), vec!["foo.x 2 1000"]);
        assert!(third.received().is_empty());
        assert_eq!(table.num_unroutable(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_tokenization_normalizes_separators() {
        let table = table();
        let route = TestRoute::new("all", Matcher::match_all());
        table.add_route(route.clone()).await;

        table.dispatch(b"foo.bar\t1   1000").await;
        assert_eq!(route.received(), vec!["foo.bar 1 1000"]);
    }

    #[tokio::test]
    async fn test_del_route_is_idempotent_and_shuts_down() {
        let table = table();
        let route = TestRoute::new("gone", Matcher::match_all());
        table.add_route(route.clone()).await;

        table.del_route("gone").await.unwrap();
        assert!(route.shutdown_called.load(Ordering::Relaxed));
        // second delete of the same key is a success, not an error
        table.del_route("gone").await.unwrap();
        assert!(table.get_route("gone").is_none());
    }

    #[tokio::test]
    async fn test_del_route_surfaces_shutdown_failure_after_swap() {
        let table = table();
        let route = TestRoute::failing("bad", false, true);
        table.add_route(route).await;

        let result = table.del_route("bad").await;
        assert!(matches!(result, Err(TableError::Route { .. })));
        // the swap completed even though shutdown failed
        assert!(table.get_route("bad").is_none());
    }

    #[tokio::test]
    async fn test_index_deletions_reject_out_of_range() {
        let table = table();
        table.add_blacklist(Matcher::prefix("a.")).await;
        table
            .add_rewriter(Rewriter::new("a", "b", None).unwrap())
            .await;

        assert!(matches!(
            table.del_blacklist(1).await,
            Err(TableError::IndexOutOfRange {
                kind: "blacklist",
                index: 1,
                len: 1
            })
        ));
        assert!(matches!(
            table.del_rewriter(7).await,
            Err(TableError::IndexOutOfRange {
                kind: "rewriter",
                ..
            })
        ));
        assert!(matches!(
            table.del_aggregator(0).await,
            Err(TableError::IndexOutOfRange {
                kind: "aggregator",
                ..
            })
        ));

        table.del_blacklist(0).await.unwrap();
        table.del_rewriter(0).await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_on_unknown_route_key() {
        let table = table();
        assert!(matches!(
            table.update_route("nope", RouteOpts::default()),
            Err(TableError::RouteNotFound { .. })
        ));
        assert!(matches!(
            table.del_destination("nope", 0).await,
            Err(TableError::RouteNotFound { .. })
        ));
        assert!(matches!(
            table.update_destination("nope", 0, DestinationOpts::default()),
            Err(TableError::RouteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_flush_stops_at_first_failure() {
        let table = table();
        let good = TestRoute::new("good", Matcher::match_all());
        let bad = TestRoute::failing("bad", true, false);
        let later = TestRoute::new("later", Matcher::match_all());
        table.add_route(good).await;
        table.add_route(bad).await;
        table.add_route(later).await;

        let result = table.flush().await;
        match result {
            Err(TableError::Route { key, .. }) => assert_eq!(key, "bad"),
            other => panic!("expected flush failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_empties_routes_and_reports_first_failure() {
        let table = table();
        let bad = TestRoute::failing("bad", false, true);
        let good = TestRoute::new("good", Matcher::match_all());
        table.add_route(bad).await;
        table.add_route(good.clone()).await;

        let result = table.shutdown().await;
        assert!(matches!(result, Err(TableError::Route { .. })));
        assert!(good.shutdown_called.load(Ordering::Relaxed));

        // routing is now a no-op; records fall through as unroutable
        table.dispatch(b"foo 1 1").await;
        assert_eq!(table.num_unroutable(), 1);
        assert!(table.snapshot().routes.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_decoupled_from_later_mutations() {
        let table = table();
        table.add_blacklist(Matcher::prefix("junk.")).await;
        let before = table.snapshot();

        table.add_blacklist(Matcher::prefix("more.")).await;
        table
            .add_rewriter(Rewriter::new("a", "b", None).unwrap())
            .await;

        assert_eq!(before.blacklist.len(), 1);
        assert!(before.rewriters.is_empty());
        assert_eq!(table.snapshot().blacklist.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_aggregate_skips_blacklist_and_rewrite() {
        let table = table();
        let route = TestRoute::new("agg", Matcher::prefix("agg."));
        table.add_route(route.clone()).await;
        table.add_blacklist(Matcher::prefix("agg.")).await;
        table
            .add_rewriter(Rewriter::new("agg.", "x.", None).unwrap())
            .await;

        table
            .dispatch_aggregate(Bytes::from_static(b"agg.x 3 1000"))
            .await;

        // neither the blacklist nor the rewriter applied
        assert_eq!(route.received(), vec!["agg.x 3 1000"]);
        assert_eq!(table.num_blacklist(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_an_error() {
        let table = table();
        table.start().await.unwrap();
        assert!(matches!(
            table.start().await,
            Err(TableError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_outcomes_are_mutually_exclusive_and_exhaustive() {
        let table = table();
        let route = TestRoute::new("ok", Matcher::prefix("ok."));
        table.add_route(route.clone()).await;
        table.add_blacklist(Matcher::prefix("junk.")).await;

        let inputs: &[&[u8]] = &[b"junk.a 1 1", b"ok.b 2 2", b"lost.c 3 3", b"junk.d 4 4"];
        for input in inputs {
            table.dispatch(input).await;
        }

        let routed = route.received().len() as u64;
        assert_eq!(
            table.num_blacklist() + routed + table.num_unroutable(),
            inputs.len() as u64
        );
        assert_eq!(table.num_blacklist(), 2);
        assert_eq!(routed, 1);
        assert_eq!(table.num_unroutable(), 1);
    }
}
