//! A single endpoint within a route
//!
//! Each destination owns a bounded command queue drained by a spawned
//! worker that forwards lines to the injected transport. Queue commands
//! carry oneshot acks, so a flush or shutdown is ordered after every line
//! queued before it.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwap;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::domain_types::ChannelCapacity;
use crate::error::RouteError;
use crate::matcher::Matcher;
use crate::route::{DestinationOpts, DestinationSnapshot, Transport, apply_matcher_opts};

type TransportResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

enum Command {
    Line(Bytes),
    Flush(oneshot::Sender<TransportResult>),
    Shutdown(oneshot::Sender<TransportResult>),
}

/// Endpoint with its own matcher, status flags and forwarding worker
pub struct Destination {
    addr: String,
    matcher: ArcSwap<Matcher>,
    spool_dir: RwLock<String>,
    spool: bool,
    pickle: bool,
    online: Arc<AtomicBool>,
    drops: AtomicU64,
    queue: mpsc::Sender<Command>,
}

impl Destination {
    /// Spawns the forwarding worker and returns the running destination
    pub fn start(
        addr: &str,
        matcher: Matcher,
        spool_dir: &str,
        spool: bool,
        pickle: bool,
        capacity: ChannelCapacity,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let (queue, rx) = mpsc::channel(capacity.as_usize());
        let online = Arc::new(AtomicBool::new(true));
        tokio::spawn(run_worker(
            addr.to_string(),
            transport,
            Arc::clone(&online),
            rx,
        ));
        Arc::new(Self {
            addr: addr.to_string(),
            matcher: ArcSwap::from_pointee(matcher),
            spool_dir: RwLock::new(spool_dir.to_string()),
            spool,
            pickle,
            online,
            drops: AtomicU64::new(0),
            queue,
        })
    }

    /// The endpoint address
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Tests the metric name against this destination's own matcher
    #[must_use]
    pub fn matches(&self, name: &[u8]) -> bool {
        self.matcher.load().matches(name)
    }

    /// Queues a line for the forwarding worker
    ///
    /// Never blocks: a full queue sheds the line and counts the drop.
    pub fn dispatch(&self, line: Bytes) {
        match self.queue.try_send(Command::Line(line)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                warn!(addr = %self.addr, "destination queue full, line dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                warn!(addr = %self.addr, "destination worker gone, line dropped");
            }
        }
    }

    /// Drains the queue through the transport's flush
    pub async fn flush(&self) -> Result<(), RouteError> {
        let (ack, done) = oneshot::channel();
        self.queue
            .send(Command::Flush(ack))
            .await
            .map_err(|_| RouteError::WorkerGone {
                addr: self.addr.clone(),
            })?;
        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(RouteError::Transport { source }),
            Err(_) => Err(RouteError::WorkerGone {
                addr: self.addr.clone(),
            }),
        }
    }

    /// Drains queued lines, closes the transport and stops the worker
    pub async fn shutdown(&self) -> Result<(), RouteError> {
        let (ack, done) = oneshot::channel();
        self.queue
            .send(Command::Shutdown(ack))
            .await
            .map_err(|_| RouteError::WorkerGone {
                addr: self.addr.clone(),
            })?;
        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(RouteError::Transport { source }),
            Err(_) => Err(RouteError::WorkerGone {
                addr: self.addr.clone(),
            }),
        }
    }

    /// Applies matcher and spool-directory overrides
    pub fn update(&self, opts: &DestinationOpts) -> Result<(), RouteError> {
        let merged = apply_matcher_opts(
            &self.matcher.load(),
            opts.prefix.as_deref(),
            opts.sub.as_deref(),
            opts.regex.as_deref(),
        )?;
        self.matcher.store(Arc::new(merged));
        if let Some(spool_dir) = &opts.spool_dir {
            if let Ok(mut current) = self.spool_dir.write() {
                *current = spool_dir.clone();
            }
        }
        Ok(())
    }

    /// Lines shed because the queue was full or the worker gone
    #[must_use]
    pub fn drops(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Whether the last transport interaction succeeded
    #[must_use]
    pub fn online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Captures the declarative fields and status flags
    #[must_use]
    pub fn snapshot(&self) -> DestinationSnapshot {
        DestinationSnapshot {
            addr: self.addr.clone(),
            matcher: self.matcher.load().snapshot(),
            spool_dir: self
                .spool_dir
                .read()
                .map(|dir| dir.clone())
                .unwrap_or_default(),
            spool: self.spool,
            pickle: self.pickle,
            online: self.online(),
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("addr", &self.addr)
            .field("spool", &self.spool)
            .field("pickle", &self.pickle)
            .field("online", &self.online())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    addr: String,
    transport: Arc<dyn Transport>,
    online: Arc<AtomicBool>,
    mut rx: mpsc::Receiver<Command>,
) {
    debug!(addr = %addr, "destination worker started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Line(line) => match transport.send(&line).await {
                Ok(()) => online.store(true, Ordering::Relaxed),
                Err(error) => {
                    online.store(false, Ordering::Relaxed);
                    warn!(addr = %addr, error = %error, "transport send failed");
                }
            },
            Command::Flush(ack) => {
                let result = transport.flush().await;
                if result.is_err() {
                    online.store(false, Ordering::Relaxed);
                }
                let _ = ack.send(result);
            }
            Command::Shutdown(ack) => {
                let _ = ack.send(transport.close().await);
                debug!(addr = %addr, "destination worker stopped");
                return;
            }
        }
    }
    // queue closed without an explicit shutdown
    let _ = transport.close().await;
    debug!(addr = %addr, "destination worker stopped, queue closed");
}
