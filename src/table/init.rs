//! Populating a table from a declarative configuration
//!
//! Sections apply in a fixed order: init commands, blacklist,
//! aggregations, rewriters, routes. The first error halts initialization
//! and is returned; whatever was built before it stays in the table.

use std::sync::Arc;

use tracing::info;

use crate::aggregator::Aggregator;
use crate::config::{InitCommand, RelayConfig, RouteConfig, parse_blacklist_entry};
use crate::domain_types::ChannelCapacity;
use crate::error::ConfigError;
use crate::matcher::Matcher;
use crate::rewriter::Rewriter;
use crate::route::{
    ConsistentHashRoute, Destination, GrafanaNetOptions, GrafanaNetRoute, KafkaMdmOptions,
    KafkaMdmRoute, Route, RouteKind, SendAllMatchRoute, SendFirstMatchRoute, TransportFactory,
};
use crate::table::Table;

impl Table {
    /// Populates the table from a declarative configuration
    ///
    /// Transports for every destination come from `transports`; the
    /// routing core never opens connections itself.
    pub async fn init_from_config(
        &self,
        config: &RelayConfig,
        transports: &dyn TransportFactory,
    ) -> Result<(), ConfigError> {
        for command in &config.init {
            self.apply_init_command(command, config, transports).await?;
        }
        for entry in &config.blacklist {
            self.add_blacklist(parse_blacklist_entry(entry)?).await;
        }
        for spec in &config.aggregations {
            let aggregator =
                Aggregator::start(spec.clone(), config.queue_size, self.feedback_sender())?;
            self.add_aggregator(aggregator).await;
        }
        for rewriter in &config.rewriters {
            self.add_rewriter(Rewriter::new(&rewriter.old, &rewriter.new, rewriter.max)?)
                .await;
        }
        for route in &config.routes {
            let built = build_route(route, self, config.queue_size, transports).await?;
            self.add_route(built).await;
        }
        info!(
            blacklist = config.blacklist.len(),
            aggregations = config.aggregations.len(),
            rewriters = config.rewriters.len(),
            routes = config.routes.len(),
            "table initialized"
        );
        Ok(())
    }

    async fn apply_init_command(
        &self,
        command: &InitCommand,
        config: &RelayConfig,
        transports: &dyn TransportFactory,
    ) -> Result<(), ConfigError> {
        match command {
            InitCommand::AddBlacklist { entry } => {
                self.add_blacklist(parse_blacklist_entry(entry)?).await;
            }
            InitCommand::AddRewriter { old, new, max } => {
                self.add_rewriter(Rewriter::new(old, new, *max)?).await;
            }
            InitCommand::AddAggregation { spec } => {
                let aggregator =
                    Aggregator::start(spec.clone(), config.queue_size, self.feedback_sender())?;
                self.add_aggregator(aggregator).await;
            }
            InitCommand::AddRoute { route } => {
                let built = build_route(route, self, config.queue_size, transports).await?;
                self.add_route(built).await;
            }
            InitCommand::DelRoute { key } => {
                self.del_route(key)
                    .await
                    .map_err(|source| ConfigError::Command {
                        source: Box::new(source),
                    })?;
            }
        }
        Ok(())
    }
}

async fn build_route(
    config: &RouteConfig,
    table: &Table,
    capacity: ChannelCapacity,
    transports: &dyn TransportFactory,
) -> Result<Arc<dyn Route>, ConfigError> {
    let matcher = Matcher::new(&config.prefix, &config.sub, &config.regex)?;
    match config.kind {
        RouteKind::SendAllMatch => {
            let destinations = build_destinations(config, table, capacity, transports).await?;
            let route: Arc<dyn Route> =
                SendAllMatchRoute::new(config.key.clone(), matcher, destinations)?;
            Ok(route)
        }
        RouteKind::SendFirstMatch => {
            let destinations = build_destinations(config, table, capacity, transports).await?;
            let route: Arc<dyn Route> =
                SendFirstMatchRoute::new(config.key.clone(), matcher, destinations)?;
            Ok(route)
        }
        RouteKind::ConsistentHash => {
            let destinations = build_destinations(config, table, capacity, transports).await?;
            let route: Arc<dyn Route> =
                ConsistentHashRoute::new(config.key.clone(), matcher, destinations)?;
            Ok(route)
        }
        RouteKind::GrafanaNet => {
            let addr = require_addr(config, "grafana-net requires an endpoint address")?;
            let mut options = GrafanaNetOptions::default();
            if let Some(spool) = config.spool {
                options.spool = spool;
            }
            if let Some(ssl_verify) = config.ssl_verify {
                options.ssl_verify = ssl_verify;
            }
            if let Some(buf_size) = config.buf_size {
                options.buf_size = buf_size;
            }
            if let Some(flush_max_num) = config.flush_max_num {
                options.flush_max_num = flush_max_num;
            }
            if let Some(flush_max_wait) = config.flush_max_wait {
                options.flush_max_wait = flush_max_wait;
            }
            if let Some(timeout) = config.timeout {
                options.timeout = timeout;
            }
            if let Some(concurrency) = config.concurrency {
                options.concurrency = concurrency;
            }
            if let Some(org_id) = config.org_id {
                options.org_id = org_id;
            }
            let transport = connect(transports, addr, RouteKind::GrafanaNet).await?;
            let route: Arc<dyn Route> = GrafanaNetRoute::new(
                config.key.clone(),
                matcher,
                addr,
                options,
                table.spool_dir().as_str(),
                capacity,
                transport,
            );
            Ok(route)
        }
        RouteKind::KafkaMdm => {
            let addr = require_addr(config, "kafka-mdm requires a broker address")?;
            let partition_by =
                config
                    .partition_by
                    .ok_or_else(|| ConfigError::MissingPartitionBy {
                        key: config.key.as_str().to_string(),
                    })?;
            let mut options = KafkaMdmOptions::new(partition_by);
            if let Some(buf_size) = config.buf_size {
                options.buf_size = buf_size;
            }
            if let Some(flush_max_num) = config.flush_max_num {
                options.flush_max_num = flush_max_num;
            }
            if let Some(flush_max_wait) = config.flush_max_wait {
                options.flush_max_wait = flush_max_wait;
            }
            if let Some(timeout) = config.timeout {
                options.timeout = timeout;
            }
            if let Some(org_id) = config.org_id {
                options.org_id = org_id;
            }
            let transport = connect(transports, addr, RouteKind::KafkaMdm).await?;
            let route: Arc<dyn Route> = KafkaMdmRoute::new(
                config.key.clone(),
                matcher,
                addr,
                options,
                capacity,
                transport,
            );
            Ok(route)
        }
    }
}

async fn build_destinations(
    config: &RouteConfig,
    table: &Table,
    capacity: ChannelCapacity,
    transports: &dyn TransportFactory,
) -> Result<Vec<Arc<Destination>>, ConfigError> {
    let mut destinations = Vec::with_capacity(config.destinations.len());
    for destination in &config.destinations {
        let matcher = Matcher::new(&destination.prefix, &destination.sub, &destination.regex)?;
        let transport = connect(transports, &destination.addr, config.kind).await?;
        let spool_dir = destination
            .spool_dir
            .as_deref()
            .unwrap_or(table.spool_dir().as_str());
        destinations.push(Destination::start(
            &destination.addr,
            matcher,
            spool_dir,
            destination.spool,
            destination.pickle,
            capacity,
            transport,
        ));
    }
    Ok(destinations)
}

fn require_addr<'a>(config: &'a RouteConfig, reason: &str) -> Result<&'a str, ConfigError> {
    config
        .addr
        .as_deref()
        .ok_or_else(|| ConfigError::Validation {
            field: format!("routes.{}.addr", config.key),
            reason: reason.to_string(),
        })
}

async fn connect(
    transports: &dyn TransportFactory,
    addr: &str,
    kind: RouteKind,
) -> Result<Arc<dyn crate::route::Transport>, ConfigError> {
    transports
        .connect(addr, kind)
        .await
        .map_err(|source| ConfigError::Transport {
            addr: addr.to_string(),
            source,
        })
}
