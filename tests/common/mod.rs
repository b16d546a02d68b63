//! Shared test doubles: capturing transports and their factory

use async_trait::async_trait;
use metrelay::{RouteKind, Transport, TransportFactory};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type TransportResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Transport that records every line it is handed
#[derive(Default)]
pub struct CaptureTransport {
    lines: Mutex<Vec<Vec<u8>>>,
    fail_flush: AtomicBool,
}

impl CaptureTransport {
    pub fn strings(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    pub fn fail_next_flushes(&self) {
        self.fail_flush.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for CaptureTransport {
    async fn send(&self, line: &[u8]) -> TransportResult {
        self.lines.lock().unwrap().push(line.to_vec());
        Ok(())
    }

    async fn flush(&self) -> TransportResult {
        if self.fail_flush.load(Ordering::Relaxed) {
            return Err("flush refused".into());
        }
        Ok(())
    }

    async fn close(&self) -> TransportResult {
        Ok(())
    }
}

/// Factory handing out capture transports, retrievable by address
#[derive(Default)]
pub struct CaptureFactory {
    transports: Mutex<HashMap<String, Arc<CaptureTransport>>>,
}

impl CaptureFactory {
    pub fn transport(&self, addr: &str) -> Option<Arc<CaptureTransport>> {
        self.transports.lock().unwrap().get(addr).cloned()
    }

    pub fn lines(&self, addr: &str) -> Vec<String> {
        self.transport(addr)
            .map(|transport| transport.strings())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TransportFactory for CaptureFactory {
    async fn connect(
        &self,
        addr: &str,
        _kind: RouteKind,
    ) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error + Send + Sync>> {
        let transport = Arc::new(CaptureTransport::default());
        self.transports
            .lock()
            .unwrap()
            .insert(addr.to_string(), Arc::clone(&transport));
        Ok(transport)
    }
}
