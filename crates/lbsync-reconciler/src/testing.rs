//! In-memory discovery backend for tests

use async_trait::async_trait;
use lbsync_core::{LbsyncError, LbsyncResult, RawMetadata};
use lbsync_discovery::DiscoveryClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Metadata for a `web` link exposing port 80, one `(instance, host)` pair per instance
pub(crate) fn web_metadata(instances: &[(&str, &str)]) -> RawMetadata {
    let mut envvars = Vec::new();
    for (id, host) in instances {
        envvars.push((format!("WEB_{}_PORT_80_TCP_ADDR", id), host.to_string()));
        envvars.push((format!("WEB_{}_PORT_80_TCP_PORT", id), "8080".to_string()));
    }
    RawMetadata::new(["web"], envvars)
}

pub(crate) struct MockDiscovery {
    response: Mutex<Option<RawMetadata>>,
    delay: Duration,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
}

impl MockDiscovery {
    pub(crate) fn new(metadata: RawMetadata) -> Arc<Self> {
        Self::with_delay(metadata, Duration::ZERO)
    }

    /// Every fetch takes `delay` before answering
    pub(crate) fn with_delay(metadata: RawMetadata, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(metadata)),
            delay,
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            starts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set(&self, metadata: RawMetadata) {
        *self.response.lock().unwrap() = Some(metadata);
    }

    /// Make subsequent fetches fail as if the backend were down
    pub(crate) fn fail(&self) {
        *self.response.lock().unwrap() = None;
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Instants at which fetches started
    pub(crate) fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoveryClient for MockDiscovery {
    async fn fetch_raw(&self) -> LbsyncResult<RawMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().unwrap().push(Instant::now());
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap().clone();
        response.ok_or_else(|| LbsyncError::DiscoveryUnavailable("backend down".to_string()))
    }
}
