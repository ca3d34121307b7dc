//! # Network Monitor
//!
//! Tracks server reachability for the sync engine.
//!
//! The current [`NetworkStatus`] is published on a `tokio::sync::watch`
//! channel, so any number of observers can follow transitions. A probe task
//! ([`NetworkMonitor::spawn_probe`]) polls the health endpoint and publishes
//! what it sees; callers that learn about connectivity some other way can use
//! [`NetworkMonitor::set_status`] directly.

use super::transport::{HttpMethod, RemoteTransport, HEALTH_PATH};
use crate::shared::error::TransportError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Server answered the health probe
    Online,
    /// Server reachable but not healthy, or credentials rejected
    Limited,
    Offline,
}

impl NetworkStatus {
    /// Whether a sync pass is worth attempting.
    pub fn is_connected(self) -> bool {
        !matches!(self, NetworkStatus::Offline)
    }
}

#[derive(Debug)]
pub struct NetworkMonitor {
    sender: watch::Sender<NetworkStatus>,
}

impl Default for NetworkMonitor {
    /// Starts optimistic; the first failed delivery or probe corrects it.
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.sender.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Publish a status. Observers are only woken on an actual change.
    pub fn set_status(&self, status: NetworkStatus) {
        self.sender.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::info!(from = ?*current, to = ?status, "network status changed");
            *current = status;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }

    /// Probe the health endpoint every `interval` until the task is aborted.
    pub fn spawn_probe(
        self: &Arc<Self>,
        transport: Arc<dyn RemoteTransport>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (status, message) = probe(transport.as_ref()).await;
                tracing::debug!(?status, %message, "connectivity probe");
                monitor.set_status(status);
            }
        })
    }
}

/// One health check. Returns the observed status and a human-readable line.
pub async fn probe(transport: &dyn RemoteTransport) -> (NetworkStatus, String) {
    match transport.send(HttpMethod::Get, HEALTH_PATH, None).await {
        Ok(response) if response.is_success() => (
            NetworkStatus::Online,
            format!("Connected to server (HTTP {})", response.status),
        ),
        Ok(response) => (
            NetworkStatus::Limited,
            format!(
                "Server responded with {}",
                TransportError::status(response.status, response.body.trim()).diagnostic()
            ),
        ),
        Err(err @ TransportError::Network { .. }) => (
            NetworkStatus::Offline,
            format!("Cannot reach server: {}", err.diagnostic()),
        ),
        Err(err) => (
            NetworkStatus::Limited,
            format!("Server check failed: {}", err.diagnostic()),
        ),
    }
}
