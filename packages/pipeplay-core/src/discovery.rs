//! DNS-SD advertisement of the HTTP API.
//!
//! Best-effort: a registration failure is logged by the caller and the API
//! stays reachable by direct address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use mdns_sd::{ServiceDaemon, ServiceInfo};
use thiserror::Error;

use crate::protocol_constants::{API_VERSION, APP_VERSION, SERVICE_ID, SERVICE_TYPE};

/// Errors raised while publishing the service record.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

/// What to publish.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    /// Instance name (`discovery.name`).
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    pub auth_required: bool,
}

impl ServiceRecord {
    fn txt(&self) -> HashMap<String, String> {
        HashMap::from([
            ("version".to_string(), APP_VERSION.to_string()),
            ("service".to_string(), SERVICE_ID.to_string()),
            ("api_version".to_string(), API_VERSION.to_string()),
            ("name".to_string(), self.name.clone()),
            ("auth_required".to_string(), self.auth_required.to_string()),
        ])
    }
}

/// Publishes the player on the local network.
///
/// The record is unregistered by [`unregister`](Self::unregister) or on drop,
/// whichever comes first.
pub struct DiscoveryBroadcaster {
    daemon: ServiceDaemon,
    service_fullname: String,
    unregistered: AtomicBool,
}

impl DiscoveryBroadcaster {
    /// Creates the responder and registers `record`.
    ///
    /// # Errors
    /// Returns an error if the mDNS daemon cannot be created or the service
    /// cannot be registered (e.g., multicast unavailable).
    pub fn register(record: &ServiceRecord) -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new()?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "pipeplay".to_string());

        let service = ServiceInfo::new(
            SERVICE_TYPE,
            &record.name,
            &format!("{}.local.", dns_hostname(&hostname)),
            record.ip,
            record.port,
            Some(record.txt()),
        )?;

        let fullname = service.get_fullname().to_string();
        daemon.register(service)?;

        log::info!(
            "[mDNS] Advertising '{}' at {}:{}",
            record.name,
            record.ip,
            record.port
        );

        Ok(Self {
            daemon,
            service_fullname: fullname,
            unregistered: AtomicBool::new(false),
        })
    }

    /// Withdraws the record. Safe to call multiple times.
    pub fn unregister(&self) {
        if self.unregistered.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.daemon.unregister(&self.service_fullname) {
            Ok(_) => log::info!("[mDNS] Unregistered {}", self.service_fullname),
            Err(e) => log::warn!("[mDNS] Failed to unregister service: {}", e),
        }
        if let Err(e) = self.daemon.shutdown() {
            log::debug!("[mDNS] Daemon shutdown: {}", e);
        }
    }
}

impl Drop for DiscoveryBroadcaster {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Lowercases and strips a hostname down to DNS label characters.
fn dns_hostname(hostname: &str) -> String {
    let label: String = hostname
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if label.is_empty() {
        "pipeplay".to_string()
    } else {
        label
    }
}
