//! Network context: which address clients should use to reach this player.

use std::net::IpAddr;
use std::sync::Arc;

/// Trait for detecting the local IP address.
///
/// Different environments may need different detection strategies.
/// This trait allows injecting the appropriate detector.
pub trait IpDetector: Send + Sync {
    /// Detects the local IP address.
    fn detect(&self) -> Result<IpAddr, NetworkError>;
}

/// Default IP detector using the system's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    /// Creates a new `LocalIpDetector` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<IpAddr, NetworkError> {
        local_ip_address::local_ip().map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect local IP address.
    #[error("Failed to detect local IP: {0}")]
    Detection(String),
}

/// Picks the address to advertise for a server bound to `bind_host`.
///
/// A specific bind address is advertised as-is. Wildcard and loopback binds
/// fall back to the detected LAN address.
///
/// # Errors
/// Returns [`NetworkError::Detection`] if detection is needed and fails.
pub fn advertise_ip(bind_host: IpAddr, detector: &dyn IpDetector) -> Result<IpAddr, NetworkError> {
    if bind_host.is_unspecified() || bind_host.is_loopback() {
        detector.detect()
    } else {
        Ok(bind_host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct MockIpDetector {
        ip: Option<IpAddr>,
    }

    impl IpDetector for MockIpDetector {
        fn detect(&self) -> Result<IpAddr, NetworkError> {
            self.ip
                .ok_or_else(|| NetworkError::Detection("no interfaces".into()))
        }
    }

    #[test]
    fn specific_bind_address_is_advertised() {
        let detector = MockIpDetector { ip: None };
        let host = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40));
        assert_eq!(advertise_ip(host, &detector).unwrap(), host);
    }

    #[test]
    fn wildcard_bind_uses_detector() {
        let lan = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let detector = MockIpDetector { ip: Some(lan) };
        assert_eq!(
            advertise_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED), &detector).unwrap(),
            lan
        );
        assert_eq!(
            advertise_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), &detector).unwrap(),
            lan
        );
    }

    #[test]
    fn detection_failure_is_reported() {
        let detector = MockIpDetector { ip: None };
        assert!(matches!(
            advertise_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED), &detector),
            Err(NetworkError::Detection(_))
        ));
    }
}
