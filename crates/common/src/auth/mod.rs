//! Anonymous client identity utilities
//!
//! The query pipeline has no user accounts: every caller is identified
//! only by a SHA-256 hash of their network identifier and user agent,
//! used as the rate limiter's key and as the audit trail's `user_id`.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

/// Anonymized identity derived from a request, never reversible to PII.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    /// SHA-256 hex digest of `"{ip}:{user_agent}"`, used as the rate-limit
    /// and audit-log `user_id`.
    pub user_id: String,

    /// SHA-256 hex digest of the client IP alone, stored as
    /// `queries.ip_address_hash`.
    pub ip_address_hash: String,
}

impl ClientIdentity {
    pub fn from_parts(ip: &str, user_agent: &str) -> Self {
        let combined = format!("{ip}:{user_agent}");
        Self {
            user_id: hash_hex(combined.as_bytes()),
            ip_address_hash: hash_hex(ip.as_bytes()),
        }
    }
}

fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Resolve the caller's IP, preferring a trusted proxy header over the
/// raw socket address so the service anonymizes the real client even
/// behind a load balancer.
fn resolve_ip(parts: &Parts, connect_info: Option<&SocketAddr>) -> String {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| connect_info.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr);

        let ip = resolve_ip(parts, connect_info.as_ref());

        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(ClientIdentity::from_parts(&ip, &user_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = ClientIdentity::from_parts("1.2.3.4", "curl/8.0");
        let b = ClientIdentity::from_parts("1.2.3.4", "curl/8.0");
        assert_eq!(a.user_id, b.user_id);
        assert_eq!(a.ip_address_hash, b.ip_address_hash);
    }

    #[test]
    fn test_identity_varies_with_user_agent() {
        let a = ClientIdentity::from_parts("1.2.3.4", "curl/8.0");
        let b = ClientIdentity::from_parts("1.2.3.4", "Mozilla/5.0");
        assert_ne!(a.user_id, b.user_id);
        assert_eq!(a.ip_address_hash, b.ip_address_hash);
    }

    #[test]
    fn test_user_id_is_sha256_hex() {
        let id = ClientIdentity::from_parts("1.2.3.4", "curl/8.0");
        assert_eq!(id.user_id.len(), 64);
        assert!(id.user_id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
