//! Client metadata recorded on sessions and compared on refresh.
//!
//! The client IP drives origin-change alerts. `X-Forwarded-For` and
//! `X-Real-IP` are only read when [`ClientIpPolicy::trust_proxy_headers`] is
//! set, which requires a reverse proxy that overwrites both headers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: String,
    pub ip: String,
}

/// Where the client IP may be read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpPolicy {
    pub trust_proxy_headers: bool,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
    ClientIpPolicy: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = ClientIpPolicy::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let forwarded = if policy.trust_proxy_headers {
            extract_ip(&parts.headers)
        } else {
            None
        };
        let ip = forwarded
            .or(peer)
            .unwrap_or_else(|| UNKNOWN_IP.to_string());

        Ok(Self {
            user_agent: extract_user_agent(&parts.headers),
            ip,
        })
    }
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return value
            .split(',')
            .next()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

// An absent agent is recorded as "" so it must stay absent on refresh.
fn extract_user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .unwrap_or_default()
}
