//! Reachability probing for share-link endpoints.
//!
//! A probe never raises past its boundary: parse failures, DNS failures and
//! TCP failures are all captured in the returned [`ProbeResult`]. Only
//! DNS resolution and a plain TCP connect are attempted; no protocol
//! handshake is performed.

use crate::extract::parse_endpoint;
use crate::models::{Endpoint, ProbeResult, ProbeStatus};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

pub const DNS_TIMEOUT: Duration = Duration::from_secs(5);
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe a share link: parse its endpoint, resolve the host, then try a TCP
/// connect with a bounded timeout, measuring connect latency.
pub async fn probe(config: &str) -> ProbeResult {
    let Some(endpoint) = parse_endpoint(config) else {
        return ProbeResult::failure("Cannot parse server");
    };
    probe_endpoint(&endpoint).await
}

async fn probe_endpoint(endpoint: &Endpoint) -> ProbeResult {
    let target = endpoint.to_string();

    let dns_resolved = match timeout(DNS_TIMEOUT, tokio::net::lookup_host(target.as_str())).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        _ => false,
    };

    let mut tcp_connected = false;
    let mut latency_ms = -1i64;
    if dns_resolved {
        let start = Instant::now();
        if let Ok(Ok(stream)) =
            timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(target.as_str())).await
        {
            latency_ms = (start.elapsed().as_secs_f64() * 1000.0).round() as i64;
            tcp_connected = true;
            drop(stream);
        }
    }

    let (status, message) = if tcp_connected {
        (ProbeStatus::Active, format!("Online - {latency_ms}ms"))
    } else if dns_resolved {
        (ProbeStatus::DnsOnly, "DNS OK, TCP failed".to_string())
    } else {
        (ProbeStatus::Dead, "Offline".to_string())
    };

    ProbeResult { status, dns_resolved, tcp_connected, latency_ms, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn malformed_link_is_an_error_without_io() {
        let result = probe("vless://malformed-no-at-sign").await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.latency_ms, -1);
        assert!(!result.dns_resolved);
        assert!(!result.tcp_connected);
        assert_eq!(result.message, "Cannot parse server");
    }

    #[tokio::test]
    async fn reachable_listener_is_active_with_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = probe(&format!("vless://uuid@127.0.0.1:{port}")).await;
        assert_eq!(result.status, ProbeStatus::Active);
        assert!(result.dns_resolved);
        assert!(result.tcp_connected);
        assert!(result.latency_ms >= 0);
        assert!(result.message.starts_with("Online"));
    }

    #[tokio::test]
    async fn refused_port_is_dns_only() {
        // Bind to get a free port, then release it so the connect is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = probe(&format!("trojan://pw@127.0.0.1:{port}")).await;
        assert_eq!(result.status, ProbeStatus::DnsOnly);
        assert!(result.dns_resolved);
        assert!(!result.tcp_connected);
        assert_eq!(result.latency_ms, -1);
        assert_eq!(result.message, "DNS OK, TCP failed");
    }

    #[tokio::test]
    async fn unresolvable_host_is_dead() {
        // RFC 6761 reserves .invalid; resolution always fails.
        let result = probe("trojan://pw@unreachable.invalid:443").await;
        assert_eq!(result.status, ProbeStatus::Dead);
        assert!(!result.dns_resolved);
        assert_eq!(result.latency_ms, -1);
        assert_eq!(result.message, "Offline");
    }
}
