//! Domain models for Config Relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Protocol tag of a share link. Closed set: anything else is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Vless,
    Vmess,
    Trojan,
    Shadowsocks,
    Unknown,
}

impl Scheme {
    /// URI prefix used on the wire. Shadowsocks links use the short `ss://` form.
    pub const fn prefix(self) -> &'static str {
        match self {
            Scheme::Vless => "vless://",
            Scheme::Vmess => "vmess://",
            Scheme::Trojan => "trojan://",
            Scheme::Shadowsocks => "ss://",
            Scheme::Unknown => "",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Scheme::Vless => "vless",
            Scheme::Vmess => "vmess",
            Scheme::Trojan => "trojan",
            Scheme::Shadowsocks => "shadowsocks",
            Scheme::Unknown => "unknown",
        }
    }

    /// Classify a share link by prefix.
    pub fn classify(config: &str) -> Scheme {
        for scheme in [Scheme::Vless, Scheme::Vmess, Scheme::Trojan, Scheme::Shadowsocks] {
            if config.starts_with(scheme.prefix()) {
                return scheme;
            }
        }
        Scheme::Unknown
    }

    /// Parse a stored scheme name back into the enum.
    pub fn parse(s: &str) -> Scheme {
        match s {
            "vless" => Scheme::Vless,
            "vmess" => Scheme::Vmess,
            "trojan" => Scheme::Trojan,
            "shadowsocks" => Scheme::Shadowsocks,
            _ => Scheme::Unknown,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(host, port)` target parsed out of a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of reachability probing for one share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// TCP connection established.
    Active,
    /// Name resolved but the TCP connect failed or timed out.
    DnsOnly,
    /// Name resolution failed.
    Dead,
    /// The link itself could not be parsed; no network I/O was attempted.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub dns_resolved: bool,
    pub tcp_connected: bool,
    /// Wall-clock connect time in milliseconds, `-1` when unmeasured.
    pub latency_ms: i64,
    pub message: String,
}

impl ProbeResult {
    /// A probe that never reached the network.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            dns_resolved: false,
            tcp_connected: false,
            latency_ms: -1,
            message: message.into(),
        }
    }
}

/// A share link that has been verified and relayed, keyed by fingerprint.
/// The document store holds at most one row per fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedConfig {
    pub fingerprint: String,
    pub config: String,
    pub scheme: Scheme,
    pub probe: ProbeResult,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<SubmissionStatus> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "approved" => Some(SubmissionStatus::Approved),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }
}

/// A user-proposed share link queued for review.
///
/// Status only ever moves `pending -> approved` or `pending -> rejected`,
/// each at most once.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: Uuid,
    pub config: String,
    pub scheme: Scheme,
    pub submitted_by: String,
    pub username: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(config: String, submitted_by: &str, username: &str) -> Self {
        let scheme = Scheme::classify(&config);
        Self {
            id: Uuid::new_v4(),
            config,
            scheme,
            submitted_by: submitted_by.to_string(),
            username: username.to_string(),
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Result of one fetch/verify/relay cycle.
///
/// `new_count` is the number actually relayed; `total_checked` counts every
/// previously-unseen link observed before the per-cycle publish cap, so
/// callers can see backlog even when throttled.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CycleOutcome {
    pub new_count: usize,
    pub total_checked: usize,
}

/// Scheme-to-template mapping kept in the settings store.
pub type TemplateMap = HashMap<String, String>;

// ── Request bodies ────────────────────────────────────────────────────────────

/// Body for `POST /api/sources` and `DELETE /api/sources`.
#[derive(Debug, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body for `POST /api/channels` and `DELETE /api/channels`.
#[derive(Debug, Deserialize)]
pub struct ChannelEntry {
    pub channel_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body for `PUT /api/templates`.
#[derive(Debug, Deserialize)]
pub struct TemplateUpdate {
    pub scheme: String,
    pub template: String,
}

/// Body for `POST /api/submissions`. The whole text is scanned for share links.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
    #[serde(default = "default_submitter")]
    pub submitted_by: String,
    #[serde(default = "default_username")]
    pub username: String,
}

fn default_submitter() -> String {
    "anonymous".to_string()
}

fn default_username() -> String {
    "unknown".to_string()
}

/// Body for `POST /api/probe`.
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub config: String,
}

/// Query string for `GET /api/configs`.
#[derive(Debug, Deserialize)]
pub struct PublishedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query string for `GET /api/submissions`.
#[derive(Debug, Deserialize)]
pub struct SubmissionQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_known_prefixes() {
        assert_eq!(Scheme::classify("vless://abc@h:443"), Scheme::Vless);
        assert_eq!(Scheme::classify("vmess://eyJ9"), Scheme::Vmess);
        assert_eq!(Scheme::classify("trojan://pw@h:443"), Scheme::Trojan);
        assert_eq!(Scheme::classify("ss://YWJj@h:8388"), Scheme::Shadowsocks);
        assert_eq!(Scheme::classify("socks5://h:1080"), Scheme::Unknown);
        assert_eq!(Scheme::classify(""), Scheme::Unknown);
    }

    #[test]
    fn scheme_round_trips_through_str() {
        for scheme in [
            Scheme::Vless,
            Scheme::Vmess,
            Scheme::Trojan,
            Scheme::Shadowsocks,
            Scheme::Unknown,
        ] {
            assert_eq!(Scheme::parse(scheme.as_str()), scheme);
        }
    }

    #[test]
    fn submission_starts_pending() {
        let sub = Submission::new("trojan://pw@host:443".into(), "123", "alice");
        assert_eq!(sub.status, SubmissionStatus::Pending);
        assert_eq!(sub.scheme, Scheme::Trojan);
        assert_eq!(sub.submitted_by, "123");
    }

    #[test]
    fn endpoint_displays_as_host_port() {
        let ep = Endpoint { host: "1.2.3.4".into(), port: 443 };
        assert_eq!(ep.to_string(), "1.2.3.4:443");
    }
}
