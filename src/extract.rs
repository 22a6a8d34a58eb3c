//! Share-link extraction and endpoint parsing.
//!
//! One regex per supported scheme is applied over raw page text; the union of
//! matches, with duplicate literals collapsed, is the extraction result. The
//! pattern set is closed over the four supported prefixes, so `unknown` links
//! never enter the pipeline through extraction.

use crate::models::{Endpoint, Scheme};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static CONFIG_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r#"vless://[^\s<>"]+"#).expect("share-link pattern compiles"),
        Regex::new(r#"vmess://[^\s<>"]+"#).expect("share-link pattern compiles"),
        Regex::new(r#"trojan://[^\s<>"]+"#).expect("share-link pattern compiles"),
        // \b keeps this from matching the tail of vless:// and vmess:// links.
        Regex::new(r#"\bss://[^\s<>"]+"#).expect("share-link pattern compiles"),
    ]
});

/// Scan raw text for share links.
///
/// Returns each distinct link once, in first-seen order (pattern order, then
/// position in the text), so the result is deterministic for a given input.
pub fn extract(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for pattern in CONFIG_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            if seen.insert(m.as_str()) {
                links.push(m.as_str().to_string());
            }
        }
    }
    links
}

/// Parse the `(host, port)` target out of a share link.
///
/// Returns `None` for malformed or unrecognised encodings; that is an
/// expected state, not an error.
pub fn parse_endpoint(config: &str) -> Option<Endpoint> {
    match Scheme::classify(config) {
        Scheme::Vmess => parse_vmess(config),
        Scheme::Vless | Scheme::Trojan => {
            let rest = config.split_once("://")?.1;
            host_port_after_at(rest)
        }
        // Legacy shadowsocks encodings without `@` are unsupported.
        Scheme::Shadowsocks => {
            let rest = config.strip_prefix(Scheme::Shadowsocks.prefix())?;
            if !rest.contains('@') {
                return None;
            }
            host_port_after_at(rest)
        }
        Scheme::Unknown => None,
    }
}

/// Vmess links carry a base64 JSON record with `add` (host) and `port` fields.
fn parse_vmess(config: &str) -> Option<Endpoint> {
    let payload = config.strip_prefix(Scheme::Vmess.prefix())?;

    // Restore standard `=` padding to the nearest multiple of 4.
    let mut padded = payload.to_string();
    let rem = padded.len() % 4;
    if rem != 0 {
        padded.extend(std::iter::repeat('=').take(4 - rem));
    }

    let decoded = STANDARD.decode(padded.as_bytes()).ok()?;
    let record: serde_json::Value = serde_json::from_slice(&decoded).ok()?;

    let host = record.get("add")?.as_str()?;
    if host.is_empty() {
        return None;
    }
    let port = match record.get("port") {
        None | Some(serde_json::Value::Null) => 443,
        Some(serde_json::Value::Number(n)) => u16::try_from(n.as_u64()?).ok()?,
        Some(serde_json::Value::String(s)) => s.parse().ok()?,
        Some(_) => return None,
    };

    Some(Endpoint { host: host.to_string(), port })
}

/// Shared `user@host:port` extraction for vless, trojan and shadowsocks.
///
/// Takes the host:port segment before any `?` or `#`, strips IPv6 brackets,
/// and splits on the last `:` so IPv6 hosts with embedded colons survive.
fn host_port_after_at(rest: &str) -> Option<Endpoint> {
    let after_at = rest.split('@').nth(1)?;
    let host_port = after_at.split(['?', '#']).next().unwrap_or(after_at);
    let (host, port) = host_port.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    // Drop any trailing path from the port segment.
    let port = port.split('/').next().unwrap_or(port);
    let port: u16 = port.parse().ok()?;
    Some(Endpoint { host: host.to_string(), port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_exact_link_from_surrounding_text() {
        let links = extract("prefix vless://abc@1.2.3.4:443?x=1 suffix");
        assert_eq!(links, vec!["vless://abc@1.2.3.4:443?x=1".to_string()]);
    }

    #[test]
    fn duplicate_literals_collapse_to_one() {
        let text = "trojan://pw@h:443#a\nsome text\ntrojan://pw@h:443#a";
        assert_eq!(extract(text).len(), 1);
    }

    #[test]
    fn collects_all_supported_schemes() {
        let text = "vless://a@h:1 vmess://eyJ9 trojan://b@h:2 ss://Yg@h:3 socks5://h:4";
        let links = extract(text);
        assert_eq!(links.len(), 4);
        assert!(!links.iter().any(|l| l.starts_with("socks5")));
    }

    #[test]
    fn ss_never_matches_inside_another_scheme() {
        let links = extract("vless://abc@1.2.3.4:443 vmess://eyJhIjoxfQ");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| !l.starts_with("ss://")));
    }

    #[test]
    fn angle_brackets_and_quotes_terminate_a_match() {
        let links = extract(r#"<a href="vless://u@h:443">link</a>"#);
        assert_eq!(links, vec!["vless://u@h:443".to_string()]);
    }

    #[test]
    fn vless_endpoint_with_query_and_fragment() {
        let ep = parse_endpoint("vless://uuid@1.2.3.4:443?security=tls#name").unwrap();
        assert_eq!(ep, Endpoint { host: "1.2.3.4".into(), port: 443 });
    }

    #[test]
    fn vless_ipv6_host_keeps_inner_colons() {
        let ep = parse_endpoint("vless://uuid@[2001:db8::1]:8443?x=1").unwrap();
        assert_eq!(ep.host, "2001:db8::1");
        assert_eq!(ep.port, 8443);
    }

    #[test]
    fn trailing_path_after_port_is_dropped() {
        let ep = parse_endpoint("trojan://pw@example.com:443/path#tag").unwrap();
        assert_eq!(ep, Endpoint { host: "example.com".into(), port: 443 });
    }

    #[test]
    fn missing_at_or_port_yields_none() {
        assert_eq!(parse_endpoint("vless://malformed-no-at-sign"), None);
        assert_eq!(parse_endpoint("vless://uuid@hostonly"), None);
        assert_eq!(parse_endpoint("trojan://pw@host:notaport"), None);
    }

    #[test]
    fn vmess_decodes_base64_record() {
        // {"add":"vm.example.com","port":8080}
        let payload = STANDARD.encode(r#"{"add":"vm.example.com","port":8080}"#);
        let ep = parse_endpoint(&format!("vmess://{payload}")).unwrap();
        assert_eq!(ep, Endpoint { host: "vm.example.com".into(), port: 8080 });
    }

    #[test]
    fn vmess_port_may_be_a_string() {
        let payload = STANDARD.encode(r#"{"add":"vm.example.com","port":"8443"}"#);
        let ep = parse_endpoint(&format!("vmess://{payload}")).unwrap();
        assert_eq!(ep.port, 8443);
    }

    #[test]
    fn vmess_port_defaults_to_443() {
        let payload = STANDARD.encode(r#"{"add":"vm.example.com"}"#);
        let ep = parse_endpoint(&format!("vmess://{payload}")).unwrap();
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn vmess_tolerates_stripped_padding() {
        let full = STANDARD.encode(r#"{"add":"vm.example.com","port":443}"#);
        let stripped = full.trim_end_matches('=');
        let ep = parse_endpoint(&format!("vmess://{stripped}")).unwrap();
        assert_eq!(ep.host, "vm.example.com");
    }

    #[test]
    fn vmess_garbage_yields_none() {
        assert_eq!(parse_endpoint("vmess://%%%not-base64%%%"), None);
        let not_json = STANDARD.encode("plain text");
        assert_eq!(parse_endpoint(&format!("vmess://{not_json}")), None);
    }

    #[test]
    fn shadowsocks_requires_userinfo() {
        let ep = parse_endpoint("ss://YWVzLTI1Ng@9.9.9.9:8388#tag").unwrap();
        assert_eq!(ep, Endpoint { host: "9.9.9.9".into(), port: 8388 });
        // Legacy fully-encoded form has no `@`.
        assert_eq!(parse_endpoint("ss://YWVzLTI1NjpwYXNz"), None);
    }

    #[test]
    fn unknown_scheme_has_no_endpoint() {
        assert_eq!(parse_endpoint("socks5://1.2.3.4:1080"), None);
    }
}
