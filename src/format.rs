//! Notification rendering.
//!
//! Templates are plain strings with `{type}`, `{server}` and `{status}`
//! placeholders, looked up by scheme with a `default` fallback. Placeholders
//! the template editor invents are left verbatim; rendering never fails.

use crate::extract::parse_endpoint;
use crate::models::{ProbeResult, ProbeStatus, Scheme, TemplateMap};

/// Last-resort template when the map has neither the scheme nor `default`.
pub const FALLBACK_TEMPLATE: &str = "{type} - {server} - {status}";

/// Template key for the generic fallback entry.
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

/// Render the notification text for one share link.
pub fn render(config: &str, probe: &ProbeResult, templates: &TemplateMap) -> String {
    let scheme = Scheme::classify(config);
    let template = templates
        .get(scheme.as_str())
        .or_else(|| templates.get(DEFAULT_TEMPLATE_KEY))
        .map(String::as_str)
        .unwrap_or(FALLBACK_TEMPLATE);

    let server = parse_endpoint(config)
        .map(|ep| ep.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let glyph = match probe.status {
        ProbeStatus::Active => "✅",
        ProbeStatus::DnsOnly => "⚠️",
        ProbeStatus::Dead | ProbeStatus::Error => "❌",
    };

    template
        .replace("{type}", &scheme.as_str().to_uppercase())
        .replace("{server}", &server)
        .replace("{status}", &format!("{glyph} {}", probe.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_probe() -> ProbeResult {
        ProbeResult {
            status: ProbeStatus::Active,
            dns_resolved: true,
            tcp_connected: true,
            latency_ms: 42,
            message: "Online - 42ms".into(),
        }
    }

    #[test]
    fn substitutes_all_three_placeholders() {
        let mut templates = TemplateMap::new();
        templates.insert(
            "vless".into(),
            "Type: {type}\nServer: {server}\nStatus: {status}".into(),
        );

        let text = render("vless://u@1.2.3.4:443", &active_probe(), &templates);
        assert!(text.contains("Type: VLESS"));
        assert!(text.contains("Server: 1.2.3.4:443"));
        assert!(text.contains("Status: ✅ Online - 42ms"));
    }

    #[test]
    fn falls_back_to_default_entry_for_missing_scheme() {
        let mut templates = TemplateMap::new();
        templates.insert(DEFAULT_TEMPLATE_KEY.into(), "generic {type}".into());

        let text = render("trojan://pw@h:443", &active_probe(), &templates);
        assert_eq!(text, "generic TROJAN");
    }

    #[test]
    fn empty_map_uses_builtin_fallback() {
        let text = render("trojan://pw@h:443", &active_probe(), &TemplateMap::new());
        assert_eq!(text, "TROJAN - h:443 - ✅ Online - 42ms");
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let mut templates = TemplateMap::new();
        templates.insert("vless".into(), "{type} {rating} {server}".into());

        let text = render("vless://u@h:443", &active_probe(), &templates);
        assert!(text.contains("{rating}"));
    }

    #[test]
    fn unparsable_server_renders_as_unknown() {
        let probe = ProbeResult::failure("Cannot parse server");
        let text = render("vless://garbage", &probe, &TemplateMap::new());
        assert!(text.contains("Unknown"));
        assert!(text.contains("❌ Cannot parse server"));
    }

    #[test]
    fn dns_only_gets_warning_glyph() {
        let probe = ProbeResult {
            status: ProbeStatus::DnsOnly,
            dns_resolved: true,
            tcp_connected: false,
            latency_ms: -1,
            message: "DNS OK, TCP failed".into(),
        };
        let text = render("trojan://pw@h:443", &probe, &TemplateMap::new());
        assert!(text.contains("⚠️ DNS OK, TCP failed"));
    }
}
