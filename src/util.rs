//! Utility helpers used at startup.
//!
//! This module contains:
//! - Local host name resolution (`{fqdn}`)
//! - Metric prefix templating
//!
//! Nothing here runs inside the collection loop.

use std::net::IpAddr;

use log::{debug, warn};

/// Placeholder replaced by the local fully-qualified domain name.
pub const FQDN_PLACEHOLDER: &str = "{fqdn}";

/// Resolves the fully-qualified name of this host.
///
/// Strategy:
/// - Take the kernel host name
/// - If it is not already dotted, reverse-resolve each of its addresses
///   and keep the first dotted name
/// - Fall back to the bare host name, then to "localhost"
///
/// Never fails: a missing FQDN only makes metric names less specific.
pub fn resolve_fqdn() -> String {
    let host = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("failed to read host name: {e}");
            return "localhost".to_string();
        }
    };

    if host.contains('.') {
        return host;
    }

    let addrs: Vec<IpAddr> = match dns_lookup::lookup_host(&host) {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("cannot resolve {host}: {e}");
            return host;
        }
    };

    addrs
        .iter()
        .filter_map(|ip| dns_lookup::lookup_addr(ip).ok())
        .find(|name| name.contains('.'))
        .unwrap_or(host)
}

/// Substitutes `{fqdn}` in the prefix template.
///
/// Dots in the host name are kept, so `db1.example.com` becomes three
/// levels of the metric tree, which is what Graphite users expect.
///
/// Examples:
/// - ("{fqdn}.mongo.", "db1.example.com") -> "db1.example.com.mongo."
/// - ("static.", "db1")                   -> "static."
pub fn render_prefix(template: &str, fqdn: &str) -> String {
    template.replace(FQDN_PLACEHOLDER, fqdn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_template_substitutes_fqdn() {
        assert_eq!(
            render_prefix("{fqdn}.mongo.", "db1.example.com"),
            "db1.example.com.mongo."
        );
        assert_eq!(render_prefix("static.", "db1"), "static.");
        assert_eq!(render_prefix("{fqdn}.{fqdn}.", "h"), "h.h.");
    }

    #[test]
    fn fqdn_is_never_empty() {
        assert!(!resolve_fqdn().is_empty());
    }
}
