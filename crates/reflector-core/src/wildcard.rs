//! Wildcard-subdomain formatting for reflected addresses
//!
//! Services like sslip.io and nip.io resolve `<dashed-ip>.<base>` back
//! to the embedded address; this consumes the reflector's output to
//! build such names.

use std::net::IpAddr;

/// Format `ip` as a wildcard DNS subdomain of `base_domain`
///
/// Dots (v4) and colons (v6) become dashes, so the label stays a valid
/// DNS label: `203.0.113.7` + `sslip.io` gives `203-0-113-7.sslip.io`.
pub fn wildcard_subdomain(ip: IpAddr, base_domain: &str) -> String {
    let label = match ip {
        IpAddr::V4(v4) => v4.to_string().replace('.', "-"),
        IpAddr::V6(v6) => v6.to_string().replace(':', "-"),
    };
    format!("{}.{}", label, base_domain.trim_matches('.'))
}
