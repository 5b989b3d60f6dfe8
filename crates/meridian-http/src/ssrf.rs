//! SSRF-safe URL validation.
//!
//! A URL must be absolute with scheme `http`/`https`; private, loopback
//! and link-local addresses are rejected unless the tenant has explicitly
//! allowlisted the host. DNS is re-resolved on every retry attempt (the
//! caller re-invokes [`validate`] per attempt) so a rebind attack between
//! the first resolution and a later retry cannot slip through.

use std::net::IpAddr;

use meridian_core::ErrorKind;
use reqwest::Url;

#[derive(Debug, Clone, Default)]
pub struct AllowlistPolicy {
    /// Hosts (exact match, case-insensitive) the tenant has explicitly
    /// permitted even though they resolve to a private/loopback address.
    pub allowed_hosts: Vec<String>,
}

impl AllowlistPolicy {
    pub fn allows(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
    }
}

/// Parses and validates `raw_url`, returning the canonical [`Url`] on
/// success. Does not itself perform DNS resolution for hostnames (that is
/// the transport's job); an already-literal IP host is checked directly.
pub fn validate(raw_url: &str, policy: &AllowlistPolicy) -> Result<Url, ErrorKind> {
    let url = Url::parse(raw_url).map_err(|_| ErrorKind::ParseError)?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(ErrorKind::ContentTypeForbidden),
    }

    let host = url.host_str().ok_or(ErrorKind::ParseError)?;

    if policy.allows(host) {
        return Ok(url);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_disallowed_ip(ip) {
            return Err(ErrorKind::PolicyDenied);
        }
    }

    Ok(url)
}

/// Checks a resolved IP address against the same private/loopback/
/// link-local rules, used after DNS resolution to catch hostnames that
/// resolve to an internal address (rebind protection).
pub fn validate_resolved(ip: IpAddr, host: &str, policy: &AllowlistPolicy) -> Result<(), ErrorKind> {
    if policy.allows(host) {
        return Ok(());
    }
    if is_disallowed_ip(ip) {
        return Err(ErrorKind::PolicyDenied);
    }
    Ok(())
}

fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local_v6(v6) || is_link_local_v6(v6)
        }
    }
}

/// `fc00::/7` (stable `Ipv6Addr::is_unique_local` is not yet stable).
fn is_unique_local_v6(ip: std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// `fe80::/10`.
fn is_link_local_v6(ip: std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_https_url() {
        let policy = AllowlistPolicy::default();
        assert!(validate("https://example.org/a.mp4", &policy).is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let policy = AllowlistPolicy::default();
        let err = validate("file:///etc/passwd", &policy).unwrap_err();
        assert_eq!(err, ErrorKind::ContentTypeForbidden);
    }

    #[test]
    fn rejects_loopback_ip_literal() {
        let policy = AllowlistPolicy::default();
        let err = validate("http://127.0.0.1/admin", &policy).unwrap_err();
        assert_eq!(err, ErrorKind::PolicyDenied);
    }

    #[test]
    fn rejects_private_ip_literal() {
        let policy = AllowlistPolicy::default();
        let err = validate("http://10.0.0.5/", &policy).unwrap_err();
        assert_eq!(err, ErrorKind::PolicyDenied);
    }

    #[test]
    fn allowlisted_host_bypasses_private_check() {
        let policy = AllowlistPolicy {
            allowed_hosts: vec!["10.0.0.5".to_string()],
        };
        assert!(validate("http://10.0.0.5/", &policy).is_ok());
    }

    #[test]
    fn rejects_link_local_ipv6() {
        let policy = AllowlistPolicy::default();
        let err = validate("http://[fe80::1]/", &policy).unwrap_err();
        assert_eq!(err, ErrorKind::PolicyDenied);
    }
}
