//! Hostname matching against a certificate's names.

use crate::certificate::Certificate;
use crate::error::VerificationError;
use std::net::IpAddr;

/// Checks that `hostname` is covered by `certificate`.
///
/// DNS names are compared case-insensitively with one trailing dot ignored.
/// A `*` is honoured only as the whole left-most label and stands for
/// exactly one label. IP literals only match IP address SANs. The subject
/// common name is consulted only when the certificate has no SAN entries.
pub fn verify_hostname(hostname: &str, certificate: &Certificate) -> Result<(), VerificationError> {
    let host = hostname.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        if certificate.ip_addresses.contains(&ip) {
            return Ok(());
        }
        return Err(mismatch(hostname, certificate));
    }

    let has_sans = !certificate.dns_names.is_empty() || !certificate.ip_addresses.is_empty();
    let matched = if has_sans {
        certificate
            .dns_names
            .iter()
            .any(|pattern| matches_dns_name(pattern, host))
    } else {
        certificate
            .subject
            .common_name()
            .map_or(false, |cn| matches_dns_name(cn, host))
    };

    if matched {
        Ok(())
    } else {
        Err(mismatch(hostname, certificate))
    }
}

fn mismatch(hostname: &str, certificate: &Certificate) -> VerificationError {
    let mut valid_for: Vec<String> = certificate.dns_names.clone();
    valid_for.extend(certificate.ip_addresses.iter().map(IpAddr::to_string));
    if valid_for.is_empty() {
        if let Some(cn) = certificate.subject.common_name() {
            valid_for.push(cn.to_string());
        }
    }

    if valid_for.is_empty() {
        VerificationError::NoNames {
            hostname: hostname.to_string(),
        }
    } else {
        VerificationError::Mismatch {
            hostname: hostname.to_string(),
            valid_for,
        }
    }
}

/// Matches one certificate DNS name (possibly a wildcard) against a host.
pub fn matches_dns_name(pattern: &str, host: &str) -> bool {
    let pattern = normalize(pattern);
    let host = normalize(host);
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let pattern_labels: Vec<&str> = pattern.split('.').collect();
    let host_labels: Vec<&str> = host.split('.').collect();
    if pattern_labels.len() != host_labels.len() || host_labels.iter().any(|l| l.is_empty()) {
        return false;
    }

    pattern_labels
        .iter()
        .zip(host_labels.iter())
        .enumerate()
        .all(|(i, (p, h))| {
            // wildcard needs at least two fixed labels after it
            if i == 0 && *p == "*" {
                pattern_labels.len() > 2
            } else {
                p == h
            }
        })
}

fn normalize(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}
