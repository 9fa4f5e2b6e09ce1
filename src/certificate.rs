//! Read-only view of a peer certificate and the negotiated session.
//!
//! These types hold exactly the fields the presenter prints and the
//! hostname matcher needs. They carry no OpenSSL handles, so tests can build
//! them directly.

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use strum_macros::Display;

/// Negotiated protocol version, displayed by its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TlsVersion {
    #[strum(to_string = "SSL 3.0")]
    Ssl3,
    #[strum(to_string = "TLS 1.0")]
    Tls10,
    #[strum(to_string = "TLS 1.1")]
    Tls11,
    #[strum(to_string = "TLS 1.2")]
    Tls12,
    #[strum(to_string = "TLS 1.3")]
    Tls13,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Algorithm of the certificate's subject public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PublicKeyAlgorithm {
    #[strum(to_string = "RSA")]
    Rsa,
    #[strum(to_string = "DSA")]
    Dsa,
    #[strum(to_string = "ECDSA")]
    Ecdsa,
    #[strum(to_string = "Ed25519")]
    Ed25519,
    #[strum(to_string = "Ed448")]
    Ed448,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Session parameters agreed during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub protocol: TlsVersion,
    /// Standard (IANA) cipher suite name, e.g. `TLS_AES_128_GCM_SHA256`
    pub cipher_suite: String,
}

/// Value of one name attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    /// Bytes of a value with no faithful text form, shown as `#hex`
    Raw(Vec<u8>),
}

/// A distinguished name as a sequence of RDNs, each holding one or more
/// `(attribute, value)` pairs, in the order they appear in the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    rdns: Vec<Vec<(String, AttributeValue)>>,
}

impl DistinguishedName {
    /// One single-valued text RDN per entry.
    pub fn new(entries: Vec<(String, String)>) -> Self {
        DistinguishedName {
            rdns: entries
                .into_iter()
                .map(|(attr, value)| vec![(attr, AttributeValue::Text(value))])
                .collect(),
        }
    }

    /// RDNs as they are, multi-valued ones included.
    pub fn from_rdns(rdns: Vec<Vec<(String, AttributeValue)>>) -> Self {
        DistinguishedName { rdns }
    }

    /// The most specific text `CN` attribute, if any.
    pub fn common_name(&self) -> Option<&str> {
        self.rdns
            .iter()
            .rev()
            .flat_map(|rdn| rdn.iter())
            .find_map(|(attr, value)| match value {
                AttributeValue::Text(text) if attr == "CN" => Some(text.as_str()),
                _ => None,
            })
    }
}

impl fmt::Display for DistinguishedName {
    /// RFC 4514 rendering: last RDN first, RDNs separated by `,`, the
    /// attributes of a multi-valued RDN joined by `+`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for (j, (attr, value)) in rdn.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                }
                match value {
                    AttributeValue::Text(text) => write!(f, "{}={}", attr, escape_value(text))?,
                    AttributeValue::Raw(bytes) => write!(f, "{}=#{}", attr, hex::encode(bytes))?,
                }
            }
        }
        Ok(())
    }
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The peer's leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    /// Big-endian magnitude of the serial number
    pub serial: Vec<u8>,
    /// Empty when the extension is absent
    pub subject_key_id: Vec<u8>,
    /// Empty when the extension is absent
    pub authority_key_id: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key_algorithm: PublicKeyAlgorithm,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}
