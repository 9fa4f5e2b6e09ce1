//! Error types for TLS inspection.
//!
//! Failures are grouped by the step that produced them: establishing the
//! TLS session ([`HandshakeError`]) or matching the requested hostname
//! against the peer certificate ([`VerificationError`]). [`InspectError`]
//! wraps both so the caller can report which step failed.

use std::io;
use thiserror::Error;

/// Error returned by [`crate::inspect`] and the connector.
#[derive(Debug, Error)]
pub enum InspectError {
    /// Transport or TLS negotiation failed
    #[error("TLS handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// The certificate does not cover the requested hostname
    #[error("hostname verification failed: {0}")]
    HostnameVerification(#[from] VerificationError),
}

impl InspectError {
    /// Short name of the step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::HostnameVerification(_) => "hostname verification",
        }
    }
}

/// Failures while opening the TCP connection or negotiating TLS.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// DNS resolution failed for the dial address
    #[error("could not resolve {address}: {source}")]
    DnsResolution {
        /// The address (host:port) that failed to resolve
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TCP connection failed to every resolved address
    #[error("could not connect to {address}: {source}")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The error from the last address tried
        source: io::Error,
    },

    /// The TLS negotiation itself failed
    #[error("{details}")]
    Negotiation {
        /// Details about why the handshake failed
        details: String,
    },

    /// The handshake completed but the chain is not trusted by the
    /// platform trust store
    #[error("certificate verify failed: {reason}")]
    UntrustedChain {
        /// OpenSSL's verification error string
        reason: String,
    },

    /// The server did not present a certificate
    #[error("server presented no certificate")]
    NoPeerCertificate,

    /// A field of the peer certificate could not be read
    #[error("could not read peer certificate: {reason}")]
    Certificate {
        /// Description of what went wrong
        reason: String,
    },
}

impl From<openssl::error::ErrorStack> for HandshakeError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Negotiation {
            details: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for HandshakeError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::Negotiation {
            details: e.to_string(),
        }
    }
}

/// Hostname verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// No certificate name covers the hostname
    #[error("certificate is valid for {}, not {hostname}", .valid_for.join(", "))]
    Mismatch {
        /// The hostname that was requested
        hostname: String,
        /// Every name the certificate is valid for
        valid_for: Vec<String>,
    },

    /// The certificate carries neither SAN entries nor a common name
    #[error("certificate names no hosts, cannot match {hostname}")]
    NoNames {
        /// The hostname that was requested
        hostname: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_step() {
        let err: InspectError = HandshakeError::Negotiation {
            details: "unexpected eof".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "TLS handshake failed: unexpected eof");
        assert_eq!(err.step(), "handshake");

        let err: InspectError = VerificationError::NoNames {
            hostname: "foo.com".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("hostname verification failed: "));
        assert_eq!(err.step(), "hostname verification");
    }

    #[test]
    fn test_mismatch_lists_names() {
        let err = VerificationError::Mismatch {
            hostname: "foo.com".to_string(),
            valid_for: vec!["bar.com".to_string(), "www.bar.com".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "certificate is valid for bar.com, www.bar.com, not foo.com"
        );
    }

    #[test]
    fn test_interrupted_handshake_is_negotiation_error() {
        use openssl::ssl::{SslConnector, SslMethod};
        use std::net::{TcpListener, TcpStream};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let tcp = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        drop(listener.accept().unwrap());

        let connector = SslConnector::builder(SslMethod::tls()).unwrap().build();
        let err: HandshakeError = connector.connect("localhost", tcp).unwrap_err().into();
        assert!(matches!(err, HandshakeError::Negotiation { .. }));
        assert!(InspectError::from(err).to_string().starts_with("TLS handshake failed: "));
    }

    #[test]
    fn test_connection_refused_keeps_cause() {
        let err = HandshakeError::ConnectionFailed {
            address: "localhost:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "could not connect to localhost:1: Connection refused"
        );
    }
}
