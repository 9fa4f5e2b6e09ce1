//! TCP + TLS connection to the target and extraction of the peer's leaf
//! certificate and session parameters.

use crate::certificate::{
    AttributeValue, Certificate, DistinguishedName, PublicKeyAlgorithm, SessionState, TlsVersion,
};
use crate::config::Target;
use crate::error::HandshakeError;
use chrono::{DateTime, Utc};
use log::debug;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::pkey::Id;
use openssl::ssl::{SslConnector, SslContextBuilder, SslMethod, SslStream, SslVerifyMode, SslVersion};
use openssl::x509::{X509Ref, X509VerifyResult};
use std::env;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

/// Opens TLS sessions verified against the platform trust store.
#[derive(Debug, Clone)]
pub struct Connector {
    timeout: Duration,
}

impl Connector {
    pub fn new(timeout: Duration) -> Self {
        Connector { timeout }
    }

    /// Connects to `target` and completes the TLS handshake.
    ///
    /// The chain is verified against the platform trust store during the
    /// handshake, but an untrusted chain does not abort it; call
    /// [`Connection::verify_chain`] to read the verdict. SNI is sent for
    /// DNS hostnames.
    pub fn connect(&self, target: &Target) -> Result<Connection, HandshakeError> {
        let address = target.dial_address();
        debug!("resolving {}", address);
        let addresses: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|source| HandshakeError::DnsResolution {
                address: address.clone(),
                source,
            })?
            .collect();
        if addresses.is_empty() {
            return Err(HandshakeError::DnsResolution {
                address,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let tcp_stream = self.open(&address, &addresses)?;

        let mut builder = SslConnector::builder(SslMethod::tls())?;
        load_platform_roots(&mut builder)?;
        builder.set_verify(SslVerifyMode::NONE);
        let connector = builder.build();

        let stream = connector
            .configure()?
            .verify_hostname(false)
            .connect(target.hostname.trim_start_matches('[').trim_end_matches(']'), tcp_stream)?;

        let connection = Connection { address, stream };
        debug!(
            "negotiated {} with {}",
            connection.ssl_version_str(),
            connection.address
        );
        Ok(connection)
    }

    fn open(&self, address: &str, addresses: &[SocketAddr]) -> Result<TcpStream, HandshakeError> {
        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no addresses found");
        for socket_addr in addresses {
            debug!("connecting to {}", socket_addr);
            match TcpStream::connect_timeout(socket_addr, self.timeout) {
                Ok(tcp_stream) => {
                    let timeouts = tcp_stream
                        .set_read_timeout(Some(self.timeout))
                        .and_then(|_| tcp_stream.set_write_timeout(Some(self.timeout)));
                    if let Err(source) = timeouts {
                        return Err(HandshakeError::ConnectionFailed {
                            address: address.to_string(),
                            source,
                        });
                    }
                    return Ok(tcp_stream);
                }
                Err(e) => {
                    debug!("connection to {} failed: {}", socket_addr, e);
                    last_error = e;
                }
            }
        }
        Err(HandshakeError::ConnectionFailed {
            address: address.to_string(),
            source: last_error,
        })
    }
}

/// An established TLS session.
///
/// Dropping the connection sends close_notify and closes the socket; this
/// happens exactly once, on every exit path.
pub struct Connection {
    address: String,
    stream: SslStream<TcpStream>,
}

impl Connection {
    /// Result of verifying the peer's chain against the platform trust store.
    pub fn verify_chain(&self) -> Result<(), HandshakeError> {
        let result = self.stream.ssl().verify_result();
        if result == X509VerifyResult::OK {
            Ok(())
        } else {
            Err(HandshakeError::UntrustedChain {
                reason: result.error_string().to_string(),
            })
        }
    }

    /// Negotiated protocol version and cipher suite.
    pub fn session_state(&self) -> SessionState {
        let ssl = self.stream.ssl();
        let protocol = ssl.version2().map_or(TlsVersion::Unknown, tls_version);
        let cipher_suite = ssl
            .current_cipher()
            .map(|cipher| cipher.standard_name().unwrap_or_else(|| cipher.name()).to_string())
            .unwrap_or_default();
        SessionState {
            protocol,
            cipher_suite,
        }
    }

    /// The leaf certificate, i.e. the first entry of the presented chain.
    pub fn peer_certificate(&self) -> Result<Certificate, HandshakeError> {
        let x509 = self
            .stream
            .ssl()
            .peer_certificate()
            .ok_or(HandshakeError::NoPeerCertificate)?;
        certificate_from_x509(&x509)
    }

    fn ssl_version_str(&self) -> &'static str {
        self.stream.ssl().version_str()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("closing connection to {}", self.address);
        if let Err(e) = self.stream.shutdown() {
            debug!("close_notify to {} failed: {}", self.address, e);
        }
    }
}

/// CA bundle and hash directories of the system OpenSSL installation.
///
/// The vendored OpenSSL looks under its own build prefix, which holds no
/// certificates, so the system locations are discovered with
/// `openssl-probe`. A location already given through `SSL_CERT_FILE` or
/// `SSL_CERT_DIR` takes precedence and suppresses the probed one.
fn platform_roots() -> (Option<PathBuf>, Vec<PathBuf>) {
    let probe = openssl_probe::probe();
    let cert_file = if env::var_os("SSL_CERT_FILE").is_none() {
        probe.cert_file.filter(|path| path.exists())
    } else {
        None
    };
    let cert_dirs = if env::var_os("SSL_CERT_DIR").is_none() {
        probe
            .cert_dir
            .into_iter()
            .filter(|path| path.exists())
            .collect()
    } else {
        Vec::new()
    };
    (cert_file, cert_dirs)
}

fn load_platform_roots(builder: &mut SslContextBuilder) -> Result<(), ErrorStack> {
    let (cert_file, cert_dirs) = platform_roots();
    if let Some(file) = cert_file {
        debug!("loading CA bundle {}", file.display());
        builder.set_ca_file(&file)?;
    }
    for dir in cert_dirs {
        debug!("loading CA directory {}", dir.display());
        builder.load_verify_locations(None, Some(dir.as_path()))?;
    }
    Ok(())
}

fn tls_version(version: SslVersion) -> TlsVersion {
    if version == SslVersion::TLS1_3 {
        TlsVersion::Tls13
    } else if version == SslVersion::TLS1_2 {
        TlsVersion::Tls12
    } else if version == SslVersion::TLS1_1 {
        TlsVersion::Tls11
    } else if version == SslVersion::TLS1 {
        TlsVersion::Tls10
    } else if version == SslVersion::SSL3 {
        TlsVersion::Ssl3
    } else {
        TlsVersion::Unknown
    }
}

fn key_algorithm(id: Id) -> PublicKeyAlgorithm {
    if id == Id::RSA {
        PublicKeyAlgorithm::Rsa
    } else if id == Id::EC {
        PublicKeyAlgorithm::Ecdsa
    } else if id == Id::DSA {
        PublicKeyAlgorithm::Dsa
    } else if id == Id::ED25519 {
        PublicKeyAlgorithm::Ed25519
    } else if id == Id::ED448 {
        PublicKeyAlgorithm::Ed448
    } else {
        PublicKeyAlgorithm::Unknown
    }
}

/// Copies the fields tlsinspect reports out of an OpenSSL certificate.
pub fn certificate_from_x509(cert: &X509Ref) -> Result<Certificate, HandshakeError> {
    let unreadable = |e: ErrorStack| HandshakeError::Certificate {
        reason: e.to_string(),
    };

    let der = cert.to_der().map_err(unreadable)?;
    let (_, parsed) =
        x509_parser::parse_x509_certificate(&der).map_err(|e| HandshakeError::Certificate {
            reason: e.to_string(),
        })?;

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    if let Some(names) = cert.subject_alt_names() {
        for name in names.iter() {
            if let Some(dns) = name.dnsname() {
                dns_names.push(dns.to_string());
            } else if let Some(ip) = name.ipaddress().and_then(ip_from_bytes) {
                ip_addresses.push(ip);
            }
        }
    }

    let public_key_algorithm = cert
        .public_key()
        .map_or(PublicKeyAlgorithm::Unknown, |key| key_algorithm(key.id()));

    Ok(Certificate {
        subject: distinguished_name(parsed.subject()),
        issuer: distinguished_name(parsed.issuer()),
        serial: cert
            .serial_number()
            .to_bn()
            .map_err(unreadable)?
            .to_vec(),
        subject_key_id: cert
            .subject_key_id()
            .map(|id| id.as_slice().to_vec())
            .unwrap_or_default(),
        authority_key_id: cert
            .authority_key_id()
            .map(|id| id.as_slice().to_vec())
            .unwrap_or_default(),
        not_before: to_datetime(cert.not_before())?,
        not_after: to_datetime(cert.not_after())?,
        public_key_algorithm,
        dns_names,
        ip_addresses,
    })
}

fn distinguished_name(name: &X509Name<'_>) -> DistinguishedName {
    let registry = oid_registry();
    DistinguishedName::from_rdns(
        name.iter()
            .map(|rdn| {
                rdn.iter()
                    .map(|attr| {
                        let oid = attr.attr_type();
                        let key = oid2abbrev(oid, registry)
                            .map(str::to_string)
                            .unwrap_or_else(|_| oid.to_id_string());
                        (key, attribute_value(attr))
                    })
                    .collect()
            })
            .collect(),
    )
}

fn attribute_value(attr: &AttributeTypeAndValue<'_>) -> AttributeValue {
    match attr.as_str() {
        Ok(value) => string_value(value.as_bytes()),
        Err(_) => AttributeValue::Raw(attr.attr_value().as_bytes().to_vec()),
    }
}

/// Text of a decoded attribute, kept as raw bytes when it is not valid
/// UTF-8 or holds a NUL.
fn string_value(bytes: &[u8]) -> AttributeValue {
    match std::str::from_utf8(bytes) {
        Ok(value) if !value.contains('\0') => AttributeValue::Text(value.to_string()),
        _ => AttributeValue::Raw(bytes.to_vec()),
    }
}

fn to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>, HandshakeError> {
    let diff = Asn1Time::from_unix(0)
        .and_then(|epoch| epoch.diff(time))
        .map_err(|e| HandshakeError::Certificate {
            reason: e.to_string(),
        })?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    datetime_from_secs(secs)
}

fn datetime_from_secs(secs: i64) -> Result<DateTime<Utc>, HandshakeError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| HandshakeError::Certificate {
        reason: format!("validity timestamp {} is out of range", secs),
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}
