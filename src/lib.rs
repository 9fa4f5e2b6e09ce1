//! # tlsinspect
//!
//! Connects to a TLS server, checks that its certificate covers the requested
//! hostname, and reports the leaf certificate together with the negotiated
//! protocol version and cipher suite.
//!
//! ```no_run
//! use tlsinspect::{inspect, presenter, Config, Target};
//!
//! let config = Config::new(Target::new("example.com", None));
//! let report = inspect(&config)?;
//! print!("{}", presenter::render(&report, config.label_width));
//! # Ok::<(), tlsinspect::InspectError>(())
//! ```

pub mod certificate;
pub mod config;
pub mod connector;
pub mod error;
pub mod hostname;
pub mod presenter;

use log::{debug, warn};

pub use certificate::{
    AttributeValue, Certificate, DistinguishedName, PublicKeyAlgorithm, SessionState, TlsVersion,
};
pub use config::{Config, ConfigError, FailurePolicy, Target, DEFAULT_PORT};
pub use connector::{Connection, Connector};
pub use error::{HandshakeError, InspectError, VerificationError};
pub use hostname::verify_hostname;
pub use presenter::LABEL_WIDTH;

/// What one inspection run obtained.
///
/// Under [`FailurePolicy::Advisory`] the report may be partial; the
/// tolerated failures are kept in `warnings`, in the order they happened.
#[derive(Debug, Default)]
pub struct Report {
    pub session: Option<SessionState>,
    pub certificate: Option<Certificate>,
    pub warnings: Vec<InspectError>,
}

impl FailurePolicy {
    fn handle(self, err: InspectError, report: &mut Report) -> Result<(), InspectError> {
        match self {
            FailurePolicy::Fatal => Err(err),
            FailurePolicy::Advisory => {
                warn!("{}", err);
                report.warnings.push(err);
                Ok(())
            }
        }
    }
}

/// Performs a single connection to `config.target` and collects the
/// session state and leaf certificate.
///
/// Handshake failures (including an untrusted chain) and hostname
/// verification failures are handled according to `config.policy`. The
/// connection is closed before this function returns, whichever path is
/// taken.
pub fn inspect(config: &Config) -> Result<Report, InspectError> {
    let policy = config.policy;
    let mut report = Report::default();
    debug!("inspecting {} ({} policy)", config.target.dial_address(), policy);

    let connection = match Connector::new(config.timeout).connect(&config.target) {
        Ok(connection) => connection,
        Err(err) => {
            policy.handle(err.into(), &mut report)?;
            return Ok(report);
        }
    };

    if let Err(err) = connection.verify_chain() {
        policy.handle(err.into(), &mut report)?;
    }
    report.session = Some(connection.session_state());

    let certificate = match connection.peer_certificate() {
        Ok(certificate) => certificate,
        Err(err) => {
            policy.handle(err.into(), &mut report)?;
            return Ok(report);
        }
    };

    if let Err(err) = verify_hostname(&config.target.hostname, &certificate) {
        policy.handle(err.into(), &mut report)?;
    }
    report.certificate = Some(certificate);

    Ok(report)
}
