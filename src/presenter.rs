//! Text rendering of an inspection report.
//!
//! Sections are printed in a fixed order: Connection, Issuer, Certificate,
//! SANs. Each field is a right-aligned label padded to the given width,
//! followed by `: ` and the value. Fields whose value is empty are left
//! out entirely.

use crate::certificate::{Certificate, SessionState};
use crate::Report;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

/// Width labels are right-aligned to.
pub const LABEL_WIDTH: usize = 20;

/// Renders everything the report holds.
///
/// The Connection block needs session state, the remaining blocks need a
/// certificate; a report with neither renders as an empty string.
pub fn render(report: &Report, width: usize) -> String {
    match (&report.certificate, &report.session) {
        (Some(certificate), session) => render_certificate(certificate, session.as_ref(), width),
        (None, Some(session)) => {
            let mut out = String::new();
            connection_block(&mut out, session, width);
            out
        }
        (None, None) => String::new(),
    }
}

/// Renders a certificate, preceded by the Connection block when `session`
/// is given.
pub fn render_certificate(
    certificate: &Certificate,
    session: Option<&SessionState>,
    width: usize,
) -> String {
    let mut out = String::new();
    if let Some(session) = session {
        connection_block(&mut out, session, width);
    }

    out.push_str("Issuer\n");
    field(&mut out, width, "Subject", &certificate.issuer.to_string());
    field(
        &mut out,
        width,
        "Authority Key ID",
        &hex::encode(&certificate.authority_key_id),
    );

    out.push_str("Certificate\n");
    field(&mut out, width, "Subject", &certificate.subject.to_string());
    field(&mut out, width, "Not before", &timestamp(&certificate.not_before));
    field(&mut out, width, "Not after", &timestamp(&certificate.not_after));
    field(&mut out, width, "Serial number", &hex::encode(&certificate.serial));
    field(
        &mut out,
        width,
        "Subject Key ID",
        &hex::encode(&certificate.subject_key_id),
    );
    field(
        &mut out,
        width,
        "Public key algorithm",
        &certificate.public_key_algorithm.to_string(),
    );

    out.push_str("SANs\n");
    out.push_str("  ");
    out.push_str(&certificate.dns_names.join("\n  "));
    out.push('\n');
    out
}

/// Writes [`render`] output to `out`.
pub fn present<W: Write>(out: &mut W, report: &Report, width: usize) -> io::Result<()> {
    out.write_all(render(report, width).as_bytes())?;
    out.flush()
}

fn connection_block(out: &mut String, session: &SessionState, width: usize) {
    out.push_str("Connection\n");
    field(out, width, "TLS version", &session.protocol.to_string());
    field(out, width, "Cipher suite", &session.cipher_suite);
}

fn field(out: &mut String, width: usize, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str(&format!("{:>width$}: {}\n", label, value, width = width));
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
