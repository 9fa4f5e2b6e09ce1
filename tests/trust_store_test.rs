//! A server whose chain leads to a CA in the configured trust bundle must be
//! reported without warnings.
//!
//! Lives in its own test binary because it points `SSL_CERT_FILE` at a
//! temporary bundle for the whole process.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Name, X509NameBuilder, X509Ref, X509};
use std::fs;
use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use tlsinspect::{inspect, Config, FailurePolicy, Target};

fn key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    name.build()
}

fn certificate_authority() -> (PKey<Private>, X509) {
    let key = key();
    let name = name("tlsinspect test CA");

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let skid = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(skid).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

fn leaf(ca_key: &PKey<Private>, ca: &X509Ref) -> (PKey<Private>, X509) {
    let key = key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(2).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name("localhost")).unwrap();
    builder.set_issuer_name(ca.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(Some(ca), None))
        .unwrap();
    builder.append_extension(san).unwrap();
    let akid = AuthorityKeyIdentifier::new()
        .keyid(true)
        .build(&builder.x509v3_context(Some(ca), None))
        .unwrap();
    builder.append_extension(akid).unwrap();
    builder.sign(ca_key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

#[test]
fn test_trusted_chain_has_no_warnings() {
    let (ca_key, ca) = certificate_authority();
    let (key, cert) = leaf(&ca_key, &ca);

    let bundle = std::env::temp_dir().join(format!("tlsinspect-ca-{}.pem", std::process::id()));
    fs::write(&bundle, ca.to_pem().unwrap()).unwrap();
    std::env::set_var("SSL_CERT_FILE", &bundle);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.set_num_tickets(0).unwrap();
    let acceptor = acceptor.build();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let mut tls = acceptor.accept(stream).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(tls.read(&mut buf).unwrap(), 0);
    });

    let config = Config::new(Target::new("127.0.0.1", Some(port.to_string())))
        .with_policy(FailurePolicy::Fatal)
        .with_timeout(Duration::from_secs(10));
    let result = inspect(&config);
    server.join().unwrap();
    fs::remove_file(&bundle).unwrap();

    let report = result.unwrap();
    assert!(report.warnings.is_empty());

    let certificate = report.certificate.unwrap();
    assert_eq!(certificate.subject.to_string(), "CN=localhost");
    assert_eq!(certificate.issuer.to_string(), "CN=tlsinspect test CA");
    assert!(!certificate.authority_key_id.is_empty());
}
