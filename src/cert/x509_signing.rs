//! X.509 certificate signing with SM2.
//!
//! This module turns an [`Sm2Certificate`] template into DER signed by a
//! parent authority's key, and parses signed DER back into the same
//! structure so the result can be inspected and used as a signer.

use crate::cert::extensions::{apply_extensions, build_extensions};
use crate::cert::name::{name_from_rdn_sequence, name_to_rdn_sequence};
use crate::cert::sm2cert::{
    Sm2Certificate, Sm2PublicKeyAlgorithm, Sm2SignatureAlgorithm, OID_EC_PUBLIC_KEY, OID_SM2_CURVE,
};
use crate::crypto::sm2::{public_key_bytes, verify_signature, KeyPair};
use crate::error::{PkiError, Result};
use der::asn1::{Any, BitString, GeneralizedTime, UtcTime};
use der::{Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::time::SystemTime;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::name::Name as X509Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::TbsCertificate;

/// Sign `template` for `public_key`, issued by `parent` with `signer`.
///
/// When `parent` is `template` itself (same subject encoding) the
/// certificate is self-signed. Otherwise the issuer is the parent's subject
/// and the authority key identifier is taken from the parent's subject key
/// identifier.
///
/// Returns the DER encoding together with its parsed form.
///
/// # Example
///
/// ```
/// use gm_testpki::cert::builder::{build_template, Role};
/// use gm_testpki::cert::translate::translate_to_sm2;
/// use gm_testpki::cert::x509_signing::create_certificate;
/// use gm_testpki::crypto::sm2::generate_sm2_keypair;
///
/// # fn example() -> gm_testpki::error::Result<()> {
/// let mut rng = rand::rngs::OsRng;
/// let keypair = generate_sm2_keypair("Org1", &mut rng)?;
/// let template = translate_to_sm2(&build_template("Org1", Role::RootCa, &mut rng)?);
///
/// let (der, cert) = create_certificate("Org1", &template, &template, &keypair.public, &keypair)?;
/// assert!(!der.is_empty());
/// assert!(cert.is_self_issued());
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn create_certificate(
    entity: &str,
    template: &Sm2Certificate,
    parent: &Sm2Certificate,
    public_key: &sm2::PublicKey,
    signer: &KeyPair,
) -> Result<(Vec<u8>, Sm2Certificate)> {
    let signing_err = |reason: String| PkiError::Signing {
        entity: entity.to_string(),
        reason,
    };

    // A parsed parent must belong to the key that signs on its behalf.
    if !parent.raw_subject_public_key_info.is_empty() {
        let parent_key = parent
            .public_key()
            .map_err(|e| signing_err(format!("Unusable parent certificate: {}", e)))?;
        if parent_key != signer.public {
            return Err(signing_err(
                "Signer key does not match the parent certificate".to_string(),
            ));
        }
    }

    let signature_algorithm = AlgorithmIdentifierOwned {
        oid: template
            .signature_algorithm
            .oid()
            .ok_or_else(|| signing_err("Unsupported signature algorithm".to_string()))?,
        parameters: None,
    };

    let subject = name_to_rdn_sequence(&template.subject)
        .map_err(|e| signing_err(format!("Failed to encode subject: {}", e)))?;
    let issuer = issuer_name(parent).map_err(|e| signing_err(format!("Failed to encode issuer: {}", e)))?;

    let subject_der = subject
        .to_der()
        .map_err(|e| signing_err(format!("Failed to encode subject: {}", e)))?;
    let issuer_der = issuer
        .to_der()
        .map_err(|e| signing_err(format!("Failed to encode issuer: {}", e)))?;

    let authority_key_id = if issuer_der != subject_der && !parent.subject_key_id.is_empty() {
        parent.subject_key_id.as_slice()
    } else {
        template.authority_key_id.as_slice()
    };
    let extensions = build_extensions(template, authority_key_id)
        .map_err(|e| signing_err(format!("Failed to encode extensions: {}", e)))?;

    let tbs = TbsCertificate {
        version: match template.version {
            1 => Version::V1,
            2 => Version::V2,
            _ => Version::V3,
        },
        serial_number: serial_number(&template.serial_number)
            .map_err(|e| signing_err(format!("Failed to create serial number: {}", e)))?,
        signature: signature_algorithm.clone(),
        issuer,
        validity: Validity {
            not_before: x509_time(template.not_before)
                .map_err(|e| signing_err(format!("Invalid notBefore: {}", e)))?,
            not_after: x509_time(template.not_after)
                .map_err(|e| signing_err(format!("Invalid notAfter: {}", e)))?,
        },
        subject,
        subject_public_key_info: subject_public_key_info(public_key)
            .map_err(|e| signing_err(format!("Failed to encode public key: {}", e)))?,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };

    let signature = sign_tbs(entity, &tbs, signer)?;

    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    };
    let der = cert
        .to_der()
        .map_err(|e| signing_err(format!("Failed to encode certificate: {}", e)))?;

    let parsed = parse_certificate(entity, &der)?;
    Ok((der, parsed))
}

/// Parse a DER certificate into an [`Sm2Certificate`].
pub fn parse_certificate(entity: &str, der: &[u8]) -> Result<Sm2Certificate> {
    let parse_err = |reason: String| PkiError::CertificateParse {
        entity: entity.to_string(),
        reason,
    };

    let cert = Certificate::from_der(der)
        .map_err(|e| parse_err(format!("Failed to decode certificate: {}", e)))?;
    let tbs = &cert.tbs_certificate;

    let mut parsed = Sm2Certificate {
        raw: der.to_vec(),
        raw_tbs_certificate: reencode(entity, tbs, "TBS certificate")?,
        raw_subject_public_key_info: reencode(entity, &tbs.subject_public_key_info, "public key info")?,
        raw_subject: reencode(entity, &tbs.subject, "subject")?,
        raw_issuer: reencode(entity, &tbs.issuer, "issuer")?,
        signature: cert.signature.raw_bytes().to_vec(),
        signature_algorithm: Sm2SignatureAlgorithm::from_oid(&cert.signature_algorithm.oid),
        public_key_algorithm: Sm2PublicKeyAlgorithm::from_oid(
            &tbs.subject_public_key_info.algorithm.oid,
        ),
        version: match tbs.version {
            Version::V1 => 1,
            Version::V2 => 2,
            Version::V3 => 3,
        },
        serial_number: serial_magnitude(tbs.serial_number.as_bytes()),
        issuer: name_from_rdn_sequence(&tbs.issuer),
        subject: name_from_rdn_sequence(&tbs.subject),
        not_before: tbs.validity.not_before.to_system_time(),
        not_after: tbs.validity.not_after.to_system_time(),
        ..Sm2Certificate::default()
    };

    if let Some(extensions) = &tbs.extensions {
        apply_extensions(&mut parsed, extensions)
            .map_err(|e| parse_err(format!("Failed to decode extensions: {}", e)))?;
    }

    Ok(parsed)
}

/// Check that `child` carries a valid signature by `parent`'s key.
///
/// Errors are reported against the child's common name.
pub fn verify_signed_by(child: &Sm2Certificate, parent: &Sm2Certificate) -> Result<()> {
    let entity = child.subject.common_name.as_str();
    let public_key = parent.public_key().map_err(|e| PkiError::CertificateParse {
        entity: entity.to_string(),
        reason: format!("Unusable issuer certificate: {}", e),
    })?;
    verify_signature(entity, &public_key, &child.raw_tbs_certificate, &child.signature)
}

/// Encode certificate DER as PEM.
pub fn cert_to_pem(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()))
}

/// Load a certificate from PEM format.
pub fn cert_from_pem(entity: &str, pem_str: &str) -> Result<Sm2Certificate> {
    let pem = pem::parse(pem_str)
        .map_err(|e| PkiError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != "CERTIFICATE" {
        return Err(PkiError::PemError(format!(
            "Expected CERTIFICATE, got {}",
            pem.tag()
        )));
    }

    parse_certificate(entity, pem.contents())
}

// Helper functions

fn reencode<T: Encode>(entity: &str, value: &T, what: &str) -> Result<Vec<u8>> {
    value.to_der().map_err(|e| PkiError::CertificateParse {
        entity: entity.to_string(),
        reason: format!("Failed to re-encode {}: {}", what, e),
    })
}

fn issuer_name(parent: &Sm2Certificate) -> der::Result<X509Name> {
    if parent.raw_subject.is_empty() {
        name_to_rdn_sequence(&parent.subject)
    } else {
        X509Name::from_der(&parent.raw_subject)
    }
}

// INTEGER content must stay positive.
fn serial_number(magnitude: &[u8]) -> der::Result<SerialNumber> {
    let magnitude = serial_magnitude(magnitude);
    if magnitude[0] & 0x80 != 0 {
        let mut bytes = Vec::with_capacity(magnitude.len() + 1);
        bytes.push(0);
        bytes.extend_from_slice(&magnitude);
        SerialNumber::new(&bytes)
    } else {
        SerialNumber::new(&magnitude)
    }
}

fn serial_magnitude(bytes: &[u8]) -> Vec<u8> {
    match bytes.iter().position(|b| *b != 0) {
        Some(first) => bytes[first..].to_vec(),
        None => vec![0],
    }
}

// UTCTime through 2049, GeneralizedTime afterwards.
fn x509_time(time: SystemTime) -> der::Result<Time> {
    match UtcTime::from_system_time(time) {
        Ok(utc) => Ok(Time::UtcTime(utc)),
        Err(_) => Ok(Time::GeneralTime(GeneralizedTime::from_system_time(time)?)),
    }
}

fn subject_public_key_info(public_key: &sm2::PublicKey) -> der::Result<SubjectPublicKeyInfoOwned> {
    Ok(SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: OID_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&OID_SM2_CURVE)?),
        },
        subject_public_key: BitString::from_bytes(&public_key_bytes(public_key))?,
    })
}

fn sign_tbs(entity: &str, tbs: &TbsCertificate, signer: &KeyPair) -> Result<BitString> {
    let tbs_der = tbs.to_der().map_err(|e| PkiError::Signing {
        entity: entity.to_string(),
        reason: format!("Failed to encode TBS: {}", e),
    })?;

    let signature = signer.sign(entity, &tbs_der)?;

    BitString::from_bytes(&signature).map_err(|e| PkiError::Signing {
        entity: entity.to_string(),
        reason: format!("Failed to create signature bitstring: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::{build_template, Role, CA_SUBJECT_KEY_ID};
    use crate::cert::sm2cert::{Sm2ExtKeyUsage, Sm2KeyUsage};
    use crate::cert::translate::translate_to_sm2;
    use crate::crypto::sm2::generate_sm2_keypair;
    use rand::rngs::OsRng;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::{Duration, UNIX_EPOCH};

    fn root(name: &str) -> (KeyPair, Sm2Certificate) {
        let keypair = generate_sm2_keypair(name, &mut OsRng).unwrap();
        let template = translate_to_sm2(&build_template(name, Role::RootCa, &mut OsRng).unwrap());
        let (_, cert) =
            create_certificate(name, &template, &template, &keypair.public, &keypair).unwrap();
        (keypair, cert)
    }

    fn issue(
        name: &str,
        role: Role,
        parent: &Sm2Certificate,
        signer: &KeyPair,
    ) -> (KeyPair, Sm2Certificate) {
        let keypair = generate_sm2_keypair(name, &mut OsRng).unwrap();
        let template = translate_to_sm2(&build_template(name, role, &mut OsRng).unwrap());
        let (_, cert) =
            create_certificate(name, &template, parent, &keypair.public, signer).unwrap();
        (keypair, cert)
    }

    #[test]
    fn test_create_self_signed_ca() {
        let (keypair, cert) = root("Org1");

        assert!(cert.is_self_issued());
        assert_eq!(cert.subject.common_name, "Org1");
        assert_eq!(cert.issuer, cert.subject);
        assert!(cert.is_ca);
        assert!(cert.basic_constraints_valid);
        assert_eq!(cert.subject_key_id, CA_SUBJECT_KEY_ID.to_vec());
        assert!(cert.authority_key_id.is_empty());
        assert_eq!(cert.ext_key_usage, vec![Sm2ExtKeyUsage::Any]);
        assert_eq!(cert.signature_algorithm, Sm2SignatureAlgorithm::Sm2WithSm3);
        assert_eq!(cert.public_key_algorithm, Sm2PublicKeyAlgorithm::Ecdsa);
        assert_eq!(cert.version, 3);
        assert_eq!(cert.public_key().unwrap(), keypair.public);

        verify_signed_by(&cert, &cert).unwrap();
    }

    #[test]
    fn test_sign_intermediate_ca() {
        let (root_key, root_cert) = root("Org1");
        let (_, inter) = issue("Org1-child1", Role::IntermediateCa, &root_cert, &root_key);

        assert_eq!(inter.raw_issuer, root_cert.raw_subject);
        assert_eq!(inter.issuer.common_name, "Org1");
        assert_eq!(inter.authority_key_id, root_cert.subject_key_id);
        assert!(!inter.is_self_issued());

        verify_signed_by(&inter, &root_cert).unwrap();
    }

    #[test]
    fn test_server_certificate_fields() {
        let (root_key, root_cert) = root("Org1");
        let (_, server) = issue("Org1-server1", Role::Server, &root_cert, &root_key);

        assert_eq!(server.subject.common_name, "localhost");
        assert_eq!(server.subject.organization, vec!["Org1-server1"]);
        assert!(!server.is_ca);
        assert_eq!(
            server.ext_key_usage,
            vec![Sm2ExtKeyUsage::ServerAuth, Sm2ExtKeyUsage::ClientAuth]
        );
        assert_eq!(server.dns_names, vec!["localhost"]);
        assert_eq!(
            server.ip_addresses,
            vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))]
        );
        assert_eq!(server.key_usage, Sm2KeyUsage::from_bits(0b101));

        verify_signed_by(&server, &root_cert).unwrap();
    }

    #[test]
    fn test_complete_signing_chain() {
        let (root_key, root_cert) = root("Org1");
        let (inter_key, inter) = issue("Org1-child1", Role::IntermediateCa, &root_cert, &root_key);
        let (_, client) = issue("Org1-child1-client1", Role::Client, &inter, &inter_key);

        assert_eq!(client.raw_issuer, inter.raw_subject);
        verify_signed_by(&client, &inter).unwrap();
        assert!(verify_signed_by(&client, &root_cert).is_err());
    }

    #[test]
    fn test_mismatched_signer_is_rejected() {
        let (_, root_cert) = root("Org1");
        let stranger = generate_sm2_keypair("stranger", &mut OsRng).unwrap();
        let template =
            translate_to_sm2(&build_template("Org1-client1", Role::Client, &mut OsRng).unwrap());

        let result =
            create_certificate("Org1-client1", &template, &root_cert, &stranger.public, &stranger);
        assert!(matches!(result, Err(PkiError::Signing { .. })));
    }

    #[test]
    fn test_broken_parent_is_reported_against_child() {
        let (root_key, root_cert) = root("Org1");
        let (_, client) = issue("Org1-client1", Role::Client, &root_cert, &root_key);

        let mut broken = root_cert.clone();
        broken.raw_subject_public_key_info = vec![0x30, 0x00];
        let template =
            translate_to_sm2(&build_template("Org1-client2", Role::Client, &mut OsRng).unwrap());

        let result =
            create_certificate("Org1-client2", &template, &broken, &root_key.public, &root_key);
        match result {
            Err(PkiError::Signing { entity, .. }) => assert_eq!(entity, "Org1-client2"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        match verify_signed_by(&client, &broken) {
            Err(PkiError::CertificateParse { entity, .. }) => assert_eq!(entity, "Org1-client1"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_signature_algorithm_is_rejected() {
        let keypair = generate_sm2_keypair("Org1", &mut OsRng).unwrap();
        let mut template =
            translate_to_sm2(&build_template("Org1", Role::RootCa, &mut OsRng).unwrap());
        template.signature_algorithm = Sm2SignatureAlgorithm::Unknown;

        let result = create_certificate("Org1", &template, &template, &keypair.public, &keypair);
        assert!(matches!(result, Err(PkiError::Signing { .. })));
    }

    #[test]
    fn test_validity_survives_encoding() {
        let (_, cert) = root("Org1");
        let window = cert.not_after.duration_since(cert.not_before).unwrap();
        assert_eq!(window, Duration::from_secs(3650 * 86400));
    }

    #[test]
    fn test_generalized_time_after_2049() {
        let late = UNIX_EPOCH + Duration::from_secs(2_600_000_000);
        assert!(matches!(x509_time(late).unwrap(), Time::GeneralTime(_)));

        let early = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert!(matches!(x509_time(early).unwrap(), Time::UtcTime(_)));
    }

    #[test]
    fn test_serial_number_high_bit() {
        let serial = serial_number(&[0x80, 0x01]).unwrap();
        assert_eq!(serial.as_bytes(), &[0x00, 0x80, 0x01]);
        assert_eq!(serial_magnitude(serial.as_bytes()), vec![0x80, 0x01]);
    }

    #[test]
    fn test_serial_number_preserved() {
        let keypair = generate_sm2_keypair("Org1", &mut OsRng).unwrap();
        let mut template =
            translate_to_sm2(&build_template("Org1", Role::RootCa, &mut OsRng).unwrap());
        template.serial_number = vec![0xff; 16];

        let (_, cert) =
            create_certificate("Org1", &template, &template, &keypair.public, &keypair).unwrap();
        assert_eq!(cert.serial_number, vec![0xff; 16]);
    }

    #[test]
    fn test_cert_pem_roundtrip() {
        let (_, cert) = root("Org1");
        let pem = cert_to_pem(&cert.raw);
        assert!(pem.contains("BEGIN CERTIFICATE"));

        let loaded = cert_from_pem("Org1", &pem).unwrap();
        assert_eq!(loaded, cert);
    }

    #[test]
    fn test_cert_from_pem_wrong_tag() {
        let pem = pem::encode(&pem::Pem::new("EC PRIVATE KEY", vec![1, 2, 3]));
        assert!(matches!(
            cert_from_pem("Org1", &pem),
            Err(PkiError::PemError(_))
        ));
    }

    #[test]
    fn test_parse_garbage() {
        let result = parse_certificate("junk", &[0x30, 0x03, 0x02, 0x01]);
        match result {
            Err(PkiError::CertificateParse { entity, .. }) => assert_eq!(entity, "junk"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
