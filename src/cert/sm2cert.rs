//! SM2 certificate representation.
//!
//! The structure the issuer signs and the parser produces. It carries the
//! same fields as [`CertificateTemplate`](crate::cert::template::CertificateTemplate)
//! but with SM2-specific key usage, EKU and algorithm types.

use crate::cert::template::{Name, RawExtension};
use crate::error::{PkiError, Result};
use const_oid::db::rfc5280;
use const_oid::ObjectIdentifier;
use der::Decode;
use spki::SubjectPublicKeyInfoRef;
use std::net::IpAddr;
use std::time::SystemTime;

/// SM2 public key curve, `sm2p256v1`.
pub const OID_SM2_CURVE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");
/// SM2 signature over an SM3 digest.
pub const OID_SM2_WITH_SM3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.501");
/// SM2 signature over a SHA-1 digest.
pub const OID_SM2_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.502");
/// SM2 signature over a SHA-256 digest.
pub const OID_SM2_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.156.10197.1.503");
/// `id-ecPublicKey`, used for SM2 subject keys.
pub const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Key usage mask for SM2 certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Sm2KeyUsage(u16);

impl Sm2KeyUsage {
    /// Number of named bits in the KeyUsage BIT STRING.
    pub const NAMED_BITS: u8 = 9;

    pub const fn from_bits(bits: u16) -> Self {
        Sm2KeyUsage(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether named bit `n` (0 = digitalSignature) is set.
    pub fn has_bit(self, n: u8) -> bool {
        n < Self::NAMED_BITS && self.0 & (1 << n) != 0
    }
}

/// Extended key usage purposes for SM2 certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sm2ExtKeyUsage {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
}

impl Sm2ExtKeyUsage {
    const TABLE: [(Sm2ExtKeyUsage, ObjectIdentifier); 14] = [
        (Sm2ExtKeyUsage::Any, rfc5280::ANY_EXTENDED_KEY_USAGE),
        (Sm2ExtKeyUsage::ServerAuth, rfc5280::ID_KP_SERVER_AUTH),
        (Sm2ExtKeyUsage::ClientAuth, rfc5280::ID_KP_CLIENT_AUTH),
        (Sm2ExtKeyUsage::CodeSigning, rfc5280::ID_KP_CODE_SIGNING),
        (Sm2ExtKeyUsage::EmailProtection, rfc5280::ID_KP_EMAIL_PROTECTION),
        (
            Sm2ExtKeyUsage::IpsecEndSystem,
            ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5"),
        ),
        (
            Sm2ExtKeyUsage::IpsecTunnel,
            ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6"),
        ),
        (
            Sm2ExtKeyUsage::IpsecUser,
            ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7"),
        ),
        (Sm2ExtKeyUsage::TimeStamping, rfc5280::ID_KP_TIME_STAMPING),
        (Sm2ExtKeyUsage::OcspSigning, rfc5280::ID_KP_OCSP_SIGNING),
        (
            Sm2ExtKeyUsage::MicrosoftServerGatedCrypto,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3"),
        ),
        (
            Sm2ExtKeyUsage::NetscapeServerGatedCrypto,
            ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1"),
        ),
        (
            Sm2ExtKeyUsage::MicrosoftCommercialCodeSigning,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.22"),
        ),
        (
            Sm2ExtKeyUsage::MicrosoftKernelCodeSigning,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.61.1.1"),
        ),
    ];

    pub fn oid(self) -> ObjectIdentifier {
        Self::TABLE
            .iter()
            .find(|(usage, _)| *usage == self)
            .map(|(_, oid)| *oid)
            .unwrap_or(rfc5280::ANY_EXTENDED_KEY_USAGE)
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, known)| known == oid)
            .map(|(usage, _)| *usage)
    }
}

/// Signature algorithms for SM2 certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Sm2SignatureAlgorithm {
    #[default]
    Unknown,
    Sm2WithSm3,
    Sm2WithSha1,
    Sm2WithSha256,
}

impl Sm2SignatureAlgorithm {
    pub fn oid(self) -> Option<ObjectIdentifier> {
        match self {
            Sm2SignatureAlgorithm::Unknown => None,
            Sm2SignatureAlgorithm::Sm2WithSm3 => Some(OID_SM2_WITH_SM3),
            Sm2SignatureAlgorithm::Sm2WithSha1 => Some(OID_SM2_WITH_SHA1),
            Sm2SignatureAlgorithm::Sm2WithSha256 => Some(OID_SM2_WITH_SHA256),
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Self {
        match *oid {
            OID_SM2_WITH_SM3 => Sm2SignatureAlgorithm::Sm2WithSm3,
            OID_SM2_WITH_SHA1 => Sm2SignatureAlgorithm::Sm2WithSha1,
            OID_SM2_WITH_SHA256 => Sm2SignatureAlgorithm::Sm2WithSha256,
            _ => Sm2SignatureAlgorithm::Unknown,
        }
    }
}

/// Public key algorithms for SM2 certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Sm2PublicKeyAlgorithm {
    #[default]
    Unknown,
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
}

impl Sm2PublicKeyAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Self {
        match *oid {
            OID_RSA_ENCRYPTION => Sm2PublicKeyAlgorithm::Rsa,
            OID_DSA => Sm2PublicKeyAlgorithm::Dsa,
            OID_EC_PUBLIC_KEY => Sm2PublicKeyAlgorithm::Ecdsa,
            OID_ED25519 => Sm2PublicKeyAlgorithm::Ed25519,
            _ => Sm2PublicKeyAlgorithm::Unknown,
        }
    }
}

/// A certificate (or unsigned template) in SM2 form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm2Certificate {
    pub raw: Vec<u8>,
    pub raw_tbs_certificate: Vec<u8>,
    pub raw_subject_public_key_info: Vec<u8>,
    pub raw_subject: Vec<u8>,
    pub raw_issuer: Vec<u8>,

    pub signature: Vec<u8>,
    pub signature_algorithm: Sm2SignatureAlgorithm,
    pub public_key_algorithm: Sm2PublicKeyAlgorithm,

    pub version: u8,
    pub serial_number: Vec<u8>,
    pub issuer: Name,
    pub subject: Name,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub key_usage: Sm2KeyUsage,

    pub extensions: Vec<RawExtension>,
    pub extra_extensions: Vec<RawExtension>,
    pub unhandled_critical_extensions: Vec<ObjectIdentifier>,

    pub ext_key_usage: Vec<Sm2ExtKeyUsage>,
    pub unknown_ext_key_usage: Vec<ObjectIdentifier>,

    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    pub max_path_len: Option<u8>,

    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,

    pub ocsp_server: Vec<String>,
    pub issuing_certificate_url: Vec<String>,

    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,

    pub permitted_dns_domains_critical: bool,
    pub permitted_dns_domains: Vec<String>,
    pub excluded_dns_domains: Vec<String>,

    pub crl_distribution_points: Vec<String>,
    pub policy_identifiers: Vec<ObjectIdentifier>,
}

impl Default for Sm2Certificate {
    fn default() -> Self {
        Self {
            raw: Vec::new(),
            raw_tbs_certificate: Vec::new(),
            raw_subject_public_key_info: Vec::new(),
            raw_subject: Vec::new(),
            raw_issuer: Vec::new(),
            signature: Vec::new(),
            signature_algorithm: Sm2SignatureAlgorithm::default(),
            public_key_algorithm: Sm2PublicKeyAlgorithm::default(),
            version: 3,
            serial_number: vec![0],
            issuer: Name::default(),
            subject: Name::default(),
            not_before: SystemTime::UNIX_EPOCH,
            not_after: SystemTime::UNIX_EPOCH,
            key_usage: Sm2KeyUsage::default(),
            extensions: Vec::new(),
            extra_extensions: Vec::new(),
            unhandled_critical_extensions: Vec::new(),
            ext_key_usage: Vec::new(),
            unknown_ext_key_usage: Vec::new(),
            basic_constraints_valid: false,
            is_ca: false,
            max_path_len: None,
            subject_key_id: Vec::new(),
            authority_key_id: Vec::new(),
            ocsp_server: Vec::new(),
            issuing_certificate_url: Vec::new(),
            dns_names: Vec::new(),
            email_addresses: Vec::new(),
            ip_addresses: Vec::new(),
            permitted_dns_domains_critical: false,
            permitted_dns_domains: Vec::new(),
            excluded_dns_domains: Vec::new(),
            crl_distribution_points: Vec::new(),
            policy_identifiers: Vec::new(),
        }
    }
}

impl Sm2Certificate {
    /// Decode the SM2 public key from the raw SubjectPublicKeyInfo.
    ///
    /// Only available on certificates that have been signed and parsed.
    pub fn public_key(&self) -> Result<sm2::PublicKey> {
        let parse_err = |reason: String| PkiError::CertificateParse {
            entity: self.subject.common_name.clone(),
            reason,
        };

        let spki = SubjectPublicKeyInfoRef::from_der(&self.raw_subject_public_key_info)
            .map_err(|e| parse_err(format!("Invalid SubjectPublicKeyInfo: {}", e)))?;
        let point = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| parse_err("Public key has unused bits".to_string()))?;

        sm2::PublicKey::from_sec1_bytes(point)
            .map_err(|e| parse_err(format!("Invalid SM2 public key: {}", e)))
    }

    /// Whether issuer and subject encode to the same name.
    pub fn is_self_issued(&self) -> bool {
        if !self.raw_issuer.is_empty() && !self.raw_subject.is_empty() {
            self.raw_issuer == self.raw_subject
        } else {
            self.issuer == self.subject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eku_oid_table_is_bijective() {
        for (usage, oid) in Sm2ExtKeyUsage::TABLE.iter() {
            assert_eq!(usage.oid(), *oid);
            assert_eq!(Sm2ExtKeyUsage::from_oid(oid), Some(*usage));
        }
    }

    #[test]
    fn test_eku_unknown_oid() {
        let oid = ObjectIdentifier::new_unwrap("1.2.3.4.5");
        assert_eq!(Sm2ExtKeyUsage::from_oid(&oid), None);
    }

    #[test]
    fn test_signature_algorithm_oid() {
        assert_eq!(
            Sm2SignatureAlgorithm::Sm2WithSm3.oid(),
            Some(OID_SM2_WITH_SM3)
        );
        assert_eq!(
            Sm2SignatureAlgorithm::from_oid(&OID_SM2_WITH_SM3),
            Sm2SignatureAlgorithm::Sm2WithSm3
        );
        assert_eq!(Sm2SignatureAlgorithm::Unknown.oid(), None);
    }

    #[test]
    fn test_key_usage_named_bits() {
        let usage = Sm2KeyUsage::from_bits(0b1_0000_0001);

        assert!(usage.has_bit(0));
        assert!(usage.has_bit(8));
        assert!(!usage.has_bit(1));
        assert!(!usage.has_bit(9));
    }
}
