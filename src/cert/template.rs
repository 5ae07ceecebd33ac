//! Conventional certificate template.
//!
//! This is the algorithm-neutral description of a certificate that the
//! builder produces. It knows nothing about SM2; [`crate::cert::translate`]
//! maps it onto [`crate::cert::sm2cert::Sm2Certificate`] before signing.

use const_oid::ObjectIdentifier;
use std::net::IpAddr;
use std::time::SystemTime;

/// A distinguished name, one list per attribute type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
    pub serial_number: String,
    pub common_name: String,
}

/// Key usage bitmask, bit `n` is named bit `n` of the X.509 KeyUsage BIT STRING.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: KeyUsage = KeyUsage(1 << 0);
    pub const CONTENT_COMMITMENT: KeyUsage = KeyUsage(1 << 1);
    pub const KEY_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 2);
    pub const DATA_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 3);
    pub const KEY_AGREEMENT: KeyUsage = KeyUsage(1 << 4);
    pub const CERT_SIGN: KeyUsage = KeyUsage(1 << 5);
    pub const CRL_SIGN: KeyUsage = KeyUsage(1 << 6);
    pub const ENCIPHER_ONLY: KeyUsage = KeyUsage(1 << 7);
    pub const DECIPHER_ONLY: KeyUsage = KeyUsage(1 << 8);

    pub fn contains(self, other: KeyUsage) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = KeyUsage;

    fn bitor(self, rhs: KeyUsage) -> KeyUsage {
        KeyUsage(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for KeyUsage {
    fn bitor_assign(&mut self, rhs: KeyUsage) {
        self.0 |= rhs.0;
    }
}

/// Extended key usage purposes known to the conventional stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKeyUsage {
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

/// Signature algorithms known to the conventional stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    #[default]
    Unknown,
    Sha256WithRsa,
    Sha384WithRsa,
    EcdsaWithSha256,
    EcdsaWithSha384,
    EcdsaWithSha512,
    PureEd25519,
}

/// Public key algorithms known to the conventional stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    #[default]
    Unknown,
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
}

/// A raw X.509 extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtension {
    pub id: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// Unsigned description of a certificate-to-be.
///
/// Raw fields are empty for templates built in memory and populated for
/// certificates parsed from DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub raw: Vec<u8>,
    pub raw_tbs_certificate: Vec<u8>,
    pub raw_subject_public_key_info: Vec<u8>,
    pub raw_subject: Vec<u8>,
    pub raw_issuer: Vec<u8>,

    pub signature: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub public_key_algorithm: PublicKeyAlgorithm,

    pub version: u8,
    /// Unsigned big-endian magnitude, no leading zero bytes.
    pub serial_number: Vec<u8>,
    pub issuer: Name,
    pub subject: Name,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub key_usage: KeyUsage,

    pub extensions: Vec<RawExtension>,
    pub extra_extensions: Vec<RawExtension>,
    pub unhandled_critical_extensions: Vec<ObjectIdentifier>,

    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub unknown_ext_key_usage: Vec<ObjectIdentifier>,

    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    /// `None` means no path length constraint.
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

impl Default for CertificateTemplate {
    fn default() -> Self {
        Self {
            raw: Vec::new(),
            raw_tbs_certificate: Vec::new(),
            raw_subject_public_key_info: Vec::new(),
            raw_subject: Vec::new(),
            raw_issuer: Vec::new(),
            signature: Vec::new(),
            signature_algorithm: SignatureAlgorithm::default(),
            public_key_algorithm: PublicKeyAlgorithm::default(),
            version: 3,
            serial_number: vec![0],
            issuer: Name::default(),
            subject: Name::default(),
            not_before: SystemTime::UNIX_EPOCH,
            not_after: SystemTime::UNIX_EPOCH,
            key_usage: KeyUsage::default(),
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
