//! Conventional template ⇄ SM2 certificate translation.
//!
//! Both directions destructure their input without `..`, so a field added
//! to either structure fails to compile until it is mapped here.

use crate::cert::sm2cert::{
    Sm2Certificate, Sm2ExtKeyUsage, Sm2KeyUsage, Sm2PublicKeyAlgorithm, Sm2SignatureAlgorithm,
};
use crate::cert::template::{
    CertificateTemplate, ExtKeyUsage, KeyUsage, PublicKeyAlgorithm, SignatureAlgorithm,
};

/// Translate a conventional template into its SM2 form.
///
/// The signature algorithm is always forced to SM2-with-SM3: the result is
/// about to be (re-)signed by an SM2 issuer regardless of what the source
/// declared.
///
/// # Example
///
/// ```
/// use gm_testpki::cert::template::{CertificateTemplate, ExtKeyUsage};
/// use gm_testpki::cert::sm2cert::{Sm2ExtKeyUsage, Sm2SignatureAlgorithm};
/// use gm_testpki::cert::translate::translate_to_sm2;
///
/// let mut template = CertificateTemplate::default();
/// template.ext_key_usage = vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth];
///
/// let sm2 = translate_to_sm2(&template);
/// assert_eq!(sm2.ext_key_usage, vec![Sm2ExtKeyUsage::ServerAuth, Sm2ExtKeyUsage::ClientAuth]);
/// assert_eq!(sm2.signature_algorithm, Sm2SignatureAlgorithm::Sm2WithSm3);
/// ```
pub fn translate_to_sm2(template: &CertificateTemplate) -> Sm2Certificate {
    let CertificateTemplate {
        raw,
        raw_tbs_certificate,
        raw_subject_public_key_info,
        raw_subject,
        raw_issuer,
        signature,
        signature_algorithm: _,
        public_key_algorithm,
        version,
        serial_number,
        issuer,
        subject,
        not_before,
        not_after,
        key_usage,
        extensions,
        extra_extensions,
        unhandled_critical_extensions,
        ext_key_usage,
        unknown_ext_key_usage,
        basic_constraints_valid,
        is_ca,
        max_path_len,
        subject_key_id,
        authority_key_id,
        ocsp_server,
        issuing_certificate_url,
        dns_names,
        email_addresses,
        ip_addresses,
        permitted_dns_domains_critical,
        permitted_dns_domains,
        excluded_dns_domains,
        crl_distribution_points,
        policy_identifiers,
    } = template;

    Sm2Certificate {
        raw: raw.clone(),
        raw_tbs_certificate: raw_tbs_certificate.clone(),
        raw_subject_public_key_info: raw_subject_public_key_info.clone(),
        raw_subject: raw_subject.clone(),
        raw_issuer: raw_issuer.clone(),
        signature: signature.clone(),
        signature_algorithm: Sm2SignatureAlgorithm::Sm2WithSm3,
        public_key_algorithm: public_key_algorithm_to_sm2(*public_key_algorithm),
        version: *version,
        serial_number: serial_number.clone(),
        issuer: issuer.clone(),
        subject: subject.clone(),
        not_before: *not_before,
        not_after: *not_after,
        key_usage: key_usage_to_sm2(*key_usage),
        extensions: extensions.clone(),
        extra_extensions: extra_extensions.clone(),
        unhandled_critical_extensions: unhandled_critical_extensions.clone(),
        ext_key_usage: ext_key_usage.iter().copied().map(ext_key_usage_to_sm2).collect(),
        unknown_ext_key_usage: unknown_ext_key_usage.clone(),
        basic_constraints_valid: *basic_constraints_valid,
        is_ca: *is_ca,
        max_path_len: *max_path_len,
        subject_key_id: subject_key_id.clone(),
        authority_key_id: authority_key_id.clone(),
        ocsp_server: ocsp_server.clone(),
        issuing_certificate_url: issuing_certificate_url.clone(),
        dns_names: dns_names.clone(),
        email_addresses: email_addresses.clone(),
        ip_addresses: ip_addresses.clone(),
        permitted_dns_domains_critical: *permitted_dns_domains_critical,
        permitted_dns_domains: permitted_dns_domains.clone(),
        excluded_dns_domains: excluded_dns_domains.clone(),
        crl_distribution_points: crl_distribution_points.clone(),
        policy_identifiers: policy_identifiers.clone(),
    }
}

/// Translate an SM2 certificate back into the conventional form.
///
/// SM2 signature algorithms have no conventional counterpart and map to
/// [`SignatureAlgorithm::Unknown`].
pub fn translate_from_sm2(cert: &Sm2Certificate) -> CertificateTemplate {
    let Sm2Certificate {
        raw,
        raw_tbs_certificate,
        raw_subject_public_key_info,
        raw_subject,
        raw_issuer,
        signature,
        signature_algorithm: _,
        public_key_algorithm,
        version,
        serial_number,
        issuer,
        subject,
        not_before,
        not_after,
        key_usage,
        extensions,
        extra_extensions,
        unhandled_critical_extensions,
        ext_key_usage,
        unknown_ext_key_usage,
        basic_constraints_valid,
        is_ca,
        max_path_len,
        subject_key_id,
        authority_key_id,
        ocsp_server,
        issuing_certificate_url,
        dns_names,
        email_addresses,
        ip_addresses,
        permitted_dns_domains_critical,
        permitted_dns_domains,
        excluded_dns_domains,
        crl_distribution_points,
        policy_identifiers,
    } = cert;

    CertificateTemplate {
        raw: raw.clone(),
        raw_tbs_certificate: raw_tbs_certificate.clone(),
        raw_subject_public_key_info: raw_subject_public_key_info.clone(),
        raw_subject: raw_subject.clone(),
        raw_issuer: raw_issuer.clone(),
        signature: signature.clone(),
        signature_algorithm: SignatureAlgorithm::Unknown,
        public_key_algorithm: public_key_algorithm_from_sm2(*public_key_algorithm),
        version: *version,
        serial_number: serial_number.clone(),
        issuer: issuer.clone(),
        subject: subject.clone(),
        not_before: *not_before,
        not_after: *not_after,
        key_usage: key_usage_from_sm2(*key_usage),
        extensions: extensions.clone(),
        extra_extensions: extra_extensions.clone(),
        unhandled_critical_extensions: unhandled_critical_extensions.clone(),
        ext_key_usage: ext_key_usage.iter().copied().map(ext_key_usage_from_sm2).collect(),
        unknown_ext_key_usage: unknown_ext_key_usage.clone(),
        basic_constraints_valid: *basic_constraints_valid,
        is_ca: *is_ca,
        max_path_len: *max_path_len,
        subject_key_id: subject_key_id.clone(),
        authority_key_id: authority_key_id.clone(),
        ocsp_server: ocsp_server.clone(),
        issuing_certificate_url: issuing_certificate_url.clone(),
        dns_names: dns_names.clone(),
        email_addresses: email_addresses.clone(),
        ip_addresses: ip_addresses.clone(),
        permitted_dns_domains_critical: *permitted_dns_domains_critical,
        permitted_dns_domains: permitted_dns_domains.clone(),
        excluded_dns_domains: excluded_dns_domains.clone(),
        crl_distribution_points: crl_distribution_points.clone(),
        policy_identifiers: policy_identifiers.clone(),
    }
}

// Both masks number bits the same way as the KeyUsage BIT STRING.
fn key_usage_to_sm2(usage: KeyUsage) -> Sm2KeyUsage {
    Sm2KeyUsage::from_bits(usage.0)
}

fn key_usage_from_sm2(usage: Sm2KeyUsage) -> KeyUsage {
    KeyUsage(usage.bits())
}

fn ext_key_usage_to_sm2(usage: ExtKeyUsage) -> Sm2ExtKeyUsage {
    match usage {
        ExtKeyUsage::Any => Sm2ExtKeyUsage::Any,
        ExtKeyUsage::ServerAuth => Sm2ExtKeyUsage::ServerAuth,
        ExtKeyUsage::ClientAuth => Sm2ExtKeyUsage::ClientAuth,
        ExtKeyUsage::CodeSigning => Sm2ExtKeyUsage::CodeSigning,
        ExtKeyUsage::EmailProtection => Sm2ExtKeyUsage::EmailProtection,
        ExtKeyUsage::IpsecEndSystem => Sm2ExtKeyUsage::IpsecEndSystem,
        ExtKeyUsage::IpsecTunnel => Sm2ExtKeyUsage::IpsecTunnel,
        ExtKeyUsage::IpsecUser => Sm2ExtKeyUsage::IpsecUser,
        ExtKeyUsage::TimeStamping => Sm2ExtKeyUsage::TimeStamping,
        ExtKeyUsage::OcspSigning => Sm2ExtKeyUsage::OcspSigning,
        ExtKeyUsage::MicrosoftServerGatedCrypto => Sm2ExtKeyUsage::MicrosoftServerGatedCrypto,
        ExtKeyUsage::NetscapeServerGatedCrypto => Sm2ExtKeyUsage::NetscapeServerGatedCrypto,
        ExtKeyUsage::MicrosoftCommercialCodeSigning => {
            Sm2ExtKeyUsage::MicrosoftCommercialCodeSigning
        }
        ExtKeyUsage::MicrosoftKernelCodeSigning => Sm2ExtKeyUsage::MicrosoftKernelCodeSigning,
    }
}

fn ext_key_usage_from_sm2(usage: Sm2ExtKeyUsage) -> ExtKeyUsage {
    match usage {
        Sm2ExtKeyUsage::Any => ExtKeyUsage::Any,
        Sm2ExtKeyUsage::ServerAuth => ExtKeyUsage::ServerAuth,
        Sm2ExtKeyUsage::ClientAuth => ExtKeyUsage::ClientAuth,
        Sm2ExtKeyUsage::CodeSigning => ExtKeyUsage::CodeSigning,
        Sm2ExtKeyUsage::EmailProtection => ExtKeyUsage::EmailProtection,
        Sm2ExtKeyUsage::IpsecEndSystem => ExtKeyUsage::IpsecEndSystem,
        Sm2ExtKeyUsage::IpsecTunnel => ExtKeyUsage::IpsecTunnel,
        Sm2ExtKeyUsage::IpsecUser => ExtKeyUsage::IpsecUser,
        Sm2ExtKeyUsage::TimeStamping => ExtKeyUsage::TimeStamping,
        Sm2ExtKeyUsage::OcspSigning => ExtKeyUsage::OcspSigning,
        Sm2ExtKeyUsage::MicrosoftServerGatedCrypto => ExtKeyUsage::MicrosoftServerGatedCrypto,
        Sm2ExtKeyUsage::NetscapeServerGatedCrypto => ExtKeyUsage::NetscapeServerGatedCrypto,
        Sm2ExtKeyUsage::MicrosoftCommercialCodeSigning => {
            ExtKeyUsage::MicrosoftCommercialCodeSigning
        }
        Sm2ExtKeyUsage::MicrosoftKernelCodeSigning => ExtKeyUsage::MicrosoftKernelCodeSigning,
    }
}

fn public_key_algorithm_to_sm2(algorithm: PublicKeyAlgorithm) -> Sm2PublicKeyAlgorithm {
    match algorithm {
        PublicKeyAlgorithm::Unknown => Sm2PublicKeyAlgorithm::Unknown,
        PublicKeyAlgorithm::Rsa => Sm2PublicKeyAlgorithm::Rsa,
        PublicKeyAlgorithm::Dsa => Sm2PublicKeyAlgorithm::Dsa,
        PublicKeyAlgorithm::Ecdsa => Sm2PublicKeyAlgorithm::Ecdsa,
        PublicKeyAlgorithm::Ed25519 => Sm2PublicKeyAlgorithm::Ed25519,
    }
}

fn public_key_algorithm_from_sm2(algorithm: Sm2PublicKeyAlgorithm) -> PublicKeyAlgorithm {
    match algorithm {
        Sm2PublicKeyAlgorithm::Unknown => PublicKeyAlgorithm::Unknown,
        Sm2PublicKeyAlgorithm::Rsa => PublicKeyAlgorithm::Rsa,
        Sm2PublicKeyAlgorithm::Dsa => PublicKeyAlgorithm::Dsa,
        Sm2PublicKeyAlgorithm::Ecdsa => PublicKeyAlgorithm::Ecdsa,
        Sm2PublicKeyAlgorithm::Ed25519 => PublicKeyAlgorithm::Ed25519,
    }
}
