//! X.509 v3 extension encoding and decoding for SM2 certificates.

use crate::cert::sm2cert::{Sm2Certificate, Sm2ExtKeyUsage, Sm2KeyUsage};
use crate::cert::template::RawExtension;
use const_oid::db::rfc5280::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_CRL_DISTRIBUTION_POINTS, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_NAME_CONSTRAINTS,
    ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER, ID_PE_AUTHORITY_INFO_ACCESS,
};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::{BitString, Ia5String, OctetString};
use der::{Decode, Encode};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, AuthorityKeyIdentifier, BasicConstraints,
    CertificatePolicies, CrlDistributionPoints, ExtendedKeyUsage, NameConstraints, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;

const OID_AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");
const OID_AD_CA_ISSUERS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.2");

/// Build the extensions for `cert` in the order a conventional issuer emits them.
///
/// Extensions in `extra_extensions` replace any built extension with the
/// same OID and are appended last.
pub fn build_extensions(cert: &Sm2Certificate, authority_key_id: &[u8]) -> der::Result<Vec<Extension>> {
    let mut extensions = Vec::new();

    if cert.key_usage.bits() != 0 {
        extensions.push(Extension {
            extn_id: ID_CE_KEY_USAGE,
            critical: true,
            extn_value: OctetString::new(key_usage_bit_string(cert.key_usage)?.to_der()?)?,
        });
    }

    if !cert.ext_key_usage.is_empty() || !cert.unknown_ext_key_usage.is_empty() {
        let oids = cert
            .ext_key_usage
            .iter()
            .map(|usage| usage.oid())
            .chain(cert.unknown_ext_key_usage.iter().copied())
            .collect();
        extensions.push(extension(&ExtendedKeyUsage(oids), false)?);
    }

    if cert.basic_constraints_valid {
        let constraints = BasicConstraints {
            ca: cert.is_ca,
            path_len_constraint: cert.max_path_len,
        };
        extensions.push(extension(&constraints, true)?);
    }

    if !cert.subject_key_id.is_empty() {
        let ski = SubjectKeyIdentifier(OctetString::new(cert.subject_key_id.clone())?);
        extensions.push(extension(&ski, false)?);
    }

    if !authority_key_id.is_empty() {
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(authority_key_id.to_vec())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        extensions.push(extension(&aki, false)?);
    }

    if !cert.ocsp_server.is_empty() || !cert.issuing_certificate_url.is_empty() {
        let mut access = Vec::new();
        for url in &cert.ocsp_server {
            access.push(AccessDescription {
                access_method: OID_AD_OCSP,
                access_location: uri(url)?,
            });
        }
        for url in &cert.issuing_certificate_url {
            access.push(AccessDescription {
                access_method: OID_AD_CA_ISSUERS,
                access_location: uri(url)?,
            });
        }
        extensions.push(extension(&AuthorityInfoAccessSyntax(access), false)?);
    }

    if !cert.dns_names.is_empty() || !cert.email_addresses.is_empty() || !cert.ip_addresses.is_empty() {
        let mut names = Vec::new();
        for dns in &cert.dns_names {
            names.push(GeneralName::DnsName(Ia5String::new(dns)?));
        }
        for email in &cert.email_addresses {
            names.push(GeneralName::Rfc822Name(Ia5String::new(email)?));
        }
        for ip in &cert.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }
        extensions.push(extension(&SubjectAltName(names), false)?);
    }

    if !cert.permitted_dns_domains.is_empty() || !cert.excluded_dns_domains.is_empty() {
        let constraints = NameConstraints {
            permitted_subtrees: dns_subtrees(&cert.permitted_dns_domains)?,
            excluded_subtrees: dns_subtrees(&cert.excluded_dns_domains)?,
        };
        extensions.push(extension(&constraints, cert.permitted_dns_domains_critical)?);
    }

    if !cert.crl_distribution_points.is_empty() {
        let points = cert
            .crl_distribution_points
            .iter()
            .map(|url| -> der::Result<DistributionPoint> {
                Ok(DistributionPoint {
                    distribution_point: Some(DistributionPointName::FullName(vec![uri(url)?])),
                    reasons: None,
                    crl_issuer: None,
                })
            })
            .collect::<der::Result<Vec<_>>>()?;
        extensions.push(extension(&CrlDistributionPoints(points), false)?);
    }

    if !cert.policy_identifiers.is_empty() {
        let policies = cert
            .policy_identifiers
            .iter()
            .map(|oid| PolicyInformation {
                policy_identifier: *oid,
                policy_qualifiers: None,
            })
            .collect();
        extensions.push(extension(&CertificatePolicies(policies), false)?);
    }

    extensions.retain(|built| {
        !cert
            .extra_extensions
            .iter()
            .any(|extra| extra.id == built.extn_id)
    });
    for extra in &cert.extra_extensions {
        extensions.push(Extension {
            extn_id: extra.id,
            critical: extra.critical,
            extn_value: OctetString::new(extra.value.clone())?,
        });
    }

    Ok(extensions)
}

/// Decode `extensions` into the typed fields of `cert`.
///
/// Every extension is also kept verbatim in `cert.extensions`; critical
/// extensions that are not understood are listed in
/// `cert.unhandled_critical_extensions`.
pub fn apply_extensions(cert: &mut Sm2Certificate, extensions: &[Extension]) -> der::Result<()> {
    for ext in extensions {
        let value = ext.extn_value.as_bytes();
        cert.extensions.push(RawExtension {
            id: ext.extn_id,
            critical: ext.critical,
            value: value.to_vec(),
        });

        match ext.extn_id {
            ID_CE_KEY_USAGE => {
                cert.key_usage = key_usage_from_bit_string(&BitString::from_der(value)?);
            }
            ID_CE_EXT_KEY_USAGE => {
                for oid in ExtendedKeyUsage::from_der(value)?.0 {
                    match Sm2ExtKeyUsage::from_oid(&oid) {
                        Some(usage) => cert.ext_key_usage.push(usage),
                        None => cert.unknown_ext_key_usage.push(oid),
                    }
                }
            }
            ID_CE_BASIC_CONSTRAINTS => {
                let constraints = BasicConstraints::from_der(value)?;
                cert.basic_constraints_valid = true;
                cert.is_ca = constraints.ca;
                cert.max_path_len = constraints.path_len_constraint;
            }
            ID_CE_SUBJECT_KEY_IDENTIFIER => {
                cert.subject_key_id = SubjectKeyIdentifier::from_der(value)?.0.as_bytes().to_vec();
            }
            ID_CE_AUTHORITY_KEY_IDENTIFIER => {
                if let Some(key_id) = AuthorityKeyIdentifier::from_der(value)?.key_identifier {
                    cert.authority_key_id = key_id.as_bytes().to_vec();
                }
            }
            ID_PE_AUTHORITY_INFO_ACCESS => {
                for access in AuthorityInfoAccessSyntax::from_der(value)?.0 {
                    let GeneralName::UniformResourceIdentifier(url) = access.access_location else {
                        continue;
                    };
                    match access.access_method {
                        OID_AD_OCSP => cert.ocsp_server.push(url.to_string()),
                        OID_AD_CA_ISSUERS => cert.issuing_certificate_url.push(url.to_string()),
                        _ => {}
                    }
                }
            }
            ID_CE_SUBJECT_ALT_NAME => {
                for name in SubjectAltName::from_der(value)?.0 {
                    match name {
                        GeneralName::DnsName(dns) => cert.dns_names.push(dns.to_string()),
                        GeneralName::Rfc822Name(email) => {
                            cert.email_addresses.push(email.to_string())
                        }
                        GeneralName::IpAddress(octets) => {
                            cert.ip_addresses.push(ip_from_octets(octets.as_bytes())?)
                        }
                        _ => {}
                    }
                }
            }
            ID_CE_NAME_CONSTRAINTS => {
                let constraints = NameConstraints::from_der(value)?;
                cert.permitted_dns_domains_critical = ext.critical;
                cert.permitted_dns_domains = dns_domains(constraints.permitted_subtrees);
                cert.excluded_dns_domains = dns_domains(constraints.excluded_subtrees);
            }
            ID_CE_CRL_DISTRIBUTION_POINTS => {
                for point in CrlDistributionPoints::from_der(value)?.0 {
                    if let Some(DistributionPointName::FullName(names)) = point.distribution_point {
                        for name in names {
                            if let GeneralName::UniformResourceIdentifier(url) = name {
                                cert.crl_distribution_points.push(url.to_string());
                            }
                        }
                    }
                }
            }
            ID_CE_CERTIFICATE_POLICIES => {
                for policy in CertificatePolicies::from_der(value)?.0 {
                    cert.policy_identifiers.push(policy.policy_identifier);
                }
            }
            other if ext.critical => cert.unhandled_critical_extensions.push(other),
            _ => {}
        }
    }

    Ok(())
}

fn extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> der::Result<Extension> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}

fn uri(url: &str) -> der::Result<GeneralName> {
    Ok(GeneralName::UniformResourceIdentifier(Ia5String::new(url)?))
}

fn dns_subtrees(domains: &[String]) -> der::Result<Option<Vec<GeneralSubtree>>> {
    if domains.is_empty() {
        return Ok(None);
    }
    let subtrees = domains
        .iter()
        .map(|domain| -> der::Result<GeneralSubtree> {
            Ok(GeneralSubtree {
                base: GeneralName::DnsName(Ia5String::new(domain)?),
                minimum: 0,
                maximum: None,
            })
        })
        .collect::<der::Result<Vec<_>>>()?;
    Ok(Some(subtrees))
}

fn dns_domains(subtrees: Option<Vec<GeneralSubtree>>) -> Vec<String> {
    subtrees
        .unwrap_or_default()
        .into_iter()
        .filter_map(|subtree| match subtree.base {
            GeneralName::DnsName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect()
}

fn ip_from_octets(octets: &[u8]) -> der::Result<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(der::ErrorKind::Length {
        tag: der::Tag::OctetString,
    }
    .into())
}

// Named bit n is the n-th most significant bit; trailing zero bits are dropped (DER).
fn key_usage_bit_string(usage: Sm2KeyUsage) -> der::Result<BitString> {
    let mut bytes = [0u8; 2];
    let mut highest = None;
    for n in 0..Sm2KeyUsage::NAMED_BITS {
        if usage.has_bit(n) {
            bytes[usize::from(n / 8)] |= 0x80 >> (n % 8);
            highest = Some(n);
        }
    }

    match highest {
        Some(n) => BitString::new(7 - n % 8, bytes[..usize::from(n / 8) + 1].to_vec()),
        None => BitString::new(0, Vec::new()),
    }
}

fn key_usage_from_bit_string(bits: &BitString) -> Sm2KeyUsage {
    let bytes = bits.raw_bytes();
    let mut mask = 0u16;
    for n in 0..Sm2KeyUsage::NAMED_BITS {
        let byte = bytes.get(usize::from(n / 8)).copied().unwrap_or(0);
        if byte & (0x80 >> (n % 8)) != 0 {
            mask |= 1 << n;
        }
    }
    Sm2KeyUsage::from_bits(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::template::KeyUsage;

    fn empty_cert() -> Sm2Certificate {
        Sm2Certificate::default()
    }

    #[test]
    fn test_key_usage_encoding_for_ca() {
        let usage = KeyUsage::DIGITAL_SIGNATURE
            | KeyUsage::KEY_ENCIPHERMENT
            | KeyUsage::CERT_SIGN
            | KeyUsage::CRL_SIGN;
        let bits = key_usage_bit_string(Sm2KeyUsage::from_bits(usage.0)).unwrap();

        // 1010_0110, trailing bit 7 unused
        assert_eq!(bits.raw_bytes(), &[0xa6]);
        assert_eq!(bits.unused_bits(), 1);
        assert_eq!(key_usage_from_bit_string(&bits).bits(), usage.0);
    }

    #[test]
    fn test_key_usage_encoding_for_decipher_only() {
        let usage = Sm2KeyUsage::from_bits(KeyUsage::DECIPHER_ONLY.0);
        let bits = key_usage_bit_string(usage).unwrap();

        assert_eq!(bits.raw_bytes(), &[0x00, 0x80]);
        assert_eq!(bits.unused_bits(), 7);
        assert_eq!(key_usage_from_bit_string(&bits), usage);
    }

    #[test]
    fn test_empty_certificate_has_no_extensions() {
        let extensions = build_extensions(&empty_cert(), &[]).unwrap();
        assert!(extensions.is_empty());
    }

    #[test]
    fn test_extensions_roundtrip() {
        let mut cert = empty_cert();
        cert.key_usage = Sm2KeyUsage::from_bits(0b110_0101);
        cert.ext_key_usage = vec![Sm2ExtKeyUsage::ServerAuth, Sm2ExtKeyUsage::ClientAuth];
        cert.unknown_ext_key_usage = vec![ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.7")];
        cert.basic_constraints_valid = true;
        cert.is_ca = true;
        cert.max_path_len = Some(1);
        cert.subject_key_id = vec![1, 2, 3, 4];
        cert.ocsp_server = vec!["http://ocsp.example.test".to_string()];
        cert.issuing_certificate_url = vec!["http://ca.example.test/ca.crt".to_string()];
        cert.dns_names = vec!["localhost".to_string()];
        cert.email_addresses = vec!["pki@example.test".to_string()];
        cert.ip_addresses = vec![
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ];
        cert.permitted_dns_domains_critical = true;
        cert.permitted_dns_domains = vec![".example.test".to_string()];
        cert.excluded_dns_domains = vec![".bad.test".to_string()];
        cert.crl_distribution_points = vec!["http://crl.example.test/1.crl".to_string()];
        cert.policy_identifiers = vec![ObjectIdentifier::new_unwrap("2.23.140.1.2.2")];

        let extensions = build_extensions(&cert, &[9, 9]).unwrap();
        let mut parsed = empty_cert();
        apply_extensions(&mut parsed, &extensions).unwrap();

        assert_eq!(parsed.key_usage, cert.key_usage);
        assert_eq!(parsed.ext_key_usage, cert.ext_key_usage);
        assert_eq!(parsed.unknown_ext_key_usage, cert.unknown_ext_key_usage);
        assert!(parsed.basic_constraints_valid);
        assert!(parsed.is_ca);
        assert_eq!(parsed.max_path_len, Some(1));
        assert_eq!(parsed.subject_key_id, vec![1, 2, 3, 4]);
        assert_eq!(parsed.authority_key_id, vec![9, 9]);
        assert_eq!(parsed.ocsp_server, cert.ocsp_server);
        assert_eq!(parsed.issuing_certificate_url, cert.issuing_certificate_url);
        assert_eq!(parsed.dns_names, cert.dns_names);
        assert_eq!(parsed.email_addresses, cert.email_addresses);
        assert_eq!(parsed.ip_addresses, cert.ip_addresses);
        assert!(parsed.permitted_dns_domains_critical);
        assert_eq!(parsed.permitted_dns_domains, cert.permitted_dns_domains);
        assert_eq!(parsed.excluded_dns_domains, cert.excluded_dns_domains);
        assert_eq!(parsed.crl_distribution_points, cert.crl_distribution_points);
        assert_eq!(parsed.policy_identifiers, cert.policy_identifiers);
        assert_eq!(parsed.extensions.len(), extensions.len());
        assert!(parsed.unhandled_critical_extensions.is_empty());
    }

    #[test]
    fn test_extra_extension_overrides_built_one() {
        let mut cert = empty_cert();
        cert.subject_key_id = vec![1, 2, 3, 4];
        cert.extra_extensions = vec![RawExtension {
            id: SubjectKeyIdentifier::OID,
            critical: false,
            value: vec![0x04, 0x01, 0xff],
        }];

        let extensions = build_extensions(&cert, &[]).unwrap();
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].extn_value.as_bytes(), &[0x04, 0x01, 0xff]);
    }

    #[test]
    fn test_unknown_critical_extension_is_unhandled() {
        let oid = ObjectIdentifier::new_unwrap("1.2.3.4.5.6");
        let extensions = vec![Extension {
            extn_id: oid,
            critical: true,
            extn_value: OctetString::new(vec![0x05, 0x00]).unwrap(),
        }];

        let mut cert = empty_cert();
        apply_extensions(&mut cert, &extensions).unwrap();
        assert_eq!(cert.unhandled_critical_extensions, vec![oid]);
    }
}
