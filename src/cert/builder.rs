//! Certificate template builder.
//!
//! This module builds conventional certificate templates for each role in
//! the hierarchy from a shared baseline plus role-specific overrides.

use crate::cert::template::{CertificateTemplate, ExtKeyUsage, KeyUsage, Name};
use crate::error::{PkiError, Result};
use rand::{CryptoRng, RngCore};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Validity of every generated certificate (~ten years).
pub const VALIDITY_DAYS: u64 = 3650;

/// Subject key identifier stamped on every authority.
pub const CA_SUBJECT_KEY_ID: [u8; 4] = [1, 2, 3, 4];

/// Common name and SAN DNS name of server leaves.
pub const SERVER_HOST: &str = "localhost";

/// Serial numbers are drawn from [0, 2^128).
const SERIAL_NUMBER_BYTES: usize = 16;

/// What an entity is for within the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    RootCa,
    IntermediateCa,
    Server,
    Client,
}

impl Role {
    /// Whether certificates of this role sign other certificates.
    pub fn is_authority(self) -> bool {
        matches!(self, Role::RootCa | Role::IntermediateCa)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::RootCa => "root CA",
            Role::IntermediateCa => "intermediate CA",
            Role::Server => "server",
            Role::Client => "client",
        };
        f.write_str(label)
    }
}

/// Default subject: fixed country, locality and province.
pub fn subject_template() -> Name {
    Name {
        country: vec!["US".to_string()],
        locality: vec!["San Francisco".to_string()],
        province: vec!["California".to_string()],
        ..Name::default()
    }
}

/// Draw a random 128-bit serial number as an unsigned big-endian magnitude.
pub fn generate_serial_number<R: RngCore + CryptoRng>(entity: &str, rng: &mut R) -> Result<Vec<u8>> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| PkiError::KeyGeneration {
            entity: entity.to_string(),
            reason: format!("Failed to draw serial number: {}", e),
        })?;

    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    Ok(bytes[first..].to_vec())
}

/// Set the validity window to `[not_before, not_before + days)`.
///
/// `not_before` is truncated to whole seconds, the precision X.509 time
/// encodings keep, so the window survives a DER round trip unchanged.
pub fn set_validity(template: &mut CertificateTemplate, not_before: SystemTime, days: u64) {
    let secs = not_before
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    template.not_before = UNIX_EPOCH + Duration::from_secs(secs);
    template.not_after = template.not_before + Duration::from_secs(days * 24 * 60 * 60);
}

/// Baseline template issued at `now`.
pub fn x509_template_at<R: RngCore + CryptoRng>(
    entity: &str,
    rng: &mut R,
    now: SystemTime,
) -> Result<CertificateTemplate> {
    let mut template = CertificateTemplate {
        serial_number: generate_serial_number(entity, rng)?,
        key_usage: KeyUsage::KEY_ENCIPHERMENT | KeyUsage::DIGITAL_SIGNATURE,
        basic_constraints_valid: true,
        ..CertificateTemplate::default()
    };
    set_validity(&mut template, now, VALIDITY_DAYS);
    Ok(template)
}

/// Baseline template issued now.
pub fn x509_template<R: RngCore + CryptoRng>(entity: &str, rng: &mut R) -> Result<CertificateTemplate> {
    x509_template_at(entity, rng, SystemTime::now())
}

/// Build the template for `name` acting as `role`.
///
/// # Example
///
/// ```
/// use gm_testpki::cert::builder::{build_template, Role};
///
/// let template = build_template("Org1-server1", Role::Server, &mut rand::rngs::OsRng).unwrap();
/// assert_eq!(template.subject.common_name, "localhost");
/// assert_eq!(template.subject.organization, vec!["Org1-server1".to_string()]);
/// ```
pub fn build_template<R: RngCore + CryptoRng>(
    name: &str,
    role: Role,
    rng: &mut R,
) -> Result<CertificateTemplate> {
    let mut template = x509_template(name, rng)?;
    apply_role(&mut template, name, role);
    Ok(template)
}

/// Apply the subject, usages and SANs of `role` to a baseline template.
pub fn apply_role(template: &mut CertificateTemplate, name: &str, role: Role) {
    let mut subject = subject_template();
    subject.organization = vec![name.to_string()];
    subject.common_name = name.to_string();

    match role {
        Role::RootCa | Role::IntermediateCa => {
            template.is_ca = true;
            template.key_usage |= KeyUsage::CERT_SIGN | KeyUsage::CRL_SIGN;
            template.ext_key_usage = vec![ExtKeyUsage::Any];
            template.subject_key_id = CA_SUBJECT_KEY_ID.to_vec();
        }
        Role::Server => {
            template.ext_key_usage = vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth];
            subject.common_name = SERVER_HOST.to_string();
            template.dns_names = vec![SERVER_HOST.to_string()];
            template.ip_addresses = vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))];
        }
        Role::Client => {
            template.ext_key_usage = vec![ExtKeyUsage::ClientAuth];
        }
    }

    template.subject = subject;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_subject_template_defaults() {
        let subject = subject_template();
        assert_eq!(subject.country, vec!["US"]);
        assert_eq!(subject.locality, vec!["San Francisco"]);
        assert_eq!(subject.province, vec!["California"]);
        assert!(subject.organization.is_empty());
    }

    #[test]
    fn test_serial_number_is_at_most_128_bits() {
        for _ in 0..32 {
            let serial = generate_serial_number("test", &mut OsRng).unwrap();
            assert!(!serial.is_empty());
            assert!(serial.len() <= 16);
            assert!(serial.len() == 1 || serial[0] != 0);
        }
    }

    #[test]
    fn test_serial_numbers_differ() {
        let a = generate_serial_number("a", &mut OsRng).unwrap();
        let b = generate_serial_number("b", &mut OsRng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_validity() {
        let mut template = CertificateTemplate::default();
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_750);
        set_validity(&mut template, now, 365);

        assert_eq!(template.not_before, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let window = template.not_after.duration_since(template.not_before).unwrap();
        assert_eq!(window.as_secs(), 365 * 24 * 60 * 60);
    }

    #[test]
    fn test_baseline_template() {
        let template = x509_template("Org1", &mut OsRng).unwrap();

        assert!(template.basic_constraints_valid);
        assert!(template.key_usage.contains(KeyUsage::DIGITAL_SIGNATURE));
        assert!(template.key_usage.contains(KeyUsage::KEY_ENCIPHERMENT));
        let window = template.not_after.duration_since(template.not_before).unwrap();
        assert_eq!(window.as_secs(), VALIDITY_DAYS * 86400);
    }

    #[test]
    fn test_ca_template() {
        let template = build_template("Org1", Role::RootCa, &mut OsRng).unwrap();

        assert!(template.is_ca);
        assert_eq!(template.max_path_len, None);
        assert!(template.key_usage.contains(KeyUsage::CERT_SIGN));
        assert!(template.key_usage.contains(KeyUsage::CRL_SIGN));
        assert_eq!(template.ext_key_usage, vec![ExtKeyUsage::Any]);
        assert_eq!(template.subject.common_name, "Org1");
        assert_eq!(template.subject.organization, vec!["Org1"]);
        assert_eq!(template.subject_key_id, CA_SUBJECT_KEY_ID.to_vec());
    }

    #[test]
    fn test_server_template() {
        let template = build_template("Org1-server1", Role::Server, &mut OsRng).unwrap();

        assert!(!template.is_ca);
        assert_eq!(
            template.ext_key_usage,
            vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth]
        );
        assert_eq!(template.subject.common_name, "localhost");
        assert_eq!(template.subject.organization, vec!["Org1-server1"]);
        assert_eq!(template.dns_names, vec!["localhost"]);
        assert_eq!(
            template.ip_addresses,
            vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))]
        );
    }

    #[test]
    fn test_client_template() {
        let template = build_template("Org1-client1", Role::Client, &mut OsRng).unwrap();

        assert_eq!(template.ext_key_usage, vec![ExtKeyUsage::ClientAuth]);
        assert_eq!(template.subject.common_name, "Org1-client1");
        assert!(template.dns_names.is_empty());
        assert!(template.subject_key_id.is_empty());
    }

    #[test]
    fn test_role_is_authority() {
        assert!(Role::RootCa.is_authority());
        assert!(Role::IntermediateCa.is_authority());
        assert!(!Role::Server.is_authority());
        assert!(!Role::Client.is_authority());
    }
}
