//! PEM files for generated keys and certificates.
//!
//! Every entity produces `<name>-key.pem` and `<name>-cert.pem` in the
//! output directory. Existing files are truncated and overwritten.

use crate::cert::sm2cert::Sm2Certificate;
use crate::cert::x509_signing::{cert_from_pem, cert_to_pem};
use crate::crypto::sm2::KeyPair;
use crate::error::{PkiError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const PRIVATE_KEY_TAG: &str = "EC PRIVATE KEY";

/// Path of the private key file for `name`.
pub fn key_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}-key.pem", name))
}

/// Path of the certificate file for `name`.
pub fn cert_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}-cert.pem", name))
}

/// Write `keypair` as a SEC1 `EC PRIVATE KEY` PEM, readable by the owner only.
///
/// # Example
///
/// ```rust,no_run
/// use gm_testpki::crypto::sm2::generate_sm2_keypair;
/// use gm_testpki::storage::pem_files::write_private_key;
/// use std::path::Path;
///
/// let keypair = generate_sm2_keypair("Org1", &mut rand::rngs::OsRng).unwrap();
/// let path = write_private_key(Path::new("."), "Org1", &keypair).unwrap();
/// assert!(path.ends_with("Org1-key.pem"));
/// ```
pub fn write_private_key(dir: &Path, name: &str, keypair: &KeyPair) -> Result<PathBuf> {
    let der = keypair.to_sec1_der(name)?;
    let pem = pem::encode(&pem::Pem::new(PRIVATE_KEY_TAG, der));

    let path = key_path(dir, name);
    write_file(&path, pem.as_bytes(), 0o600).map_err(|source| PkiError::Io {
        entity: name.to_string(),
        source,
    })?;

    Ok(path)
}

/// Write certificate DER as a `CERTIFICATE` PEM.
pub fn write_certificate(dir: &Path, name: &str, der: &[u8]) -> Result<PathBuf> {
    let path = cert_path(dir, name);
    write_file(&path, cert_to_pem(der).as_bytes(), 0o644).map_err(|source| PkiError::Io {
        entity: name.to_string(),
        source,
    })?;

    Ok(path)
}

/// Load a certificate written by [`write_certificate`].
pub fn read_certificate(path: &Path) -> Result<Sm2Certificate> {
    let entity = entity_name(path);
    let contents = fs::read_to_string(path).map_err(|source| PkiError::Io {
        entity: entity.clone(),
        source,
    })?;

    cert_from_pem(&entity, &contents)
}

/// Load a private key written by [`write_private_key`].
pub fn read_private_key(path: &Path) -> Result<KeyPair> {
    let contents = fs::read_to_string(path).map_err(|source| PkiError::Io {
        entity: entity_name(path),
        source,
    })?;

    let pem = pem::parse(&contents)
        .map_err(|e| PkiError::PemError(format!("Failed to parse PEM: {}", e)))?;
    if pem.tag() != PRIVATE_KEY_TAG {
        return Err(PkiError::PemError(format!(
            "Expected {}, got {}",
            PRIVATE_KEY_TAG,
            pem.tag()
        )));
    }

    KeyPair::from_sec1_der(pem.contents())
}

fn entity_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| {
            let stem = stem.to_string_lossy();
            stem.trim_end_matches("-cert")
                .trim_end_matches("-key")
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(unix)]
fn write_file(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // mode() only applies on create; rewrites keep the old permissions otherwise.
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_file(path: &Path, contents: &[u8], _mode: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents)
}
