//! SM2 key operations.
//!
//! This module provides key generation, SM2-with-SM3 signing and
//! verification over the national-cryptography curve.

use crate::cert::sm2cert::OID_SM2_CURVE;
use crate::error::{PkiError, Result};
use der::asn1::UintRef;
use der::{Decode, Encode, Sequence};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sec1::{EcParameters, EcPrivateKey};
use signature::{Signer, Verifier};
use sm2::dsa::{Signature, SigningKey, VerifyingKey};
use sm2::elliptic_curve::sec1::ToEncodedPoint;
use sm2::{PublicKey, SecretKey};

/// Default SM2 distinguishing identifier (GM/T 0009).
pub const DEFAULT_DIST_ID: &str = "1234567812345678";

/// Length of a raw `r || s` SM2 signature.
const SIGNATURE_LEN: usize = 64;

/// An SM2 keypair consisting of a secret scalar and public point.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

/// ASN.1 form of an SM2 signature, identical to ECDSA-Sig-Value.
#[derive(Sequence)]
struct SignatureValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

impl KeyPair {
    /// Create a new keypair from a secret key.
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the public key as an uncompressed SEC1 point.
    pub fn public_bytes(&self) -> Vec<u8> {
        public_key_bytes(&self.public)
    }

    /// Encode the secret key as a SEC1 `ECPrivateKey` structure.
    ///
    /// The `namedCurve` parameter carries the SM2 curve OID and the public
    /// point is included, so the key loads without its certificate.
    pub fn to_sec1_der(&self, entity: &str) -> Result<Vec<u8>> {
        let secret_bytes = self.secret.to_bytes();
        let public_bytes = self.public_bytes();

        let key = EcPrivateKey {
            private_key: &secret_bytes,
            parameters: Some(EcParameters::NamedCurve(OID_SM2_CURVE)),
            public_key: Some(&public_bytes),
        };
        key.to_der().map_err(|e| PkiError::KeyGeneration {
            entity: entity.to_string(),
            reason: format!("Failed to encode private key: {}", e),
        })
    }

    /// Load a keypair from SEC1 `ECPrivateKey` DER.
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_sec1_der(der)
            .map_err(|e| PkiError::PemError(format!("Invalid SM2 private key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    /// Sign a message with SM2 over SM3 and return the DER signature.
    pub fn sign(&self, entity: &str, message: &[u8]) -> Result<Vec<u8>> {
        let signing_err = |reason: String| PkiError::Signing {
            entity: entity.to_string(),
            reason,
        };

        let signing_key = SigningKey::new(DEFAULT_DIST_ID, &self.secret)
            .map_err(|e| signing_err(format!("Invalid signing key: {}", e)))?;
        let signature: Signature = signing_key
            .try_sign(message)
            .map_err(|e| signing_err(format!("SM2 signature failed: {}", e)))?;

        let bytes = signature.to_bytes();
        let value = SignatureValue {
            r: UintRef::new(&bytes[..32]).map_err(|e| signing_err(e.to_string()))?,
            s: UintRef::new(&bytes[32..]).map_err(|e| signing_err(e.to_string()))?,
        };
        value
            .to_der()
            .map_err(|e| signing_err(format!("Failed to encode signature: {}", e)))
    }
}

/// Get a public key as an uncompressed SEC1 point.
pub fn public_key_bytes(public: &PublicKey) -> Vec<u8> {
    public.to_encoded_point(false).as_bytes().to_vec()
}

/// Verify a DER-encoded SM2 signature over `message`.
///
/// Failures are reported against `entity`, the owner of the signature.
pub fn verify_signature(
    entity: &str,
    public: &PublicKey,
    message: &[u8],
    der_signature: &[u8],
) -> Result<()> {
    let invalid = |reason: String| PkiError::CertificateParse {
        entity: entity.to_string(),
        reason,
    };

    let value = SignatureValue::from_der(der_signature)
        .map_err(|e| invalid(format!("Malformed signature: {}", e)))?;

    let mut raw = [0u8; SIGNATURE_LEN];
    for (half, scalar) in [value.r, value.s].iter().enumerate() {
        let bytes = scalar.as_bytes();
        if bytes.len() > 32 {
            return Err(invalid("Signature scalar too long".to_string()));
        }
        let end = (half + 1) * 32;
        raw[end - bytes.len()..end].copy_from_slice(bytes);
    }

    let signature =
        Signature::from_slice(&raw).map_err(|e| invalid(format!("Invalid signature: {}", e)))?;
    let verifying_key = VerifyingKey::new(DEFAULT_DIST_ID, *public)
        .map_err(|e| invalid(format!("Invalid verifying key: {}", e)))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|e| invalid(format!("Signature verification failed: {}", e)))
}

/// Generate a new SM2 keypair from a cryptographically secure RNG.
///
/// Uses the fallible `try_fill_bytes` so an exhausted entropy source
/// surfaces as [`PkiError::KeyGeneration`] instead of a panic.
///
/// # Example
///
/// ```
/// use gm_testpki::crypto::sm2::generate_sm2_keypair;
///
/// let keypair = generate_sm2_keypair("Org1", &mut rand::rngs::OsRng).unwrap();
/// assert_eq!(keypair.public_bytes().len(), 65);
/// ```
pub fn generate_sm2_keypair<R: RngCore + CryptoRng>(entity: &str, rng: &mut R) -> Result<KeyPair> {
    let mut bytes = [0u8; 32];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| PkiError::KeyGeneration {
            entity: entity.to_string(),
            reason: format!("Randomness source failed: {}", e),
        })?;

    let secret = SecretKey::from_slice(&bytes).map_err(|_| PkiError::KeyGeneration {
        entity: entity.to_string(),
        reason: "Drawn scalar is not a valid SM2 private key".to_string(),
    });
    bytes.fill(0);

    Ok(KeyPair::from_secret(secret?))
}

/// Source of fresh keypairs for the hierarchy orchestrator.
pub trait KeyGenerator {
    fn generate(&mut self, entity: &str) -> Result<KeyPair>;
}

/// Key generator backed by the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    fn generate(&mut self, entity: &str) -> Result<KeyPair> {
        generate_sm2_keypair(entity, &mut OsRng)
    }
}
