//! Error types for the test-PKI generator.
//!
//! Every per-entity failure carries the name of the entity being generated
//! so the orchestrator can report which part of the hierarchy is missing.

use thiserror::Error;

/// The main error type for certificate hierarchy generation.
#[derive(Error, Debug)]
pub enum PkiError {
    /// Randomness was unavailable or the drawn scalar was not a valid SM2 key
    #[error("Key generation failed for {entity}: {reason}")]
    KeyGeneration { entity: String, reason: String },

    /// TBS encoding or the SM2 signature operation failed
    #[error("Signing failed for {entity}: {reason}")]
    Signing { entity: String, reason: String },

    /// Freshly produced (or loaded) DER could not be parsed back
    #[error("Certificate parse error for {entity}: {reason}")]
    CertificateParse { entity: String, reason: String },

    /// Filesystem failure while persisting key material
    #[error("I/O error for {entity}: {source}")]
    Io {
        entity: String,
        #[source]
        source: std::io::Error,
    },

    /// The authority that should sign this entity was never produced
    #[error("No signer available for {entity}: {signer} failed earlier")]
    SignerUnavailable { entity: String, signer: String },

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Generator parameters out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PkiError {
    /// Name of the entity this error belongs to, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            PkiError::KeyGeneration { entity, .. }
            | PkiError::Signing { entity, .. }
            | PkiError::CertificateParse { entity, .. }
            | PkiError::Io { entity, .. }
            | PkiError::SignerUnavailable { entity, .. } => Some(entity),
            PkiError::PemError(_) | PkiError::InvalidConfig(_) => None,
        }
    }
}

/// A specialized Result type for generator operations.
pub type Result<T> = std::result::Result<T, PkiError>;
