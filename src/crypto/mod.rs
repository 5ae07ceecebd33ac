//! Cryptographic operations module.
//!
//! SM2 key generation, signing and verification over SM3 digests.
//!
//! # Example
//!
//! ```rust
//! use gm_testpki::crypto::sm2::{generate_sm2_keypair, verify_signature};
//!
//! # fn example() -> gm_testpki::error::Result<()> {
//! let keypair = generate_sm2_keypair("Org1", &mut rand::rngs::OsRng)?;
//!
//! let signature = keypair.sign("Org1", b"message")?;
//! verify_signature("Org1", &keypair.public, b"message", &signature)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod sm2;
