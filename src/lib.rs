//! gm-testpki: SM2/SM3 test PKI generator
//!
//! This library builds a hierarchy of certificate authorities and leaf
//! certificates signed with the Chinese national algorithms:
//!
//! - SM2 key pairs for every entity
//! - Root organizations, nested child authorities, server and client leaves
//! - Conventional certificate templates translated into SM2 certificates
//! - PEM output, one key file and one certificate file per entity
//!
//! # Architecture
//!
//! Certificates are described by a conventional
//! [`CertificateTemplate`](cert::template::CertificateTemplate), translated
//! field by field into an [`Sm2Certificate`](cert::sm2cert::Sm2Certificate)
//! and signed with the parent authority's key. The orchestrator in
//! [`hierarchy`] plans the tree up front and walks it, collecting
//! per-entity failures instead of aborting.
//!
//! # Example
//!
//! ```rust,no_run
//! use gm_testpki::config::GeneratorConfig;
//! use gm_testpki::error::Result;
//! use gm_testpki::hierarchy::generate;
//!
//! fn example() -> Result<()> {
//!     let report = generate(&GeneratorConfig::default())?;
//!     println!("Issued {} certificates", report.issued.len());
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hierarchy;
pub mod storage;

// Re-export commonly used types
pub use config::GeneratorConfig;
pub use error::{PkiError, Result};
