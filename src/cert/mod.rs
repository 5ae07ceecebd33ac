//! Certificate generation module.
//!
//! Templates are built per role, translated into the SM2 representation
//! and signed into X.509 DER.

pub mod builder;
pub mod extensions;
pub mod name;
pub mod sm2cert;
pub mod template;
pub mod translate;
pub mod x509_signing;
