//! Key and certificate storage module.
//!
//! Generated material is persisted as plain PEM files, one key and one
//! certificate per entity.

pub mod pem_files;
