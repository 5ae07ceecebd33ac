//! Generator configuration.

use crate::error::{PkiError, Result};
use std::path::PathBuf;

/// Shape of the hierarchy to generate and where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Number of root organizations.
    pub orgs: usize,
    /// Child authorities under each authority that has children.
    pub child_orgs: usize,
    /// Server leaves under every authority.
    pub servers: usize,
    /// Client leaves under every authority.
    pub clients: usize,
    /// Levels of child authorities below each root.
    pub depth: usize,
    /// Directory the PEM files are written to.
    pub output_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            orgs: 2,
            child_orgs: 2,
            servers: 2,
            clients: 1,
            depth: 1,
            output_dir: PathBuf::from("."),
        }
    }
}

impl GeneratorConfig {
    /// Reject shapes that cannot produce a hierarchy.
    pub fn validate(&self) -> Result<()> {
        if self.orgs == 0 {
            return Err(PkiError::InvalidConfig(
                "At least one organization is required".to_string(),
            ));
        }
        if self.child_orgs > 0 && self.depth == 0 {
            return Err(PkiError::InvalidConfig(
                "Child organizations require a depth of at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of authorities (roots and children) the config describes.
    pub fn authority_count(&self) -> usize {
        let mut level = self.orgs;
        let mut total = level;
        if self.child_orgs > 0 {
            for _ in 0..self.depth {
                level *= self.child_orgs;
                total += level;
            }
        }
        total
    }

    /// Number of server and client leaves the config describes.
    pub fn leaf_count(&self) -> usize {
        self.authority_count() * (self.servers + self.clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.orgs, 2);
        assert_eq!(config.child_orgs, 2);
        assert_eq!(config.servers, 2);
        assert_eq!(config.clients, 1);
        assert_eq!(config.depth, 1);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_orgs_rejected() {
        let config = GeneratorConfig {
            orgs: 0,
            ..GeneratorConfig::default()
        };
        assert!(matches!(config.validate(), Err(PkiError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_depth_with_children_rejected() {
        let config = GeneratorConfig {
            depth: 0,
            ..GeneratorConfig::default()
        };
        assert!(config.validate().is_err());

        let flat = GeneratorConfig {
            depth: 0,
            child_orgs: 0,
            ..GeneratorConfig::default()
        };
        assert!(flat.validate().is_ok());
    }

    #[test]
    fn test_counts() {
        let config = GeneratorConfig::default();
        assert_eq!(config.authority_count(), 2 + 4);
        assert_eq!(config.leaf_count(), 6 * 3);

        let deep = GeneratorConfig {
            orgs: 1,
            child_orgs: 2,
            depth: 2,
            ..GeneratorConfig::default()
        };
        assert_eq!(deep.authority_count(), 1 + 2 + 4);

        let flat = GeneratorConfig {
            orgs: 1,
            child_orgs: 0,
            servers: 1,
            clients: 0,
            ..GeneratorConfig::default()
        };
        assert_eq!(flat.authority_count(), 1);
        assert_eq!(flat.leaf_count(), 1);
    }
}
