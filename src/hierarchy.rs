//! Hierarchy orchestration.
//!
//! [`plan`] lays the whole hierarchy out as a tree of [`PendingEntity`]
//! nodes; [`generate_hierarchy`] walks that tree depth-first, issuing each
//! entity with its parent authority as signer. Generation is best-effort:
//! an entity that fails is logged and recorded, its descendants are
//! reported as [`PkiError::SignerUnavailable`], and the walk moves on.

use crate::cert::builder::{build_template, Role};
use crate::cert::sm2cert::Sm2Certificate;
use crate::cert::translate::translate_to_sm2;
use crate::cert::x509_signing::create_certificate;
use crate::config::GeneratorConfig;
use crate::crypto::sm2::{KeyGenerator, KeyPair, OsKeyGenerator};
use crate::error::{PkiError, Result};
use crate::storage::pem_files::{write_certificate, write_private_key};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where an entity sits in the hierarchy, for log output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    /// 1-based organization index.
    pub org: usize,
    /// 1-based child index at each level below the root.
    pub children: Vec<usize>,
    pub server: Option<usize>,
    pub client: Option<usize>,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "org={}", self.org)?;
        if !self.children.is_empty() {
            let path: Vec<String> = self.children.iter().map(|c| c.to_string()).collect();
            write!(f, " child={}", path.join("."))?;
        }
        if let Some(server) = self.server {
            write!(f, " server={}", server)?;
        }
        if let Some(client) = self.client {
            write!(f, " client={}", client)?;
        }
        Ok(())
    }
}

/// An entity waiting to be issued, with everything it signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntity {
    pub name: String,
    pub role: Role,
    pub position: Position,
    /// Leaves first, then child authorities, in issuance order.
    pub children: Vec<PendingEntity>,
}

impl PendingEntity {
    /// Names of this entity and all its descendants, in issuance order.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for child in &self.children {
            names.extend(child.names());
        }
        names
    }
}

/// A signer: key pair plus its signed certificate.
#[derive(Debug, Clone)]
pub struct Authority {
    pub keypair: KeyPair,
    pub certificate: Sm2Certificate,
}

/// An entity whose files were written.
#[derive(Debug, Clone)]
pub struct IssuedEntity {
    pub name: String,
    pub role: Role,
    pub certificate: Sm2Certificate,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub issued: Vec<IssuedEntity>,
    pub failures: Vec<PkiError>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Issued entities of `role`.
    pub fn issued_with_role(&self, role: Role) -> impl Iterator<Item = &IssuedEntity> {
        self.issued.iter().filter(move |entity| entity.role == role)
    }

    /// Names of every entity that was not produced.
    pub fn failed_entities(&self) -> Vec<&str> {
        self.failures.iter().filter_map(PkiError::entity).collect()
    }
}

/// Lay out the hierarchy described by `config`, one tree per organization.
///
/// # Example
///
/// ```
/// use gm_testpki::config::GeneratorConfig;
/// use gm_testpki::hierarchy::plan;
///
/// let config = GeneratorConfig { orgs: 1, child_orgs: 0, servers: 1, clients: 0, ..Default::default() };
/// let roots = plan(&config);
/// assert_eq!(roots[0].names(), vec!["Org1", "Org1-server1"]);
/// ```
pub fn plan(config: &GeneratorConfig) -> Vec<PendingEntity> {
    (1..=config.orgs)
        .map(|org| {
            let position = Position {
                org,
                ..Position::default()
            };
            plan_authority(format!("Org{}", org), Role::RootCa, position, config.depth, config)
        })
        .collect()
}

fn plan_authority(
    name: String,
    role: Role,
    position: Position,
    levels_below: usize,
    config: &GeneratorConfig,
) -> PendingEntity {
    let mut children = Vec::new();

    for server in 1..=config.servers {
        children.push(PendingEntity {
            name: format!("{}-server{}", name, server),
            role: Role::Server,
            position: Position {
                server: Some(server),
                ..position.clone()
            },
            children: Vec::new(),
        });
    }

    for client in 1..=config.clients {
        children.push(PendingEntity {
            name: format!("{}-client{}", name, client),
            role: Role::Client,
            position: Position {
                client: Some(client),
                ..position.clone()
            },
            children: Vec::new(),
        });
    }

    if levels_below > 0 {
        for child in 1..=config.child_orgs {
            let mut child_position = position.clone();
            child_position.children.push(child);
            children.push(plan_authority(
                format!("{}-child{}", name, child),
                Role::IntermediateCa,
                child_position,
                levels_below - 1,
                config,
            ));
        }
    }

    PendingEntity {
        name,
        role,
        position,
        children,
    }
}

/// Generate the hierarchy with OS randomness.
pub fn generate(config: &GeneratorConfig) -> Result<GenerationReport> {
    generate_hierarchy(config, &mut OsKeyGenerator, &mut OsRng)
}

/// Generate and persist every entity of the hierarchy described by `config`.
///
/// Returns `Err` only for an invalid config or an unusable output
/// directory; per-entity failures are collected in the report.
pub fn generate_hierarchy<K, R>(
    config: &GeneratorConfig,
    key_gen: &mut K,
    rng: &mut R,
) -> Result<GenerationReport>
where
    K: KeyGenerator,
    R: RngCore + CryptoRng,
{
    config.validate()?;

    fs::create_dir_all(&config.output_dir).map_err(|source| PkiError::Io {
        entity: config.output_dir.display().to_string(),
        source,
    })?;

    info!(
        orgs = config.orgs,
        child_orgs = config.child_orgs,
        servers = config.servers,
        clients = config.clients,
        depth = config.depth,
        output_dir = %config.output_dir.display(),
        "Generating certificate hierarchy"
    );

    let mut walker = Walker {
        dir: &config.output_dir,
        key_gen,
        rng,
        report: GenerationReport::default(),
    };
    for root in plan(config) {
        walker.walk(&root, Issuer::SelfSigned);
    }

    let report = walker.report;
    info!(
        issued = report.issued.len(),
        failed = report.failures.len(),
        "Hierarchy generation finished"
    );
    Ok(report)
}

enum Issuer<'a> {
    SelfSigned,
    Authority(&'a Authority),
    Unavailable(&'a str),
}

struct Walker<'a, K, R> {
    dir: &'a Path,
    key_gen: &'a mut K,
    rng: &'a mut R,
    report: GenerationReport,
}

impl<K, R> Walker<'_, K, R>
where
    K: KeyGenerator,
    R: RngCore + CryptoRng,
{
    fn walk(&mut self, node: &PendingEntity, issuer: Issuer<'_>) {
        let result = match issuer {
            Issuer::SelfSigned => self.issue(node, None),
            Issuer::Authority(parent) => self.issue(node, Some(parent)),
            Issuer::Unavailable(signer) => Err(PkiError::SignerUnavailable {
                entity: node.name.clone(),
                signer: signer.to_string(),
            }),
        };

        match result {
            Ok((keypair, issued)) => {
                info!(
                    entity = %node.name,
                    role = %node.role,
                    position = %node.position,
                    "Issued certificate"
                );
                // Leaves never sign, so only authorities keep their key.
                let authority = node.role.is_authority().then(|| Authority {
                    keypair,
                    certificate: issued.certificate.clone(),
                });
                self.report.issued.push(issued);

                if let Some(authority) = &authority {
                    for child in &node.children {
                        self.walk(child, Issuer::Authority(authority));
                    }
                }
            }
            Err(e) => {
                match &e {
                    PkiError::SignerUnavailable { .. } => warn!(
                        entity = %node.name,
                        position = %node.position,
                        error = %e,
                        "Skipping entity"
                    ),
                    _ => error!(
                        entity = %node.name,
                        role = %node.role,
                        position = %node.position,
                        error = %e,
                        "Failed to issue certificate"
                    ),
                }
                self.report.failures.push(e);

                for child in &node.children {
                    self.walk(child, Issuer::Unavailable(&node.name));
                }
            }
        }
    }

    fn issue(
        &mut self,
        node: &PendingEntity,
        parent: Option<&Authority>,
    ) -> Result<(KeyPair, IssuedEntity)> {
        let keypair = self.key_gen.generate(&node.name)?;
        let template = translate_to_sm2(&build_template(&node.name, node.role, &mut *self.rng)?);

        let (der, certificate) = match parent {
            Some(parent) => create_certificate(
                &node.name,
                &template,
                &parent.certificate,
                &keypair.public,
                &parent.keypair,
            )?,
            None => create_certificate(&node.name, &template, &template, &keypair.public, &keypair)?,
        };
        debug!(
            entity = %node.name,
            serial = %hex::encode(&certificate.serial_number),
            "Signed certificate"
        );

        let cert_path = write_certificate(self.dir, &node.name, &der)?;
        // The key goes last; without it the certificate is removed again.
        let key_path = match write_private_key(self.dir, &node.name, &keypair) {
            Ok(path) => path,
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&cert_path) {
                    warn!(path = %cert_path.display(), error = %remove_err, "Failed to remove certificate");
                }
                return Err(e);
            }
        };

        let issued = IssuedEntity {
            name: node.name.clone(),
            role: node.role,
            certificate,
            cert_path,
            key_path,
        };
        Ok((keypair, issued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sm2::generate_sm2_keypair;
    use tempfile::TempDir;

    struct FailFor(&'static str);

    impl KeyGenerator for FailFor {
        fn generate(&mut self, entity: &str) -> Result<KeyPair> {
            if entity == self.0 {
                return Err(PkiError::KeyGeneration {
                    entity: entity.to_string(),
                    reason: "injected".to_string(),
                });
            }
            generate_sm2_keypair(entity, &mut OsRng)
        }
    }

    fn config(dir: &Path, orgs: usize, child_orgs: usize, servers: usize, clients: usize) -> GeneratorConfig {
        GeneratorConfig {
            orgs,
            child_orgs,
            servers,
            clients,
            depth: 1,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_plan_default_order() {
        let roots = plan(&GeneratorConfig::default());
        assert_eq!(roots.len(), 2);
        assert_eq!(
            roots[0].names(),
            vec![
                "Org1",
                "Org1-server1",
                "Org1-server2",
                "Org1-client1",
                "Org1-child1",
                "Org1-child1-server1",
                "Org1-child1-server2",
                "Org1-child1-client1",
                "Org1-child2",
                "Org1-child2-server1",
                "Org1-child2-server2",
                "Org1-child2-client1",
            ]
        );
        assert_eq!(roots[1].name, "Org2");
    }

    #[test]
    fn test_plan_roles_and_positions() {
        let roots = plan(&GeneratorConfig::default());
        let root = &roots[1];
        assert_eq!(root.role, Role::RootCa);

        let child = root
            .children
            .iter()
            .find(|c| c.name == "Org2-child2")
            .unwrap();
        assert_eq!(child.role, Role::IntermediateCa);
        assert_eq!(child.position.to_string(), "org=2 child=2");

        let client = &child.children[2];
        assert_eq!(client.role, Role::Client);
        assert_eq!(client.position.to_string(), "org=2 child=2 client=1");
    }

    #[test]
    fn test_plan_only_authorities_sign() {
        let config = GeneratorConfig {
            depth: 2,
            ..GeneratorConfig::default()
        };

        fn check(node: &PendingEntity) {
            if !node.role.is_authority() {
                assert!(node.children.is_empty(), "{} has children", node.name);
            }
            node.children.iter().for_each(check);
        }
        plan(&config).iter().for_each(check);
    }

    #[test]
    fn test_plan_depth() {
        let config = GeneratorConfig {
            orgs: 1,
            child_orgs: 1,
            servers: 0,
            clients: 0,
            depth: 3,
            ..GeneratorConfig::default()
        };
        assert_eq!(
            plan(&config)[0].names(),
            vec![
                "Org1",
                "Org1-child1",
                "Org1-child1-child1",
                "Org1-child1-child1-child1"
            ]
        );
    }

    #[test]
    fn test_plan_names_are_unique() {
        let config = GeneratorConfig {
            depth: 2,
            ..GeneratorConfig::default()
        };
        let mut names: Vec<String> = plan(&config).iter().flat_map(|r| r.names()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, config.authority_count() + config.leaf_count());
    }

    #[test]
    fn test_generate_small_hierarchy() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), 1, 1, 1, 1);

        let report = generate_hierarchy(&config, &mut OsKeyGenerator, &mut OsRng).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.issued.len(), 6);
        assert_eq!(report.issued_with_role(Role::IntermediateCa).count(), 1);
        for entity in &report.issued {
            assert!(entity.cert_path.exists());
            assert!(entity.key_path.exists());
        }
    }

    #[test]
    fn test_failed_root_skips_descendants() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), 2, 1, 1, 0);

        let report = generate_hierarchy(&config, &mut FailFor("Org1"), &mut OsRng).unwrap();

        assert_eq!(
            report.failed_entities(),
            vec!["Org1", "Org1-server1", "Org1-child1", "Org1-child1-server1"]
        );
        assert!(matches!(report.failures[0], PkiError::KeyGeneration { .. }));
        assert!(report.failures[1..]
            .iter()
            .all(|e| matches!(e, PkiError::SignerUnavailable { .. })));
        assert_eq!(report.issued.len(), 4);
        assert!(!temp_dir.path().join("Org1-cert.pem").exists());
        assert!(temp_dir.path().join("Org2-cert.pem").exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(temp_dir.path(), 0, 1, 1, 1);

        let result = generate_hierarchy(&config, &mut OsKeyGenerator, &mut OsRng);
        assert!(matches!(result, Err(PkiError::InvalidConfig(_))));
    }
}
