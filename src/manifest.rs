//! TOML manifest that declares groups, their fragments and the commands they own.
//!
//! ```toml
//! [groups.git]
//! modules = ["common/helpers.sh", "vcs/git.sh"]
//! commands = ["gst", "gco"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::ManifestError;
use crate::registry::{CommandRegistry, FragmentCatalog, GroupId, ModuleDescriptor, ModuleRegistry};

/// Manifest shipped with the crate, describing the fragments under `fragments/`.
pub const DEFAULT_MANIFEST: &str = include_str!("../fragments/manifest.toml");

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    groups: BTreeMap<String, GroupSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSpec {
    #[serde(default)]
    modules: Vec<String>,
    #[serde(default)]
    commands: Vec<String>,
}

/// Build a catalog from manifest text.
pub fn parse_manifest(text: &str) -> Result<FragmentCatalog, ManifestError> {
    let manifest: Manifest = toml::from_str(text)?;
    build_catalog(manifest)
}

/// Read and build a catalog from a manifest file.
pub fn load_manifest(path: &Path) -> Result<FragmentCatalog, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text)
}

/// Catalog for the embedded [`DEFAULT_MANIFEST`].
pub fn default_catalog() -> Result<FragmentCatalog, ManifestError> {
    parse_manifest(DEFAULT_MANIFEST)
}

fn build_catalog(manifest: Manifest) -> Result<FragmentCatalog, ManifestError> {
    let mut groups = HashMap::new();
    let mut commands: HashMap<String, GroupId> = HashMap::new();

    for (name, spec) in manifest.groups {
        let group = GroupId::new(name);

        let modules = spec
            .modules
            .iter()
            .map(|module| {
                ModuleDescriptor::parse(group.clone(), module).ok_or_else(|| {
                    ManifestError::InvalidModule {
                        group: group.to_string(),
                        module: module.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for command in spec.commands {
            if let Some(first) = commands.get(&command) {
                return Err(ManifestError::DuplicateCommand {
                    command,
                    first: first.to_string(),
                    second: group.to_string(),
                });
            }
            commands.insert(command, group.clone());
        }

        // Groups without modules stay out of the module table; their commands
        // fall through to "not found" after the (empty) ensure.
        if !modules.is_empty() {
            groups.insert(group, modules);
        }
    }

    Ok(FragmentCatalog::new(
        ModuleRegistry::new(groups),
        CommandRegistry::new(commands),
    ))
}
