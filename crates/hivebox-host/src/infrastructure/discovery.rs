//! Filesystem discovery of extension modules.
//!
//! Extension modules are dynamic libraries named `ext.<name>.<dll-ext>` in
//! the host's working directory, where `<dll-ext>` is the platform's dynamic
//! library extension (`so`, `dll`, or `dylib`).  The friendly name is the
//! file name with the `ext.` prefix and the extension stripped:
//! `ext.broadcast.so` → `broadcast`.
//!
//! Matches are returned in lexical file-name order so that slot registration
//! (and therefore dispatch order within a round) is reproducible across runs,
//! instead of depending on directory-enumeration order.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Prefix marking a file as an extension module.
const MODULE_PREFIX: &str = "ext.";

/// Error type for module discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The extensions directory could not be enumerated.
    #[error("failed to scan extensions directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One discovered extension module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    /// Friendly name derived from the file name (prefix and extension
    /// stripped).
    pub name: String,
    /// Full path to the module file.
    pub path: PathBuf,
}

/// Scans `dir` for extension modules.
///
/// # Errors
///
/// Returns [`DiscoveryError::Scan`] if the directory cannot be read.  A file
/// that merely fails the naming convention is skipped, not an error.
pub fn discover_modules(dir: &Path) -> Result<Vec<DiscoveredModule>, DiscoveryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut modules = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if let Some(name) = module_name(&path) {
            modules.push(DiscoveredModule { name, path });
        }
    }

    modules.sort_by(|a, b| a.path.cmp(&b.path));
    info!(dir = %dir.display(), count = modules.len(), "discovered extension modules");
    Ok(modules)
}

/// Derives the friendly name, or `None` if `path` is not an extension module.
fn module_name(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let extension = path.extension()?.to_str()?;
    if extension != std::env::consts::DLL_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let name = stem.strip_prefix(MODULE_PREFIX)?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dll(name: &str) -> String {
        format!("{name}.{}", std::env::consts::DLL_EXTENSION)
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hivebox_discovery_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_discovers_matching_modules_in_lexical_order() {
        let dir = temp_dir();
        for file in [dll("ext.zeta"), dll("ext.alpha"), dll("ext.mid")] {
            std::fs::write(dir.join(file), b"").unwrap();
        }

        let modules = discover_modules(&dir).unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_skips_files_without_prefix_or_wrong_extension() {
        let dir = temp_dir();
        std::fs::write(dir.join(dll("extension.alpha")), b"").unwrap();
        std::fs::write(dir.join(dll("alpha")), b"").unwrap();
        std::fs::write(dir.join("ext.alpha.txt"), b"").unwrap();
        std::fs::write(dir.join(dll("ext.real")), b"").unwrap();

        let modules = discover_modules(&dir).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "real");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_or_prefix_only_name_is_skipped() {
        let dir = temp_dir();
        // Stem "ext." strips to an empty name; stem "ext" has no prefix.
        std::fs::write(dir.join(dll("ext.")), b"").unwrap();
        std::fs::write(dir.join(dll("ext")), b"").unwrap();

        let modules = discover_modules(&dir).unwrap();
        assert!(modules.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_directory_surfaces_scan_error() {
        let dir = PathBuf::from("/nonexistent/hivebox/extensions");
        let result = discover_modules(&dir);
        assert!(matches!(result, Err(DiscoveryError::Scan { .. })));
    }
}
