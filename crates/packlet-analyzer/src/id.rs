//! Module identifiers and specifier resolution.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Extension appended to relative specifiers that have none.
pub const DEFAULT_EXTENSION: &str = "js";

/// Canonical absolute path naming one source module.
///
/// Identifiers are compared by path only; two ids are the same module iff
/// their normalized paths are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create an identifier from a path, normalizing `.` and `..` lexically.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(normalize(path.as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Directory containing the module, used to resolve its relative imports.
    pub fn directory(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }

    /// String form used as the runtime lookup key.
    pub fn key(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ModuleId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Never touches the file system, so the result is the
/// same whether or not the file exists.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `..` above the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Whether a specifier is relative (`./x` or `../x`). Everything else is a
/// bare or package specifier and is not bundled.
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve a relative specifier against the importing module's directory.
///
/// Returns `None` for non-relative specifiers. When the resolved path has no
/// extension, [`DEFAULT_EXTENSION`] is appended.
pub fn resolve_specifier(specifier: &str, importer: &ModuleId) -> Option<ModuleId> {
    if !is_relative_specifier(specifier) {
        return None;
    }

    let resolved = normalize(&importer.directory().join(specifier));
    if resolved.extension().is_some() {
        return Some(ModuleId(resolved));
    }

    let mut with_extension = resolved.into_os_string();
    with_extension.push(".");
    with_extension.push(DEFAULT_EXTENSION);
    Some(ModuleId(PathBuf::from(with_extension)))
}
