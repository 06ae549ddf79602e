//! Reference resolution.
//!
//! Referenced modules use the same binary format this tool emits. Every
//! `-r` path must load and validate before analysis starts; there is no
//! partial success.

use std::fs;

use tracing::debug;

use intacc_core::{Options, ReferenceError};

use crate::metadata::ModuleMetadata;

/// The loaded referenced modules, in command-line order.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    modules: Vec<ModuleMetadata>,
}

impl ReferenceSet {
    /// Build a set from already-decoded modules, preserving order.
    pub fn from_modules(modules: Vec<ModuleMetadata>) -> Self {
        Self { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleMetadata> {
        self.modules.iter()
    }

    /// Look up an exported type by name across all references; bare names
    /// match the tail of a qualified export on a dot boundary.
    ///
    /// Returns the owning module and the match, visible to the importer or
    /// not; the caller distinguishes unknown from inaccessible.
    pub fn find_type(&self, name: &str) -> Option<(&ModuleMetadata, &crate::metadata::ExportedType)> {
        self.modules.iter().find_map(|module| {
            module
                .types
                .iter()
                .find(|ty| ty.name == name || is_suffix_match(&ty.name, name))
                .map(|ty| (module, ty))
        })
    }
}

/// Whether `name` matches the tail of qualified `full` on a dot boundary.
fn is_suffix_match(full: &str, name: &str) -> bool {
    full.len() > name.len()
        && full.ends_with(name)
        && full.as_bytes()[full.len() - name.len() - 1] == b'.'
}

/// Load and validate every referenced module named by `options`.
pub fn resolve_references(options: &Options) -> Result<ReferenceSet, ReferenceError> {
    let mut modules = Vec::with_capacity(options.references.len());
    for path in &options.references {
        let bytes = fs::read(path).map_err(|source| ReferenceError::Io {
            path: path.clone(),
            source,
        })?;
        let module = ModuleMetadata::decode(&bytes).map_err(|error| ReferenceError::Format {
            path: path.clone(),
            detail: error.to_string(),
        })?;
        debug!(path = %path.display(), module = %module.name, "resolved reference");
        modules.push(module);
    }
    Ok(ReferenceSet { modules })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ExportedType, ModuleFlags};
    use intacc_core::{Accessibility, TargetKind, TypeKind};
    use std::path::PathBuf;

    fn library() -> ModuleMetadata {
        ModuleMetadata {
            name: "Widgets".to_string(),
            target: TargetKind::Library,
            flags: ModuleFlags::empty(),
            grants: vec!["Consumer".to_string()],
            defines: vec![],
            types: vec![ExportedType {
                name: "Acme.Widget".to_string(),
                kind: TypeKind::Class,
                accessibility: Accessibility::Internal,
                span: None,
            }],
        }
    }

    fn options_with_refs(references: Vec<PathBuf>) -> Options {
        let mut options = Options::new("out.iacm", vec![PathBuf::from("a.cs")]);
        options.references = references;
        options
    }

    #[test]
    fn loads_valid_references_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.iacm");
        std::fs::write(&path, library().encode()).unwrap();

        let set = resolve_references(&options_with_refs(vec![path])).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().name, "Widgets");
    }

    #[test]
    fn missing_reference_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.iacm");

        let error = resolve_references(&options_with_refs(vec![missing.clone()])).unwrap_err();
        match error {
            ReferenceError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_reference_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.iacm");
        std::fs::write(&path, b"not a module").unwrap();

        let error = resolve_references(&options_with_refs(vec![path])).unwrap_err();
        assert!(matches!(error, ReferenceError::Format { .. }));
    }

    #[test]
    fn find_type_matches_qualified_and_bare_names() {
        let set = ReferenceSet::from_modules(vec![library()]);
        assert!(set.find_type("Acme.Widget").is_some());
        assert!(set.find_type("Widget").is_some());
        assert!(set.find_type("idget").is_none());
        assert!(set.find_type("Gadget").is_none());
    }
}
