//! Accessibility rewriting via grant injection.
//!
//! The tool never widens a declaration's accessibility. Instead it injects
//! assembly-scope `InternalsVisibleTo` grants for the configured assembly
//! names, which lets those assemblies see every internal declaration while
//! the source semantics stay untouched.

use std::collections::BTreeSet;

use bumpalo::Bump;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use intacc_core::{Accessibility, Options};
use intacc_parser::ast::{Item, TypeDecl};

use crate::loader::SourceUnit;

/// Display path of the fabricated grant unit.
pub const GRANT_UNIT_PATH: &str = "<grants>";

/// Which assemblies may see each non-public declaration.
///
/// Keys are qualified declaration names (`Namespace.Type` or
/// `Namespace.Type.Member`); values are the granted assembly names, sorted.
#[derive(Debug, Default)]
pub struct GrantTable {
    entries: FxHashMap<String, BTreeSet<String>>,
}

impl GrantTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `assembly` has been granted access to `declaration`.
    pub fn is_granted(&self, declaration: &str, assembly: &str) -> bool {
        self.entries
            .get(declaration)
            .is_some_and(|grants| grants.contains(assembly))
    }

    /// The sorted grant set for `declaration`, empty when it is public.
    pub fn grants_for(&self, declaration: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(declaration)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    fn record(&mut self, declaration: String, grants: &BTreeSet<String>) {
        self.entries
            .entry(declaration)
            .or_default()
            .extend(grants.iter().cloned());
    }
}

/// Classify every declaration whose effective accessibility is narrower
/// than public and map it to the granted assembly-name set.
pub fn scan_grants(units: &[SourceUnit<'_>], names: &[String]) -> GrantTable {
    let grants: BTreeSet<String> = names.iter().cloned().collect();
    let mut table = GrantTable::default();

    for unit in units {
        for item in unit.unit.items() {
            scan_item(item, "", &grants, &mut table);
        }
    }
    table
}

fn scan_item(item: &Item<'_>, prefix: &str, grants: &BTreeSet<String>, table: &mut GrantTable) {
    match item {
        Item::Namespace(ns) => {
            let prefix = join(prefix, &ns.name.to_string());
            for inner in ns.items {
                scan_item(inner, &prefix, grants, table);
            }
        }
        Item::Type(decl) => {
            scan_type(decl, prefix, decl.effective_accessibility(), grants, table);
        }
        _ => {}
    }
}

fn scan_type(
    decl: &TypeDecl<'_>,
    prefix: &str,
    effective: Accessibility,
    grants: &BTreeSet<String>,
    table: &mut GrantTable,
) {
    let qualified = join(prefix, decl.name.text);

    if effective.is_narrower_than_public() {
        table.record(qualified.clone(), grants);
    }

    for member in decl.members {
        let member_effective = member.effective_accessibility().constrained_by(effective);
        if member_effective.is_narrower_than_public() {
            table.record(join(&qualified, member.name.text), grants);
        }
    }

    for nested in decl.nested {
        let nested_effective = nested.effective_nested_accessibility(effective);
        scan_type(nested, &qualified, nested_effective, grants, table);
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Names already granted by `[assembly: InternalsVisibleTo("...")]` in the
/// given units, fabricated one included.
pub fn existing_grants(units: &[SourceUnit<'_>]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for unit in units {
        for attr in unit.unit.assembly_attrs() {
            if attr.is_internal_access_grant()
                && let Some(argument) = attr.argument
            {
                names.insert(argument.to_string());
            }
        }
    }
    names
}

/// Inject grants for the configured assembly names.
///
/// Scans the units into a [`GrantTable`] first; with no declaration
/// narrower than public there is nothing a grant could expose and the
/// input is returned unchanged. Otherwise builds the deduplicated, sorted
/// set of names from the options, subtracts names an author already
/// granted in source, and appends one synthetic unit carrying exactly one
/// grant attribute per remaining name. Input trees are never mutated; the
/// synthetic unit lives in the same arena.
///
/// Returns the units and the names actually injected, in emission order.
pub fn inject_grants<'ast>(
    mut units: Vec<SourceUnit<'ast>>,
    options: &Options,
    arena: &'ast Bump,
) -> (Vec<SourceUnit<'ast>>, Vec<String>) {
    let configured: FxHashSet<&String> = options.internal_access_names.iter().collect();
    if configured.is_empty() {
        return (units, Vec::new());
    }

    let table = scan_grants(&units, &options.internal_access_names);
    debug!(declarations = table.len(), "grant scan");
    if table.is_empty() {
        return (units, Vec::new());
    }

    let already = existing_grants(&units);
    let mut missing: Vec<String> = configured
        .into_iter()
        .filter(|name| !already.contains(name.as_str()))
        .cloned()
        .collect();
    missing.sort();

    if missing.is_empty() {
        return (units, Vec::new());
    }

    let mut text = String::from("using System.Runtime.CompilerServices;\n\n");
    for name in &missing {
        text.push_str(&format!("[assembly: InternalsVisibleTo(\"{name}\")]\n"));
    }
    debug!(count = missing.len(), "injecting internal access grants");

    let mut unit = SourceUnit::parse(GRANT_UNIT_PATH.to_string(), &text, options, arena);
    unit.synthetic = true;
    debug_assert!(unit.diagnostics.is_empty(), "grant unit must parse clean");
    units.push(unit);

    (units, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options_with_grants(names: &[&str]) -> Options {
        let mut options = Options::new(PathBuf::from("out.iacm"), vec![PathBuf::from("a.cs")]);
        options.internal_access_names = names.iter().map(|s| s.to_string()).collect();
        options
    }

    fn unit_from<'ast>(source: &str, arena: &'ast Bump) -> SourceUnit<'ast> {
        let options = options_with_grants(&[]);
        let unit = SourceUnit::parse("a.cs".to_string(), source, &options, arena);
        assert!(unit.diagnostics.is_empty(), "{:?}", unit.diagnostics);
        unit
    }

    #[test]
    fn scan_classifies_internal_declarations() {
        let arena = Bump::new();
        let source = r#"
            namespace Acme {
                public class Open {
                    private int hidden;
                }
                internal class Shut {
                    public int Exposed;
                }
            }
        "#;
        let units = vec![unit_from(source, &arena)];
        let table = scan_grants(&units, &["Consumer".to_string()]);

        assert!(table.is_granted("Acme.Shut", "Consumer"));
        assert!(table.is_granted("Acme.Open.hidden", "Consumer"));
        // Public member of an internal type is capped at internal.
        assert!(table.is_granted("Acme.Shut.Exposed", "Consumer"));
        assert!(!table.is_granted("Acme.Open", "Consumer"));
        assert!(!table.is_granted("Acme.Shut", "Stranger"));
    }

    #[test]
    fn empty_grant_list_is_identity() {
        let arena = Bump::new();
        let units = vec![unit_from("internal class A { }", &arena)];
        let options = options_with_grants(&[]);
        let (units, injected) = inject_grants(units, &options, &arena);
        assert_eq!(units.len(), 1);
        assert!(injected.is_empty());
    }

    #[test]
    fn duplicates_collapse_to_one_grant() {
        let arena = Bump::new();
        let units = vec![unit_from("internal class A { }", &arena)];
        let options = options_with_grants(&["Consumer", "Consumer", "Other"]);
        let (units, injected) = inject_grants(units, &options, &arena);

        assert_eq!(injected, vec!["Consumer".to_string(), "Other".to_string()]);
        let synthetic = units.last().unwrap();
        assert!(synthetic.synthetic);
        assert_eq!(synthetic.path, GRANT_UNIT_PATH);
        assert_eq!(synthetic.unit.assembly_attrs().len(), 2);
    }

    #[test]
    fn all_public_sources_need_no_grants() {
        let arena = Bump::new();
        let units = vec![unit_from(
            "namespace N { public class A { public int X; } }",
            &arena,
        )];
        let options = options_with_grants(&["Consumer"]);
        let (units, injected) = inject_grants(units, &options, &arena);
        assert!(injected.is_empty());
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn existing_source_grant_is_not_duplicated() {
        let arena = Bump::new();
        let source = r#"
            [assembly: System.Runtime.CompilerServices.InternalsVisibleTo("Consumer")]
            internal class A { }
        "#;
        let units = vec![unit_from(source, &arena)];
        let options = options_with_grants(&["Consumer"]);
        let (units, injected) = inject_grants(units, &options, &arena);

        assert!(injected.is_empty());
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn injected_names_are_sorted() {
        let arena = Bump::new();
        let units = vec![unit_from("internal class A { }", &arena)];
        let options = options_with_grants(&["Zeta", "Alpha", "Mid"]);
        let (_, injected) = inject_grants(units, &options, &arena);
        assert_eq!(injected, vec!["Alpha", "Mid", "Zeta"]);
    }
}
