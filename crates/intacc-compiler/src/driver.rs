//! Compilation driver.
//!
//! One driver per invocation. The state machine is strict:
//! `Assembled → Analyzed → (Emitted | Aborted)`; analysis runs once and
//! emission is attempted at most once. Ordinary problems travel through the
//! diagnostics channel and only error severity suppresses emission.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use intacc_core::{
    Diagnostic, Diagnostics, EmissionError, OptimizationLevel, Options, Span,
};
use intacc_parser::ast::{Item, TypeDecl};

use crate::loader::SourceUnit;
use crate::metadata::{ExportedType, ModuleFlags, ModuleMetadata};
use crate::references::ReferenceSet;
use crate::rewrite::existing_grants;

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Assembled,
    Analyzed,
    Emitted,
    Aborted,
}

impl DriverState {
    fn name(self) -> &'static str {
        match self {
            DriverState::Assembled => "assembled",
            DriverState::Analyzed => "analyzed",
            DriverState::Emitted => "emitted",
            DriverState::Aborted => "aborted",
        }
    }
}

/// A single compilation in flight.
pub struct Compilation<'opt, 'ast> {
    options: &'opt Options,
    units: Vec<SourceUnit<'ast>>,
    references: ReferenceSet,
    /// Grant names the rewriter injected, sorted.
    injected: Vec<String>,
    diagnostics: Diagnostics,
    state: DriverState,
}

impl<'opt, 'ast> Compilation<'opt, 'ast> {
    /// Assemble a compilation from its already-prepared parts.
    pub fn assemble(
        options: &'opt Options,
        units: Vec<SourceUnit<'ast>>,
        references: ReferenceSet,
        injected: Vec<String>,
    ) -> Self {
        Self {
            options,
            units,
            references,
            injected,
            diagnostics: Diagnostics::new(),
            state: DriverState::Assembled,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Consume the driver, keeping only its diagnostics.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Run all analysis checks, in their fixed order.
    pub fn analyze(&mut self) -> Result<&Diagnostics, EmissionError> {
        if self.state != DriverState::Assembled {
            return Err(EmissionError::WrongState {
                state: self.state.name(),
            });
        }

        self.collect_parse_diagnostics();
        self.check_unsafe();
        self.check_private_protected();
        self.check_duplicate_types();
        self.check_base_types();
        self.report_injected_grants();

        debug!(
            errors = self.diagnostics.error_count(),
            warnings = self.diagnostics.warning_count(),
            "analysis complete"
        );
        self.state = DriverState::Analyzed;
        Ok(&self.diagnostics)
    }

    /// Produce the module bytes, or `None` when errors abort emission.
    pub fn emit(&mut self) -> Result<Option<Vec<u8>>, EmissionError> {
        if self.state != DriverState::Analyzed {
            return Err(EmissionError::WrongState {
                state: self.state.name(),
            });
        }

        if self.diagnostics.has_errors() {
            self.state = DriverState::Aborted;
            return Ok(None);
        }

        let metadata = self.build_metadata();
        info!(
            module = %metadata.name,
            types = metadata.types.len(),
            grants = metadata.grants.len(),
            "emitting module"
        );
        self.state = DriverState::Emitted;
        Ok(Some(metadata.encode()))
    }

    // =========================================
    // Analysis checks
    // =========================================

    /// 1. Parse diagnostics carried by each unit, in input order.
    fn collect_parse_diagnostics(&mut self) {
        for unit in &self.units {
            self.diagnostics.extend(unit.diagnostics.iter().cloned());
        }
    }

    /// 2. `unsafe` constructs require the `--unsafe` flag.
    fn check_unsafe(&mut self) {
        if self.options.allow_unsafe {
            return;
        }
        let mut found = Vec::new();
        for unit in &self.units {
            for (name, decl) in named_types(unit) {
                if decl.contains_unsafe() {
                    found.push(Diagnostic::error(
                        format!("unsafe code in '{name}' requires the --unsafe flag"),
                        unit.path.clone(),
                        decl.name.span,
                    ));
                }
            }
        }
        self.diagnostics.extend(found);
    }

    /// 3. `private protected` needs language level C# 7.2 or newer.
    fn check_private_protected(&mut self) {
        if self.options.language.supports_private_protected() {
            return;
        }
        let mut found = Vec::new();
        for unit in &self.units {
            for (name, decl) in named_types(unit) {
                let mut flag = |at: Span, what: &str| {
                    found.push(Diagnostic::error(
                        format!(
                            "'private protected' on '{what}' requires language level C# 7.2 or greater"
                        ),
                        unit.path.clone(),
                        at,
                    ));
                };
                if decl.declared_accessibility
                    == Some(intacc_core::Accessibility::PrivateProtected)
                {
                    flag(decl.name.span, &name);
                }
                for member in decl.members {
                    if member.declared_accessibility
                        == Some(intacc_core::Accessibility::PrivateProtected)
                    {
                        flag(member.span, &format!("{name}.{}", member.name.text));
                    }
                }
            }
        }
        self.diagnostics.extend(found);
    }

    /// 4. The same qualified type name must not be defined twice.
    fn check_duplicate_types(&mut self) {
        let mut seen: FxHashMap<String, String> = FxHashMap::default();
        let mut found = Vec::new();
        for unit in &self.units {
            for (name, decl) in top_level_types(unit) {
                match seen.get(&name) {
                    Some(first_path) => found.push(Diagnostic::error(
                        format!("type '{name}' is already defined in '{first_path}'"),
                        unit.path.clone(),
                        decl.name.span,
                    )),
                    None => {
                        seen.insert(name, unit.path.clone());
                    }
                }
            }
        }
        self.diagnostics.extend(found);
    }

    /// 5. Base types must resolve; a referenced internal type counts only
    ///    when its module grants this compilation's name.
    fn check_base_types(&mut self) {
        let importer = self.options.module_name().to_string();

        let mut local: FxHashSet<String> = FxHashSet::default();
        for unit in &self.units {
            for (name, decl) in named_types(unit) {
                local.insert(decl.name.text.to_string());
                local.insert(name);
            }
        }

        let mut found = Vec::new();
        for unit in &self.units {
            for (name, decl) in named_types(unit) {
                for base in decl.bases {
                    let base_name = base.to_string();
                    if local.contains(&base_name) {
                        continue;
                    }
                    match self.references.find_type(&base_name) {
                        Some((module, ty)) if !ty.visible_to(&module.grants, &importer) => {
                            found.push(Diagnostic::error(
                                format!(
                                    "base type '{base_name}' of '{name}' is defined in module \
                                     '{}' but is not accessible to '{importer}'",
                                    module.name
                                ),
                                unit.path.clone(),
                                base.span(),
                            ));
                        }
                        Some(_) => {}
                        None => {
                            found.push(Diagnostic::warning(
                                format!("unknown base type '{base_name}' of '{name}'"),
                                unit.path.clone(),
                                base.span(),
                            ));
                        }
                    }
                }
            }
        }
        self.diagnostics.extend(found);
    }

    /// 6. One info line per injected grant.
    fn report_injected_grants(&mut self) {
        for name in &self.injected {
            self.diagnostics
                .push(Diagnostic::info(format!("granting internal access to '{name}'")));
        }
    }

    // =========================================
    // Emission
    // =========================================

    fn build_metadata(&self) -> ModuleMetadata {
        let mut flags = ModuleFlags::empty();
        if self.options.allow_unsafe {
            flags |= ModuleFlags::ALLOW_UNSAFE;
        }
        let keep_spans = match self.options.optimization {
            OptimizationLevel::Release => {
                flags |= ModuleFlags::OPTIMIZED;
                false
            }
            OptimizationLevel::Debug => {
                flags |= ModuleFlags::HAS_DEBUG_SPANS;
                true
            }
        };

        let mut grants: Vec<String> = existing_grants(&self.units).into_iter().collect();
        grants.sort();

        let mut defines = self.options.defines.clone();
        defines.sort();
        defines.dedup();

        let mut types: Vec<ExportedType> = Vec::new();
        for unit in &self.units {
            for (name, decl) in top_level_types(unit) {
                types.push(ExportedType {
                    name,
                    kind: decl.kind,
                    accessibility: decl.effective_accessibility(),
                    span: keep_spans.then_some(decl.name.span),
                });
            }
        }
        types.sort_by(|a, b| a.name.cmp(&b.name));

        ModuleMetadata {
            name: self.options.module_name().to_string(),
            target: self.options.target,
            flags,
            grants,
            defines,
            types,
        }
    }
}

/// Walk a unit's namespace-level types, qualified-name first.
fn top_level_types<'a, 'ast>(unit: &'a SourceUnit<'ast>) -> Vec<(String, &'a TypeDecl<'ast>)> {
    fn walk<'a, 'ast>(
        items: &'a [Item<'ast>],
        prefix: &str,
        out: &mut Vec<(String, &'a TypeDecl<'ast>)>,
    ) {
        for item in items {
            match item {
                Item::Type(decl) => out.push((join(prefix, decl.name.text), decl)),
                Item::Namespace(ns) => {
                    walk(ns.items, &join(prefix, &ns.name.to_string()), out);
                }
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    walk(unit.unit.items(), "", &mut out);
    out
}

/// Like [`top_level_types`], but descending into nested type declarations.
fn named_types<'a, 'ast>(unit: &'a SourceUnit<'ast>) -> Vec<(String, &'a TypeDecl<'ast>)> {
    fn descend<'a, 'ast>(
        name: String,
        decl: &'a TypeDecl<'ast>,
        out: &mut Vec<(String, &'a TypeDecl<'ast>)>,
    ) {
        for nested in decl.nested {
            descend(join(&name, nested.name.text), nested, out);
        }
        out.push((name, decl));
    }
    let mut out = Vec::new();
    for (name, decl) in top_level_types(unit) {
        descend(name, decl, &mut out);
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
