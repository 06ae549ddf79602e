//! intacc compiler
//!
//! Compiles a set of C# source files into a binary module while relaxing
//! accessibility for a caller-specified allow-list of assembly names.
//!
//! ## Pipeline
//!
//! 1. **References**: load and validate every referenced module (fatal
//!    before any source work).
//! 2. **Loading**: read all inputs, then parse all inputs.
//! 3. **Rewrite**: inject `InternalsVisibleTo` grants for the configured
//!    assembly names.
//! 4. **Analysis**: ordered checks producing the diagnostic sequence.
//! 5. **Emission**: encode the module and persist it all-or-nothing.
//!
//! ## Modules
//!
//! - [`loader`]: source reading and parsing into [`loader::SourceUnit`]s
//! - [`rewrite`]: grant scanning and injection
//! - [`references`]: referenced-module resolution
//! - [`driver`]: the analysis/emission state machine
//! - [`metadata`]: the binary module format
//! - [`reporter`]: log-file output and process outcome

pub mod driver;
pub mod loader;
pub mod metadata;
pub mod references;
pub mod reporter;
pub mod rewrite;

pub use driver::{Compilation, DriverState};
pub use loader::{SourceUnit, load_sources};
pub use metadata::{ExportedType, MetadataError, ModuleFlags, ModuleMetadata};
pub use references::{ReferenceSet, resolve_references};
pub use reporter::{Outcome, report};
pub use rewrite::{GrantTable, inject_grants, scan_grants};

// Re-export the unified error type from core for convenience
pub use intacc_core::CompileError;

use std::fs;

use bumpalo::Bump;
use intacc_core::{Diagnostics, EmissionError, Options};
use tracing::info;

/// What a whole invocation produced.
#[derive(Debug)]
pub struct CompilationResult {
    /// The emitted module bytes; `None` when analysis aborted emission.
    pub binary: Option<Vec<u8>>,
    /// Every diagnostic, in its stable order.
    pub diagnostics: Diagnostics,
}

impl CompilationResult {
    /// Whether the run emitted a module.
    pub fn emitted(&self) -> bool {
        self.binary.is_some()
    }
}

/// Run the full pipeline for `options`.
///
/// Fatal problems (bad configuration, unreadable input, broken reference,
/// output write failure) return a [`CompileError`]; everything else lands
/// in the result's diagnostics.
pub fn compile(options: &Options) -> Result<CompilationResult, CompileError> {
    options.validate()?;
    info!(
        out = %options.out.display(),
        inputs = options.inputs.len(),
        references = options.references.len(),
        "starting compilation"
    );

    let references = resolve_references(options)?;

    let arena = Bump::new();
    let units = load_sources(options, &arena)?;
    let (units, injected) = inject_grants(units, options, &arena);

    let mut compilation = Compilation::assemble(options, units, references, injected);
    compilation.analyze()?;
    let binary = compilation.emit()?;

    if let Some(bytes) = &binary {
        write_atomically(&options.out, bytes)?;
        info!(bytes = bytes.len(), "module written");
    }

    Ok(CompilationResult {
        binary,
        diagnostics: compilation.into_diagnostics(),
    })
}

/// Persist the module all-or-nothing: a failed write must not leave a
/// truncated artifact at the output path.
fn write_atomically(out: &std::path::Path, bytes: &[u8]) -> Result<(), EmissionError> {
    let mut tmp = out.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let write_error = |source| EmissionError::Write {
        path: out.to_path_buf(),
        source,
    };
    if let Err(source) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(write_error(source));
    }
    fs::rename(&tmp, out).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        write_error(source)
    })
}
