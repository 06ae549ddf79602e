//! Source loading.
//!
//! Reads every input file into memory before parsing any of them, so an
//! unreadable input aborts the run without surfacing diagnostics for the
//! files that did load. Parse failures never abort: the parser recovers
//! and its errors become per-unit diagnostics.

use std::fs;

use bumpalo::Bump;
use tracing::debug;

use intacc_core::{Diagnostic, Options, SourceReadError};
use intacc_parser::{CompilationUnit, Parser};

/// One parsed input file, with the diagnostics its parse produced.
#[derive(Debug)]
pub struct SourceUnit<'ast> {
    /// Display path, as given on the command line.
    pub path: String,
    pub unit: CompilationUnit<'ast>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set for the unit the rewriter fabricates; it has no file on disk.
    pub synthetic: bool,
}

impl<'ast> SourceUnit<'ast> {
    /// Parse `text` into a unit under `path`.
    pub fn parse(path: String, text: &str, options: &Options, arena: &'ast Bump) -> Self {
        let (unit, errors) = Parser::parse(text, &options.defines, arena);
        let diagnostics = errors
            .iter()
            .map(|error| Diagnostic::error(error.to_string(), path.clone(), error.span))
            .collect();
        Self {
            path,
            unit,
            diagnostics,
            synthetic: false,
        }
    }
}

/// Read and parse every input named by `options`, in input order.
///
/// All files are read before any is parsed; the first read failure wins.
pub fn load_sources<'ast>(
    options: &Options,
    arena: &'ast Bump,
) -> Result<Vec<SourceUnit<'ast>>, SourceReadError> {
    let mut texts = Vec::with_capacity(options.inputs.len());
    for path in &options.inputs {
        let text = fs::read_to_string(path).map_err(|source| SourceReadError {
            path: path.clone(),
            source,
        })?;
        texts.push((path.display().to_string(), text));
    }

    let mut units = Vec::with_capacity(texts.len());
    for (path, text) in texts {
        debug!(path = %path, bytes = text.len(), "parsing source");
        units.push(SourceUnit::parse(path, &text, options, arena));
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn options_for(inputs: Vec<PathBuf>) -> Options {
        Options::new(PathBuf::from("out.iacm"), inputs)
    }

    #[test]
    fn loads_and_parses_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.cs");
        let b = dir.path().join("b.cs");
        std::fs::write(&a, "public class A { }").unwrap();
        std::fs::write(&b, "internal class B { }").unwrap();

        let arena = Bump::new();
        let units = load_sources(&options_for(vec![a, b]), &arena).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].path.ends_with("a.cs"));
        assert!(units.iter().all(|u| u.diagnostics.is_empty()));
        assert_eq!(units[1].unit.types()[0].name.text, "B");
    }

    #[test]
    fn parse_errors_become_diagnostics_not_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cs");
        std::fs::write(&path, "public clazz Broken { }").unwrap();

        let arena = Bump::new();
        let units = load_sources(&options_for(vec![path]), &arena).unwrap();
        assert_eq!(units.len(), 1);
        assert!(!units[0].diagnostics.is_empty());
    }

    #[test]
    fn unreadable_input_aborts_before_any_unit_exists() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.cs");
        std::fs::write(&good, "public class Fine { }").unwrap();
        let missing = dir.path().join("missing.cs");

        let arena = Bump::new();
        let error = load_sources(&options_for(vec![good, missing.clone()]), &arena).unwrap_err();
        assert_eq!(error.path, missing);
    }

    #[test]
    fn defines_flow_into_the_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cond.cs");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#if FEATURE\npublic class Extra {{ }}\n#endif").unwrap();

        let mut options = options_for(vec![path]);
        options.defines.push("FEATURE".to_string());

        let arena = Bump::new();
        let units = load_sources(&options, &arena).unwrap();
        assert_eq!(units[0].unit.types().len(), 1);
    }
}
