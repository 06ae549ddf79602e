//! The validated, immutable configuration for one invocation.
//!
//! The CLI (or a test) builds an [`Options`] value once, calls
//! [`Options::validate`], and passes it by reference to every downstream
//! component. There is no ambient or global configuration.

use std::path::{Path, PathBuf};

use num_enum::TryFromPrimitive;

use crate::error::ConfigError;

/// Output kind of the compiled artifact.
///
/// Discriminants are part of the binary module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum TargetKind {
    /// A dynamically linked library.
    #[default]
    Library = 0,
    /// A console application with an entry point.
    Executable = 1,
    /// A bare module intended to be linked into another assembly.
    Module = 2,
}

/// Optimization level, mirroring the build configuration it is named after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptimizationLevel {
    #[default]
    Release,
    Debug,
}

/// Source language level. Governs which constructs are legal during
/// analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguageLevel {
    CSharp7,
    CSharp7_1,
    CSharp7_2,
    CSharp7_3,
    CSharp8,
    #[default]
    Latest,
}

impl LanguageLevel {
    /// Whether the `private protected` accessibility combination is legal.
    /// Introduced in C# 7.2.
    pub fn supports_private_protected(self) -> bool {
        !matches!(self, LanguageLevel::CSharp7 | LanguageLevel::CSharp7_1)
    }
}

/// Immutable configuration for one compilation.
#[derive(Debug, Clone)]
pub struct Options {
    /// Output artifact path.
    pub out: PathBuf,
    /// Diagnostics log path.
    pub logfile: PathBuf,
    /// Input source paths, in order.
    pub inputs: Vec<PathBuf>,
    /// Referenced module paths, in order.
    pub references: Vec<PathBuf>,
    /// Preprocessor symbols.
    pub defines: Vec<String>,
    /// External assembly names granted internal access.
    pub internal_access_names: Vec<String>,
    /// Output kind.
    pub target: TargetKind,
    /// Source language level.
    pub language: LanguageLevel,
    /// Optimization level.
    pub optimization: OptimizationLevel,
    /// Whether unsafe code constructs are permitted.
    pub allow_unsafe: bool,
}

impl Options {
    /// Create options with the required fields and the documented defaults
    /// for everything else.
    pub fn new(out: impl Into<PathBuf>, inputs: Vec<PathBuf>) -> Self {
        Self {
            out: out.into(),
            logfile: PathBuf::from("compile.log"),
            inputs,
            references: Vec::new(),
            defines: Vec::new(),
            internal_access_names: Vec::new(),
            target: TargetKind::default(),
            language: LanguageLevel::default(),
            optimization: OptimizationLevel::default(),
            allow_unsafe: false,
        }
    }

    /// Check the configuration invariants. Called once, before any
    /// compilation work begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.out.as_os_str().is_empty() {
            return Err(ConfigError::EmptyOutputPath);
        }
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        for name in &self.internal_access_names {
            if !is_valid_assembly_name(name) {
                return Err(ConfigError::InvalidAssemblyName { name: name.clone() });
            }
        }
        for define in &self.defines {
            if !is_valid_symbol(define) {
                return Err(ConfigError::InvalidDefine {
                    name: define.clone(),
                });
            }
        }
        Ok(())
    }

    /// The name of the module being compiled: the output file stem.
    ///
    /// This is the name other modules would put in their own grant lists to
    /// make their internals visible to us.
    pub fn module_name(&self) -> &str {
        Path::new(&self.out)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// Whether `name` is acceptable as an assembly name in a grant declaration.
///
/// Dotted identifier segments, each starting with a letter or underscore.
/// This is what the grant mechanism can represent; anything else is a
/// configuration error, not a crash at injection time.
pub fn is_valid_assembly_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Whether `name` is a well-formed preprocessor symbol.
fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Options {
        Options::new("out.iacm", vec![PathBuf::from("Foo.cs")])
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let options = minimal();
        assert_eq!(options.logfile, PathBuf::from("compile.log"));
        assert_eq!(options.target, TargetKind::Library);
        assert_eq!(options.optimization, OptimizationLevel::Release);
        assert_eq!(options.language, LanguageLevel::Latest);
        assert!(!options.allow_unsafe);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn empty_out_is_rejected() {
        let options = Options::new("", vec![PathBuf::from("Foo.cs")]);
        assert_eq!(options.validate(), Err(ConfigError::EmptyOutputPath));
    }

    #[test]
    fn no_inputs_is_rejected() {
        let options = Options::new("out.iacm", vec![]);
        assert_eq!(options.validate(), Err(ConfigError::NoInputs));
    }

    #[test]
    fn malformed_grant_name_is_rejected() {
        let mut options = minimal();
        options.internal_access_names = vec!["My.Assembly".into(), "not valid!".into()];
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidAssemblyName {
                name: "not valid!".into()
            })
        );
    }

    #[test]
    fn malformed_define_is_rejected() {
        let mut options = minimal();
        options.defines = vec!["2BAD".into()];
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidDefine { .. })
        ));
    }

    #[test]
    fn module_name_is_the_out_stem() {
        let options = Options::new("build/Consumer.iacm", vec![PathBuf::from("a.cs")]);
        assert_eq!(options.module_name(), "Consumer");
    }

    #[test]
    fn assembly_name_shapes() {
        assert!(is_valid_assembly_name("Consumer"));
        assert!(is_valid_assembly_name("My.Test.Assembly"));
        assert!(is_valid_assembly_name("_internal"));
        assert!(!is_valid_assembly_name(""));
        assert!(!is_valid_assembly_name("9lives"));
        assert!(!is_valid_assembly_name("a..b"));
        assert!(!is_valid_assembly_name("has space"));
    }

    #[test]
    fn private_protected_needs_cs72() {
        assert!(!LanguageLevel::CSharp7.supports_private_protected());
        assert!(!LanguageLevel::CSharp7_1.supports_private_protected());
        assert!(LanguageLevel::CSharp7_2.supports_private_protected());
        assert!(LanguageLevel::Latest.supports_private_protected());
    }
}
