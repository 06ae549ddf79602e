//! CLI for the intacc module compiler.
//!
//! Pipeline: resolve references -> load sources -> inject grants ->
//! analyze -> emit module -> write log.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use intacc_compiler::{compile, report};
use intacc_core::{
    Diagnostic, Diagnostics, LanguageLevel, OptimizationLevel, Options, TargetKind,
};

#[derive(Parser, Debug)]
#[command(
    name = "intacc",
    version,
    about = "Compiles C# sources into a binary module, granting internal access to an allow-list of assemblies"
)]
struct Cli {
    /// Input source files.
    #[arg(value_name = "INPUTS", required = true)]
    inputs: Vec<PathBuf>,

    /// Output module path; its file stem names the module.
    #[arg(short, long)]
    out: PathBuf,

    /// Assembly names granted internal access, ';'-separated.
    /// `--assemblyNames` is kept as a hidden alias for older scripts.
    #[arg(short = 'a', long = "assembly-names", alias = "assemblyNames", value_delimiter = ';')]
    assembly_names: Vec<String>,

    /// Build configuration.
    #[arg(short = 'c', long, value_enum, default_value_t = Configuration::Release)]
    configuration: Configuration,

    /// Diagnostics log file.
    #[arg(short = 'l', long, default_value = "compile.log")]
    logfile: PathBuf,

    /// Referenced module files, ';'-separated.
    #[arg(short = 'r', long = "references", alias = "reference", value_delimiter = ';')]
    references: Vec<PathBuf>,

    /// Preprocessor symbols, ';'-separated.
    #[arg(short = 'd', long = "defines", alias = "define", value_delimiter = ';')]
    defines: Vec<String>,

    /// Permit unsafe code constructs.
    #[arg(long = "unsafe")]
    allow_unsafe: bool,

    /// Output kind.
    #[arg(short = 't', long, value_enum, default_value_t = Target::DynamicallyLinkedLibrary)]
    target: Target,

    /// Source language level. `--langage` is kept as a hidden alias for
    /// compatibility with older scripts.
    #[arg(long, visible_alias = "lang", alias = "langage", value_enum, default_value_t = Language::Latest)]
    language: Language,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Configuration {
    Release,
    Debug,
}

impl From<Configuration> for OptimizationLevel {
    fn from(value: Configuration) -> Self {
        match value {
            Configuration::Release => OptimizationLevel::Release,
            Configuration::Debug => OptimizationLevel::Debug,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Target {
    DynamicallyLinkedLibrary,
    ConsoleApplication,
    NetModule,
}

impl From<Target> for TargetKind {
    fn from(value: Target) -> Self {
        match value {
            Target::DynamicallyLinkedLibrary => TargetKind::Library,
            Target::ConsoleApplication => TargetKind::Executable,
            Target::NetModule => TargetKind::Module,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Language {
    #[value(name = "7")]
    CSharp7,
    #[value(name = "7.1")]
    CSharp7_1,
    #[value(name = "7.2")]
    CSharp7_2,
    #[value(name = "7.3")]
    CSharp7_3,
    #[value(name = "8")]
    CSharp8,
    Latest,
}

impl From<Language> for LanguageLevel {
    fn from(value: Language) -> Self {
        match value {
            Language::CSharp7 => LanguageLevel::CSharp7,
            Language::CSharp7_1 => LanguageLevel::CSharp7_1,
            Language::CSharp7_2 => LanguageLevel::CSharp7_2,
            Language::CSharp7_3 => LanguageLevel::CSharp7_3,
            Language::CSharp8 => LanguageLevel::CSharp8,
            Language::Latest => LanguageLevel::Latest,
        }
    }
}

impl Cli {
    fn into_options(self) -> Options {
        let mut options = Options::new(self.out, self.inputs);
        options.logfile = self.logfile;
        options.references = self.references;
        options.defines = self.defines;
        options.internal_access_names = self.assembly_names;
        options.target = self.target.into();
        options.language = self.language.into();
        options.optimization = self.configuration.into();
        options.allow_unsafe = self.allow_unsafe;
        options
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Cli::parse().into_options();

    let diagnostics = match compile(&options) {
        Ok(result) => result.diagnostics,
        Err(error) => {
            tracing::error!(%error, "compilation failed");
            // Fatal errors still leave a line in the log file.
            let mut diagnostics = Diagnostics::new();
            let mut cause: Option<&dyn std::error::Error> = Some(&error);
            while let Some(current) = cause {
                diagnostics.push(Diagnostic::bare(
                    intacc_core::Severity::Error,
                    current.to_string(),
                ));
                cause = current.source();
            }
            diagnostics
        }
    };

    match report(&diagnostics, &options.logfile) {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(error) => {
            tracing::error!(%error, logfile = %options.logfile.display(), "cannot write log file");
            ExitCode::FAILURE
        }
    }
}
