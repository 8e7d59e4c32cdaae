//! Latteify command line front end.
//!
//! `latteify convert page.twig` writes `page.latte` next to the input,
//! keeping a previous output as `page.latte.bak`. `latteify check` converts
//! without writing anything.

pub mod args;
pub mod config;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use latteify_codegen::{CodegenError, Converter};
use log::{debug, info};

pub use args::{Args, Command};
pub use config::ConverterConfig;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Convert(#[from] CodegenError),

    #[error("File not found: {}", .0.display())]
    MissingInput(PathBuf),
}

/// Execute one CLI invocation.
pub fn run(args: &Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };
    let converter = Converter::new(config.environment(args.lenient));

    match &args.command {
        Command::Convert { input, output } => {
            let output = output.clone().unwrap_or_else(|| default_output_path(input));
            convert(&converter, input, &output)?;
            println!("Saved to {}", output.display());
        }
        Command::Check { input } => {
            check(&converter, input)?;
            println!("OK: {}", input.display());
        }
    }
    Ok(())
}

/// Convert `input` and write the result to `output`, moving an existing
/// output file to its `.bak` sibling first.
pub fn convert(converter: &Converter, input: &Path, output: &Path) -> Result<(), CliError> {
    let conversion = converter.convert_file(existing(input)?)?;

    if output.exists() {
        let backup = backup_path(output);
        std::fs::rename(output, &backup).map_err(|source| CliError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        info!(path = backup.display().to_string().as_str(); "Backed up previous output");
    }

    std::fs::write(output, &conversion.code).map_err(|source| CliError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    debug!(
        input = input.display().to_string().as_str(),
        output = output.display().to_string().as_str(),
        mappings = conversion.debug_info.len();
        "Wrote template"
    );
    Ok(())
}

/// Convert `input` and discard the result.
pub fn check(converter: &Converter, input: &Path) -> Result<(), CliError> {
    converter.convert_file(existing(input)?)?;
    Ok(())
}

fn existing(input: &Path) -> Result<&Path, CliError> {
    if input.is_file() {
        Ok(input)
    } else {
        Err(CliError::MissingInput(input.to_path_buf()))
    }
}

/// `page.twig` and `page.twig.html` become `page.latte`; any other name
/// gets its extension replaced.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input.to_string_lossy();
    for suffix in [".twig.html", ".twig"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            return PathBuf::from(format!("{stem}.latte"));
        }
    }
    input.with_extension("latte")
}

pub fn backup_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}
