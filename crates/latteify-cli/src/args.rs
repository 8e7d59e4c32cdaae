use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "latteify")]
#[command(about = "Latteify: Twig to Latte template converter")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with converter settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Accept filters and functions the converter does not know
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a Twig template to Latte
    Convert {
        /// Input Twig template
        input: PathBuf,
        /// Output file (defaults to the input with a .latte extension)
        output: Option<PathBuf>,
    },

    /// Check that a Twig template converts without writing output
    Check {
        /// Input Twig template
        input: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_convert_with_defaults() {
        let args = Args::try_parse_from(["latteify", "convert", "page.twig"]).unwrap();
        assert_eq!(args.log_level, "warn");
        assert!(!args.lenient);
        assert!(args.config.is_none());
        let Command::Convert { input, output } = args.command else {
            panic!("expected convert");
        };
        assert_eq!(input, PathBuf::from("page.twig"));
        assert!(output.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "latteify",
            "check",
            "page.twig",
            "--lenient",
            "--config",
            "latteify.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(args.lenient);
        assert_eq!(args.config, Some(PathBuf::from("latteify.toml")));
        assert_eq!(args.log_level, "debug");
        assert!(matches!(args.command, Command::Check { .. }));
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Args::try_parse_from(["latteify"]).is_err());
    }
}
