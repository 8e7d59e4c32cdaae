use std::fs;
use std::path::Path;

use clap::Parser;
use latteify_cli::{run, Args, CliError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("latteify").chain(argv.iter().copied())).unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

// =============================================================================
// convert
// =============================================================================

#[test]
fn test_convert_writes_default_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("list.twig");
    fs::write(&input, "{% for item in items %}{{ item }}{% endfor %}").unwrap();

    run(&args(&["convert", path_str(&input)])).unwrap();

    let output = fs::read_to_string(dir.path().join("list.latte")).unwrap();
    assert_eq!(output, "{foreach $items as $item}{$item}{/foreach}");
}

#[test]
fn test_convert_twig_html_suffix() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.twig.html");
    fs::write(&input, "<h1>{{ title }}</h1>").unwrap();

    run(&args(&["convert", path_str(&input)])).unwrap();

    let output = fs::read_to_string(dir.path().join("page.latte")).unwrap();
    assert_eq!(output, "<h1>{$title}</h1>");
}

#[test]
fn test_convert_explicit_output_and_backup() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.twig");
    let output = dir.path().join("out.latte");
    fs::write(&input, "{{ name|upper }}").unwrap();
    fs::write(&output, "old").unwrap();

    run(&args(&["convert", path_str(&input), path_str(&output)])).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "{$name|upper}");
    assert_eq!(fs::read_to_string(dir.path().join("out.latte.bak")).unwrap(), "old");
}

#[test]
fn test_convert_missing_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.twig");

    let err = run(&args(&["convert", path_str(&input)])).unwrap_err();

    assert!(matches!(err, CliError::MissingInput(_)));
    assert!(err.to_string().starts_with("File not found: "));
    assert!(!dir.path().join("missing.latte").exists());
}

#[test]
fn test_convert_syntax_error_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.twig");
    fs::write(&input, "{% if x %}open").unwrap();

    let err = run(&args(&["convert", path_str(&input)])).unwrap_err();

    assert!(matches!(err, CliError::Convert(_)));
    assert!(!dir.path().join("bad.latte").exists());
}

// =============================================================================
// check
// =============================================================================

#[test]
fn test_check_does_not_write() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.twig");
    fs::write(&input, "{{ title }}").unwrap();

    run(&args(&["check", path_str(&input)])).unwrap();

    assert!(!dir.path().join("page.latte").exists());
}

#[test]
fn test_check_reports_unknown_filter() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.twig");
    fs::write(&input, "{{ title|shout }}").unwrap();

    let err = run(&args(&["check", path_str(&input)])).unwrap_err();
    assert!(err.to_string().contains("shout"), "{err}");

    run(&args(&["check", path_str(&input), "--lenient"])).unwrap();
}

// =============================================================================
// Config file
// =============================================================================

#[test]
fn test_config_remaps_and_lenient() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("latteify.toml");
    fs::write(
        &config,
        "lenient = true\n\n[filters]\nupper = \"uppercase\"\n",
    )
    .unwrap();
    let input = dir.path().join("page.twig");
    fs::write(&input, "{{ a|upper }}{{ b|shout }}").unwrap();

    run(&args(&["convert", path_str(&input), "--config", path_str(&config)])).unwrap();

    let output = fs::read_to_string(dir.path().join("page.latte")).unwrap();
    assert_eq!(output, "{$a|uppercase}{$b|shout}");
}

#[test]
fn test_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("latteify.toml");
    fs::write(&config, "lenient = \"yes\"").unwrap();
    let input = dir.path().join("page.twig");
    fs::write(&input, "{{ a }}").unwrap();

    let err = run(&args(&["check", path_str(&input), "--config", path_str(&config)])).unwrap_err();
    assert!(matches!(err, CliError::Config { .. }));
}

// =============================================================================
// Binary
// =============================================================================

#[test]
fn test_binary_reports_error_with_logging_off() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.twig");

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_latteify"))
        .args(["convert", path_str(&input), "--log-level", "off"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found: "), "{stderr}");
}

#[test]
fn test_binary_success_prints_saved_path() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.twig");
    fs::write(&input, "{{ title }}").unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_latteify"))
        .args(["convert", path_str(&input)])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Saved to "), "{stdout}");
    assert!(dir.path().join("page.latte").exists());
}
