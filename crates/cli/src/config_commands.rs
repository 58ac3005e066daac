use std::path::Path;

use anyhow::Result;

use chatmux_config::{ChatmuxConfig, Severity, find_config_file, validate};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print every diagnostic for `config`; fails when any is an error.
pub fn check(config: &ChatmuxConfig, path: Option<&Path>) -> Result<()> {
    match path.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let result = validate(config);
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("{color}{BOLD}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = result.diagnostics.len() - errors;
    eprintln!("\n{errors} error(s), {warnings} warning(s)");

    if result.has_errors() {
        anyhow::bail!("configuration has errors");
    }
    Ok(())
}
