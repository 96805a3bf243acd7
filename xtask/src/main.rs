//! xtask - Development tasks for lcovstream
//!
//! Golden fixture management: every `fixtures/lcov/<name>.info` is parsed and
//! compared with (or written to) `fixtures/expected/<name>.json`. An optional
//! `fixtures/lcov/<name>.toml` supplies field-name overrides for that input.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lcovstream_app::parse_bytes;
use lcovstream_config::{CliOverrides, load_config, resolve_config};
use std::fs;
use std::path::{Path, PathBuf};

fn exit_validation_failure() -> Result<()> {
    bail!("validation failure")
}

/// Development tasks for lcovstream
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tasks for lcovstream", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage golden test fixtures
    Fixtures {
        /// Check fixtures match expected output (exits non-zero if different)
        #[arg(long, conflicts_with = "update")]
        check: bool,

        /// Update fixtures with current output
        #[arg(long, conflicts_with = "check")]
        update: bool,
    },
}

fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let code = main_impl(args);
    std::process::ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main_impl(args: Vec<String>) -> i32 {
    match run_cli_with_args(args) {
        Ok(_) => 0,
        Err(e) => {
            if e.to_string().contains("validation failure") {
                return 2;
            }
            eprintln!("error: {e:#}");
            1
        }
    }
}

fn run_cli_with_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::try_parse_from(&args)?;
    match cli.command {
        Commands::Fixtures { check, update } => {
            let project_root = find_project_root()?;
            cmd_fixtures(&project_root, check, update)
        }
    }
}

// ============================================================================
// Fixtures Command
// ============================================================================

fn cmd_fixtures(project_root: &Path, check: bool, update: bool) -> Result<()> {
    let fixtures_dir = project_root.join("fixtures");
    let expected_dir = fixtures_dir.join("expected");

    if !fixtures_dir.exists() {
        bail!("fixtures directory not found at {}", fixtures_dir.display());
    }

    let fixtures = generate_fixtures(&fixtures_dir.join("lcov"))?;

    if check {
        let mut has_differences = false;

        for (name, expected_content) in &fixtures {
            let fixture_path = expected_dir.join(name);

            if !fixture_path.exists() {
                eprintln!("missing: {name}");
                has_differences = true;
                continue;
            }

            let actual_content = fs::read_to_string(&fixture_path)
                .with_context(|| format!("failed to read {}", fixture_path.display()))?;

            // Normalize line endings for comparison
            let expected_normalized = expected_content.replace("\r\n", "\n");
            let actual_normalized = actual_content.replace("\r\n", "\n");

            if expected_normalized != actual_normalized {
                eprintln!("differs: {name}");
                has_differences = true;

                let expected_lines: Vec<&str> = expected_normalized.lines().collect();
                let actual_lines: Vec<&str> = actual_normalized.lines().collect();

                if expected_lines.len() != actual_lines.len() {
                    eprintln!(
                        "  line count: expected {}, got {}",
                        expected_lines.len(),
                        actual_lines.len()
                    );
                } else if let Some(line) = expected_lines
                    .iter()
                    .zip(&actual_lines)
                    .position(|(expected, actual)| expected != actual)
                {
                    eprintln!("  first difference at line {}", line + 1);
                }
            }
        }

        if has_differences {
            eprintln!("\nRun 'cargo xtask fixtures --update' to update fixtures.");
            return exit_validation_failure();
        }
        println!("All {} fixture(s) match.", fixtures.len());
    } else if update {
        fs::create_dir_all(&expected_dir)?;

        for (name, content) in &fixtures {
            let fixture_path = expected_dir.join(name);
            fs::write(&fixture_path, content)
                .with_context(|| format!("failed to write {}", fixture_path.display()))?;
            println!("updated: {name}");
        }

        println!("\nUpdated {} fixture(s).", fixtures.len());
    } else {
        println!("Fixtures that would be generated:");
        for (name, _) in &fixtures {
            println!("  {name}");
        }
        println!("\nUse --check to verify or --update to regenerate.");
    }

    Ok(())
}

/// Parse every `.info` input into `(expected file name, pretty JSON)` pairs,
/// sorted by name.
fn generate_fixtures(lcov_dir: &Path) -> Result<Vec<(String, String)>> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(lcov_dir)
        .with_context(|| format!("failed to list {}", lcov_dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<_>>()?;
    inputs.retain(|path| path.extension().is_some_and(|ext| ext == "info"));
    inputs.sort();

    let mut fixtures = Vec::with_capacity(inputs.len());
    for input in inputs {
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("non UTF-8 fixture name {}", input.display()))?;

        let sidecar = input.with_extension("toml");
        let config = if sidecar.exists() {
            Some(
                load_config(&sidecar)
                    .with_context(|| format!("failed to load {}", sidecar.display()))?,
            )
        } else {
            None
        };
        let effective = resolve_config(config.as_ref(), &CliOverrides::default())?;

        let bytes =
            fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
        let sections = parse_bytes(&bytes, &effective.field_names);

        let mut json = serde_json::to_string_pretty(&sections)?;
        json.push('\n');
        fixtures.push((format!("{stem}.json"), json));
    }

    Ok(fixtures)
}

// ============================================================================
// Utilities
// ============================================================================

/// Find the project root by looking for Cargo.toml with [workspace]
fn find_project_root() -> Result<PathBuf> {
    let mut current = std::env::current_dir()?;

    loop {
        let cargo_toml = current.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = fs::read_to_string(&cargo_toml)?;
            if content.contains("[workspace]") {
                return Ok(current);
            }
        }

        if !current.pop() {
            bail!("could not find workspace root (no Cargo.toml with [workspace] found)");
        }
    }
}
