//! lcovstream parses LCOV coverage tracefiles incrementally and emits per-file
//! section summaries as JSON.

use clap::{ArgAction, Args, Parser, Subcommand};
use lcovstream_adapters_io::ReaderSource;
use lcovstream_app::{AppError, EofMode, RecordStream, SectionStream};
use lcovstream_config::{
    CliOverrides, ConfigError, EffectiveConfig, discover_config, load_config,
    parse_field_override, resolve_config,
};
use lcovstream_parser::RecordParser;
use lcovstream_types::SectionSummary;
use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "LCOVSTREAM_LOG";

/// lcovstream parses LCOV coverage tracefiles incrementally and emits per-file section summaries as JSON.
#[derive(Parser)]
#[command(name = "lcovstream")]
#[command(
    about = "lcovstream parses LCOV coverage tracefiles incrementally and emits per-file section summaries as JSON."
)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that builds a parser.
#[derive(Args, Debug, Default)]
struct ParserArgs {
    /// Path to config file (default: auto-discover lcovstream.toml)
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Override a field token, e.g. `lineHit=LH` (repeatable)
    #[arg(long = "field", value_name = "KEY=TOKEN")]
    fields: Vec<String>,
}

/// Options for commands that read LCOV input.
#[derive(Args, Debug, Default)]
struct InputArgs {
    /// Path to LCOV file (repeatable, `-` or none reads stdin)
    #[arg(long)]
    lcov: Vec<String>,

    /// Output path (default: stdout)
    #[arg(long)]
    out: Option<String>,

    /// Bytes read per chunk (overrides config file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Ignore unterminated trailing input and keep an unfinished last section
    #[arg(long)]
    lenient: bool,

    #[command(flatten)]
    parser: ParserArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse LCOV input into a JSON array of section summaries
    Parse {
        #[command(flatten)]
        input: InputArgs,

        /// Pretty-print the JSON output (overrides config file)
        #[arg(long)]
        pretty: bool,
    },
    /// Print every typed record as one JSON object per line
    Records {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the effective field token table in matching order
    Fields {
        #[command(flatten)]
        parser: ParserArgs,
    },
}

/// CLI errors
#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirCreate {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Input {
        path: String,
        #[source]
        source: AppError,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to load config: {0}")]
    Config(#[from] ConfigError),
}

/// Exit codes:
/// - 0: success
/// - 1: any error (I/O, configuration, truncated input)
const EXIT_CODE_ERROR: i32 = 1;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let exit_code = match run(cli.command) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            EXIT_CODE_ERROR
        }
    };
    std::process::exit(exit_code);
}

/// `-q`/`-v` take precedence over `LCOVSTREAM_LOG`, which defaults to `warn`.
fn init_logging(verbose: u8, quiet: bool) {
    let flag_level = match (quiet, verbose) {
        (true, _) => Some("error"),
        (false, 0) => None,
        (false, 1) => Some("debug"),
        (false, _) => Some("trace"),
    };
    let filter = match flag_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .compact()
        .try_init();
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Parse { input, pretty } => run_parse(input, pretty),
        Commands::Records { input } => run_records(input),
        Commands::Fields { parser } => run_fields(parser),
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn load_effective(
    args: &ParserArgs,
    mut overrides: CliOverrides,
) -> Result<EffectiveConfig, CliError> {
    let loaded_config = if let Some(path) = &args.config {
        Some(load_config(Path::new(path))?)
    } else {
        discover_config()?.map(|(path, config)| {
            debug!(path = %path.display(), "discovered config");
            config
        })
    };

    for raw in &args.fields {
        overrides.fields.push(parse_field_override(raw)?);
    }

    Ok(resolve_config(loaded_config.as_ref(), &overrides)?)
}

fn input_overrides(input: &InputArgs, pretty: bool) -> CliOverrides {
    CliOverrides {
        chunk_size: input.chunk_size,
        pretty: pretty.then_some(true),
        eof: input.lenient.then_some(EofMode::Lenient),
        fields: Vec::new(),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_parse(input: InputArgs, pretty: bool) -> Result<(), CliError> {
    let config = load_effective(&input.parser, input_overrides(&input, pretty))?;

    let mut sections: Vec<SectionSummary> = Vec::new();
    for path in input_paths(&input.lcov) {
        let source = open_source(path, config.chunk_size)?;
        let stream = SectionStream::with_parser(source, RecordParser::new(&config.field_names))
            .eof_mode(config.eof);

        let before = sections.len();
        for section in stream {
            sections.push(section.map_err(|source| CliError::Input {
                path: display_path(path),
                source,
            })?);
        }
        info!(input = %display_path(path), sections = sections.len() - before, "parsed input");
    }

    let mut json = if config.pretty {
        serde_json::to_string_pretty(&sections)?
    } else {
        serde_json::to_string(&sections)?
    };
    json.push('\n');

    write_output(input.out.as_deref(), json.as_bytes())
}

fn run_records(input: InputArgs) -> Result<(), CliError> {
    let config = load_effective(&input.parser, input_overrides(&input, false))?;

    let mut lines = String::new();
    for path in input_paths(&input.lcov) {
        let source = open_source(path, config.chunk_size)?;
        let stream = RecordStream::with_parser(source, RecordParser::new(&config.field_names))
            .eof_mode(config.eof);

        for entry in stream {
            let entry = entry.map_err(|source| CliError::Input {
                path: display_path(path),
                source,
            })?;
            lines.push_str(&serde_json::to_string(&entry.record())?);
            lines.push('\n');
        }
    }

    write_output(input.out.as_deref(), lines.as_bytes())
}

fn run_fields(args: ParserArgs) -> Result<(), CliError> {
    let config = load_effective(&args, CliOverrides::default())?;
    let parser = RecordParser::new(&config.field_names);

    let mut table = String::new();
    for (variant, token) in parser.field_table().iter() {
        table.push_str(&format!(
            "{} = \"{}\"\n",
            variant.key(),
            String::from_utf8_lossy(token)
        ));
    }

    write_output(None, table.as_bytes())
}

// ============================================================================
// Input and Output
// ============================================================================

const STDIN_PATH: &str = "-";

fn input_paths(lcov: &[String]) -> Vec<&str> {
    if lcov.is_empty() {
        vec![STDIN_PATH]
    } else {
        lcov.iter().map(String::as_str).collect()
    }
}

fn display_path(path: &str) -> String {
    if path == STDIN_PATH {
        "<stdin>".to_string()
    } else {
        path.to_string()
    }
}

fn open_source(path: &str, chunk_size: usize) -> Result<ReaderSource<Box<dyn Read>>, CliError> {
    let reader: Box<dyn Read> = if path == STDIN_PATH {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(path).map_err(|e| CliError::FileRead {
            path: path.to_string(),
            source: e,
        })?)
    };
    Ok(ReaderSource::new(reader, chunk_size))
}

fn write_output(out: Option<&str>, bytes: &[u8]) -> Result<(), CliError> {
    let Some(out) = out else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        return handle
            .write_all(bytes)
            .and_then(|()| handle.flush())
            .map_err(|e| CliError::FileWrite {
                path: "<stdout>".to_string(),
                source: e,
            });
    };

    let out_path = Path::new(out);
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| CliError::DirCreate {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let file = File::create(out_path).map_err(|e| CliError::FileWrite {
        path: out.to_string(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .and_then(|()| writer.flush())
        .map_err(|e| CliError::FileWrite {
            path: out.to_string(),
            source: e,
        })
}
