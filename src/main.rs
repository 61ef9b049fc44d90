//! hilite - print files with incremental pattern-based syntax highlighting

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use tracing_subscriber::EnvFilter;

use hilite::config::Config;
use hilite::editor::Editor;
use hilite::error::{HighlightError, Result};
use hilite::syntax::{LanguageMode, PatternSet};
use hilite::terminal::Terminal;

/// Mode name used for a pattern set given with `--patterns`
const CUSTOM_MODE: &str = "Custom";

/// Log filter when `RUST_LOG` is unset or unusable
const DEFAULT_LOG_FILTER: &str = "warn";

fn main() {
    let directives = env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(directives.as_deref()))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Filter built from `RUST_LOG` directives, or warnings only
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    mode: Option<String>,
    patterns: Option<PathBuf>,
    config: Option<PathBuf>,
    list_modes: bool,
    files: Vec<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> std::result::Result<Option<Args>, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or(format!("{flag} needs a value"));
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                print_version();
                return Ok(None);
            }
            "--mode" | "-m" => parsed.mode = Some(value("--mode")?),
            "--patterns" | "-p" => parsed.patterns = Some(PathBuf::from(value("--patterns")?)),
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--list-modes" => parsed.list_modes = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            file => parsed.files.push(PathBuf::from(file)),
        }
    }
    Ok(Some(parsed))
}

fn run() -> Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => return Ok(()),
        Err(message) => {
            eprintln!("{message}");
            print_usage();
            process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let defer = config.highlight.defer_initial_parse;
    let mut editor = Editor::new(config)?;

    if let Some(path) = &args.patterns {
        let text = fs::read_to_string(path)?;
        PatternSet::parse(CUSTOM_MODE, &text)?;
        editor
            .registry_mut()
            .add_mode(LanguageMode::new(CUSTOM_MODE, &text));
    }

    if args.list_modes {
        for name in editor.registry().list_modes() {
            println!("{name}");
        }
        return Ok(());
    }

    let mode = if args.patterns.is_some() {
        Some(CUSTOM_MODE.to_string())
    } else {
        args.mode.clone()
    };

    let mut term = Terminal::stdout();
    for path in &args.files {
        let id = editor.open_file(path)?;
        if let Some(mode) = &mode {
            editor.document_mut(id)?.set_language_mode(Some(mode.clone()));
        }
        match editor.start_highlighting(id, defer) {
            Ok(()) | Err(HighlightError::NoPatternSet(_)) => {}
            Err(e) => return Err(e),
        }
        term.write_document(editor.document(id)?, editor.styles())?;
        editor.close_document(id)?;
    }

    Ok(())
}

fn print_usage() {
    println!("hilite {} - incremental syntax highlighter", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: hilite [OPTIONS] FILE...");
    println!();
    println!("Options:");
    println!("  -m, --mode NAME       Use language mode NAME instead of detecting it");
    println!("  -p, --patterns FILE   Highlight with the pattern set in FILE");
    println!("  -c, --config FILE     Read configuration from FILE");
    println!("      --list-modes      List available language modes");
    println!("  -h, --help            Show this help message");
    println!("  -V, --version         Show version information");
    println!();
    println!("Set RUST_LOG=debug to see reparse activity.");
}

fn print_version() {
    println!("hilite {}", env!("CARGO_PKG_VERSION"));
}
