//! CLI entry point for the exemplar store.
//!
//! Provides commands to initialize settings, build the store from a corpus,
//! search it and inspect what is committed.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use exemplar::display::{self, THEME};
use exemplar::io::{ExitCode, Report};
use exemplar::{
    EmbeddingRegistry, ExemplarError, ExemplarStore, SearchHit, Settings, StoreStats,
    build_context, read_corpus,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Exemplar retrieval for prompt grounding
#[derive(Parser)]
#[command(
    name = "exemplar",
    version = env!("CARGO_PKG_VERSION"),
    about = "Retrieve distinct exemplars for prompt grounding",
    long_about = "Build a vector store from a JSONL corpus of exemplars and retrieve the nearest distinct ones.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug information to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .exemplar directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build or update the store from a corpus
    #[command(
        about = "Embed a JSONL corpus into the store",
        after_help = "Examples:\n  exemplar build\n  exemplar build prompts.jsonl\n  exemplar build prompts.jsonl --full"
    )]
    Build {
        /// Corpus file (defaults to corpus_path from settings)
        corpus: Option<PathBuf>,

        /// Re-embed everything instead of appending new records
        #[arg(long)]
        full: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Retrieve exemplars nearest to a query
    #[command(
        about = "Search the store for distinct exemplars",
        after_help = "Examples:\n  exemplar search \"a cat in space\"\n  exemplar search \"misty forest\" -k 3 --context\n  exemplar search \"neon city\" --json"
    )]
    Search {
        /// Query text
        query: String,

        /// Number of results (defaults to search.top_k; 0 skips retrieval)
        #[arg(short, long)]
        k: Option<usize>,

        /// Also print the reference context built from the hits
        #[arg(long)]
        context: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show what is committed in the data directory
    #[command(about = "Display store statistics")]
    Info {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Build { json, .. }
            | Commands::Search { json, .. }
            | Commands::Info { json } => *json,
            Commands::Init { .. } | Commands::Config => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    k: usize,
    hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.command.wants_json();

    let code = match run(cli) {
        Ok(()) => ExitCode::Success,
        Err(error) => report_error(&error, json),
    };

    std::process::exit(code.into());
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(config: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    settings.map_err(|e| {
        ExemplarError::Config {
            reason: e.to_string(),
        }
        .into()
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // A broken settings file must not block regenerating it
    let settings = match load_settings(cli.config.as_ref()) {
        Ok(settings) => settings,
        Err(_) if matches!(cli.command, Commands::Init { .. }) => Settings::default(),
        Err(e) => return Err(e),
    };
    init_logging(cli.verbose || settings.debug);

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| ExemplarError::Config {
                reason: e.to_string(),
            })?;
            println!(
                "{}",
                THEME.done(&format!("Created configuration at {}", THEME.path(path.display())))
            );
            println!("Edit this file to customize your settings.");
            Ok(())
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            let toml_str =
                toml::to_string_pretty(&settings).context("failed to render settings")?;
            println!("{toml_str}");
            Ok(())
        }

        Commands::Info { json } => {
            let stats = StoreStats::read(&settings.data_dir)?;
            if json {
                print_json(&Report::success(&stats, None))?;
            } else {
                println!("{}", display::create_stats_table(&stats));
            }
            Ok(())
        }

        Commands::Build { corpus, full, json } => {
            let corpus_path = corpus.unwrap_or_else(|| settings.corpus_path.clone());
            run_build(&settings, corpus_path, full, json)
        }

        Commands::Search {
            query,
            k,
            context,
            json,
        } => {
            let k = k.unwrap_or(settings.search.top_k);
            run_search(&settings, &query, k, context, json)
        }
    }
}

fn open_store(
    settings: &Settings,
    registry: &EmbeddingRegistry,
    quiet: bool,
) -> anyhow::Result<ExemplarStore> {
    let message = format!("Loading embedding model {}", settings.embedding.model);
    let store = if quiet {
        ExemplarStore::open(settings, registry, false)?
    } else {
        display::with_spinner(&message, || ExemplarStore::open(settings, registry, true))?
    };
    Ok(store)
}

fn run_build(
    settings: &Settings,
    corpus_path: PathBuf,
    full: bool,
    json: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let corpus = read_corpus(&corpus_path)?;

    let registry = EmbeddingRegistry::new();
    let mut store = open_store(settings, &registry, json)?;

    let progress = (!json).then(|| display::create_embedding_bar("Embedding records"));
    store.set_progress(progress.clone());
    let report = store.build(&corpus, !full);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let report = report?;

    let elapsed = start.elapsed();
    if json {
        print_json(&Report::success(report, Some(elapsed)))?;
    } else {
        if report.fell_back {
            let warning = "Stored state could not be extended; rebuilt from the full corpus";
            println!("{}", THEME.warn(warning));
        }
        println!("{}", display::create_build_table(&report, elapsed));
        println!(
            "{}",
            THEME.done(&format!(
                "Store committed to {}",
                THEME.path(settings.data_dir.display())
            ))
        );
    }
    Ok(())
}

fn run_search(
    settings: &Settings,
    query: &str,
    k: usize,
    with_context: bool,
    json: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();

    // k = 0 asks for no references; skip loading the model entirely
    let hits = if k == 0 {
        Vec::new()
    } else {
        let registry = EmbeddingRegistry::new();
        let mut store = open_store(settings, &registry, json)?;
        store.load()?;
        store.search(query, k)?
    };

    let context =
        with_context.then(|| build_context(query, hits.iter().map(|hit| &hit.record)));

    if json {
        let output = SearchOutput {
            query,
            k,
            hits,
            context,
        };
        return print_json(&Report::success(output, Some(start.elapsed())));
    }

    if hits.is_empty() {
        println!("{}", THEME.warn("No exemplars found"));
    } else {
        println!("{}", display::create_results_table(&hits));
        for (i, hit) in hits.iter().enumerate() {
            println!("{}", THEME.hit_header(i + 1, hit.distance));
            println!("  {}", hit.record.search_text());
        }
    }
    if let Some(context) = context {
        println!();
        println!("{context}");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_error(error: &anyhow::Error, json: bool) -> ExitCode {
    let Some(error) = error.downcast_ref::<ExemplarError>() else {
        eprintln!("{}", THEME.fail(&format!("{error:#}")));
        return ExitCode::GeneralError;
    };

    if json {
        if let Ok(report) = serde_json::to_string_pretty(&Report::failure(error)) {
            println!("{report}");
        }
    } else {
        eprintln!("{}", THEME.fail(&error.to_string()));
        for suggestion in error.recovery_suggestions() {
            eprintln!("  {}", THEME.hint(suggestion));
        }
    }
    ExitCode::from_error(error)
}
