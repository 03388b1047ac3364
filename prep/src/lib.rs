use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use refinery::config::{ENV_INPUT, ENV_OUTPUT, PrepConfig};
use refinery::merge::{self, MergeOptions};
use refinery::pipeline::{self, ConvertMode, ShuffleOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aegis-prep",
    about = "Aegis dataset tools: repair, convert, normalize and merge JSONL training records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair raw agent traces and convert them into system/user/assistant conversations.
    ///
    /// Records without an image reference are rejected unless --text is given.
    Convert {
        /// Raw JSONL input (falls back to AEGIS_INPUT).
        input: Option<PathBuf>,

        /// Canonical JSONL output (falls back to AEGIS_OUTPUT).
        output: Option<PathBuf>,

        /// Emit {"text": ...} ChatML rows instead of vision conversations.
        #[arg(long)]
        text: bool,
    },

    /// Normalize already-structured conversations so every content field is a block list.
    Normalize {
        /// JSONL with a `messages` list per line (falls back to AEGIS_INPUT).
        input: Option<PathBuf>,

        /// Output path (falls back to AEGIS_OUTPUT).
        output: Option<PathBuf>,

        /// Seed for a reproducible shuffle (overrides AEGIS_SHUFFLE_SEED).
        #[arg(long)]
        seed: Option<u64>,

        /// Keep input order.
        #[arg(long)]
        no_shuffle: bool,
    },

    /// Concatenate several JSONL datasets into one file.
    Merge {
        /// Input files, merged in the order given. Missing files are skipped.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file path (falls back to AEGIS_OUTPUT).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Clamp coordinates in expected_output.thought to 0-1000.
        #[arg(long)]
        clamp: bool,

        /// Drop records identical to one already merged.
        #[arg(long)]
        dedupe: bool,
    },
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PrepConfig::from_env();

    match cli.command {
        Commands::Convert {
            input,
            output,
            text,
        } => run_convert(&config, input, output, text),
        Commands::Normalize {
            input,
            output,
            seed,
            no_shuffle,
        } => run_normalize(&config, input, output, seed, no_shuffle),
        Commands::Merge {
            inputs,
            output,
            clamp,
            dedupe,
        } => run_merge(&config, inputs, output, clamp, dedupe),
    }
}

fn run_convert(
    config: &PrepConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    text: bool,
) -> Result<()> {
    let input = resolve_path(input, &config.input, "INPUT", ENV_INPUT)?;
    let output = resolve_path(output, &config.output, "OUTPUT", ENV_OUTPUT)?;
    let mode = if text {
        ConvertMode::ChatTemplate
    } else {
        ConvertMode::Vision
    };

    println!("Converting {} ({mode:?})", input.display());
    let stats = pipeline::convert_file(&input, &output, mode)?;
    println!(
        "Convert complete: accepted={} rejected={} output={}",
        stats.accepted,
        stats.rejected,
        output.display()
    );
    Ok(())
}

fn run_normalize(
    config: &PrepConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    seed: Option<u64>,
    no_shuffle: bool,
) -> Result<()> {
    let input = resolve_path(input, &config.input, "INPUT", ENV_INPUT)?;
    let output = resolve_path(output, &config.output, "OUTPUT", ENV_OUTPUT)?;
    let shuffle = shuffle_options(config, seed, no_shuffle);

    println!("Normalizing {}", input.display());
    let stats = pipeline::normalize_file(&input, &output, shuffle)?;
    println!(
        "Normalize complete: accepted={} rejected={} shuffled={} output={}",
        stats.accepted,
        stats.rejected,
        shuffle.enabled,
        output.display()
    );
    Ok(())
}

fn run_merge(
    config: &PrepConfig,
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    clamp: bool,
    dedupe: bool,
) -> Result<()> {
    let output = resolve_path(output, &config.output, "--output", ENV_OUTPUT)?;
    let options = MergeOptions {
        clamp_thought: clamp,
        dedupe,
    };

    println!("Merging {} files into {}", inputs.len(), output.display());
    let stats = merge::merge_files(&inputs, &output, options)?;
    println!(
        "Merge complete: merged={} skipped_duplicates={} errors={} missing_inputs={}",
        stats.merged, stats.skipped_duplicates, stats.errors, stats.missing_inputs,
    );
    Ok(())
}

/// Command-line value first, then the environment.
fn resolve_path(
    arg: Option<PathBuf>,
    fallback: &Option<PathBuf>,
    arg_name: &str,
    env_key: &str,
) -> Result<PathBuf> {
    arg.or_else(|| fallback.clone())
        .ok_or_else(|| anyhow!("missing {arg_name}: pass it on the command line or set {env_key}"))
}

fn shuffle_options(config: &PrepConfig, seed: Option<u64>, no_shuffle: bool) -> ShuffleOptions {
    ShuffleOptions {
        enabled: config.shuffle && !no_shuffle,
        seed: seed.or(config.shuffle_seed),
    }
}
