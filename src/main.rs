use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use featflow::{ChainData, ChainSpec, ProcessArgs, ProcessingChain};

/// featflow - feature extraction and processing chains
///
/// Runs a JSON chain specification on one input file and writes the final
/// feature container.
#[derive(Parser, Debug)]
#[command(name = "featflow")]
#[command(version)]
#[command(about = "Run a feature processing chain on an input file", long_about = None)]
struct Args {
    /// Chain specification (JSON `{"chain": [...]}` or a bare stage list)
    #[arg(value_name = "CHAIN")]
    chain: PathBuf,

    /// Input file handed to the first stage as `filename`
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Where to write the final DataMatrix / DataRepository (JSON)
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Load stage state (normalizer statistics, sequencer shift) before running
    #[arg(long, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Save stage state after running
    #[arg(long, value_name = "PATH")]
    save_state: Option<PathBuf>,

    /// Extra process argument; the value is parsed as JSON, else taken as a string
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Print the chain table before running
    #[arg(long)]
    show_chain: bool,
}

impl Args {
    fn validate(&self) -> Result<()> {
        if !self.chain.is_file() {
            bail!("Chain specification does not exist: {:?}", self.chain);
        }
        if !self.input.is_file() {
            bail!("Input file does not exist: {:?}", self.input);
        }
        if let Some(state) = &self.state {
            if !state.is_file() {
                bail!("State file does not exist: {:?}", state);
            }
        }
        if let Some(output) = &self.output {
            if output.is_dir() {
                bail!("Output path is a directory: {:?}", output);
            }
        }
        Ok(())
    }

    fn process_args(&self) -> Result<ProcessArgs> {
        let mut args = ProcessArgs::new().with("filename", self.input.to_string_lossy().to_string());
        for raw in &self.set {
            let (key, value) = parse_override(raw)?;
            args.insert(key, value);
        }
        Ok(args)
    }
}

fn parse_override(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected KEY=VALUE, got '{}'", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Empty key in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    args.validate()
        .context("Failed to validate command-line arguments")?;

    println!("1. Building processing chain...");
    let spec = ChainSpec::load(&args.chain)
        .with_context(|| format!("Failed to load chain specification {:?}", args.chain))?;
    let mut chain = ProcessingChain::from_spec(&spec).context("Failed to build chain")?;
    println!("   {} stages, hash {}", chain.len(), chain.hash());
    if args.show_chain {
        print!("{}", chain.chain_string());
    }

    if let Some(state) = &args.state {
        println!("\n2. Loading stage state...");
        chain
            .load_state_file(state)
            .with_context(|| format!("Failed to load chain state {:?}", state))?;
    }

    println!("\n3. Running chain on {:?}...", args.input);
    let process_args = args.process_args()?;
    let output = chain
        .process(ChainData::None, &process_args)
        .context("Processing chain failed")?;
    println!("   Result: {}", output.summary());

    if let Some(path) = &args.output {
        println!("\n4. Writing output...");
        match &output {
            ChainData::Matrix(matrix) => matrix.save(path).map(|_| ()),
            ChainData::Repository(repository) => repository.save(path).map(|_| ()),
            other => bail!("Cannot write {} output to {:?}", other.item_type(), path),
        }
        .with_context(|| format!("Failed to write output {:?}", path))?;
        println!("   Wrote {:?}", path);
    }

    if let Some(path) = &args.save_state {
        println!("\n5. Saving stage state...");
        chain
            .save_state(path)
            .with_context(|| format!("Failed to save chain state {:?}", path))?;
        println!("   Wrote {:?}", path);
    }

    println!("\n✓ Processing complete!");
    Ok(())
}
