use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rowstream_engine::{BatchIterator, DatasetSpec};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowstream")]
#[command(about = "Rowstream - stream fixed-size row batches out of tabular partitions")]
struct Cli {
    /// Path to the dataset spec (YAML)
    #[arg(short, long)]
    config: String,

    /// Stop after this many batches, overriding the spec's iteration count
    #[arg(long)]
    max_batches: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load YAML spec
    let mut spec: DatasetSpec = serde_yaml::from_str(&std::fs::read_to_string(&cli.config)?)?;
    if cli.max_batches.is_some() {
        spec.iterations = cli.max_batches;
    }

    let iter = BatchIterator::open(&spec)?;

    let bar = match spec.iterations {
        Some(n) => ProgressBar::new(n).with_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} batches ({per_sec})",
        )?),
        None => ProgressBar::new_spinner(),
    };

    let mut batches = 0u64;
    let mut rows = 0usize;
    for batch in iter {
        let batch = batch?;
        batches += 1;
        rows += batch.num_rows();
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("✓ Streamed {batches} batches ({rows} rows)");
    Ok(())
}
