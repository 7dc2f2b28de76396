//! `decigrad`: train a decimal MLP and render its loss graph.
//!
//! Runs training steps on random inputs against one fixed random expectation,
//! logging every step, and writes the last step's loss graph as Graphviz DOT.
//!
//! ```text
//! decigrad --config run.toml --steps 50 --dot loss.dot
//! ```

mod dot;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dg_core::{build_graph, layers_spec, Decimal, Grapher};
use dg_nn::layers::uniform_unit;
use dg_nn::{NetworkConfig, NeuralNetwork, TracingHooks};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use dot::DotGrapher;

#[derive(Debug, Parser)]
#[command(name = "decigrad", about = "Train a decimal MLP and render its loss graph")]
struct Cli {
    /// TOML file with [network] and [run] tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of training steps.
    #[arg(long)]
    steps: Option<usize>,

    /// Write the final loss graph to this DOT file.
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Seed for weights, inputs and expectation.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    learning_rate: Option<Decimal>,

    /// Pause between steps, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default = "default_network")]
    network: NetworkConfig,
    #[serde(default)]
    run: RunConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            network: default_network(),
            run: RunConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RunConfig {
    steps: usize,
    dot_output: Option<PathBuf>,
    interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            steps: 100,
            dot_output: None,
            interval_ms: 0,
        }
    }
}

fn default_network() -> NetworkConfig {
    NetworkConfig::new(3, [3, 3, 3])
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    if let Some(steps) = cli.steps {
        config.run.steps = steps;
    }
    if let Some(path) = &cli.dot {
        config.run.dot_output = Some(path.clone());
    }
    if let Some(ms) = cli.interval_ms {
        config.run.interval_ms = ms;
    }
    if let Some(seed) = cli.seed {
        config.network.seed = Some(seed);
    }
    if let Some(lr) = cli.learning_rate {
        config.network.learning_rate = lr;
    }
    config.network.validate()?;
    Ok(config)
}

/// `n` values drawn uniformly from [-1, 1), like initial weights.
fn random_values<R: Rng>(rng: &mut R, n: usize) -> Vec<Decimal> {
    (0..n).map(|_| uniform_unit(rng)).collect()
}

fn write_graph(grapher: &mut DotGrapher, path: &Path) -> Result<()> {
    let bytes = grapher.render()?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        nodes = grapher.node_count(),
        edges = grapher.edge_count(),
        "wrote loss graph"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut net = NeuralNetwork::new(&config.network)?.with_hooks(TracingHooks);
    let mut rng = match config.network.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let expectation = random_values(&mut rng, net.output_shape());
    let mut grapher = DotGrapher::new();

    tracing::info!(
        input_shape = net.input_shape(),
        output_shape = net.output_shape(),
        layers = %layers_spec(net.layers().len()),
        parameters = net.parameters().len(),
        steps = config.run.steps,
        "starting training"
    );

    let mut completed = 0usize;
    for i in 0..config.run.steps {
        if i > 0 && config.run.interval_ms > 0 {
            thread::sleep(Duration::from_millis(config.run.interval_ms));
        }

        let input = random_values(&mut rng, net.input_shape());
        tracing::debug!(step = i, ?input, "running step");

        let loss = match net.step(&input, &expectation) {
            Ok(loss) => loss,
            Err(err) => {
                tracing::error!(step = i, error = %err, "training step failed");
                net.reset();
                continue;
            }
        };
        completed += 1;

        if let Err(err) = build_graph(&mut grapher, net.tape(), loss) {
            tracing::error!(step = i, error = %err, "failed to build loss graph");
        }
    }

    tracing::info!(completed, failed = config.run.steps - completed, "training finished");

    if let Some(path) = &config.run.dot_output {
        if completed == 0 {
            anyhow::bail!("no step completed, nothing to render");
        }
        write_graph(&mut grapher, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_file() {
        let config: FileConfig = toml::from_str(
            r#"
            [network]
            input_shape = 2
            shape = [4, 1]
            learning_rate = "0.1"

            [run]
            steps = 7
            dot_output = "loss.dot"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.shape, vec![4, 1]);
        assert_eq!(config.network.learning_rate, dec!(0.1));
        assert_eq!(config.run.steps, 7);
        assert_eq!(config.run.dot_output, Some(PathBuf::from("loss.dot")));
        assert_eq!(config.run.interval_ms, 0);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "decigrad",
            "--steps",
            "3",
            "--seed",
            "5",
            "--learning-rate",
            "0.5",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.run.steps, 3);
        assert_eq!(config.network.seed, Some(5));
        assert_eq!(config.network.learning_rate, dec!(0.5));
        assert_eq!(config.network.shape, vec![3, 3, 3]);
    }

    #[test]
    fn test_random_values_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let values = random_values(&mut rng, 50);
        assert_eq!(values.len(), 50);
        assert!(values.iter().all(|v| *v >= dec!(-1) && *v < dec!(1)));
    }
}
