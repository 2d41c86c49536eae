//! Sonograph CLI - compose, inspect and live-reload compositions

use clap::{Parser, Subcommand};
use sonograph::composition::IDIOTEQUE_TOML;
use sonograph::engine::JsonLinesEngine;
use sonograph::live::{LiveConfig, LiveSession};
use sonograph::probe::GateProbe;
use sonograph::{compose, Composition, Error};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sonograph")]
#[command(about = "Declarative audio-graph composer with hot reload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a composition file and report the resulting graph
    Compose {
        /// Composition file (.toml)
        file: PathBuf,

        /// Print the full graph as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Write the JSON graph to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Watch a composition and stream every new graph to stdout as JSON lines
    Live {
        /// Composition file to watch and auto-reload
        file: PathBuf,

        /// Hold rendering until the engine writes `ready` on stdin
        #[arg(long)]
        wait_ready: bool,

        /// Quiet period that closes a burst of changes, in milliseconds
        #[arg(long, default_value = "50")]
        debounce_ms: u64,
    },

    /// Print the values a sequencer emits, one line per step change
    Probe {
        /// Composition file (.toml)
        file: PathBuf,

        /// Sequencer key, e.g. drums.kick
        #[arg(short, long)]
        sequencer: String,

        /// Number of samples to evaluate (default: one second)
        #[arg(short = 'n', long, default_value = "44100")]
        samples: usize,

        /// Sample rate in Hz (default: the composition's)
        #[arg(short = 'r', long)]
        sample_rate: Option<f64>,
    },

    /// Print the bundled Idioteque composition
    Preset,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries graphs
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compose { file, json, output } => {
            let composition = Composition::load(&file)?;
            let graph = compose(&composition)?;

            if let Some(path) = output {
                std::fs::write(&path, graph.to_json()?)?;
                println!("✅ Wrote {} nodes to {}", graph.len(), path.display());
            } else if json {
                println!("{}", graph.to_json()?);
            } else {
                println!("📊 {} ({} nodes)", file.display(), graph.len());
                for (kind, count) in graph.census() {
                    println!("   {:<14} {}", kind, count);
                }
                println!("   left  = {}", graph.left);
                println!("   right = {}", graph.right);
                println!("   fingerprint {}", graph.fingerprint()?);
            }
        }

        Commands::Live {
            file,
            wait_ready,
            debounce_ms,
        } => {
            let engine = if wait_ready {
                let engine = JsonLinesEngine::awaiting_ready(io::stdout());
                let _listener = engine.listen_for_ready(BufReader::new(io::stdin()));
                engine
            } else {
                JsonLinesEngine::new(io::stdout())
            };
            let config = LiveConfig {
                debounce: Duration::from_millis(debounce_ms),
                ..LiveConfig::default()
            };
            let mut session = LiveSession::new(&file, Arc::new(engine), config)?;
            session.watch()?;
        }

        Commands::Probe {
            file,
            sequencer,
            samples,
            sample_rate,
        } => {
            let composition = Composition::load(&file)?;
            let graph = compose(&composition)?;
            let id = graph.sequencer(&sequencer).ok_or_else(|| {
                Error::invalid("sequencer", format!("no sequencer keyed `{}`", sequencer))
            })?;
            let sample_rate = sample_rate.unwrap_or(composition.sample_rate);
            let mut probe = GateProbe::new(&graph, id, sample_rate)?;

            let mut last = None;
            for n in 0..samples {
                let value = probe.next_sample();
                let step = probe.step_index();
                if last != Some((step, value)) {
                    let ms = n as f64 * 1000.0 / sample_rate;
                    match step {
                        Some(step) => println!("{:>10.2} ms  step {:>3}  {}", ms, step, value),
                        None => println!("{:>10.2} ms  idle       {}", ms, value),
                    }
                    last = Some((step, value));
                }
            }
        }

        Commands::Preset => {
            print!("{}", IDIOTEQUE_TOML);
        }
    }

    Ok(())
}
