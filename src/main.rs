use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use bytepair::Tokenizer;
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn merge rules from a corpus and write a model file
    Train {
        /// Training corpus, read whole into memory
        corpus: PathBuf,
        /// Destination model file
        model_out: PathBuf,
        /// Total vocabulary size to aim for (bytes included)
        target_vocab: u32,
        /// Minimum pair frequency for a merge
        #[arg(default_value_t = 2)]
        min_freq: u32,
    },

    /// Encode text with a trained model, printing decimal token ids
    Encode {
        /// Model file written by `train`
        model: PathBuf,
        /// Text to encode
        text: String,
    },

    /// Decode token ids back to bytes
    Decode {
        /// Model file written by `train`
        model: PathBuf,
        /// Ids to decode
        ids: Vec<u32>,
    },
}

impl Commands {
    fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::Train {
                corpus,
                model_out,
                target_vocab,
                min_freq,
            } => {
                let text = fs::read(&corpus)
                    .with_context(|| format!("reading corpus {}", corpus.display()))?;
                debug!(bytes = text.len(), target_vocab, min_freq, "training");
                let tok = Tokenizer::train(&text, target_vocab, min_freq);
                tok.save(&model_out)
                    .with_context(|| format!("writing model {}", model_out.display()))?;
                println!("Done.");
            }
            Commands::Encode { model, text } => {
                let tok = Tokenizer::load(&model)
                    .with_context(|| format!("loading model {}", model.display()))?;
                let ids = tok.encode(text.as_bytes());
                let line = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{line}");
            }
            Commands::Decode { model, ids } => {
                let tok = Tokenizer::load(&model)
                    .with_context(|| format!("loading model {}", model.display()))?;
                let bytes = tok.decode(&ids);
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    let default_log_directive = match cli.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to set tracing subscriber");
        exit(1);
    }

    if let Err(e) = cli.command.execute() {
        error!("{e:#}");
        exit(1);
    }
}
