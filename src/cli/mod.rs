// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the classifier on a class-per-folder
//                  image directory and exports the model
//   2. `predict` — loads the exported model and classifies one image
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

/// The main CLI struct. clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "tumor-classifier",
    version = "0.1.0",
    about = "Train a CNN tumor / non-tumor image classifier, then classify scans."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.data_dir);

    // Convert CLI args → application config (separates presentation from domain)
    let use_case = TrainUseCase::new(args.into());
    let summary  = use_case.execute()?;

    println!("{}", summary.final_report.report);
    println!(
        "Training complete. Best macro-F1 {:.4}. Model saved to {}",
        summary.best_f1,
        summary.artifacts.weights.display()
    );
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case   = PredictUseCase::new(args.model_dir, args.device.into());
    let prediction = use_case.predict(&args.image)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
