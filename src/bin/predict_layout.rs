//! Predict Layout - command-line entry point for both boundary operations
//!
//! Usage:
//!   cargo run --bin predict_layout -- request.json        # predict-batch
//!   cat request.json | cargo run --bin predict_layout -- -
//!   cargo run --bin predict_layout -- --totals crops.json  # compute-layout-totals
//!   cargo run --bin predict_layout -- --config service.json request.json
//!
//! Configuration comes from the environment (YIELD_MODE, YIELD_MODEL_PATH, ...)
//! unless `--config` names a JSON config file.
//! Prints pretty JSON to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use crop_yield_rust::{compute_layout_totals, CropAreaInput, PredictBatchRequest, PredictionService, ServiceConfig};
use std::io::Read;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn read_input(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("Failed to read request file: {}", arg))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crop_yield_rust=info,predict_layout=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, rest) = match args.as_slice() {
        [flag, path, rest @ ..] if flag == "--config" => (Some(path.as_str()), rest),
        rest => (None, rest),
    };
    let (totals_only, input) = match rest {
        [flag, path] if flag == "--totals" => (true, path.as_str()),
        [path] => (false, path.as_str()),
        _ => bail!("usage: predict_layout [--config <service.json>] [--totals] <request.json | ->"),
    };

    let raw = read_input(input)?;

    if totals_only {
        let crops: Vec<CropAreaInput> =
            serde_json::from_str(&raw).context("Failed to parse crop areas JSON")?;
        let totals = compute_layout_totals(&crops)?;
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    let request: PredictBatchRequest =
        serde_json::from_str(&raw).context("Failed to parse predict-batch request JSON")?;

    let config = match config_path {
        Some(path) => ServiceConfig::load(Path::new(path))?,
        None => ServiceConfig::from_env(),
    };
    let service = PredictionService::new(config);
    if let Err(e) = service.warm_up() {
        tracing::warn!("Model warm-up failed: {}", e);
    }

    let response = service.handle_request(&request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
