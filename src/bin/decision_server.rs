//! Process entry point: loads configuration and ensemble artifacts once at
//! startup, then serves one `Snapshot` JSON object per input line with one
//! `Reply` JSON object per output line (spec §6 — "wrapping it in HTTP,
//! pipes, or a message queue is the orchestrator author's choice"; this
//! repository's choice is newline-delimited JSON over stdio, mirroring the
//! teacher crate's `run_1500_trades` harness reading its trade log).

use decision_core::Snapshot;
use funded_decision_engine::ensemble_predictor::EnsemblePredictor;
use funded_decision_engine::metadata_store::MetadataStore;
use funded_decision_engine::monitoring::MonitoringSystem;
use funded_decision_engine::{EngineConfig, Orchestrator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::Notify;

const METADATA_STORE_PATH_ENV: &str = "ENGINE_METADATA_STORE_PATH";
const DEFAULT_METADATA_STORE_PATH: &str = "data/position_metadata.json";
const ARTIFACTS_DIR_ENV: &str = "ENGINE_ARTIFACTS_DIR";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: config load failed: {err}");
            std::process::exit(1);
        }
    };

    let metadata_path =
        std::env::var(METADATA_STORE_PATH_ENV).unwrap_or_else(|_| DEFAULT_METADATA_STORE_PATH.to_string());
    let metadata = MetadataStore::load(&metadata_path).await;

    // Ensemble artifacts are an opaque, pre-trained input this engine only
    // consumes (spec §1 non-goal: "training pipelines"). Symbols with no
    // artifact directory configured, or no files for that symbol, fall back
    // to (HOLD, 50) per spec §4.2; a partially-present or unparseable
    // artifact is a startup-fatal schema mismatch (spec §6 exit codes).
    let predictor = match std::env::var(ARTIFACTS_DIR_ENV) {
        Ok(dir) => match EnsemblePredictor::load_from_dir(std::path::Path::new(&dir)) {
            Ok(predictor) => predictor,
            Err(err) => {
                eprintln!("fatal: ensemble artifact load failed: {err}");
                std::process::exit(1);
            }
        },
        Err(_) => EnsemblePredictor::new(),
    };

    let monitoring = Arc::new(MonitoringSystem::new());
    let orchestrator = Arc::new(Orchestrator::new(config, predictor, metadata, monitoring));

    let shutdown = Arc::new(Notify::new());
    let ctrlc_shutdown = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        ctrlc_shutdown.notify_one();
    }) {
        tracing::warn!(error = %err, "failed to install signal handler");
    }

    tracing::info!("decision engine ready");

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!("shutdown requested, exiting cleanly");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let reply = match serde_json::from_str::<Snapshot>(&line) {
                            Ok(snapshot) => orchestrator.decide(snapshot).await,
                            Err(err) => {
                                tracing::warn!(error = %err, "malformed snapshot, holding");
                                decision_core::Decision::hold("bad snapshot")
                                    .into_reply(decision_core::Diagnostics::default())
                            }
                        };
                        let serialized = serde_json::to_string(&reply).expect("reply always serializable");
                        if let Err(err) = stdout.write_all(serialized.as_bytes()).await {
                            tracing::error!(error = %err, "failed writing reply");
                            break;
                        }
                        let _ = stdout.write_all(b"\n").await;
                        let _ = stdout.flush().await;
                    }
                    Ok(None) => {
                        tracing::info!("input closed, exiting cleanly");
                        break;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "error reading input");
                        break;
                    }
                }
            }
        }
    }

    std::process::exit(0);
}
