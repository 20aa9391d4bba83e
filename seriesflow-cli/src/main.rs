// Copyright 2025 Seriesflow Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Seriesflow CLI
//!
//! Command-line entry for the ingestion engine: run a dataset pipeline,
//! inspect its current version, or invoke the batch handler.

mod config_loader;
mod handler;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config_loader::{load_app_config_from_env, load_dataset_config};
use handler::HandlerEvent;
use object_store::aws::AmazonS3Builder;
use seriesflow_core::{AppConfig, DatasetId, SystemClock};
use seriesflow_ingest::{Pipeline, SnsNotifier};
use seriesflow_plugins::Registry;
use seriesflow_storage::{CatalogStore, DynamoLeaseStore, ManifestStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seriesflow")]
#[command(about = "Seriesflow - incremental time-series dataset ingestion", long_about = None)]
struct Cli {
    /// Directory holding per-dataset TOML configs
    #[arg(long, default_value = "config/datasets")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline for a dataset
    Run {
        /// Dataset ID
        dataset_id: String,

        /// Process even if the source bytes are unchanged
        #[arg(long)]
        full_reload: bool,
    },

    /// Print the current version pointer and its manifest
    Status {
        /// Dataset ID
        dataset_id: String,
    },

    /// Invoke the batch handler with a JSON event
    Handle {
        /// Event JSON, e.g. '{"dataset_id":"bcra_rem","full_reload":false}'
        event: String,
    },
}

async fn build_pipeline(app_config: &AppConfig) -> Result<Pipeline> {
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(&app_config.bucket);
    if let Some(region) = &app_config.region {
        builder = builder.with_region(region);
    }
    let s3 = builder.build().context("failed to build object store")?;
    let store = CatalogStore::new(Arc::new(s3));

    let clock = Arc::new(SystemClock);
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let lease = app_config.lock_table.as_ref().map(|table| {
        let client = aws_sdk_dynamodb::Client::new(&aws);
        Arc::new(DynamoLeaseStore::new(client, table, clock.clone()))
            as Arc<dyn seriesflow_storage::LeaseStore>
    });
    let notifier = app_config.sns_topic_arn.as_ref().map(|_| {
        let client = aws_sdk_sns::Client::new(&aws);
        Arc::new(SnsNotifier::new(client)) as Arc<dyn seriesflow_ingest::NotificationBus>
    });

    let registry = Registry::with_builtins();
    info!(
        parsers = registry.parser_count(),
        normalizers = registry.normalizer_count(),
        "plugin registry ready"
    );

    let pipeline = Pipeline::new(app_config.clone(), store, registry, clock, lease, notifier)?;
    Ok(pipeline)
}

async fn run_command(cli: Cli) -> Result<i32> {
    let app_config = load_app_config_from_env().context("failed to load app config")?;

    match cli.command {
        Commands::Run {
            dataset_id,
            full_reload,
        } => {
            let config = load_dataset_config(&cli.config_dir, &dataset_id)?;
            let pipeline = build_pipeline(&app_config).await?;
            let record = pipeline.run(&config, None, full_reload).await?;
            println!(
                "Pipeline completed: run_id={}, version={}, outcome={:?}, rows_added={}",
                record.run_id, record.version_ts, record.outcome, record.rows_added
            );
            Ok(0)
        }
        Commands::Status { dataset_id } => {
            let mut builder =
                AmazonS3Builder::from_env().with_bucket_name(&app_config.bucket);
            if let Some(region) = &app_config.region {
                builder = builder.with_region(region);
            }
            let store = CatalogStore::new(Arc::new(
                builder.build().context("failed to build object store")?,
            ));
            let manifests = ManifestStore::new(store);
            let dataset = DatasetId::new(dataset_id)?;

            match manifests.read_current_pointer(&dataset).await? {
                Some(pointer) => {
                    let manifest = manifests
                        .read_version_manifest(&dataset, &pointer.current_version)
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&pointer)?);
                    if let Some(manifest) = manifest {
                        println!("{}", serde_json::to_string_pretty(&manifest)?);
                    }
                    Ok(0)
                }
                None => {
                    println!("No published version for dataset '{dataset}'");
                    Ok(0)
                }
            }
        }
        Commands::Handle { event } => {
            let event: HandlerEvent =
                serde_json::from_str(&event).context("invalid handler event JSON")?;
            let pipeline = build_pipeline(&app_config).await?;
            let response = handler::handle(&pipeline, &cli.config_dir, event).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(if response.status_code == 200 { 0 } else { 1 })
        }
    }
}

#[tokio::main]
async fn main() {
    // .env values take precedence in local development; absence is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("seriesflow starting");

    match run_command(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
