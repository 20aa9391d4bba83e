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

//! Batch/Lambda-style handler.
//!
//! Maps an event `{dataset_id, full_reload?}` onto a pipeline run and the
//! run onto `{statusCode, body}`: 400 for a bad request, 404 when the
//! dataset config does not exist, 500 for anything else.

use crate::config_loader::load_dataset_config;
use serde::{Deserialize, Serialize};
use serde_json::json;
use seriesflow_ingest::Pipeline;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerEvent {
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub full_reload: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: serde_json::Value,
}

pub async fn handle(
    pipeline: &Pipeline,
    config_dir: &Path,
    event: HandlerEvent,
) -> HandlerResponse {
    let Some(dataset_id) = event.dataset_id.filter(|id| !id.is_empty()) else {
        return HandlerResponse {
            status_code: 400,
            body: json!({"error": "dataset_id is required"}),
        };
    };

    let config = match load_dataset_config(config_dir, &dataset_id) {
        Ok(config) => config,
        Err(e) if e.is_not_found() => {
            error!(dataset_id, error = %e, "dataset config not found");
            return HandlerResponse {
                status_code: 404,
                body: json!({"error": e.to_string()}),
            };
        }
        Err(e) => {
            error!(dataset_id, error = %e, "failed to load dataset config");
            return HandlerResponse {
                status_code: 500,
                body: json!({"error": e.to_string()}),
            };
        }
    };

    match pipeline.run(&config, None, event.full_reload).await {
        Ok(record) => {
            info!(
                dataset_id,
                run = %record.run_id,
                version = %record.version_ts,
                outcome = ?record.outcome,
                "pipeline completed"
            );
            HandlerResponse {
                status_code: 200,
                body: json!({
                    "dataset_id": record.dataset_id,
                    "run_id": record.run_id,
                    "version_ts": record.version_ts,
                    "outcome": record.outcome,
                    "published": record.published(),
                    "rows_added": record.rows_added,
                    "status": "completed",
                }),
            }
        }
        Err(e) => {
            error!(dataset_id, error = %e, "pipeline failed");
            HandlerResponse {
                status_code: 500,
                body: json!({"error": e.to_string()}),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seriesflow_core::{AppConfig, ManualClock};
    use seriesflow_plugins::Registry;
    use seriesflow_storage::CatalogStore;
    use std::sync::Arc;

    fn pipeline() -> Pipeline {
        let app_config = AppConfig {
            bucket: "test-bucket".into(),
            region: None,
            sns_topic_arn: None,
            lock_table: None,
            verify_ssl: true,
        };
        Pipeline::new(
            app_config,
            CatalogStore::in_memory(),
            Registry::with_builtins(),
            Arc::new(ManualClock::epoch_2024()),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn missing_dataset_id_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = handle(
            &pipeline(),
            dir.path(),
            HandlerEvent {
                dataset_id: None,
                full_reload: false,
            },
        )
        .await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn unknown_dataset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = handle(
            &pipeline(),
            dir.path(),
            HandlerEvent {
                dataset_id: Some("ghost".into()),
                full_reload: false,
            },
        )
        .await;
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn pipeline_failure_maps_to_500() {
        let dir = tempfile::tempdir().unwrap();
        // Valid config pointing at a file that does not exist.
        std::fs::write(
            dir.path().join("broken.toml"),
            r#"
dataset_id = "broken"
frequency = "daily"
lag_days = 0

[source]
kind = "local"
url = "/nonexistent/source.csv"
format = "csv"

[parse]
plugin = "csv"

[normalize]
plugin = "generic"
primary_keys = ["obs_time"]
"#,
        )
        .unwrap();
        let response = handle(
            &pipeline(),
            dir.path(),
            HandlerEvent {
                dataset_id: Some("broken".into()),
                full_reload: false,
            },
        )
        .await;
        assert_eq!(response.status_code, 500);
    }
}
