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

//! Configuration loading for the CLI shell.
//!
//! Dataset configs live as TOML files under a config directory, one file
//! per dataset id. The app config is assembled from environment
//! variables; the core never reads the environment itself.

use seriesflow_core::{AppConfig, DatasetConfig, Result, SeriesflowError};
use std::path::Path;

const VALID_ENVIRONMENTS: &[&str] = &["local", "staging", "production"];

/// Load and validate `<config_dir>/<dataset_id>.toml`.
pub fn load_dataset_config(config_dir: &Path, dataset_id: &str) -> Result<DatasetConfig> {
    let path = config_dir.join(format!("{dataset_id}.toml"));
    if !path.exists() {
        return Err(SeriesflowError::NotFound(format!(
            "config not found for dataset '{dataset_id}' (tried {})",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(&path)?;
    let config: DatasetConfig = toml::from_str(&raw).map_err(|e| {
        SeriesflowError::Config(format!("invalid config {}: {e}", path.display()))
    })?;
    if config.dataset_id != dataset_id {
        return Err(SeriesflowError::Config(format!(
            "config file {} declares dataset_id '{}'",
            path.display(),
            config.dataset_id
        )));
    }
    config.validate()?;
    Ok(config)
}

/// Assemble the app config from the environment.
///
/// `ENV` selects the environment name, `S3_BUCKET` is required, and
/// `AWS_REGION`/`AWS_DEFAULT_REGION`, `SNS_TOPIC_ARN`, `DYNAMODB_TABLE`
/// and `VERIFY_SSL` are optional.
pub fn load_app_config_from_env() -> Result<AppConfig> {
    let env = std::env::var("ENV").unwrap_or_else(|_| "local".to_string());
    if !VALID_ENVIRONMENTS.contains(&env.as_str()) {
        return Err(SeriesflowError::Config(format!(
            "invalid environment '{env}', must be one of: {}",
            VALID_ENVIRONMENTS.join(", ")
        )));
    }

    let bucket = std::env::var("S3_BUCKET")
        .map_err(|_| SeriesflowError::Config("S3_BUCKET is required".into()))?;
    let region = std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .ok();
    let sns_topic_arn = std::env::var("SNS_TOPIC_ARN").ok().filter(|v| !v.is_empty());
    let lock_table = std::env::var("DYNAMODB_TABLE").ok().filter(|v| !v.is_empty());
    let verify_ssl = std::env::var("VERIFY_SSL")
        .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true);

    let config = AppConfig {
        bucket,
        region,
        sns_topic_arn,
        lock_table,
        verify_ssl,
    };
    config.validate()?;
    Ok(config)
}
