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

//! Application and dataset configuration.
//!
//! `AppConfig` describes the runtime environment (bucket, region, topic,
//! lock table); `DatasetConfig` describes one dataset's source, parsing
//! and normalization. Both are plain serde types; loading them from disk
//! or the environment is owned by the outer shell.

use crate::error::{Result, SeriesflowError};
use serde::{Deserialize, Serialize};

/// Runtime environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Object store bucket holding every dataset.
    pub bucket: String,
    pub region: Option<String>,
    pub sns_topic_arn: Option<String>,
    /// Lease table name; leasing is disabled when absent.
    pub lock_table: Option<String>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

fn default_verify_ssl() -> bool {
    true
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(SeriesflowError::Config("bucket must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

/// Where and how to fetch the source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub url: Option<String>,
    pub format: SourceFormat,
    pub sheet: Option<String>,
    pub header_row: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseSection {
    pub plugin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeSection {
    pub plugin: Option<String>,
    /// Primary-key columns, in fingerprint order.
    pub primary_keys: Vec<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySection {
    pub sns_topic_arn: Option<String>,
}

/// One entry of a wide-format series map: a source column that carries a
/// whole series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMapEntry {
    pub column: String,
    pub internal_series_code: String,
    pub unit: Option<String>,
    pub frequency: Option<String>,
}

/// Parser-specific options (column mapping for the built-in CSV parser).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOptions {
    pub date_col: Option<String>,
    pub value_col: Option<String>,
    pub series_col: Option<String>,
    pub series_map: Option<Vec<SeriesMapEntry>>,
    pub delimiter: Option<char>,
}

/// Per-dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_id: String,
    pub frequency: String,
    pub lag_days: i64,
    pub source: SourceConfig,
    #[serde(default)]
    pub parse: ParseSection,
    pub normalize: NormalizeSection,
    pub notify: Option<NotifySection>,
    pub provider: Option<String>,
    pub unit: Option<String>,
    /// Dataset-level plugin id; overrides `parse.plugin` when set.
    pub plugin: Option<String>,
    pub parse_config: Option<ParseOptions>,
}

impl DatasetConfig {
    /// The parser plugin id to use for this dataset.
    pub fn parser_plugin(&self) -> Option<&str> {
        self.plugin.as_deref().or(self.parse.plugin.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_id.is_empty() {
            return Err(SeriesflowError::Config("dataset_id must not be empty".into()));
        }
        if self.normalize.primary_keys.is_empty() {
            return Err(SeriesflowError::Config(format!(
                "dataset '{}': normalize.primary_keys must not be empty",
                self.dataset_id
            )));
        }
        if self.source.kind == SourceKind::Http && self.source.url.is_none() {
            return Err(SeriesflowError::Config(format!(
                "dataset '{}': source.url is required for http sources",
                self.dataset_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> DatasetConfig {
        DatasetConfig {
            dataset_id: "test_dataset".into(),
            frequency: "daily".into(),
            lag_days: 0,
            source: SourceConfig {
                kind: SourceKind::Http,
                url: Some("https://example.com/data.csv".into()),
                format: SourceFormat::Csv,
                sheet: None,
                header_row: None,
            },
            parse: ParseSection {
                plugin: Some("csv".into()),
            },
            normalize: NormalizeSection {
                plugin: Some("generic".into()),
                primary_keys: vec!["obs_time".into(), "internal_series_code".into()],
                timezone: None,
            },
            notify: None,
            provider: None,
            unit: None,
            plugin: None,
            parse_config: None,
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn validate_requires_url_for_http() {
        let mut config = minimal();
        config.source.url = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_primary_keys() {
        let mut config = minimal();
        config.normalize.primary_keys.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn dataset_plugin_overrides_parse_plugin() {
        let mut config = minimal();
        assert_eq!(config.parser_plugin(), Some("csv"));
        config.plugin = Some("bcra_rem".into());
        assert_eq!(config.parser_plugin(), Some("bcra_rem"));
    }
}
