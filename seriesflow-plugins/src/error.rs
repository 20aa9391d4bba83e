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

//! Plugin error types.

use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Errors from parser/normalizer plugins and their registry.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Dataset config named no plugin
    #[error("Plugin id is required - no default {0} available")]
    MissingPluginId(&'static str),

    /// Requested plugin is not in the registry
    #[error("{kind} plugin '{id}' not found")]
    NotRegistered { kind: &'static str, id: String },

    /// Parser failure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Normalizer failure
    #[error("Normalize error: {0}")]
    Normalize(String),

    /// Plugin configuration problem (missing columns, bad options)
    #[error("Plugin config error: {0}")]
    Config(String),
}

impl From<PluginError> for seriesflow_core::SeriesflowError {
    fn from(e: PluginError) -> Self {
        use seriesflow_core::SeriesflowError;
        match e {
            PluginError::Parse(msg) => SeriesflowError::Parse(msg),
            PluginError::Normalize(msg) => SeriesflowError::Normalize(msg),
            other => SeriesflowError::Config(other.to_string()),
        }
    }
}
