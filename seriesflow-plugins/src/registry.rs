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

//! Plugin registry.
//!
//! Populated once by the outer shell at startup and passed by value into
//! the orchestrator; lookups never require a plugin default, a dataset
//! must name the plugin it wants.

use crate::error::{PluginError, PluginResult};
use crate::{CsvParser, GenericNormalizer, Normalizer, Parser};
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from plugin id to parser/normalizer instance.
#[derive(Default, Clone)]
pub struct Registry {
    parsers: HashMap<String, Arc<dyn Parser>>,
    normalizers: HashMap<String, Arc<dyn Normalizer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_parser(Arc::new(CsvParser::new()));
        registry.register_normalizer(Arc::new(GenericNormalizer::new()));
        registry
    }

    pub fn register_parser(&mut self, parser: Arc<dyn Parser>) {
        self.parsers.insert(parser.id().to_string(), parser);
    }

    pub fn register_normalizer(&mut self, normalizer: Arc<dyn Normalizer>) {
        self.normalizers
            .insert(normalizer.id().to_string(), normalizer);
    }

    pub fn parser(&self, id: Option<&str>) -> PluginResult<Arc<dyn Parser>> {
        let id = id.ok_or(PluginError::MissingPluginId("parser"))?;
        self.parsers
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotRegistered {
                kind: "parser",
                id: id.to_string(),
            })
    }

    pub fn normalizer(&self, id: Option<&str>) -> PluginResult<Arc<dyn Normalizer>> {
        let id = id.ok_or(PluginError::MissingPluginId("normalizer"))?;
        self.normalizers
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotRegistered {
                kind: "normalizer",
                id: id.to_string(),
            })
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    pub fn normalizer_count(&self) -> usize {
        self.normalizers.len()
    }
}
