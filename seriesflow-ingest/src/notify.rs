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

//! Consumer notification bus.
//!
//! FIFO topics (arn ending in `.fifo`) get a message group keyed by
//! dataset and a deduplication id derived from the manifest pointer, so
//! re-delivery of the same publication collapses.

use async_trait::async_trait;
use seriesflow_core::{sha256_hex, Result, SeriesflowError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of the publication notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetUpdated {
    #[serde(rename = "type")]
    pub message_type: String,
    pub timestamp: String,
    pub dataset_id: String,
    /// Manifest path relative to the bucket (no `datasets/` prefix).
    pub manifest_pointer: String,
}

impl DatasetUpdated {
    pub fn new(
        timestamp: impl Into<String>,
        dataset_id: impl Into<String>,
        manifest_pointer: impl Into<String>,
    ) -> Self {
        Self {
            message_type: "DATASET_UPDATED".into(),
            timestamp: timestamp.into(),
            dataset_id: dataset_id.into(),
            manifest_pointer: manifest_pointer.into(),
        }
    }
}

/// Publish-subscribe bus for publication notices.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish_dataset_updated(&self, topic_arn: &str, notice: &DatasetUpdated)
        -> Result<()>;
}

/// SNS-backed notifier.
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
}

impl SnsNotifier {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationBus for SnsNotifier {
    async fn publish_dataset_updated(
        &self,
        topic_arn: &str,
        notice: &DatasetUpdated,
    ) -> Result<()> {
        let body = serde_json::to_string(notice)?;
        let mut request = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(body);
        if topic_arn.ends_with(".fifo") {
            request = request
                .message_group_id(&notice.dataset_id)
                .message_deduplication_id(sha256_hex(notice.manifest_pointer.as_bytes()));
        }
        let response = request
            .send()
            .await
            .map_err(|e| SeriesflowError::Storage(format!("sns publish: {e}")))?;
        info!(
            topic_arn,
            dataset = notice.dataset_id,
            message_id = response.message_id().unwrap_or(""),
            "published dataset-updated notice"
        );
        Ok(())
    }
}

/// Notifier that records notices in memory, for tests.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: parking_lot::Mutex<Vec<(String, DatasetUpdated)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(String, DatasetUpdated)> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl NotificationBus for RecordingNotifier {
    async fn publish_dataset_updated(
        &self,
        topic_arn: &str,
        notice: &DatasetUpdated,
    ) -> Result<()> {
        self.notices
            .lock()
            .push((topic_arn.to_string(), notice.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_serializes_with_type_field() {
        let notice = DatasetUpdated::new(
            "2024-01-01T00:00:00+00:00",
            "bcra_rem",
            "bcra_rem/events/2024-01-01T00-00-00/manifest.json",
        );
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["type"], "DATASET_UPDATED");
        assert_eq!(json["dataset_id"], "bcra_rem");
        assert!(json["manifest_pointer"]
            .as_str()
            .unwrap()
            .starts_with("bcra_rem/events/"));
    }

    #[tokio::test]
    async fn recording_notifier_captures_notices() {
        let notifier = RecordingNotifier::new();
        let notice = DatasetUpdated::new("t", "d", "d/events/v/manifest.json");
        notifier
            .publish_dataset_updated("arn:aws:sns:x:1:topic", &notice)
            .await
            .unwrap();
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, "arn:aws:sns:x:1:topic");
    }
}
