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

//! Dataset lease: a timed exclusive ownership record.
//!
//! Acquisition is a conditional put that succeeds iff the lock key is
//! absent or its lease has expired; release is a conditional delete on
//! owner match. A release that finds a different owner falls back to
//! deleting only if that lease has already expired, and otherwise gives
//! up silently.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default lease time-to-live, in seconds.
pub const DEFAULT_LEASE_TTL_SECS: i64 = 3600;

/// Default lease time-to-live.
pub fn default_lease_ttl() -> Duration {
    Duration::seconds(DEFAULT_LEASE_TTL_SECS)
}

/// Distributed mutex keyed by lock key.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Try to acquire; `false` means another live owner holds the lease.
    async fn acquire(&self, lock_key: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Release an owned lease. Owner mismatch is not an error.
    async fn release(&self, lock_key: &str, owner: &str) -> Result<()>;
}

/// DynamoDB-backed lease store.
pub struct DynamoLeaseStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
    clock: Arc<dyn seriesflow_core::Clock>,
}

impl DynamoLeaseStore {
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        table: impl Into<String>,
        clock: Arc<dyn seriesflow_core::Clock>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            clock,
        }
    }
}

#[async_trait]
impl LeaseStore for DynamoLeaseStore {
    async fn acquire(&self, lock_key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let expires_at = (now + ttl).timestamp();

        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .item("lock_key", AttributeValue::S(lock_key.to_string()))
            .item("owner_id", AttributeValue::S(owner.to_string()))
            .item("acquired_at", AttributeValue::S(now.to_rfc3339()))
            .item("expires_at", AttributeValue::N(expires_at.to_string()))
            .condition_expression("attribute_not_exists(lock_key) OR expires_at < :now")
            .expression_attribute_values(":now", AttributeValue::N(now.timestamp().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(lock_key, owner, expires_at, "lease acquired");
                Ok(true)
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    debug!(lock_key, owner, "lease held by another owner");
                    Ok(false)
                } else {
                    Err(StorageError::Lease(service_err.to_string()))
                }
            }
        }
    }

    async fn release(&self, lock_key: &str, owner: &str) -> Result<()> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key("lock_key", AttributeValue::S(lock_key.to_string()))
            .condition_expression("owner_id = :owner")
            .expression_attribute_values(":owner", AttributeValue::S(owner.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(lock_key, owner, "lease released");
                Ok(())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if !service_err.is_conditional_check_failed_exception() {
                    return Err(StorageError::Lease(service_err.to_string()));
                }
                // Owner mismatch: reclaim only if the lease already expired.
                let now = self.clock.now().timestamp();
                let fallback = self
                    .client
                    .delete_item()
                    .table_name(&self.table)
                    .key("lock_key", AttributeValue::S(lock_key.to_string()))
                    .condition_expression("expires_at < :now")
                    .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
                    .send()
                    .await;
                match fallback {
                    Ok(_) => {
                        warn!(lock_key, owner, "released expired lease held by another owner");
                        Ok(())
                    }
                    Err(err) => {
                        let service_err = err.into_service_error();
                        if service_err.is_conditional_check_failed_exception() {
                            warn!(lock_key, owner, "lease owner mismatch on release");
                            Ok(())
                        } else {
                            Err(StorageError::Lease(service_err.to_string()))
                        }
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
struct LeaseEntry {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// In-memory lease store for tests and local runs.
pub struct InMemoryLeaseStore {
    entries: Mutex<HashMap<String, LeaseEntry>>,
    clock: Arc<dyn seriesflow_core::Clock>,
}

impl InMemoryLeaseStore {
    pub fn new(clock: Arc<dyn seriesflow_core::Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn acquire(&self, lock_key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(lock_key) {
            Some(entry) if entry.expires_at > now => Ok(false),
            _ => {
                entries.insert(
                    lock_key.to_string(),
                    LeaseEntry {
                        owner: owner.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, lock_key: &str, owner: &str) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(lock_key) {
            if entry.owner == owner || entry.expires_at < now {
                entries.remove(lock_key);
            } else {
                warn!(lock_key, owner, "lease owner mismatch on release");
            }
        }
        Ok(())
    }
}
