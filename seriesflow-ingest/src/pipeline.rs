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

//! Run orchestrator.
//!
//! One run walks: lease → verify/repair → fetch → hash compare → parse →
//! latest-date filter → normalize → delta → enrich → write events →
//! publish (CAS) → consolidate → notify. Every early exit is a documented
//! outcome on the `RunRecord`, and the lease is released best-effort on
//! every path out.

use crate::consolidate::Consolidator;
use crate::delta::compute_delta;
use crate::enrich::enrich_metadata;
use crate::fetch::Fetcher;
use crate::latest::filter_by_latest_date;
use crate::notify::{DatasetUpdated, NotificationBus};
use crate::publish::{PublishOutcome, VersionPublisher};
use seriesflow_core::{
    columns, AppConfig, Clock, DatasetConfig, DatasetId, Result, RunId, RunOutcome, RunRecord,
    VersionStamp,
};
use seriesflow_plugins::Registry;
use seriesflow_storage::{
    paths, CatalogStore, EventStore, IndexStore, LeaseStore, ManifestStore, ProjectionStore,
    SourceFile, default_lease_ttl,
};
use std::sync::Arc;
use tracing::{info, warn};

/// The ingestion pipeline: single public operation `run`.
pub struct Pipeline {
    app_config: AppConfig,
    store: CatalogStore,
    events: EventStore,
    manifests: ManifestStore,
    index: IndexStore,
    consolidator: Consolidator,
    publisher: VersionPublisher,
    fetcher: Fetcher,
    registry: Registry,
    lease: Option<Arc<dyn LeaseStore>>,
    notifier: Option<Arc<dyn NotificationBus>>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        app_config: AppConfig,
        store: CatalogStore,
        registry: Registry,
        clock: Arc<dyn Clock>,
        lease: Option<Arc<dyn LeaseStore>>,
        notifier: Option<Arc<dyn NotificationBus>>,
    ) -> Result<Self> {
        app_config.validate()?;
        let events = EventStore::new(store.clone(), clock.clone());
        let manifests = ManifestStore::new(store.clone());
        let index = IndexStore::new(store.clone());
        let projections = ProjectionStore::new(store.clone(), clock.clone());
        let consolidator = Consolidator::new(events.clone(), projections);
        let publisher = VersionPublisher::new(manifests.clone(), index.clone(), clock.clone());
        let fetcher = Fetcher::new(app_config.verify_ssl)?;
        Ok(Self {
            app_config,
            store,
            events,
            manifests,
            index,
            consolidator,
            publisher,
            fetcher,
            registry,
            lease,
            notifier,
            clock,
        })
    }

    /// Run the pipeline for one dataset.
    ///
    /// Returns a `RunRecord` for every documented no-op (lease held,
    /// unchanged source, nothing new, lost CAS) and errors only on real
    /// failures.
    pub async fn run(
        &self,
        config: &DatasetConfig,
        run_id: Option<RunId>,
        full_reload: bool,
    ) -> Result<RunRecord> {
        config.validate()?;
        let dataset = DatasetId::new(config.dataset_id.clone())?;
        let run_id = run_id.unwrap_or_else(|| self.clock.new_run_id());
        let version = self.clock.new_version_stamp();
        let mut record = RunRecord::new(dataset.clone(), run_id.clone(), version.clone());

        info!(dataset = %dataset, run = %run_id, version = %version, "starting pipeline");

        let Some(lease) = &self.lease else {
            self.run_locked(config, &dataset, &version, full_reload, &mut record)
                .await?;
            return Ok(record);
        };

        let lock_key = dataset.lock_key();
        let acquired = lease
            .acquire(&lock_key, run_id.as_str(), default_lease_ttl())
            .await?;
        if !acquired {
            warn!(dataset = %dataset, "pipeline already running, skipping execution");
            record.outcome = RunOutcome::Locked;
            return Ok(record);
        }

        let result = self
            .run_locked(config, &dataset, &version, full_reload, &mut record)
            .await;

        // Best-effort release on success and failure alike.
        if let Err(e) = lease.release(&lock_key, run_id.as_str()).await {
            warn!(dataset = %dataset, error = %e, "lease release failed");
        }
        result?;
        Ok(record)
    }

    async fn run_locked(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        version: &VersionStamp,
        full_reload: bool,
        record: &mut RunRecord,
    ) -> Result<()> {
        // VERIFY: repair the index before touching anything else.
        if !self
            .index
            .verify_pointer_index_consistency(dataset, &self.manifests)
            .await?
        {
            warn!(dataset = %dataset, "pointer-index inconsistency detected, rebuilding index");
            self.index
                .rebuild_index_from_pointer(dataset, &self.manifests)
                .await?;
            info!(dataset = %dataset, "index rebuilt");
        }

        // FETCH + HASH_COMPARE.
        let fetched = self.fetcher.fetch(&config.source).await?;
        if !full_reload && self.source_unchanged(dataset, &fetched.sha256).await? {
            info!(dataset = %dataset, "source unchanged, skipping processing");
            record.outcome = RunOutcome::SourceUnchanged;
            return Ok(());
        }
        if full_reload {
            info!(dataset = %dataset, "full reload requested, processing regardless of source changes");
        }

        // PARSE.
        let parser = self.registry.parser(config.parser_plugin())?;
        let parsed = parser.parse(config, &fetched.bytes)?;
        info!(dataset = %dataset, rows = parsed.len(), "parsed source");

        // FILTER_BY_LATEST_DATE.
        let fresh =
            filter_by_latest_date(&self.store, &self.manifests, dataset, parsed).await?;
        if fresh.is_empty() {
            info!(dataset = %dataset, "no new data to process");
            record.outcome = RunOutcome::NoNewRows;
            return Ok(());
        }

        // NORMALIZE.
        let normalizer = self.registry.normalizer(config.normalize.plugin.as_deref())?;
        let normalized = normalizer.normalize(config, fresh)?;

        // COMPUTE_DELTA.
        let prior_index = self.index.read_index(dataset).await?;
        let delta = compute_delta(
            &normalized,
            prior_index.as_deref(),
            &config.normalize.primary_keys,
        )?;
        info!(dataset = %dataset, new_rows = delta.len(), "computed delta");
        if delta.is_empty() {
            record.outcome = RunOutcome::NoNewRows;
            return Ok(());
        }

        // ENRICH: event rows carry metadata but not the fingerprint.
        let mut event_rows = delta.clone();
        event_rows.drop_column(columns::KEY_HASH);
        let enriched = enrich_metadata(event_rows, config, version, self.clock.as_ref());

        // WRITE_EVENTS.
        let event_keys = self.events.write_events(dataset, version, &enriched).await?;
        let rows_added = enriched.len();
        record.rows_added = rows_added;

        // PUBLISH.
        let prior_etag = self.manifests.current_pointer_etag(dataset).await?;
        let source_file = SourceFile {
            path: None,
            sha256: fetched.sha256.clone(),
            size: fetched.size,
        };
        let outcome = self
            .publisher
            .publish(
                dataset,
                version,
                source_file,
                event_keys,
                rows_added,
                &config.normalize.primary_keys,
                prior_index.as_deref(),
                &delta,
                prior_etag.as_deref(),
            )
            .await?;

        match outcome {
            PublishOutcome::Skipped => {
                record.outcome = RunOutcome::NoNewRows;
                Ok(())
            }
            PublishOutcome::LostRace => {
                info!(dataset = %dataset, "publish lost the pointer race");
                record.outcome = RunOutcome::LostRace;
                Ok(())
            }
            PublishOutcome::Published { .. } => {
                // CONSOLIDATE + NOTIFY only for the CAS winner.
                self.consolidator
                    .consolidate(config, dataset, &enriched)
                    .await?;
                self.notify(config, dataset, version).await?;
                record.outcome = RunOutcome::Completed;
                record.published_version = Some(version.clone());
                Ok(())
            }
        }
    }

    async fn source_unchanged(&self, dataset: &DatasetId, sha256: &str) -> Result<bool> {
        let Some(manifest) = self.manifests.read_current_manifest(dataset).await? else {
            info!(dataset = %dataset, "first run: no previous manifest found");
            return Ok(false);
        };
        match manifest.source_sha256() {
            Some(prior) => Ok(prior == sha256),
            None => Ok(false),
        }
    }

    async fn notify(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        version: &VersionStamp,
    ) -> Result<()> {
        let topic = config
            .notify
            .as_ref()
            .and_then(|n| n.sns_topic_arn.clone())
            .or_else(|| self.app_config.sns_topic_arn.clone());
        let (Some(topic), Some(notifier)) = (topic, self.notifier.as_ref()) else {
            info!(dataset = %dataset, "no notification topic configured, skipping notify");
            return Ok(());
        };
        let notice = DatasetUpdated::new(
            self.clock.now_iso(),
            dataset.to_string(),
            paths::manifest_pointer(dataset, version),
        );
        notifier.publish_dataset_updated(&topic, &notice).await?;
        info!(dataset = %dataset, "notified consumers");
        Ok(())
    }
}
