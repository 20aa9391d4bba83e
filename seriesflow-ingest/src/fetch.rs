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

//! Source file fetching.

use bytes::Bytes;
use seriesflow_core::{sha256_hex, Result, SeriesflowError, SourceConfig, SourceKind};
use std::time::Duration;
use tracing::info;

const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetched source bytes plus the hash used for change detection.
#[derive(Debug)]
pub struct FetchedSource {
    pub bytes: Bytes,
    pub sha256: String,
    pub size: u64,
}

/// HTTP/local source fetcher.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(verify_ssl: bool) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(FETCH_TIMEOUT);
        if !verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| SeriesflowError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, source: &SourceConfig) -> Result<FetchedSource> {
        let url = source
            .url
            .as_deref()
            .ok_or_else(|| SeriesflowError::Config("source.url is required".into()))?;

        let bytes = match source.kind {
            SourceKind::Http => self.fetch_http(url).await?,
            SourceKind::Local => Bytes::from(tokio::fs::read(url).await?),
        };
        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        info!(url, size, hash = &sha256[..8], "fetched source");
        Ok(FetchedSource { bytes, sha256, size })
    }

    async fn fetch_http(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SeriesflowError::Fetch(format!("GET {url}: {e}")))?;
        let response = response
            .error_for_status()
            .map_err(|e| SeriesflowError::Fetch(format!("GET {url}: {e}")))?;
        response
            .bytes()
            .await
            .map_err(|e| SeriesflowError::Fetch(format!("GET {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seriesflow_core::SourceFormat;
    use std::io::Write;

    fn local_source(path: &str) -> SourceConfig {
        SourceConfig {
            kind: SourceKind::Local,
            url: Some(path.to_string()),
            format: SourceFormat::Csv,
            sheet: None,
            header_row: None,
        }
    }

    #[tokio::test]
    async fn local_fetch_hashes_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"obs_time,value\n2024-01-01,1\n").unwrap();
        let fetcher = Fetcher::new(true).unwrap();
        let fetched = fetcher
            .fetch(&local_source(file.path().to_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(fetched.size, fetched.bytes.len() as u64);
        assert_eq!(fetched.bytes.as_ref(), b"obs_time,value\n2024-01-01,1\n");
        assert_eq!(fetched.sha256, sha256_hex(&fetched.bytes));
    }

    #[tokio::test]
    async fn missing_url_is_a_config_error() {
        let fetcher = Fetcher::new(true).unwrap();
        let mut source = local_source("/tmp/x");
        source.url = None;
        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, SeriesflowError::Config(_)));
    }
}
