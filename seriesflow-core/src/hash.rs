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

//! Hashing utilities: key fingerprints and content hashes.

use sha1::{Digest, Sha1};
use sha2::Sha256;

/// SHA-1 hex fingerprint of primary-key values joined by `|` in declared
/// order. Equal fingerprints denote the same logical row.
pub fn key_fingerprint(values: &[String]) -> String {
    let joined = values.join("|");
    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 hex of raw content, used for source-change detection.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_forty_hex_chars() {
        let fp = key_fingerprint(&["2024-01-01".into(), "A".into()]);
        assert_eq!(fp.len(), 40);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let ab = key_fingerprint(&["a".into(), "b".into()]);
        let ba = key_fingerprint(&["b".into(), "a".into()]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
