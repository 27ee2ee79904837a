// Copyright [2026] [VeriFYD Contributors]
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// Copyright (c) 2026 VeriFYD Contributors
// SPDX-License-Identifier: Apache-2.0

//! Content fingerprinting: streaming SHA-256 over the original upload bytes.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_BYTES: usize = 8192;

/// Streams `path` in fixed-size chunks and returns the lowercase hex SHA-256
/// digest. Memory use is constant in the file size; read errors propagate.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; CHUNK_BYTES];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn same_bytes_same_digest() {
        let tmp = TempDir::new().expect("tmp");
        let a = tmp.path().join("a.mp4");
        let b = tmp.path().join("b.mp4");
        fs::write(&a, b"frame data").expect("write a");
        fs::write(&b, b"frame data").expect("write b");
        assert_eq!(
            fingerprint_file(&a).expect("a"),
            fingerprint_file(&b).expect("b")
        );
    }

    #[test]
    fn distinct_bytes_distinct_digest() {
        let tmp = TempDir::new().expect("tmp");
        let a = tmp.path().join("a.mp4");
        let b = tmp.path().join("b.mp4");
        fs::write(&a, b"frame data").expect("write a");
        fs::write(&b, b"frame datb").expect("write b");
        assert_ne!(
            fingerprint_file(&a).expect("a"),
            fingerprint_file(&b).expect("b")
        );
    }

    #[test]
    fn file_and_bytes_digests_agree() {
        let tmp = TempDir::new().expect("tmp");
        let a = tmp.path().join("a.mp4");
        let payload = vec![7u8; 3 * CHUNK_BYTES + 11];
        fs::write(&a, &payload).expect("write");
        assert_eq!(
            fingerprint_file(&a).expect("file"),
            fingerprint_bytes(&payload)
        );
    }

    #[test]
    fn unreadable_source_propagates_error() {
        let tmp = TempDir::new().expect("tmp");
        let missing = tmp.path().join("missing.mp4");
        assert!(fingerprint_file(&missing).is_err());
    }
}
