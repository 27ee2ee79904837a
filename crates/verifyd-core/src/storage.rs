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

//! On-disk artifact areas: staged raw uploads and certified stamped outputs.
//!
//! The store resolves ids to paths directly; nothing ever scans a directory
//! to find a file. All publishes go through a temp path and an atomic rename,
//! so readers observe either the previous state or the complete new file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::certificate::CertificateId;
use crate::error::{VerifydError, VerifydResult};

const STAGING_DIR: &str = "staging";
const CERTIFIED_DIR: &str = "certified";

/// Reference to a releasable file in the certified area. Stored in the
/// certificate record; resolved back to a path only through [`ArtifactStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
pub struct ArtifactStore {
    staging_dir: PathBuf,
    certified_dir: PathBuf,
}

impl ArtifactStore {
    pub fn open(root: &Path) -> VerifydResult<Self> {
        let staging_dir = root.join(STAGING_DIR);
        let certified_dir = root.join(CERTIFIED_DIR);
        fs::create_dir_all(&staging_dir)
            .map_err(|_| VerifydError::Internal("create staging dir failed".to_string()))?;
        fs::create_dir_all(&certified_dir)
            .map_err(|_| VerifydError::Internal("create certified dir failed".to_string()))?;
        Ok(Self {
            staging_dir,
            certified_dir,
        })
    }

    /// Writes the raw upload under `staging/{id}_{name}` via temp + rename.
    /// A caller that disconnects mid-write leaves at most a temp file, never
    /// a partially visible staged upload.
    pub fn stage(
        &self,
        id: &CertificateId,
        filename: &str,
        bytes: &[u8],
    ) -> VerifydResult<PathBuf> {
        let name = sanitize_filename(filename)?;
        let path = self.staging_dir.join(format!("{id}_{name}"));
        match write_file_atomic_durable(&path, bytes, "stage upload failed") {
            Ok(()) => Ok(path),
            Err(err) => {
                let _ = fs::remove_file(path.with_extension("tmp"));
                Err(err)
            }
        }
    }

    /// Path of the staged raw upload for `id`. Pure computation; existence is
    /// for the caller to check.
    pub fn staged_path(&self, id: &CertificateId, filename: &str) -> VerifydResult<PathBuf> {
        let name = sanitize_filename(filename)?;
        Ok(self.staging_dir.join(format!("{id}_{name}")))
    }

    pub fn remove_staged(&self, id: &CertificateId, filename: &str) -> VerifydResult<()> {
        let path = self.staged_path(id, filename)?;
        fs::remove_file(path)
            .map_err(|_| VerifydError::Internal("remove staged upload failed".to_string()))
    }

    /// Scratch path the stamping tool writes to; finished outputs are moved
    /// into place by [`ArtifactStore::publish`].
    pub fn stamp_output_path(&self, id: &CertificateId) -> PathBuf {
        self.certified_dir.join(format!("{id}.mp4.part"))
    }

    /// Atomically moves the finished stamp output into the certified area and
    /// returns the reference to record in the certificate.
    pub fn publish(&self, id: &CertificateId) -> VerifydResult<ArtifactRef> {
        let name = format!("{id}.mp4");
        let part = self.stamp_output_path(id);
        let dest = self.certified_dir.join(&name);
        fs::rename(&part, &dest)
            .map_err(|_| VerifydError::Internal("publish stamped output failed".to_string()))?;
        sync_directory(&self.certified_dir)?;
        Ok(ArtifactRef(name))
    }

    pub fn discard_stamp_output(&self, id: &CertificateId) {
        let _ = fs::remove_file(self.stamp_output_path(id));
    }

    /// Resolves a recorded artifact reference back to a path in the certified
    /// area. References never contain path separators.
    pub fn resolve(&self, artifact: &ArtifactRef) -> VerifydResult<PathBuf> {
        if artifact.0.is_empty()
            || artifact.0.contains('/')
            || artifact.0.contains('\\')
            || artifact.0.contains("..")
        {
            return Err(VerifydError::Internal(
                "malformed artifact reference".to_string(),
            ));
        }
        Ok(self.certified_dir.join(&artifact.0))
    }
}

/// Keeps only the final path component of a client-supplied filename.
fn sanitize_filename(filename: &str) -> VerifydResult<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .ok_or_else(|| VerifydError::InvalidInput("unusable filename".to_string()))?;
    Ok(name.to_string())
}

#[cfg(unix)]
pub fn sync_directory(path: &Path) -> VerifydResult<()> {
    let dir = File::open(path)
        .map_err(|_| VerifydError::Internal("open directory failed".to_string()))?;
    dir.sync_all()
        .map_err(|_| VerifydError::Internal("sync directory failed".to_string()))
}

#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> VerifydResult<()> {
    Ok(())
}

/// Write-temp, fsync, rename, fsync-dir. Either the full file lands at `path`
/// or the previous contents survive untouched.
pub fn write_file_atomic_durable(
    path: &Path,
    bytes: &[u8],
    write_err: &'static str,
) -> VerifydResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| VerifydError::Internal("path parent missing".to_string()))?;
    let tmp = path.with_extension("tmp");
    let mut f =
        File::create(&tmp).map_err(|_| VerifydError::Internal(write_err.to_string()))?;
    f.write_all(bytes)
        .map_err(|_| VerifydError::Internal(write_err.to_string()))?;
    f.sync_all()
        .map_err(|_| VerifydError::Internal(write_err.to_string()))?;
    fs::rename(&tmp, path).map_err(|_| VerifydError::Internal(write_err.to_string()))?;
    sync_directory(parent)?;
    Ok(())
}
