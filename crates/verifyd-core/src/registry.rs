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

//! The certificate registry: exclusive owner of certificate records.
//!
//! Every read and write of certificate state passes through this store. A
//! create or approve is visible either completely or not at all: mutations
//! are applied in memory, persisted with an atomic durable write, and rolled
//! back in memory if the persist fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::certificate::{CertStatus, Certificate, CertificateId};
use crate::error::{VerifydError, VerifydResult};
use crate::storage::{write_file_atomic_durable, ArtifactRef};

const REGISTRY_FILE: &str = "certificates.json";

#[derive(Debug, Serialize, Deserialize, Default)]
struct RegistryFile {
    certificates: BTreeMap<CertificateId, Certificate>,
}

#[derive(Debug)]
pub struct CertificateRegistry {
    path: PathBuf,
    certificates: BTreeMap<CertificateId, Certificate>,
}

impl CertificateRegistry {
    pub fn open(root: &Path) -> VerifydResult<Self> {
        let path = root.join(REGISTRY_FILE);
        let certificates = if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|_| VerifydError::Internal("read registry failed".to_string()))?;
            serde_json::from_slice::<RegistryFile>(&bytes)
                .map_err(|_| VerifydError::Internal("decode registry failed".to_string()))?
                .certificates
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, certificates })
    }

    pub fn get(&self, id: &CertificateId) -> Option<&Certificate> {
        self.certificates.get(id)
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Inserts a new record. An existing record under the same id is never
    /// overwritten; that is an internal fault, not a client error.
    pub fn create(&mut self, certificate: Certificate) -> VerifydResult<Certificate> {
        let id = certificate.id.clone();
        if self.certificates.contains_key(&id) {
            return Err(VerifydError::Internal(
                "certificate id collision".to_string(),
            ));
        }
        self.certificates.insert(id.clone(), certificate.clone());
        if let Err(err) = self.persist() {
            self.certificates.remove(&id);
            return Err(err);
        }
        Ok(certificate)
    }

    /// `REVIEW -> CERTIFIED`, together with the artifact reference, in one
    /// persisted write. A reader never observes `CERTIFIED` without the
    /// stamped artifact it releases.
    pub fn approve(
        &mut self,
        id: &CertificateId,
        artifact: ArtifactRef,
    ) -> VerifydResult<Certificate> {
        let previous = self
            .certificates
            .get(id)
            .cloned()
            .ok_or_else(|| VerifydError::NotFound(format!("certificate {id}")))?;
        let mut updated = previous.clone();
        updated.status = previous.status.transition(CertStatus::Certified)?;
        updated.stored_artifact_ref = Some(artifact);
        self.certificates.insert(id.clone(), updated.clone());
        if let Err(err) = self.persist() {
            self.certificates.insert(id.clone(), previous);
            return Err(err);
        }
        Ok(updated)
    }

    fn persist(&self) -> VerifydResult<()> {
        let payload = serde_json::to_vec_pretty(&RegistryFile {
            certificates: self.certificates.clone(),
        })
        .map_err(|_| VerifydError::Internal("encode registry failed".to_string()))?;
        write_file_atomic_durable(&self.path, &payload, "write registry failed")
    }
}
