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

//! The certification lifecycle engine.
//!
//! One submission flows admission -> staging -> fingerprint -> score ->
//! stamp-or-park -> registry write -> quota commit. The quota counter is
//! charged only after the registry write succeeds, and on the auto-certify
//! path the stamped artifact exists before the `CERTIFIED` record is written,
//! so no reader ever sees a releasable status without a releasable file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use verifyd_core::certificate::{unix_now, CertStatus, Certificate, CertificateId};
use verifyd_core::error::{VerifydError, VerifydResult};
use verifyd_core::fingerprint::fingerprint_file;
use verifyd_core::quota::{Admission, QuotaLedger, UsageRecord};
use verifyd_core::registry::CertificateRegistry;
use verifyd_core::storage::{ArtifactRef, ArtifactStore};

use crate::config::DaemonConfig;
use crate::oracle::{
    scoring_oracle_from_config, stamping_oracle_from_config, ScoringOracle, StampingOracle,
};
use crate::telemetry::{LifecycleEvent, Telemetry};

const STATE_RECEIVED: &str = "RECEIVED";

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub certificate: Certificate,
    pub uploads_used: Option<u64>,
    pub free_remaining: Option<u64>,
}

pub struct CertifyEngine {
    cfg: DaemonConfig,
    registry: Mutex<CertificateRegistry>,
    ledger: Mutex<QuotaLedger>,
    store: Arc<ArtifactStore>,
    scorer: Arc<dyn ScoringOracle>,
    stamper: Arc<dyn StampingOracle>,
    telemetry: Telemetry,
    stamp_permits: Arc<Semaphore>,
    approval_locks: Mutex<HashMap<CertificateId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CertifyEngine {
    /// Production wiring: oracles resolved from the config.
    pub fn build(data_dir: &Path, cfg: DaemonConfig) -> VerifydResult<Self> {
        let scorer = scoring_oracle_from_config(&cfg);
        let stamper = stamping_oracle_from_config(&cfg);
        Self::with_oracles(data_dir, cfg, scorer, stamper, Telemetry::new())
    }

    pub fn with_oracles(
        data_dir: &Path,
        cfg: DaemonConfig,
        scorer: Arc<dyn ScoringOracle>,
        stamper: Arc<dyn StampingOracle>,
        telemetry: Telemetry,
    ) -> VerifydResult<Self> {
        let registry = CertificateRegistry::open(data_dir)?;
        let ledger = QuotaLedger::open(data_dir)?;
        let store = Arc::new(ArtifactStore::open(data_dir)?);
        let stamp_permits = Arc::new(Semaphore::new(cfg.stamp_concurrency.max(1)));
        Ok(Self {
            cfg,
            registry: Mutex::new(registry),
            ledger: Mutex::new(ledger),
            store,
            scorer,
            stamper,
            telemetry,
            stamp_permits,
            approval_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.cfg
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub async fn submit(
        &self,
        identity: Option<&str>,
        filename: &str,
        bytes: Vec<u8>,
    ) -> VerifydResult<SubmitOutcome> {
        validate_extension(filename, &self.cfg.allowed_extensions)?;
        if bytes.is_empty() {
            return Err(VerifydError::InvalidInput("empty upload".to_string()));
        }

        if let Some(identity) = identity {
            let admission = self
                .ledger
                .lock()
                .admit(identity, self.cfg.free_upload_limit);
            if admission == Admission::Deny {
                self.telemetry.record_quota_denied(identity);
                return Err(VerifydError::QuotaExceeded);
            }
        }

        let id = CertificateId::generate()?;
        let staged = self.store.stage(&id, filename, &bytes)?;
        drop(bytes);

        let result = self
            .submit_staged(&id, identity, filename, &staged)
            .await;
        // Once a record exists the staged file is the approve source and the
        // fingerprint witness; clean up only when the submission died first.
        if result.is_err() && self.registry.lock().get(&id).is_none() {
            let _ = std::fs::remove_file(&staged);
        }
        result
    }

    async fn submit_staged(
        &self,
        id: &CertificateId,
        identity: Option<&str>,
        filename: &str,
        staged: &Path,
    ) -> VerifydResult<SubmitOutcome> {
        let fingerprint = {
            let staged = staged.to_path_buf();
            run_blocking(move || fingerprint_file(&staged))
                .await?
                .map_err(|err| {
                    VerifydError::InvalidInput(format!("unreadable upload: {err}"))
                })?
        };

        let score = {
            let scorer = Arc::clone(&self.scorer);
            let staged = staged.to_path_buf();
            run_blocking(move || scorer.score(&staged))
                .await?
                .map_err(|err| {
                    tracing::warn!(certificate_id = %id, error = %err, "scoring oracle failed");
                    VerifydError::Internal("scoring failed".to_string())
                })?
                .min(100)
        };

        let status = CertStatus::from_score(score, self.cfg.certify_threshold);
        let artifact = match status {
            CertStatus::Certified => Some(self.stamp_to_store(id, staged).await?),
            CertStatus::Review => None,
        };

        let certificate = Certificate {
            id: id.clone(),
            owner_identity: identity.map(str::to_string),
            original_filename: filename.to_string(),
            fingerprint,
            score,
            status,
            stored_artifact_ref: artifact.clone(),
            created_at_unix: unix_now()?,
        };
        let certificate = match self.registry.lock().create(certificate) {
            Ok(certificate) => certificate,
            Err(err) => {
                // No record was written: a published artifact must not outlive
                // the failed create.
                if let Some(artifact) = &artifact {
                    if let Ok(path) = self.store.resolve(artifact) {
                        let _ = std::fs::remove_file(path);
                    }
                }
                return Err(err);
            }
        };

        let (uploads_used, free_remaining) = match identity {
            Some(identity) => {
                let used = self.ledger.lock().commit(identity)?;
                (
                    Some(used),
                    Some(self.cfg.free_upload_limit.saturating_sub(used)),
                )
            }
            None => (None, None),
        };

        self.telemetry.record_submission(status.as_str());
        self.telemetry.lifecycle_event(&LifecycleEvent {
            certificate_id: certificate.id.as_str(),
            identity,
            score,
            from: STATE_RECEIVED,
            to: status.as_str(),
        });

        Ok(SubmitOutcome {
            certificate,
            uploads_used,
            free_remaining,
        })
    }

    /// Runs the stamping oracle on a bounded pool and publishes the output
    /// atomically. On any failure the partial output is discarded.
    async fn stamp_to_store(
        &self,
        id: &CertificateId,
        source: &Path,
    ) -> VerifydResult<ArtifactRef> {
        let _permit = self
            .stamp_permits
            .acquire()
            .await
            .map_err(|_| VerifydError::Internal("stamping pool closed".to_string()))?;

        let outcome = {
            let stamper = Arc::clone(&self.stamper);
            let source = source.to_path_buf();
            let id = id.clone();
            let output = self.store.stamp_output_path(&id);
            run_blocking(move || stamper.stamp(&source, &id, &output)).await?
        };

        match outcome {
            Ok(()) => self.store.publish(id),
            Err(err) => {
                self.store.discard_stamp_output(id);
                self.telemetry.record_stamp_failure();
                tracing::warn!(certificate_id = %id, error = %err, "stamping oracle failed");
                Err(VerifydError::StampingFailed(err.to_string()))
            }
        }
    }

    /// Manual approval of a parked `REVIEW` certificate. Idempotent: an
    /// already-certified id returns the current record unchanged. Approvals
    /// for the same id are serialized; different ids never contend.
    pub async fn approve(&self, id: &CertificateId) -> VerifydResult<Certificate> {
        let lock = self.approval_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.approve_locked(id).await
        };
        drop(lock);
        self.release_approval_lock(id);
        result
    }

    async fn approve_locked(&self, id: &CertificateId) -> VerifydResult<Certificate> {
        let existing = self
            .registry
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| VerifydError::NotFound(format!("certificate {id}")))?;
        if existing.status == CertStatus::Certified {
            return Ok(existing);
        }

        let staged = self.store.staged_path(id, &existing.original_filename)?;
        if !staged.exists() {
            return Err(VerifydError::SourceMissing(format!("certificate {id}")));
        }

        let artifact = self.stamp_to_store(id, &staged).await?;
        let updated = match self.registry.lock().approve(id, artifact) {
            Ok(updated) => updated,
            // Lost a race with another writer; the terminal record stands.
            Err(VerifydError::AlreadyCertified(_)) => self
                .registry
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| VerifydError::NotFound(format!("certificate {id}")))?,
            Err(err) => return Err(err),
        };

        self.telemetry.record_approval();
        self.telemetry.lifecycle_event(&LifecycleEvent {
            certificate_id: id.as_str(),
            identity: existing.owner_identity.as_deref(),
            score: existing.score,
            from: CertStatus::Review.as_str(),
            to: CertStatus::Certified.as_str(),
        });
        Ok(updated)
    }

    /// Pure read; never mutates state.
    pub fn verify(&self, id: &CertificateId) -> VerifydResult<Certificate> {
        self.registry
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| VerifydError::NotFound(format!("certificate {id}")))
    }

    /// Release gate: the artifact is handed out only for a `CERTIFIED`
    /// record that actually carries one. The status check repeats here even
    /// though creation and approval already enforce it.
    pub fn download(&self, id: &CertificateId) -> VerifydResult<(Certificate, PathBuf)> {
        let certificate = self.verify(id)?;
        if certificate.status != CertStatus::Certified {
            return Err(VerifydError::NotCertified(format!("certificate {id}")));
        }
        let artifact = certificate.stored_artifact_ref.as_ref().ok_or_else(|| {
            VerifydError::Internal("certified record without artifact".to_string())
        })?;
        let path = self.store.resolve(artifact)?;
        if !path.exists() {
            return Err(VerifydError::Internal(
                "certified artifact missing from store".to_string(),
            ));
        }
        self.telemetry.record_download();
        Ok((certificate, path))
    }

    pub fn set_subscribed(&self, identity: &str) -> VerifydResult<()> {
        self.ledger.lock().set_subscribed(identity, true)
    }

    pub fn usage(&self, identity: &str) -> Option<UsageRecord> {
        self.ledger.lock().usage(identity).cloned()
    }

    fn approval_lock(&self, id: &CertificateId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.approval_locks.lock();
        Arc::clone(
            locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release_approval_lock(&self, id: &CertificateId) {
        let mut locks = self.approval_locks.lock();
        if let Some(entry) = locks.get(id) {
            // A lone strong ref is the map's own: no waiter still holds one.
            if Arc::strong_count(entry) == 1 {
                locks.remove(id);
            }
        }
    }
}

fn validate_extension(filename: &str, allowed: &[String]) -> VerifydResult<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| VerifydError::InvalidInput("unsupported file type".to_string()))?;
    if allowed.iter().any(|a| a == &ext) {
        Ok(())
    } else {
        Err(VerifydError::InvalidInput("unsupported file type".to_string()))
    }
}

async fn run_blocking<T, F>(f: F) -> VerifydResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|_| VerifydError::Internal("blocking task failed".to_string()))
}
