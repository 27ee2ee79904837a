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

//! Per-identity upload quotas.
//!
//! Admission is decided before any submission work runs; the counter is
//! committed only after the whole submission has succeeded, so a failed or
//! rejected submission never consumes an upload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VerifydError, VerifydResult};
use crate::storage::write_file_atomic_durable;

const USAGE_FILE: &str = "usage.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub uploads_used: u64,
    pub subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UsageFile {
    identities: HashMap<String, UsageRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny,
}

#[derive(Debug)]
pub struct QuotaLedger {
    path: PathBuf,
    identities: HashMap<String, UsageRecord>,
}

impl QuotaLedger {
    pub fn open(root: &Path) -> VerifydResult<Self> {
        let path = root.join(USAGE_FILE);
        let identities = if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|_| VerifydError::Internal("read usage ledger failed".to_string()))?;
            serde_json::from_slice::<UsageFile>(&bytes)
                .map_err(|_| VerifydError::Internal("decode usage ledger failed".to_string()))?
                .identities
        } else {
            HashMap::new()
        };
        Ok(Self { path, identities })
    }

    fn ensure_record(&mut self, identity: &str) -> &mut UsageRecord {
        self.identities
            .entry(identity.to_string())
            .or_insert_with(|| UsageRecord {
                uploads_used: 0,
                subscribed: false,
            })
    }

    /// Subscribed identities bypass the ceiling entirely; everyone else is
    /// admitted while `uploads_used < free_limit`. Unknown identities are
    /// created with a zeroed record before evaluation.
    pub fn admit(&mut self, identity: &str, free_limit: u64) -> Admission {
        let record = self.ensure_record(identity);
        if record.subscribed || record.uploads_used < free_limit {
            Admission::Allow
        } else {
            Admission::Deny
        }
    }

    /// Charges exactly one upload. Called only after the submission as a
    /// whole has succeeded.
    pub fn commit(&mut self, identity: &str) -> VerifydResult<u64> {
        let record = self.ensure_record(identity);
        let previous = record.uploads_used;
        record.uploads_used = previous.saturating_add(1);
        let used = record.uploads_used;
        if let Err(err) = self.persist() {
            if let Some(record) = self.identities.get_mut(identity) {
                record.uploads_used = previous;
            }
            return Err(err);
        }
        Ok(used)
    }

    /// Idempotent and unconditional; creates unknown identities.
    pub fn set_subscribed(&mut self, identity: &str, subscribed: bool) -> VerifydResult<()> {
        let record = self.ensure_record(identity);
        let previous = record.subscribed;
        record.subscribed = subscribed;
        if let Err(err) = self.persist() {
            if let Some(record) = self.identities.get_mut(identity) {
                record.subscribed = previous;
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn usage(&self, identity: &str) -> Option<&UsageRecord> {
        self.identities.get(identity)
    }

    fn persist(&self) -> VerifydResult<()> {
        let payload = serde_json::to_vec_pretty(&UsageFile {
            identities: self.identities.clone(),
        })
        .map_err(|_| VerifydError::Internal("encode usage ledger failed".to_string()))?;
        write_file_atomic_durable(&self.path, &payload, "write usage ledger failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn free_limit_admits_then_denies() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = QuotaLedger::open(tmp.path()).unwrap();
        for _ in 0..10 {
            assert_eq!(ledger.admit("a@x.com", 10), Admission::Allow);
            ledger.commit("a@x.com").unwrap();
        }
        assert_eq!(ledger.usage("a@x.com").unwrap().uploads_used, 10);
        assert_eq!(ledger.admit("a@x.com", 10), Admission::Deny);
        assert_eq!(ledger.usage("a@x.com").unwrap().uploads_used, 10);
    }

    #[test]
    fn subscription_bypasses_the_ceiling() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = QuotaLedger::open(tmp.path()).unwrap();
        for _ in 0..3 {
            ledger.commit("a@x.com").unwrap();
        }
        assert_eq!(ledger.admit("a@x.com", 3), Admission::Deny);
        ledger.set_subscribed("a@x.com", true).unwrap();
        assert_eq!(ledger.admit("a@x.com", 3), Admission::Allow);
    }

    #[test]
    fn set_subscribed_creates_unknown_identities() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = QuotaLedger::open(tmp.path()).unwrap();
        ledger.set_subscribed("new@x.com", true).unwrap();
        ledger.set_subscribed("new@x.com", true).unwrap();
        let record = ledger.usage("new@x.com").unwrap();
        assert!(record.subscribed);
        assert_eq!(record.uploads_used, 0);
    }

    #[test]
    fn counters_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let mut ledger = QuotaLedger::open(tmp.path()).unwrap();
            ledger.commit("a@x.com").unwrap();
            ledger.commit("a@x.com").unwrap();
            ledger.set_subscribed("b@x.com", true).unwrap();
        }
        let ledger = QuotaLedger::open(tmp.path()).unwrap();
        assert_eq!(ledger.usage("a@x.com").unwrap().uploads_used, 2);
        assert!(ledger.usage("b@x.com").unwrap().subscribed);
    }

    #[test]
    fn failed_persist_rolls_back_the_commit() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = QuotaLedger::open(tmp.path()).unwrap();
        ledger.commit("a@x.com").unwrap();
        fs::create_dir(tmp.path().join("usage.tmp")).unwrap();

        assert!(ledger.commit("a@x.com").is_err());
        assert_eq!(ledger.usage("a@x.com").unwrap().uploads_used, 1);
    }
}
