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

//! Certificate records and the `REVIEW -> CERTIFIED` state machine.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{VerifydError, VerifydResult};
use crate::storage::ArtifactRef;

const CERTIFICATE_ID_BYTES: usize = 16;

/// Opaque certificate identifier: 128 random bits, hex-encoded.
///
/// Identifiers are generated once at submission time and never reused; the
/// collision probability of 128 random bits is negligible, and the registry
/// still refuses to overwrite an existing record on create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(String);

impl CertificateId {
    pub fn generate() -> VerifydResult<Self> {
        let mut raw = [0u8; CERTIFICATE_ID_BYTES];
        getrandom::getrandom(&mut raw)
            .map_err(|err| VerifydError::Internal(format!("rng unavailable: {err}")))?;
        Ok(Self(hex::encode(raw)))
    }

    pub fn parse(raw: &str) -> VerifydResult<Self> {
        if raw.len() != CERTIFICATE_ID_BYTES * 2
            || !raw.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(VerifydError::InvalidInput(
                "malformed certificate id".to_string(),
            ));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertStatus {
    #[serde(rename = "REVIEW")]
    Review,
    #[serde(rename = "CERTIFIED")]
    Certified,
}

impl CertStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Review => "REVIEW",
            Self::Certified => "CERTIFIED",
        }
    }

    pub fn from_score(score: u8, certify_threshold: u8) -> Self {
        if score >= certify_threshold {
            Self::Certified
        } else {
            Self::Review
        }
    }

    /// The only legal transition is `Review -> Certified`; `Certified` is
    /// terminal.
    pub fn transition(self, to: CertStatus) -> VerifydResult<CertStatus> {
        match (self, to) {
            (Self::Review, Self::Certified) => Ok(Self::Certified),
            (Self::Certified, _) => Err(VerifydError::AlreadyCertified(
                "certificate status is terminal".to_string(),
            )),
            (Self::Review, Self::Review) => Err(VerifydError::Internal(
                "invalid certificate status transition".to_string(),
            )),
        }
    }
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One certificate per accepted submission.
///
/// `fingerprint` is the digest of the original upload (tamper evidence
/// independent of watermarking); `stored_artifact_ref` points at the stamped
/// output and is `Some` exactly when the certificate is releasable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub owner_identity: Option<String>,
    pub original_filename: String,
    pub fingerprint: String,
    pub score: u8,
    pub status: CertStatus,
    pub stored_artifact_ref: Option<ArtifactRef>,
    pub created_at_unix: u64,
}

pub fn unix_now() -> VerifydResult<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| VerifydError::Internal("system clock before unix epoch".to_string()))?
        .as_secs())
}
