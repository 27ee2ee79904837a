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

//! verifyd-core
//!
//! Domain core of the *VeriFYD* video-certification service.
//!
//! This crate owns the certificate lifecycle invariants:
//! - content fingerprints are computed over the original upload, never the
//!   stamped output
//! - `REVIEW -> CERTIFIED` is the only status transition, taken at most once
//! - a `CERTIFIED` record always carries the reference to its stamped artifact
//! - per-identity upload quotas gate admission before any work is performed
//!
//! Everything here is synchronous and runtime-free; orchestration lives in
//! `verifyd-daemon`.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod certificate;
pub mod error;
pub mod fingerprint;
pub mod quota;
pub mod registry;
pub mod storage;

pub use crate::certificate::{CertStatus, Certificate, CertificateId};
pub use crate::error::{VerifydError, VerifydResult};
