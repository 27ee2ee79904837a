//! Scoring and stamping oracles.
//!
//! Both are opaque external collaborators with all-or-nothing contracts: the
//! scorer returns an authenticity score in 0..=100, the stamper either
//! produces a complete watermarked output file or fails. Failures carry tool
//! detail for the logs; the engine maps them to generic public errors.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use verifyd_core::certificate::CertificateId;

use crate::config::DaemonConfig;

const WATERMARK_TEXT: &str = "VeriFYD Certified";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle io: {0}")]
    Io(#[from] std::io::Error),

    #[error("oracle command failed: {0}")]
    Command(String),

    #[error("oracle output malformed: {0}")]
    Malformed(String),
}

pub trait ScoringOracle: Send + Sync {
    fn score(&self, source: &Path) -> Result<u8, OracleError>;
}

pub trait StampingOracle: Send + Sync {
    /// Writes the stamped rendition of `source` to `output`, tagged with the
    /// certificate id. All-or-nothing: on error the caller discards `output`.
    fn stamp(
        &self,
        source: &Path,
        certificate_id: &CertificateId,
        output: &Path,
    ) -> Result<(), OracleError>;
}

/// Deployment mode without an analyzer: every upload gets the configured
/// score.
#[derive(Debug, Clone)]
pub struct FixedScorer {
    score: u8,
}

impl FixedScorer {
    pub fn new(score: u8) -> Self {
        Self {
            score: score.min(100),
        }
    }
}

impl ScoringOracle for FixedScorer {
    fn score(&self, _source: &Path) -> Result<u8, OracleError> {
        Ok(self.score)
    }
}

/// Runs `program <source>` and parses a single integer from stdout.
#[derive(Debug, Clone)]
pub struct CommandScorer {
    program: String,
}

impl CommandScorer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ScoringOracle for CommandScorer {
    fn score(&self, source: &Path) -> Result<u8, OracleError> {
        let output = Command::new(&self.program).arg(source).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(program = %self.program, %stderr, "scorer command failed");
            return Err(OracleError::Command(format!(
                "scorer exited with {}",
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: i64 = stdout
            .trim()
            .parse()
            .map_err(|_| OracleError::Malformed(format!("scorer stdout: {stdout:?}")))?;
        Ok(parsed.clamp(0, 100) as u8)
    }
}

/// Production stamper: shells out to ffmpeg with a watermark overlay, a
/// certification caption, and the certificate id written into the container
/// metadata.
#[derive(Debug, Clone)]
pub struct FfmpegStamper {
    ffmpeg_path: String,
    logo_path: Option<PathBuf>,
}

impl FfmpegStamper {
    pub fn new(ffmpeg_path: impl Into<String>, logo_path: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            logo_path,
        }
    }

    fn build_args(
        &self,
        source: &Path,
        certificate_id: &CertificateId,
        output: &Path,
    ) -> Vec<OsString> {
        let caption = format!(
            "drawtext=text='{WATERMARK_TEXT}':fontsize=28:fontcolor=white:x=20:y=H-th-20"
        );
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), source.into()];
        match &self.logo_path {
            Some(logo) => {
                args.push("-i".into());
                args.push(logo.into());
                args.push("-filter_complex".into());
                args.push(format!("overlay=W-w-20:H-h-20,{caption}").into());
            }
            None => {
                args.push("-vf".into());
                args.push(caption.into());
            }
        }
        args.push("-metadata".into());
        args.push(format!("cert_id={certificate_id}").into());
        args.push("-c:v".into());
        args.push("libx264".into());
        args.push("-preset".into());
        args.push("fast".into());
        args.push("-crf".into());
        args.push("23".into());
        args.push("-c:a".into());
        args.push("aac".into());
        args.push("-f".into());
        args.push("mp4".into());
        args.push(output.into());
        args
    }
}

impl StampingOracle for FfmpegStamper {
    fn stamp(
        &self,
        source: &Path,
        certificate_id: &CertificateId,
        output: &Path,
    ) -> Result<(), OracleError> {
        let args = self.build_args(source, certificate_id, output);
        let result = Command::new(&self.ffmpeg_path).args(&args).output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::warn!(certificate_id = %certificate_id, %stderr, "ffmpeg failed");
            return Err(OracleError::Command(format!(
                "ffmpeg exited with {}",
                result.status
            )));
        }
        Ok(())
    }
}

pub fn scoring_oracle_from_config(cfg: &DaemonConfig) -> std::sync::Arc<dyn ScoringOracle> {
    match &cfg.scorer_command {
        Some(program) => std::sync::Arc::new(CommandScorer::new(program.clone())),
        None => std::sync::Arc::new(FixedScorer::new(cfg.default_score)),
    }
}

pub fn stamping_oracle_from_config(cfg: &DaemonConfig) -> std::sync::Arc<dyn StampingOracle> {
    std::sync::Arc::new(FfmpegStamper::new(
        cfg.ffmpeg_path.clone(),
        cfg.logo_path.clone(),
    ))
}
