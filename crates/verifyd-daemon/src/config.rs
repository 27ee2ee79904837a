use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Free-tier uploads per identity before a subscription is required.
    pub free_upload_limit: u64,
    /// Authenticity score at or above which a submission auto-certifies.
    pub certify_threshold: u8,
    /// Hard cap on request bodies at the transport layer.
    pub max_upload_bytes: usize,
    /// Concurrent stamping subprocesses; excess submissions queue.
    pub stamp_concurrency: usize,
    /// Accepted upload extensions, lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub ffmpeg_path: String,
    /// Watermark overlay image; stamping runs text-only when absent.
    pub logo_path: Option<PathBuf>,
    /// External analyzer command; when unset every upload scores
    /// `default_score`.
    pub scorer_command: Option<String>,
    pub default_score: u8,
    /// Absolute prefix for verify/download links in responses; relative
    /// links when unset.
    pub public_base_url: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            free_upload_limit: 10,
            certify_threshold: 80,
            max_upload_bytes: 512 * 1024 * 1024,
            stamp_concurrency: 2,
            allowed_extensions: vec![
                "mp4".to_string(),
                "mov".to_string(),
                "avi".to_string(),
                "m4v".to_string(),
            ],
            ffmpeg_path: "ffmpeg".to_string(),
            logo_path: None,
            scorer_command: None,
            default_score: 100,
            public_base_url: None,
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            free_upload_limit: read_env_u64("VERIFYD_FREE_UPLOAD_LIMIT", defaults.free_upload_limit),
            certify_threshold: read_env_u8("VERIFYD_CERTIFY_THRESHOLD", defaults.certify_threshold),
            max_upload_bytes: read_env_usize("VERIFYD_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            stamp_concurrency: read_env_usize("VERIFYD_STAMP_CONCURRENCY", defaults.stamp_concurrency)
                .max(1),
            allowed_extensions: defaults.allowed_extensions,
            ffmpeg_path: std::env::var("VERIFYD_FFMPEG_PATH")
                .unwrap_or(defaults.ffmpeg_path),
            logo_path: std::env::var("VERIFYD_LOGO_PATH").ok().map(PathBuf::from),
            scorer_command: std::env::var("VERIFYD_SCORER_COMMAND").ok(),
            default_score: read_env_u8("VERIFYD_DEFAULT_SCORE", defaults.default_score).min(100),
            public_base_url: std::env::var("VERIFYD_PUBLIC_BASE_URL").ok(),
        }
    }
}

fn read_env_u64(key: &str, default_value: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u8(key: &str, default_value: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u8>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(key: &str, default_value: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(default_value)
}
