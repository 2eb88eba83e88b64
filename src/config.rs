//! Configuration for lux-uploader
//!
//! Paths, credentials, and feature flags come from the command line, with
//! the four credential strings falling back to the process environment.
//! Timing and retry knobs live in an optional TOML tuning file; every knob
//! has a compiled default matching the production cadence.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::{Result, UploadError};
use crate::services::oauth::Credentials;

/// Command-line arguments for lux-uploader
#[derive(Parser, Debug)]
#[command(name = "lux-uploader")]
#[command(about = "Bulk-uploads LUX identifier claims to Wikidata")]
#[command(version)]
pub struct Args {
    /// Input CSV of (entity id, LUX URI) pairs
    #[arg(long, default_value = "lux_uris.csv")]
    pub input: PathBuf,

    /// Success sink; also replayed at startup to resume a prior run
    #[arg(long, default_value = "lux_upload_success.csv")]
    pub success_file: PathBuf,

    /// Failure sink
    #[arg(long, default_value = "lux_upload_failures.csv")]
    pub failure_file: PathBuf,

    /// Redirect sink
    #[arg(long, default_value = "wikidata_redirects.csv")]
    pub redirect_file: PathBuf,

    /// Append structured logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// API endpoint
    #[arg(long, default_value = "https://www.wikidata.org/w/api.php")]
    pub api_url: String,

    /// Property id the claims are created for
    #[arg(long, default_value = "P13591")]
    pub property: String,

    /// Size of the concurrent worker pool
    #[arg(long, default_value_t = 6)]
    pub workers: usize,

    /// Look up existing claims in batches before scheduling writes
    #[arg(long)]
    pub check_existing: bool,

    /// Record a failure when the redirect check cannot complete, instead of
    /// proceeding with the write
    #[arg(long)]
    pub redirect_fail_closed: bool,

    /// Optional TOML file overriding retry/backoff tuning
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CONSUMER_KEY", hide_env_values = true)]
    pub consumer_key: String,

    #[arg(long, env = "CONSUMER_SECRET", hide_env_values = true)]
    pub consumer_secret: String,

    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    #[arg(long, env = "ACCESS_SECRET", hide_env_values = true)]
    pub access_secret: String,
}

/// Retry and backoff tuning, loadable from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    pub pacing_delay_secs: u64,
    pub transport_backoff_secs: u64,
    pub max_attempts: u32,
    pub redirect_max_attempts: u32,
    pub redirect_backoff_step_secs: u64,
    pub min_lag_backoff_secs: u64,
    pub max_lag_backoff_secs: u64,
    pub pause_duration_secs: u64,
    pub maxlag: u32,
    pub request_timeout_secs: u64,
    pub claims_batch_size: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pacing_delay_secs: 5,
            transport_backoff_secs: 5,
            max_attempts: 3,
            redirect_max_attempts: 3,
            redirect_backoff_step_secs: 2,
            min_lag_backoff_secs: 5,
            max_lag_backoff_secs: 60,
            pause_duration_secs: 90,
            maxlag: 5,
            request_timeout_secs: 10,
            claims_batch_size: 50,
        }
    }
}

impl Tuning {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UploadError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| UploadError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub success_file: PathBuf,
    pub failure_file: PathBuf,
    pub redirect_file: PathBuf,
    pub api_url: String,
    pub property_id: String,
    pub workers: usize,
    pub check_existing: bool,
    pub redirect_fail_open: bool,
    pub credentials: Credentials,
    pub tuning: Tuning,
}

impl Config {
    pub fn resolve(args: Args) -> Result<Self> {
        let tuning = match &args.config {
            Some(path) => Tuning::load(path)?,
            None => Tuning::default(),
        };

        if args.workers == 0 {
            return Err(UploadError::Config(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            input: args.input,
            success_file: args.success_file,
            failure_file: args.failure_file,
            redirect_file: args.redirect_file,
            api_url: args.api_url,
            property_id: args.property,
            workers: args.workers,
            check_existing: args.check_existing,
            redirect_fail_open: !args.redirect_fail_closed,
            credentials: Credentials {
                consumer_key: args.consumer_key,
                consumer_secret: args.consumer_secret,
                access_token: args.access_token,
                access_secret: args.access_secret,
            },
            tuning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "lux-uploader",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--access-token",
            "at",
            "--access-secret",
            "as",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_match_production_cadence() {
        let tuning = Tuning::default();
        assert_eq!(tuning.pacing_delay_secs, 5);
        assert_eq!(tuning.max_attempts, 3);
        assert_eq!(tuning.pause_duration_secs, 90);
        assert_eq!(tuning.min_lag_backoff_secs, 5);
        assert_eq!(tuning.max_lag_backoff_secs, 60);
        assert_eq!(tuning.claims_batch_size, 50);
    }

    #[test]
    fn tuning_toml_overrides_selected_knobs() {
        let tuning: Tuning = toml::from_str(
            r#"
            pacing_delay_secs = 0
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(tuning.pacing_delay_secs, 0);
        assert_eq!(tuning.max_attempts, 5);
        assert_eq!(tuning.pause_duration_secs, 90);
    }

    #[test]
    fn resolve_uses_cli_defaults() {
        let config = Config::resolve(parse_args(&[])).unwrap();
        assert_eq!(config.workers, 6);
        assert_eq!(config.property_id, "P13591");
        assert!(config.redirect_fail_open);
        assert!(!config.check_existing);
        assert_eq!(config.input, PathBuf::from("lux_uris.csv"));
    }

    #[test]
    fn fail_closed_flag_flips_redirect_policy() {
        let config = Config::resolve(parse_args(&["--redirect-fail-closed"])).unwrap();
        assert!(!config.redirect_fail_open);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = Config::resolve(parse_args(&["--workers", "0"]));
        assert!(matches!(result, Err(UploadError::Config(_))));
    }
}
