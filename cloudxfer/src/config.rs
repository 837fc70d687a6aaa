//! Process-wide configuration (spec §9): environment-derived settings
//! read once at startup rather than threaded through every call.

use camino::Utf8PathBuf;
use cloudxfer_storage::CredentialInputs;

fn default_state_dir(leaf: &str) -> Utf8PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    Utf8PathBuf::try_from(base.join("cloudxfer").join(leaf))
        .unwrap_or_else(|_| Utf8PathBuf::from(format!("./.cloudxfer/{leaf}")))
}

/// Gathered once in `main` and handed to every `Client` operation.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub log_location: Utf8PathBuf,
    pub job_plan_location: Utf8PathBuf,
    pub login_cache_path: Utf8PathBuf,
    pub cap_mbps: Option<f64>,
    pub concurrency_value: Option<usize>,
    pub show_perf_states: bool,
    pub trusted_suffixes: Vec<String>,
    pub oauth_token_info: Option<String>,
    pub credential_inputs: CredentialInputs,
}

impl ProcessConfig {
    pub fn from_env() -> Self {
        let log_location = std::env::var("CLOUDXFER_LOG_LOCATION")
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|_| default_state_dir("logs"));
        let job_plan_location = std::env::var("CLOUDXFER_JOB_PLAN_LOCATION")
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|_| default_state_dir("plans"));
        let login_cache_name = std::env::var("CLOUDXFER_LOGIN_CACHE_NAME")
            .unwrap_or_else(|_| "login.json".to_string());
        let login_cache_path = default_state_dir("cache").join(login_cache_name);

        let cap_mbps = std::env::var("CLOUDXFER_CAP_MBPS")
            .ok()
            .and_then(|v| v.parse().ok());
        let concurrency_value = std::env::var("CLOUDXFER_CONCURRENCY_VALUE")
            .ok()
            .and_then(|v| v.parse().ok());
        let show_perf_states = std::env::var("CLOUDXFER_SHOW_PERF_STATES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let trusted_suffixes = std::env::var("CLOUDXFER_TRUSTED_SUFFIXES")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let oauth_token_info = std::env::var("CLOUDXFER_OAUTH_TOKEN_INFO").ok();

        Self {
            log_location,
            job_plan_location,
            login_cache_path,
            cap_mbps,
            concurrency_value,
            show_perf_states,
            trusted_suffixes,
            oauth_token_info,
            credential_inputs: CredentialInputs::from_env(),
        }
    }
}
