//! Application configuration

use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Public control-plane endpoint; it rejects unsigned requests
pub const DEFAULT_API_ENDPOINT: &str = "https://scf.tencentcloudapi.com";

/// Configuration loaded from environment variables
#[derive(Clone)]
pub struct AppConfig {
    /// API secret id
    pub secret_id: Option<String>,

    /// API secret key
    pub secret_key: Option<String>,

    /// Platform region, e.g. `ap-guangzhou`
    pub region: String,

    /// Account app id, appended to COS bucket names
    pub appid: Option<String>,

    /// Control-plane endpoint receiving function and trigger calls
    pub api_endpoint: String,

    /// Object storage endpoint override
    pub cos_endpoint: Option<String>,

    /// Directory receiving function archives
    pub build_dir: PathBuf,

    /// Functions deployed concurrently within one namespace
    pub deploy_jobs: usize,

    /// Remote request timeout in seconds
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let region = lookup("SCF_REGION").unwrap_or_else(|| "ap-guangzhou".to_string());

        Self {
            secret_id: lookup("SCF_SECRET_ID"),
            secret_key: lookup("SCF_SECRET_KEY"),
            region,
            appid: lookup("SCF_APPID"),

            api_endpoint: lookup("SCF_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),

            cos_endpoint: lookup("SCF_COS_ENDPOINT"),

            build_dir: lookup("SCF_BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.scf_build")),

            deploy_jobs: lookup("SCF_DEPLOY_JOBS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),

            request_timeout_secs: lookup("SCF_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Object storage endpoint for the configured region
    pub fn cos_endpoint(&self) -> String {
        self.cos_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cos.{}.myqcloud.com", self.region))
    }

    pub fn attr_value(&self, attr: ConfigAttr) -> Option<&str> {
        match attr {
            ConfigAttr::Appid => self.appid.as_deref(),
            ConfigAttr::Region => Some(self.region.as_str()),
            ConfigAttr::SecretId => self.secret_id.as_deref(),
            ConfigAttr::SecretKey => self.secret_key.as_deref(),
        }
    }

    /// True when no signing gateway was configured via `SCF_API_ENDPOINT`
    pub fn uses_default_api_endpoint(&self) -> bool {
        self.api_endpoint.trim_end_matches('/') == DEFAULT_API_ENDPOINT
    }

    /// Render `name = value` lines for the requested attributes, secrets masked.
    /// An empty request selects every attribute.
    pub fn render_attrs(&self, requested: &[ConfigAttr]) -> String {
        let mut out = String::from("scf config:\n");
        for attr in select_attrs(requested) {
            let value = self.attr_value(attr).unwrap_or_default();
            let shown = match attr.masked_prefix() {
                Some(hidden) => mask(value, hidden),
                None => value.to_string(),
            };
            let _ = writeln!(out, "{} = {}", attr.name(), shown);
        }
        out.trim_end().to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("secret_id", &self.secret_id.as_deref().map(|v| mask(v, 32)))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("region", &self.region)
            .field("appid", &self.appid)
            .field("api_endpoint", &self.api_endpoint)
            .field("cos_endpoint", &self.cos_endpoint)
            .field("build_dir", &self.build_dir)
            .field("deploy_jobs", &self.deploy_jobs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Account attributes shown by `config get`, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigAttr {
    Appid,
    Region,
    SecretId,
    SecretKey,
}

impl ConfigAttr {
    pub const ALL: [ConfigAttr; 4] = [
        ConfigAttr::Appid,
        ConfigAttr::Region,
        ConfigAttr::SecretId,
        ConfigAttr::SecretKey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigAttr::Appid => "appid",
            ConfigAttr::Region => "region",
            ConfigAttr::SecretId => "secret-id",
            ConfigAttr::SecretKey => "secret-key",
        }
    }

    fn masked_prefix(self) -> Option<usize> {
        match self {
            ConfigAttr::SecretId => Some(32),
            ConfigAttr::SecretKey => Some(28),
            _ => None,
        }
    }
}

/// Requested attributes sorted by name; nothing requested means everything
pub fn select_attrs(requested: &[ConfigAttr]) -> Vec<ConfigAttr> {
    let mut selected = if requested.is_empty() {
        ConfigAttr::ALL.to_vec()
    } else {
        requested.to_vec()
    };
    selected.sort();
    selected.dedup();
    selected
}

/// Replace the first `hidden` characters with `*`
pub fn mask(value: &str, hidden: usize) -> String {
    let rest: String = value.chars().skip(hidden).collect();
    format!("{}{}", "*".repeat(hidden), rest)
}
