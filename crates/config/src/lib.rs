use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "brandmarket.toml",
    "config/brandmarket.toml",
    "crates/config/brandmarket.toml",
    "../brandmarket.toml",
    "../config/brandmarket.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

/// Connection settings for the managed backend.
///
/// ```
/// use brandmarket_config::FirebaseConfig;
///
/// let firebase = FirebaseConfig::default();
/// assert_eq!(firebase.identity_base_url, "https://identitytoolkit.googleapis.com/v1");
/// assert_eq!(firebase.request_timeout_seconds, 30);
/// assert!(firebase.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "FirebaseConfig::default_project_id")]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default = "FirebaseConfig::default_identity_base_url")]
    pub identity_base_url: String,
    #[serde(default = "FirebaseConfig::default_token_base_url")]
    pub token_base_url: String,
    #[serde(default = "FirebaseConfig::default_firestore_base_url")]
    pub firestore_base_url: String,
    #[serde(default = "FirebaseConfig::default_storage_base_url")]
    pub storage_base_url: String,
    #[serde(default = "FirebaseConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl FirebaseConfig {
    fn default_project_id() -> String {
        "brandmarket-dev".to_string()
    }

    fn default_identity_base_url() -> String {
        "https://identitytoolkit.googleapis.com/v1".to_string()
    }

    fn default_token_base_url() -> String {
        "https://securetoken.googleapis.com/v1".to_string()
    }

    fn default_firestore_base_url() -> String {
        "https://firestore.googleapis.com/v1".to_string()
    }

    fn default_storage_base_url() -> String {
        "https://firebasestorage.googleapis.com/v0".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Bucket used for blob uploads, falling back to the project's default bucket.
    pub fn bucket(&self) -> String {
        self.storage_bucket
            .clone()
            .unwrap_or_else(|| format!("{}.appspot.com", self.project_id))
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: Self::default_project_id(),
            storage_bucket: None,
            identity_base_url: Self::default_identity_base_url(),
            token_base_url: Self::default_token_base_url(),
            firestore_base_url: Self::default_firestore_base_url(),
            storage_base_url: Self::default_storage_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_min_password_length")]
    pub min_password_length: usize,
    #[serde(default = "AuthConfig::default_sign_in_path")]
    pub sign_in_path: String,
    #[serde(default = "AuthConfig::default_protected_routes")]
    pub protected_routes: Vec<String>,
    /// Refresh token persisted by the host from a previous run.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl AuthConfig {
    const fn default_min_password_length() -> usize {
        6
    }

    fn default_sign_in_path() -> String {
        "/signin".to_string()
    }

    fn default_protected_routes() -> Vec<String> {
        ["/profile", "/create-listing", "/consultation", "/my-listings"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: Self::default_min_password_length(),
            sign_in_path: Self::default_sign_in_path(),
            protected_routes: Self::default_protected_routes(),
            refresh_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "CollectionsConfig::default_users")]
    pub users: String,
    #[serde(default = "CollectionsConfig::default_listings")]
    pub listings: String,
}

impl CollectionsConfig {
    fn default_users() -> String {
        "users".to_string()
    }

    fn default_listings() -> String {
        "listings".to_string()
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            users: Self::default_users(),
            listings: Self::default_listings(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use brandmarket_config::load;
///
/// std::env::remove_var("BRANDMARKET_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert_eq!(config.auth.min_password_length, 6);
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let timeout = i64::try_from(defaults.firebase.request_timeout_seconds).unwrap_or(i64::MAX);
    let min_password = i64::try_from(defaults.auth.min_password_length).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("firebase.project_id", defaults.firebase.project_id.clone())?
        .set_default(
            "firebase.identity_base_url",
            defaults.firebase.identity_base_url.clone(),
        )?
        .set_default("firebase.token_base_url", defaults.firebase.token_base_url.clone())?
        .set_default(
            "firebase.firestore_base_url",
            defaults.firebase.firestore_base_url.clone(),
        )?
        .set_default(
            "firebase.storage_base_url",
            defaults.firebase.storage_base_url.clone(),
        )?
        .set_default("firebase.request_timeout_seconds", timeout)?
        .set_default("auth.min_password_length", min_password)?
        .set_default("auth.sign_in_path", defaults.auth.sign_in_path.clone())?
        .set_default("auth.protected_routes", defaults.auth.protected_routes.clone())?
        .set_default("collections.users", defaults.collections.users.clone())?
        .set_default("collections.listings", defaults.collections.listings.clone())?;

    let environment_overrides = config::Environment::with_prefix("BRANDMARKET")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("auth.protected_routes");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("BRANDMARKET_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via BRANDMARKET_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.min_password_length == 0 {
        config.auth.min_password_length = AuthConfig::default_min_password_length();
    }

    debug!(
        project = %config.firebase.project_id,
        api_key_present = config.firebase.api_key.is_some(),
        "loaded configuration"
    );
    Ok(config)
}
