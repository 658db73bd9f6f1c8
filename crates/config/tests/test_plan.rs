//! Test plan for the `brandmarket-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use brandmarket_config::{load, AppConfig, AuthConfig, CollectionsConfig, FirebaseConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "BRANDMARKET_CONFIG",
    "BRANDMARKET__AUTH__MIN_PASSWORD_LENGTH",
    "BRANDMARKET__AUTH__PROTECTED_ROUTES",
    "BRANDMARKET__AUTH__REFRESH_TOKEN",
    "BRANDMARKET__AUTH__SIGN_IN_PATH",
    "BRANDMARKET__COLLECTIONS__LISTINGS",
    "BRANDMARKET__COLLECTIONS__USERS",
    "BRANDMARKET__FIREBASE__API_KEY",
    "BRANDMARKET__FIREBASE__PROJECT_ID",
    "BRANDMARKET__FIREBASE__REQUEST_TIMEOUT_SECONDS",
    "BRANDMARKET__FIREBASE__STORAGE_BUCKET",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

fn isolated() -> (TempDir, TestContext) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    (temp_dir, ctx)
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let (_temp_dir, _ctx) = isolated();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.firebase.project_id, defaults.firebase.project_id);
    assert_eq!(
        config.firebase.identity_base_url,
        defaults.firebase.identity_base_url
    );
    assert!(config.firebase.api_key.is_none());
    assert_eq!(config.auth.min_password_length, 6);
    assert_eq!(config.auth.sign_in_path, "/signin");
    assert_eq!(config.auth.protected_routes, defaults.auth.protected_routes);
    assert_eq!(config.collections.users, "users");
    assert_eq!(config.collections.listings, "listings");
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "brandmarket.toml",
        r#"
        [firebase]
        project_id = "first"
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/brandmarket.toml",
        r#"
        [firebase]
        project_id = "second"
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.firebase.project_id, "first");
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "brandmarket.toml",
        r#"
        [firebase]
        api_key = "AIza-test"
        storage_bucket = "brands.appspot.com"

        [collections]
        listings = "assets"
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.firebase.api_key.as_deref(), Some("AIza-test"));
    assert_eq!(config.firebase.bucket(), "brands.appspot.com");
    assert_eq!(config.firebase.project_id, defaults.firebase.project_id);
    assert_eq!(config.collections.listings, "assets");
    assert_eq!(config.collections.users, defaults.collections.users);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "elsewhere/settings.toml",
        r#"
        [auth]
        sign_in_path = "/login"
        "#,
    );
    ctx.set_var(
        "BRANDMARKET_CONFIG",
        temp_dir.path().join("elsewhere/settings.toml").display().to_string(),
    );

    let config = load().expect("configuration load should read the explicit file");
    assert_eq!(config.auth.sign_in_path, "/login");
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "brandmarket.toml",
        r#"
        [firebase]
        request_timeout_seconds = 10
        "#,
    );

    ctx.set_var("BRANDMARKET__FIREBASE__REQUEST_TIMEOUT_SECONDS", "45");
    ctx.set_var("BRANDMARKET__FIREBASE__API_KEY", "from-env");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.firebase.request_timeout_seconds, 45);
    assert_eq!(config.firebase.api_key.as_deref(), Some("from-env"));
}

#[test]
#[serial]
fn load_parses_protected_routes_list_from_environment() {
    let (_temp_dir, mut ctx) = isolated();

    ctx.set_var("BRANDMARKET__AUTH__PROTECTED_ROUTES", "/profile,/dashboard");

    let config = load().expect("configuration load should parse the route list");
    assert_eq!(
        config.auth.protected_routes,
        vec!["/profile".to_string(), "/dashboard".to_string()]
    );
}

#[test]
#[serial]
fn load_restores_default_password_length_when_zero() {
    let (_temp_dir, mut ctx) = isolated();

    ctx.set_var("BRANDMARKET__AUTH__MIN_PASSWORD_LENGTH", "0");

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.auth.min_password_length, 6);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "brandmarket.toml",
        r#"
        [firebase]
        request_timeout_seconds = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration")
            || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn firebase_bucket_falls_back_to_project_default() {
    let firebase = FirebaseConfig {
        project_id: "acme".to_string(),
        ..FirebaseConfig::default()
    };
    assert_eq!(firebase.bucket(), "acme.appspot.com");
}

#[test]
fn auth_config_defaults_protect_account_pages() {
    let defaults = AuthConfig::default();
    assert!(defaults.protected_routes.iter().any(|r| r == "/profile"));
    assert!(defaults.protected_routes.iter().any(|r| r == "/create-listing"));
    assert!(defaults.refresh_token.is_none());
}

#[test]
fn collections_config_defaults_match_document_layout() {
    let defaults = CollectionsConfig::default();
    assert_eq!(defaults.users, "users");
    assert_eq!(defaults.listings, "listings");
}
