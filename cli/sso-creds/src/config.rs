//! AWS shared config parsing
//!
//! Reads `~/.aws/config` (or `AWS_CONFIG_FILE`) and turns every
//! section that carries a complete set of SSO attributes into a
//! `ProfileBinding`. Sections follow the AWS CLI convention: the
//! default profile lives in `[default]`, every other profile in
//! `[profile <name>]`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use common::ProfileBinding;
use ini::{Ini, Properties};
use tracing::warn;

const REQUIRED_KEYS: [&str; 4] = ["sso_start_url", "sso_account_id", "sso_role_name", "sso_region"];

/// Location of the shared config file.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AWS_CONFIG_FILE") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine the home directory"))?;
    Ok(home.join(".aws").join("config"))
}

/// Location of the shared credentials file.
pub fn credentials_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine the home directory"))?;
    Ok(home.join(".aws").join("credentials"))
}

/// Directory for the private SSO token cache.
pub fn token_cache_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine the home directory"))?;
    Ok(home.join(".aws").join("sso").join("cache"))
}

/// All SSO-enabled profiles from the shared config file.
pub fn load_bindings(path: &Path) -> Result<HashMap<String, ProfileBinding>> {
    let ini = Ini::load_from_file(path)
        .with_context(|| format!("cannot read AWS config at {}", path.display()))?;

    let mut bindings = HashMap::new();
    for (section, properties) in ini.iter() {
        let Some(name) = profile_name(section) else {
            continue;
        };
        match binding_from(name, properties)? {
            Some(binding) => {
                bindings.insert(name.to_string(), binding);
            }
            None => continue,
        }
    }
    Ok(bindings)
}

/// Maps an INI section header to a profile name. Non-profile sections
/// (`[services x]`, `[sso-session x]`) are skipped.
fn profile_name(section: Option<&str>) -> Option<&str> {
    match section? {
        "default" => Some("default"),
        other => other.strip_prefix("profile "),
    }
}

fn binding_from(name: &str, properties: &Properties) -> Result<Option<ProfileBinding>> {
    let present: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| properties.contains_key(*key))
        .collect();
    if present.is_empty() {
        // Not an SSO profile at all.
        return Ok(None);
    }
    if present.len() < REQUIRED_KEYS.len() {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !present.contains(key))
            .collect();
        warn!(profile = name, ?missing, "skipping profile with incomplete SSO configuration");
        return Ok(None);
    }

    Ok(Some(ProfileBinding {
        account_id: required(name, properties, "sso_account_id")?,
        role_name: required(name, properties, "sso_role_name")?,
        start_url: required(name, properties, "sso_start_url")?,
        sso_region: required(name, properties, "sso_region")?,
        default_region: properties.get("region").map(str::to_string),
    }))
}

fn required(name: &str, properties: &Properties, key: &str) -> Result<String> {
    match properties.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => bail!("profile '{name}' is missing required attribute '{key}'"),
    }
}
