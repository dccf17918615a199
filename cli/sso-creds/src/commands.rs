//! Subcommand implementations
//!
//! Every subcommand resolves its credential through the same
//! orchestrator; they differ only in what they do with the result.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::SecondsFormat;
use common::RoleCredential;

use crate::browser;
use crate::config;
use crate::console;
use crate::wiring::{self, Orchestrator};

async fn resolve(profile: &str) -> Result<(Orchestrator, RoleCredential)> {
    let bindings = config::load_bindings(&config::config_path()?)?;
    let orchestrator = wiring::build_orchestrator(bindings)?;
    let credential = orchestrator.ensure_credential(profile).await?;
    Ok((orchestrator, credential))
}

pub async fn login(profile: &str) -> Result<()> {
    let (_, credential) = resolve(profile).await?;
    println!(
        "Wrote credentials for profile '{profile}', valid until {}.",
        credential
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    Ok(())
}

pub async fn export(profile: &str) -> Result<()> {
    let (orchestrator, credential) = resolve(profile).await?;
    let default_region = orchestrator
        .binding(profile)
        .and_then(|binding| binding.default_region.clone());

    for line in export_lines(&credential, default_region.as_deref()) {
        println!("{line}");
    }
    Ok(())
}

/// Shell `export` statements for `credential`. Empty values produce no
/// line at all; exporting an empty variable would shadow a working one
/// in the caller's environment.
fn export_lines(credential: &RoleCredential, default_region: Option<&str>) -> Vec<String> {
    let vars = [
        ("AWS_ACCESS_KEY_ID", credential.access_key_id.as_str()),
        ("AWS_SECRET_ACCESS_KEY", credential.secret_access_key.as_str()),
        ("AWS_SESSION_TOKEN", credential.session_token.as_str()),
        // Older SDKs read the legacy variable name.
        ("AWS_SECURITY_TOKEN", credential.session_token.as_str()),
        ("AWS_DEFAULT_REGION", default_region.unwrap_or("")),
    ];
    vars.into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("export {name}=\"{value}\""))
        .collect()
}

pub async fn process(profile: &str) -> Result<()> {
    let (_, credential) = resolve(profile).await?;

    let output = serde_json::json!({
        "Version": 1,
        "AccessKeyId": credential.access_key_id,
        "SecretAccessKey": credential.secret_access_key,
        "SessionToken": credential.session_token,
        "Expiration": credential
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    println!("{}", serde_json::to_string(&output).context("cannot serialize process output")?);
    Ok(())
}

pub async fn console(profile: &str, force_logout: bool, logout_wait: u64) -> Result<()> {
    let (orchestrator, credential) = resolve(profile).await?;
    let region = orchestrator
        .binding(profile)
        .map(|binding| binding.sso_region.clone())
        .ok_or_else(|| anyhow!("unknown profile '{profile}'"))?;

    let http = wiring::http_client()?;
    let url = console::login_url(&http, &credential, &region).await?;

    if let Some(pause) = logout_pause(force_logout, logout_wait) {
        // An already-signed-in console session would otherwise swallow
        // the federated login; log it out first.
        browser::open_best_effort(&console::logout_url(&region));
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    browser::open_best_effort(&url);
    Ok(())
}

/// Whether to log out an existing console session first, and how long
/// to give the browser before the login URL follows. A non-zero wait
/// implies the logout even without `--force-logout`.
fn logout_pause(force_logout: bool, logout_wait: u64) -> Option<Duration> {
    (force_logout || logout_wait > 0).then(|| Duration::from_secs(logout_wait))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn credential() -> RoleCredential {
        RoleCredential {
            account_id: "111111111111".into(),
            role_name: "Admin".into(),
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: "session".into(),
            expires_at: Utc::now() + TimeDelta::hours(1),
        }
    }

    #[test]
    fn export_lines_cover_all_variables_with_a_region() {
        let lines = export_lines(&credential(), Some("eu-central-1"));
        assert_eq!(
            lines,
            vec![
                "export AWS_ACCESS_KEY_ID=\"ASIAEXAMPLE\"",
                "export AWS_SECRET_ACCESS_KEY=\"secret\"",
                "export AWS_SESSION_TOKEN=\"session\"",
                "export AWS_SECURITY_TOKEN=\"session\"",
                "export AWS_DEFAULT_REGION=\"eu-central-1\"",
            ]
        );
    }

    #[test]
    fn export_lines_skip_empty_values() {
        let mut cred = credential();
        cred.session_token = String::new();

        let lines = export_lines(&cred, None);
        assert_eq!(
            lines,
            vec![
                "export AWS_ACCESS_KEY_ID=\"ASIAEXAMPLE\"",
                "export AWS_SECRET_ACCESS_KEY=\"secret\"",
            ]
        );
    }

    #[test]
    fn logout_runs_on_either_flag_or_wait() {
        assert_eq!(logout_pause(false, 0), None);
        assert_eq!(logout_pause(true, 0), Some(Duration::ZERO));
        assert_eq!(logout_pause(false, 3), Some(Duration::from_secs(3)));
        assert_eq!(logout_pause(true, 1), Some(Duration::from_secs(1)));
    }
}
