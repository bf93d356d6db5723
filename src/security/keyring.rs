//! API key storage for the completion service
//!
//! Lookup order: `OPENAI_API_KEY`, then the OS keyring, then a 0600 file in the
//! config directory (used when no keyring backend is available).

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const SERVICE_NAME: &str = "french-tutor";
const API_KEY_USERNAME: &str = "openai-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Environment variable checked before any stored key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

fn api_key_file_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "french-tutor", "french-tutor")
        .context("Failed to get project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("Failed to create config directory")?;
    Ok(dir.join(API_KEY_FILE))
}

/// Set API key - tries keyring first, falls back to file
pub fn set_api_key(key: &str) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if entry.set_password(key).is_ok() {
            return Ok(());
        }
    }

    save_to_file(key)?;
    println!("Note: Using file-based storage (keyring unavailable)");
    Ok(())
}

fn save_to_file(key: &str) -> Result<()> {
    let path = api_key_file_path()?;
    fs::write(&path, key).context("Failed to write API key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

/// Get API key from the environment, the keyring or the fallback file
pub fn get_api_key() -> Result<String> {
    if let Some(key) = non_empty(std::env::var(API_KEY_ENV).ok()) {
        return Ok(key);
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if let Ok(key) = entry.get_password() {
            return Ok(key);
        }
    }

    let path = api_key_file_path()?;
    let key = fs::read_to_string(&path).with_context(|| {
        format!("No API key found. Set {} or run 'french-tutor set-key YOUR_KEY'.", API_KEY_ENV)
    })?;
    non_empty(Some(key)).context("Stored API key is empty")
}

/// Delete API key from both keyring and file
pub fn delete_api_key() -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        let _ = entry.delete_credential();
    }

    let path = api_key_file_path()?;
    if path.exists() {
        fs::remove_file(&path).context("Failed to delete API key file")?;
    }

    Ok(())
}

/// Check if an API key is available from any source
pub fn has_api_key() -> bool {
    if non_empty(std::env::var(API_KEY_ENV).ok()).is_some() {
        return true;
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if entry.get_password().is_ok() {
            return true;
        }
    }

    api_key_file_path().map(|p| p.exists()).unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
