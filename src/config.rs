//! Startup configuration
//!
//! Everything is supplied through the environment and read exactly once
//! before the browser session is created. Missing required values abort the
//! run before any Chromium process is launched.

use anyhow::{bail, Result};
use std::{env, fmt, path::PathBuf};
use which::which;

/// Student id environment variable (required).
pub const ENV_USER: &str = "CLOCKIN_USER";
/// Password environment variable (required).
pub const ENV_PASSWORD: &str = "CLOCKIN_PASSWORD";
/// PushPlus token environment variable (optional; empty counts as absent).
pub const ENV_PUSH_TOKEN: &str = "CLOCKIN_PUSHPLUS_TOKEN";
/// Headless toggle; "0", "false", "no", "off" run headful.
pub const ENV_HEADLESS: &str = "CLOCKIN_HEADLESS";
/// Explicit Chromium executable path override.
pub const ENV_CHROME: &str = "CLOCKIN_CHROME";

/// Immutable login pair, read-only for the whole run.
#[derive(Clone)]
pub struct Credentials {
    pub student_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("student_id", &self.student_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Chromium launch options.
#[derive(Clone, Debug)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
}

/// Full startup configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub push_token: Option<String>,
    pub browser: BrowserOptions,
}

impl Settings {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let student_id = require_env(ENV_USER)?;
        let password = require_env(ENV_PASSWORD)?;

        let push_token = env::var(ENV_PUSH_TOKEN)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            credentials: Credentials {
                student_id,
                password,
            },
            push_token,
            browser: BrowserOptions {
                headless: resolve_headless(),
                executable: detect_chrome_executable(),
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("required environment variable {key} is not set"),
    }
}

fn resolve_headless() -> bool {
    match env::var(ENV_HEADLESS) {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

/// Locate a Chromium binary: explicit override first, then PATH, then the
/// usual OS install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(ENV_CHROME) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn clear_all() {
        for key in [ENV_USER, ENV_PASSWORD, ENV_PUSH_TOKEN, ENV_HEADLESS, ENV_CHROME] {
            env::remove_var(key);
        }
    }

    // Environment variables are process-global, so everything that touches
    // them lives in one test.
    #[test]
    fn settings_from_env() {
        clear_all();

        // Missing credentials are fatal.
        assert!(Settings::from_env().is_err());

        env::set_var(ENV_USER, "32106200000");
        assert!(Settings::from_env().is_err());

        env::set_var(ENV_PASSWORD, "hunter2");
        let settings = Settings::from_env().expect("minimal settings");
        assert_eq!(settings.credentials.student_id, "32106200000");
        assert!(settings.push_token.is_none());
        assert!(settings.browser.headless);

        // Empty token counts as absent.
        env::set_var(ENV_PUSH_TOKEN, "  ");
        let settings = Settings::from_env().expect("blank token");
        assert!(settings.push_token.is_none());

        env::set_var(ENV_PUSH_TOKEN, "tok123");
        env::set_var(ENV_HEADLESS, "off");
        let settings = Settings::from_env().expect("full settings");
        assert_eq!(settings.push_token.as_deref(), Some("tok123"));
        assert!(!settings.browser.headless);

        clear_all();
    }

    #[test]
    fn detects_chrome_from_override() {
        let dir = tempdir().expect("tempdir");
        let exe = dir.path().join("my-chrome");
        fs::write(&exe, b"").expect("touch executable");

        let original = env::var(ENV_CHROME).ok();
        env::set_var(ENV_CHROME, exe.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        match original {
            Some(value) => env::set_var(ENV_CHROME, value),
            None => env::remove_var(ENV_CHROME),
        }

        assert_eq!(detected, Some(exe));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            student_id: "32106200000".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }
}
