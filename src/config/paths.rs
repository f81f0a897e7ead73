//! Where blast-radius keeps its config file
//!
//! Lookup order: `BLAST_RADIUS_CONFIG_DIR`, then `XDG_CONFIG_HOME/blast-radius`
//! (Unix only), then the platform default from `directories`.

use std::path::{Path, PathBuf};

const APP_NAME: &str = "blast-radius";
const CONFIG_FILE: &str = "config.yaml";

/// Environment variable that overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "BLAST_RADIUS_CONFIG_DIR";

/// Get the configuration directory path from the process environment
pub fn config_dir() -> PathBuf {
    resolve_config_dir(|key| std::env::var(key).ok())
}

/// Resolve the configuration directory with variables read through `lookup`
///
/// Empty variables count as unset.
pub fn resolve_config_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(dir) = non_empty(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    #[cfg(not(windows))]
    {
        if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_NAME);
        }
    }

    platform_config_dir()
}

#[cfg(windows)]
fn platform_config_dir() -> PathBuf {
    // %APPDATA%\blast-radius\config
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
}

#[cfg(not(windows))]
fn platform_config_dir() -> PathBuf {
    // ~/.config/blast-radius; a relative path when no home directory is known
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".config"))
        .unwrap_or_else(|| PathBuf::from(".").join(".config"))
        .join(APP_NAME)
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> PathBuf {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        resolve_config_dir(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_override_wins() {
        let dir = resolve(&[(CONFIG_DIR_ENV, "/etc/br"), ("XDG_CONFIG_HOME", "/xdg")]);
        assert_eq!(dir, PathBuf::from("/etc/br"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let dir = resolve(&[(CONFIG_DIR_ENV, "  ")]);
        assert_eq!(dir, platform_config_dir());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_xdg_config_home() {
        let dir = resolve(&[("XDG_CONFIG_HOME", "/xdg")]);
        assert_eq!(dir, PathBuf::from("/xdg").join("blast-radius"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_platform_default_names_the_app() {
        assert!(resolve(&[]).ends_with(APP_NAME));
    }

    #[test]
    fn test_root_config_file_name() {
        assert_eq!(
            root_config_path().file_name().and_then(|n| n.to_str()),
            Some("config.yaml")
        );
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
