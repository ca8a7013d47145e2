use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ini_adapter, ConfigError, CURRENT_CONFIG_VERSION};
use crate::paths::PathResolver;

/// Single instance, lifetime = process (spec §3 `GlobalConfig`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalConfig {
    pub config_version: String,
    pub max_concurrent_downloads: usize,
    pub max_backup: usize,
    pub log_level: String,
    pub console_log_level: String,
    pub network: NetworkConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub retry_attempts: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub storage: PathBuf,
    pub backup: PathBuf,
    pub icon: PathBuf,
    pub settings: PathBuf,
    pub logs: PathBuf,
    pub cache: PathBuf,
    pub tmp: PathBuf,
}

impl GlobalConfig {
    pub fn defaults(paths: &PathResolver) -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            max_concurrent_downloads: 5,
            max_backup: 1,
            log_level: "info".to_string(),
            console_log_level: "warn".to_string(),
            network: NetworkConfig { retry_attempts: 3, timeout_seconds: 10 },
            directory: DirectoryConfig {
                storage: paths.storage_dir(),
                backup: paths.backup_dir(),
                icon: paths.icon_dir(),
                settings: paths.config_dir().to_path_buf(),
                logs: paths.log_dir(),
                cache: paths.cache_dir().to_path_buf(),
                tmp: paths.tmp_dir(),
            },
        }
    }
}

pub fn load(path: &Path) -> Result<GlobalConfig, ConfigError> {
    let loaded = ini_adapter::load(path)?;
    let ini = &loaded.ini;

    let config_version = ini.get("default", "config_version").unwrap_or_else(|| "1.0.0".to_string());
    if config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::NeedsMigration {
            path: path.to_path_buf(),
            from: config_version,
            to: CURRENT_CONFIG_VERSION.to_string(),
        });
    }

    let expand = |raw: Option<String>, fallback: &Path| -> PathBuf {
        raw.map(|value| expand_path(&value)).unwrap_or_else(|| fallback.to_path_buf())
    };

    // Defaults for directory expansion come from a fresh resolver so a
    // partially-written settings.conf still produces usable paths.
    let fallback = PathResolver::discover().ok();

    Ok(GlobalConfig {
        config_version,
        max_concurrent_downloads: ini
            .getuint("default", "max_concurrent_downloads")
            .ok()
            .flatten()
            .unwrap_or(5) as usize,
        max_backup: ini.getuint("default", "max_backup").ok().flatten().unwrap_or(1) as usize,
        log_level: ini.get("default", "log_level").unwrap_or_else(|| "info".to_string()),
        console_log_level: ini.get("default", "console_log_level").unwrap_or_else(|| "warn".to_string()),
        network: NetworkConfig {
            retry_attempts: ini.getuint("network", "retry_attempts").ok().flatten().unwrap_or(3) as u32,
            timeout_seconds: ini.getuint("network", "timeout_seconds").ok().flatten().unwrap_or(10),
        },
        directory: DirectoryConfig {
            storage: expand(ini.get("directory", "storage"), fallback.as_ref().map(|p| p.storage_dir()).as_deref().unwrap_or(Path::new("."))),
            backup: expand(ini.get("directory", "backup"), fallback.as_ref().map(|p| p.backup_dir()).as_deref().unwrap_or(Path::new("."))),
            icon: expand(ini.get("directory", "icon"), fallback.as_ref().map(|p| p.icon_dir()).as_deref().unwrap_or(Path::new("."))),
            settings: expand(ini.get("directory", "settings"), fallback.as_ref().map(|p| p.config_dir().to_path_buf()).as_deref().unwrap_or(Path::new("."))),
            logs: expand(ini.get("directory", "logs"), fallback.as_ref().map(|p| p.log_dir()).as_deref().unwrap_or(Path::new("."))),
            cache: expand(ini.get("directory", "cache"), fallback.as_ref().map(|p| p.cache_dir().to_path_buf()).as_deref().unwrap_or(Path::new("."))),
            tmp: expand(ini.get("directory", "tmp"), fallback.as_ref().map(|p| p.tmp_dir()).as_deref().unwrap_or(Path::new("."))),
        },
    })
}

pub fn save(path: &Path, cfg: &GlobalConfig) -> Result<(), ConfigError> {
    if cfg.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::NeedsMigration {
            path: path.to_path_buf(),
            from: cfg.config_version.clone(),
            to: CURRENT_CONFIG_VERSION.to_string(),
        });
    }

    let comments = if path.exists() { ini_adapter::load(path)?.comments } else { Default::default() };

    let sections = vec![
        (
            "default",
            vec![
                ("config_version", cfg.config_version.clone()),
                ("max_concurrent_downloads", cfg.max_concurrent_downloads.to_string()),
                ("max_backup", cfg.max_backup.to_string()),
                ("log_level", cfg.log_level.clone()),
                ("console_log_level", cfg.console_log_level.clone()),
            ],
        ),
        (
            "network",
            vec![
                ("retry_attempts", cfg.network.retry_attempts.to_string()),
                ("timeout_seconds", cfg.network.timeout_seconds.to_string()),
            ],
        ),
        (
            "directory",
            vec![
                ("storage", cfg.directory.storage.display().to_string()),
                ("backup", cfg.directory.backup.display().to_string()),
                ("icon", cfg.directory.icon.display().to_string()),
                ("settings", cfg.directory.settings.display().to_string()),
                ("logs", cfg.directory.logs.display().to_string()),
                ("cache", cfg.directory.cache.display().to_string()),
                ("tmp", cfg.directory.tmp.display().to_string()),
            ],
        ),
    ];

    let rendered = ini_adapter::render(&sections, &comments);

    let dir = path.parent().expect("settings.conf always has a parent");
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    std::io::Write::write_all(&mut tmp, rendered.as_bytes())
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    tmp.persist(path).map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e.error })?;

    debug!(?path, "global config saved");
    Ok(())
}

/// Expands `~` and `$ENV` references into an absolute path (spec §4.1).
fn expand_path(raw: &str) -> PathBuf {
    let mut expanded = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '~' && expanded.is_empty() {
            if let Some(home) = directories::UserDirs::new().map(|d| d.home_dir().to_path_buf()) {
                expanded.push_str(&home.display().to_string());
            }
        } else if c == '$' {
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Ok(value) = std::env::var(&name) {
                expanded.push_str(&value);
            }
        } else {
            expanded.push(c);
        }
    }

    PathBuf::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_values() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();

        let cfg = GlobalConfig::defaults(&paths);
        let path = paths.global_config_path();
        save(&path, &cfg).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.max_concurrent_downloads, cfg.max_concurrent_downloads);
        assert_eq!(loaded.network.retry_attempts, cfg.network.retry_attempts);
        assert_eq!(loaded.directory.storage, cfg.directory.storage);
    }

    #[test]
    fn save_preserves_user_comments_across_a_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let path = paths.global_config_path();

        let cfg = GlobalConfig::defaults(&paths);
        save(&path, &cfg).unwrap();

        let mut text = std::fs::read_to_string(&path).unwrap();
        text = text.replacen("max_backup = 1", "; keep only one backup\nmax_backup = 1", 1);
        std::fs::write(&path, text).unwrap();

        let mut reloaded = load(&path).unwrap();
        reloaded.max_backup = 2;
        save(&path, &reloaded).unwrap();

        let final_text = std::fs::read_to_string(&path).unwrap();
        assert!(final_text.contains("; keep only one backup"));
    }

    #[test]
    fn expand_path_substitutes_home_and_env() {
        std::env::set_var("MY_UNICORN_TEST_VAR", "value");
        let expanded = expand_path("$MY_UNICORN_TEST_VAR/sub");
        assert_eq!(expanded, PathBuf::from("value/sub"));
    }
}
