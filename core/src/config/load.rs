use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;
use crate::executor::ConcurrencyLimit;

pub const LOCAL_CONFIG_FILE: &str = "phasegate.toml";

/// Get the per-user data directory: ~/.phasegate
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".phasegate"))
}

/// Loads config with priority: explicit path, `./phasegate.toml`,
/// `~/.phasegate/config.toml`, built-in defaults. Env overrides apply last.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = match explicit {
        Some(path) => read_file(path)?,
        None => {
            let local = Path::new(LOCAL_CONFIG_FILE);
            let user = get_data_dir().ok().map(|d| d.join("config.toml"));
            if local.exists() {
                read_file(local)?
            } else if let Some(user) = user.filter(|p| p.exists()) {
                read_file(&user)?
            } else {
                AppConfig::default()
            }
        }
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn read_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

/// `PHASEGATE_*` overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PHASEGATE_CONCURRENCY") {
        cfg.scheduler.concurrency = v
            .parse::<ConcurrencyLimit>()
            .map_err(|e| anyhow::anyhow!("PHASEGATE_CONCURRENCY: {e}"))?;
    }
    if let Some(v) = get("PHASEGATE_AGENT_CMD") {
        cfg.agent.command = v;
    }
    if let Some(v) = get("PHASEGATE_LOG") {
        cfg.logging.level = v;
    }
    if let Some(v) = get("PHASEGATE_TASKS_DIR") {
        cfg.tasks.dir = v;
    }
    Ok(())
}
