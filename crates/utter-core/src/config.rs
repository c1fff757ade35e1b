use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

const RC_ENV_VAR: &str = "UTTERRC";
const API_KEY_ENV_VARS: [&str; 2] = ["UTTER_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("data.location".to_string(), "~/.utter".to_string());
        cfg.map.insert(
            "inference.url".to_string(),
            "https://api.openai.com/v1".to_string(),
        );
        cfg.map
            .insert("inference.model".to_string(), "gpt-4o-mini".to_string());
        cfg.map
            .insert("inference.timeout_secs".to_string(), "10".to_string());
        cfg.map
            .insert("reminder.interval_secs".to_string(), "10".to_string());
        cfg.map
            .insert("reminder.window_secs".to_string(), "300".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());

        let rc_path = resolve_rc_path(rc_override)?;
        if let Some(path) = rc_path {
            info!(rc = %path.display(), "loading rc file");
            cfg.load_file(&path)?;
        } else {
            debug!("no rc file found; using defaults");
        }

        Ok(cfg)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        let raw = self.map.get(key)?;
        match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key = %key, value = %raw, "ignoring non-numeric config value");
                None
            }
        }
    }

    /// Credential lookup order: rc file, then environment. Absence is the
    /// one hard configuration error in the system, surfaced by the caller.
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = self.get("inference.key")
            && !key.trim().is_empty()
        {
            return Some(key);
        }
        for var in API_KEY_ENV_VARS {
            if let Ok(key) = std::env::var(var)
                && !key.trim().is_empty()
            {
                return Some(key);
            }
        }
        None
    }

    pub fn inference_url(&self) -> String {
        self.get("inference.url")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    pub fn inference_model(&self) -> String {
        self.get("inference.model")
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("inference.timeout_secs").unwrap_or(10))
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.get_u64("reminder.interval_secs").unwrap_or(10).max(1))
    }

    pub fn reminder_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.get_u64("reminder.window_secs").unwrap_or(300) as i64)
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var(RC_ENV_VAR) {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".utterrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".utter"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::Config;

    #[test]
    fn rc_file_overrides_defaults() {
        let mut rc = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(rc, "# reminder tuning").expect("write");
        writeln!(rc, "reminder.window_secs = 120").expect("write");
        writeln!(rc, "inference.model = gpt-4.1-mini").expect("write");

        let cfg = Config::load(Some(rc.path())).expect("load config");
        assert_eq!(cfg.reminder_window(), chrono::Duration::seconds(120));
        assert_eq!(cfg.inference_model(), "gpt-4.1-mini");
        assert_eq!(cfg.reminder_interval().as_secs(), 10);
    }

    #[test]
    fn non_numeric_tunable_falls_back_to_default() {
        let mut rc = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(rc, "inference.timeout_secs = soon").expect("write");

        let cfg = Config::load(Some(rc.path())).expect("load config");
        assert_eq!(cfg.inference_timeout().as_secs(), 10);
    }
}
