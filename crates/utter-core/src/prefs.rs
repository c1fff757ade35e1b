use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

const THEME_FILE: &str = "theme";
const LANG_FILE: &str = "lang";
const HANDEDNESS_FILE: &str = "handedness";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Day,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handedness {
    Left,
    #[default]
    Right,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Day => "day",
            ThemeMode::Night => "night",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "day" => Some(ThemeMode::Day),
            "night" => Some(ThemeMode::Night),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Day => ThemeMode::Night,
            ThemeMode::Night => ThemeMode::Day,
        }
    }
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "left" => Some(Handedness::Left),
            "right" => Some(Handedness::Right),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

/// Three independent persisted enums. Each lives in its own entry and is
/// rewritten alone when its in-memory value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub theme: ThemeMode,
    pub lang: Language,
    pub handedness: Handedness,
}

impl Preferences {
    /// Missing or corrupt entries fall back to their defaults.
    #[tracing::instrument(skip(data_dir))]
    pub fn load(data_dir: &Path) -> Self {
        Self {
            theme: read_entry(data_dir, THEME_FILE, ThemeMode::parse),
            lang: read_entry(data_dir, LANG_FILE, Language::parse),
            handedness: read_entry(data_dir, HANDEDNESS_FILE, Handedness::parse),
        }
    }

    pub fn save_theme(&self, data_dir: &Path) -> anyhow::Result<()> {
        write_entry(data_dir, THEME_FILE, self.theme.as_str())
    }

    pub fn save_lang(&self, data_dir: &Path) -> anyhow::Result<()> {
        write_entry(data_dir, LANG_FILE, self.lang.as_str())
    }

    pub fn save_handedness(&self, data_dir: &Path) -> anyhow::Result<()> {
        write_entry(data_dir, HANDEDNESS_FILE, self.handedness.as_str())
    }
}

fn read_entry<T: Default>(data_dir: &Path, file: &str, parse: fn(&str) -> Option<T>) -> T {
    let path = data_dir.join(file);
    match fs::read_to_string(&path) {
        Ok(raw) => parse(&raw).unwrap_or_else(|| {
            warn!(file = %path.display(), value = %raw.trim(), "unknown preference value; using default");
            T::default()
        }),
        Err(_) => {
            debug!(file = %path.display(), "preference entry missing; using default");
            T::default()
        }
    }
}

fn write_entry(data_dir: &Path, file: &str, value: &str) -> anyhow::Result<()> {
    let path = data_dir.join(file);
    fs::write(&path, value).with_context(|| format!("failed writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{Handedness, Language, Preferences, ThemeMode};

    #[test]
    fn missing_entries_load_defaults() {
        let temp = tempdir().expect("tempdir");
        let prefs = Preferences::load(temp.path());
        assert_eq!(prefs.theme, ThemeMode::Day);
        assert_eq!(prefs.lang, Language::En);
        assert_eq!(prefs.handedness, Handedness::Right);
    }

    #[test]
    fn corrupt_entry_falls_back_to_default() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("theme"), "sepia").expect("write");
        let prefs = Preferences::load(temp.path());
        assert_eq!(prefs.theme, ThemeMode::Day);
    }

    #[test]
    fn save_rewrites_only_its_own_entry() {
        let temp = tempdir().expect("tempdir");
        let mut prefs = Preferences::load(temp.path());
        prefs.lang = prefs.lang.toggled();
        prefs.save_lang(temp.path()).expect("save");

        assert!(temp.path().join("lang").exists());
        assert!(!temp.path().join("theme").exists());

        let reloaded = Preferences::load(temp.path());
        assert_eq!(reloaded.lang, Language::Zh);
    }
}
