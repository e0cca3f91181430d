use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const SETTINGS_FILE: &str = "settings.toml";

/// Upper bound on the recent-folders list.
pub const MAX_RECENT: usize = 10;

/// Small key/value state persisted across runs: the folder to reopen on
/// startup and a most-recent-first list of previously opened folders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub last_folder: Option<PathBuf>,
    #[serde(default)]
    pub recent_folders: Vec<PathBuf>,
}

fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("comicv").join(SETTINGS_FILE))
}

impl Settings {
    /// Load from the platform config dir. A missing or unparsable file
    /// degrades to defaults; settings are never worth failing startup over.
    pub fn load() -> Settings {
        let Some(path) = settings_path() else {
            return Settings::default();
        };
        if !path.exists() {
            return Settings::default();
        }
        match Settings::load_from_path(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings file {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        match settings_path() {
            Some(path) => self.save_to_path(&path),
            None => Ok(()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Record `folder` as the most recently opened one: moved to the front
    /// of the recent list, de-duplicated, list capped at [`MAX_RECENT`].
    pub fn remember_folder(&mut self, folder: &Path) {
        self.recent_folders.retain(|p| p != folder);
        self.recent_folders.insert(0, folder.to_path_buf());
        self.recent_folders.truncate(MAX_RECENT);
        self.last_folder = Some(folder.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.toml");
        let mut settings = Settings::default();
        settings.remember_folder(Path::new("/comics/vol1"));
        settings.remember_folder(Path::new("/comics/vol2"));

        settings.save_to_path(&path).expect("save");
        let loaded = Settings::load_from_path(&path).expect("load");
        assert_eq!(loaded, settings);
        assert_eq!(loaded.last_folder.as_deref(), Some(Path::new("/comics/vol2")));
    }

    #[test]
    fn remember_folder_is_most_recent_first_and_deduplicated() {
        let mut settings = Settings::default();
        settings.remember_folder(Path::new("/a"));
        settings.remember_folder(Path::new("/b"));
        settings.remember_folder(Path::new("/a"));

        assert_eq!(
            settings.recent_folders,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(settings.last_folder.as_deref(), Some(Path::new("/a")));
    }

    #[test]
    fn recent_folders_are_capped() {
        let mut settings = Settings::default();
        for i in 0..15 {
            settings.remember_folder(&PathBuf::from(format!("/comics/{}", i)));
        }
        assert_eq!(settings.recent_folders.len(), MAX_RECENT);
        assert_eq!(settings.recent_folders[0], PathBuf::from("/comics/14"));
    }

    #[test]
    fn corrupt_file_is_a_settings_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "not = valid = toml").expect("write");
        assert!(Settings::load_from_path(&path).is_err());
    }

    #[test]
    fn missing_fields_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "").expect("write");
        let loaded = Settings::load_from_path(&path).expect("load");
        assert_eq!(loaded, Settings::default());
    }
}
