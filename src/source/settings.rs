//! Settings hot reload.
//!
//! Polls the settings file for changes and re-loads it with default-merge.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{info, warn};

use crate::config::Settings;

/// Watches a settings file by modification time.
///
/// Only returns new settings when the file has been updated and parsed
/// successfully. A file that fails to parse leaves the previous settings in
/// effect and is reported through [`SettingsFile::error`].
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl SettingsFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    /// Treat the file as already loaded at its current modification time.
    ///
    /// Use this when the settings were read at startup, so the first poll
    /// does not discard overrides applied on top of them.
    pub fn primed(mut self) -> Self {
        self.last_modified = self.get_modified_time();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Check the file and return the re-loaded settings if it changed.
    pub fn poll(&mut self) -> Option<Settings> {
        let Some(current) = self.get_modified_time() else {
            if self.last_error.is_none() {
                self.last_error = Some(format!("Read error: {} not found", self.path.display()));
            }
            return None;
        };

        let changed = match self.last_modified {
            None => true,
            Some(last) => current > last,
        };
        if !changed {
            return None;
        }
        self.last_modified = Some(current);

        match Settings::load(Some(&self.path)) {
            Ok(settings) => {
                self.last_error = None;
                info!("Loaded settings from {}", self.path.display());
                Some(settings)
            }
            Err(e) => {
                warn!("Keeping previous settings, {} is invalid: {}", self.path.display(), e);
                self.last_error = Some(format!("Parse error: {}", e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn settings_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    fn bump_mtime(file: &NamedTempFile) {
        let later = SystemTime::now() + Duration::from_secs(5);
        file.as_file().set_modified(later).unwrap();
    }

    #[test]
    fn test_settings_file_new() {
        let source = SettingsFile::new("/tmp/fleetwatch.toml");
        assert_eq!(source.path(), Path::new("/tmp/fleetwatch.toml"));
        assert_eq!(source.description(), "file: /tmp/fleetwatch.toml");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_first_poll_loads_then_waits_for_change() {
        let file = settings_file("[thresholds]\nbattery_low = 25");
        let mut source = SettingsFile::new(file.path());

        let settings = source.poll().unwrap();
        assert_eq!(settings.thresholds.battery_low, Some(25.0));
        assert_eq!(settings.thresholds.rssi_low, Some(-90.0));

        assert!(source.poll().is_none());
    }

    #[test]
    fn test_primed_waits_for_change() {
        let mut file = settings_file("[thresholds]\nbattery_low = 25");
        let mut source = SettingsFile::new(file.path()).primed();

        assert!(source.poll().is_none());
        assert!(source.error().is_none());

        writeln!(file, "temp_high = 45").unwrap();
        file.flush().unwrap();
        bump_mtime(&file);

        let settings = source.poll().unwrap();
        assert_eq!(settings.thresholds.battery_low, Some(25.0));
        assert_eq!(settings.thresholds.temp_high, Some(45.0));
    }

    #[test]
    fn test_primed_missing_file_loads_once_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetwatch.toml");
        let mut source = SettingsFile::new(&path).primed();
        assert!(source.poll().is_none());

        fs::write(&path, "[thresholds]\nrssi_low = -80\n").unwrap();
        let settings = source.poll().unwrap();
        assert_eq!(settings.thresholds.rssi_low, Some(-80.0));
    }

    #[test]
    fn test_detects_changes() {
        let mut file = settings_file("[thresholds]\nbattery_low = 25");
        let mut source = SettingsFile::new(file.path());
        source.poll();

        file.rewind().unwrap();
        file.as_file().set_len(0).unwrap();
        writeln!(file, "[thresholds]\ntemp_high = 45").unwrap();
        file.flush().unwrap();
        bump_mtime(&file);

        let settings = source.poll().unwrap();
        assert_eq!(settings.thresholds.temp_high, Some(45.0));
        assert_eq!(settings.thresholds.battery_low, Some(20.0));
    }

    #[test]
    fn test_invalid_file_keeps_previous() {
        let mut file = settings_file("[thresholds]\nbattery_low = 25");
        let mut source = SettingsFile::new(file.path());
        source.poll();

        file.rewind().unwrap();
        file.as_file().set_len(0).unwrap();
        writeln!(file, "[thresholds\nbattery_low =").unwrap();
        file.flush().unwrap();
        bump_mtime(&file);

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }

    #[test]
    fn test_missing_file() {
        let mut source = SettingsFile::new("/nonexistent/path/fleetwatch.toml");
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }
}
