//! Settings file loading

use std::path::Path;

use anyhow::{Context, Result};
use vix_core::HarvestSettings;

/// Load harvester settings, falling back to defaults when no file is given.
///
/// Keys missing from the file keep their default values.
pub fn load_settings(path: Option<&Path>) -> Result<HarvestSettings> {
    let Some(path) = path else {
        return Ok(HarvestSettings::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let settings: HarvestSettings =
        toml::from_str(&content).with_context(|| format!("Invalid settings file {}", path.display()))?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_settings_default() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.download.thread_count, 8);
    }

    #[test]
    fn test_load_settings_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vix.toml");
        std::fs::write(
            &path,
            "[capture]\ntimeout_secs = 60\n\n[download]\ndownloader = \"/opt/bin/N_m3u8DL-RE\"\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();

        assert_eq!(settings.capture.timeout_secs, 60);
        assert_eq!(settings.capture.poll_interval_ms, 300);
        assert_eq!(settings.download.downloader, "/opt/bin/N_m3u8DL-RE");
        assert_eq!(settings.discovery.max_scrolls, 60);
    }

    #[test]
    fn test_load_settings_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vix.toml");
        std::fs::write(&path, "[discovery]\nmax_scrolls = 0\n").unwrap();

        let err = load_settings(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("max_scrolls"));
    }

    #[test]
    fn test_load_settings_missing_file() {
        let err = load_settings(Some(Path::new("/nonexistent/vix.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }
}
