use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the background-removal credential.
pub const API_KEY_ENV: &str = "REMOVEBG_API_KEY";

/// Application settings. Read once at startup, never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub remove_bg_endpoint: String,
    pub remove_bg_timeout_secs: u64,
    pub remove_bg_enabled: bool,
    /// Directory with `<key>.png` garment bitmaps. Built-in mockups otherwise.
    pub garment_dir: Option<PathBuf>,
    /// Upper bound for the pre-rasterization settle step of an export.
    pub export_settle_ms: u64,
    pub export_pixel_ratio: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            remove_bg_endpoint: "https://api.remove.bg/v1.0/removebg".to_string(),
            remove_bg_timeout_secs: 30,
            remove_bg_enabled: true,
            garment_dir: None,
            export_settle_ms: 60,
            export_pixel_ratio: 3.0,
        }
    }
}

impl AppSettings {
    /// Load settings from the standard location.
    /// Returns defaults if the file doesn't exist or is malformed.
    pub fn load() -> Self {
        match Self::config_path().and_then(|p| Self::try_load(&p)) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("failed to load settings: {e}; using defaults");
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let mut settings: AppSettings = serde_json::from_str(&contents)?;
        if crate::export::check_pixel_ratio(settings.export_pixel_ratio).is_err() {
            tracing::warn!(
                "export_pixel_ratio {} is not usable, falling back to 3",
                settings.export_pixel_ratio
            );
            settings.export_pixel_ratio = 3.0;
        }
        tracing::debug!("settings loaded from {}", path.display());
        Ok(settings)
    }

    /// `<config dir>/teefe/settings.json`
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        use directories::ProjectDirs;

        let proj_dirs = ProjectDirs::from("", "", "teefe")
            .ok_or("failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("settings.json"))
    }

    /// Credential for the background-removal service, if set.
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("teefe-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("teefe-definitely-missing.json");
        assert_eq!(AppSettings::try_load(&path).unwrap(), AppSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_file("partial.json", r#"{ "remove_bg_enabled": false, "export_settle_ms": 5 }"#);
        let s = AppSettings::try_load(&path).unwrap();
        assert!(!s.remove_bg_enabled);
        assert_eq!(s.export_settle_ms, 5);
        assert_eq!(s.remove_bg_timeout_secs, 30);
        assert_eq!(s.export_pixel_ratio, 3.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_file("broken.json", "{ not json");
        assert!(AppSettings::try_load(&path).is_err());
    }

    #[test]
    fn unusable_pixel_ratio_is_replaced() {
        let path = temp_file("ratio.json", r#"{ "export_pixel_ratio": -2.0 }"#);
        assert_eq!(AppSettings::try_load(&path).unwrap().export_pixel_ratio, 3.0);
        let path = temp_file("huge_ratio.json", r#"{ "export_pixel_ratio": 500.0 }"#);
        assert_eq!(AppSettings::try_load(&path).unwrap().export_pixel_ratio, 3.0);
    }
}
