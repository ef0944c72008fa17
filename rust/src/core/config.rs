use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_PAGE_SIZE: usize = 5;
const DEFAULT_THUMBNAIL_MAX_EDGE: u32 = 640;
const DEFAULT_VIDEO_THUMBNAIL_AT_SECS: f64 = 1.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) page_size: Option<usize>,
    pub(crate) thumbnail_max_edge: Option<u32>,
    pub(crate) video_thumbnail_at_secs: Option<f64>,
    pub(crate) media_staging_dir: Option<String>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join("chatroom_config.json");
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), %e, "invalid config; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    let defaults = serde_json::json!({
        "page_size": DEFAULT_PAGE_SIZE,
        "thumbnail_max_edge": DEFAULT_THUMBNAIL_MAX_EDGE,
        "video_thumbnail_at_secs": DEFAULT_VIDEO_THUMBNAIL_AT_SECS,
    });
    serde_json::to_string_pretty(&defaults).unwrap_or_else(|_| "{}".to_string())
}

impl AppConfig {
    pub(crate) fn page_size(&self) -> usize {
        self.page_size
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub(crate) fn thumbnail_max_edge(&self) -> u32 {
        self.thumbnail_max_edge
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_THUMBNAIL_MAX_EDGE)
    }

    pub(crate) fn video_thumbnail_at_secs(&self) -> f64 {
        self.video_thumbnail_at_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .unwrap_or(DEFAULT_VIDEO_THUMBNAIL_AT_SECS)
    }

    pub(crate) fn media_staging_dir(&self, data_dir: &str) -> PathBuf {
        match self.media_staging_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => Path::new(data_dir).join("staged_media"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_app_config(&dir.path().to_string_lossy());
        assert_eq!(config.page_size(), 5);
        assert_eq!(config.thumbnail_max_edge(), 640);
        assert_eq!(config.video_thumbnail_at_secs(), 1.0);
        assert_eq!(
            config.media_staging_dir("/data"),
            Path::new("/data").join("staged_media")
        );
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chatroom_config.json"),
            r#"{"page_size": 20, "media_staging_dir": "/tmp/stage"}"#,
        )
        .unwrap();
        let config = load_app_config(&dir.path().to_string_lossy());
        assert_eq!(config.page_size(), 20);
        assert_eq!(config.thumbnail_max_edge(), 640);
        assert_eq!(config.media_staging_dir("/data"), PathBuf::from("/tmp/stage"));
    }

    #[test]
    fn invalid_file_and_zero_values_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chatroom_config.json"), "not json").unwrap();
        assert_eq!(load_app_config(&dir.path().to_string_lossy()).page_size(), 5);

        let zero = AppConfig {
            page_size: Some(0),
            ..AppConfig::default()
        };
        assert_eq!(zero.page_size(), 5);
    }

    #[test]
    fn default_json_parses_back() {
        let config: AppConfig = serde_json::from_str(&default_app_config_json()).unwrap();
        assert_eq!(config.page_size, Some(5));
        assert_eq!(config.thumbnail_max_edge, Some(640));
    }
}
