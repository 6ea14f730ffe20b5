use crate::material::{ColorError, MaterialProperties, Rgb, DEFAULT_COLOR};
use crate::scene::DEFAULT_BACKGROUND;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Names a config file that must exist.
pub const CONFIG_ENV: &str = "MATVIEW_CONFIG";
/// Overrides `model_path` after the file is read.
pub const MODEL_ENV: &str = "MATVIEW_MODEL";
pub const DEFAULT_CONFIG_FILE: &str = "matview.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {field}: {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: ColorError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub model_path: PathBuf,
    pub window_title: String,
    pub window_size: [u32; 2],
    pub background_color: String,
    pub shadow_map_size: u32,
    pub initial_color: String,
    pub initial_material: MaterialProperties,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/medal.gltf"),
            window_title: "3D Model Viewer".to_string(),
            window_size: [1280, 800],
            background_color: DEFAULT_BACKGROUND.to_string(),
            shadow_map_size: 4096,
            initial_color: DEFAULT_COLOR.to_string(),
            initial_material: MaterialProperties::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ViewerConfig = serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validated()
    }

    /// Reads configuration from the process environment and working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve_with(|key| std::env::var(key).ok(), &cwd)
    }

    pub fn resolve_with(env: impl Fn(&str) -> Option<String>, cwd: &Path) -> Result<Self> {
        let mut config = match env(CONFIG_ENV).filter(|value| !value.is_empty()) {
            Some(explicit) => Self::load_from_file(Path::new(&explicit))?,
            None => {
                let local = cwd.join(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::load_from_file(&local)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(model) = env(MODEL_ENV).filter(|value| !value.is_empty()) {
            config.model_path = PathBuf::from(model);
        }
        Ok(config)
    }

    /// Checks colors and sizes and clamps the initial material.
    pub fn validated(mut self) -> Result<Self> {
        parse_color("background_color", &self.background_color)?;
        parse_color("initial_color", &self.initial_color)?;
        if self.window_size.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "window_size must be non-zero, got {:?}",
                self.window_size
            )));
        }
        if self.shadow_map_size == 0 {
            return Err(ConfigError::Invalid("shadow_map_size must be non-zero".to_string()));
        }
        self.initial_material = self.initial_material.clamped();
        Ok(self)
    }

    pub fn background(&self) -> Rgb {
        Rgb::from_hex(&self.background_color).unwrap_or_default()
    }

    /// Lowercase `#rrggbb` of the starting color.
    pub fn initial_color_hex(&self) -> String {
        Rgb::from_hex(&self.initial_color)
            .map(Rgb::to_hex)
            .unwrap_or_else(|_| DEFAULT_COLOR.to_string())
    }
}

fn parse_color(field: &'static str, value: &str) -> Result<Rgb> {
    Rgb::from_hex(value).map_err(|source| ConfigError::InvalidColor { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_dir(label: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "matview_config_{label}_{}_{}",
            std::process::id(),
            nonce
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let dir = temp_dir("defaults");
        let config = ViewerConfig::resolve_with(env_of(&[]), &dir).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.background(), Rgb::from_u32(0xffe6ce));
        assert_eq!(config.initial_color_hex(), "#4a90e2");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_local_file_and_model_override() {
        let dir = temp_dir("local");
        std::fs::write(
            dir.join(DEFAULT_CONFIG_FILE),
            r##"{"window_title": "Medal", "initial_color": "#E74C3C", "initial_material": {"opacity": 7.0}}"##,
        )
        .unwrap();
        let config =
            ViewerConfig::resolve_with(env_of(&[(MODEL_ENV, "/tmp/other.glb")]), &dir).unwrap();
        assert_eq!(config.window_title, "Medal");
        assert_eq!(config.initial_color_hex(), "#e74c3c");
        assert_eq!(config.initial_material.opacity, 1.0);
        assert_eq!(config.model_path, PathBuf::from("/tmp/other.glb"));
        assert_eq!(config.shadow_map_size, 4096);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = temp_dir("explicit");
        let missing = dir.join("nope.json");
        let env = env_of(&[(CONFIG_ENV, missing.to_str().unwrap())]);
        let err = ViewerConfig::resolve_with(env, &dir).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_color = ViewerConfig {
            background_color: "peach".to_string(),
            ..ViewerConfig::default()
        };
        assert!(matches!(
            bad_color.validated(),
            Err(ConfigError::InvalidColor { field: "background_color", .. })
        ));
        let bad_size = ViewerConfig {
            window_size: [0, 600],
            ..ViewerConfig::default()
        };
        assert!(matches!(bad_size.validated(), Err(ConfigError::Invalid(_))));
        let bad_shadow = ViewerConfig {
            shadow_map_size: 0,
            ..ViewerConfig::default()
        };
        assert!(matches!(bad_shadow.validated(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_fields_fail_to_parse() {
        let dir = temp_dir("unknown");
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"modle_path": "x.gltf"}"#).unwrap();
        let err = ViewerConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }
}
