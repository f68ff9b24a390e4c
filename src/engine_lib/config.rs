// src/engine_lib/config.rs

use std::{fmt, fs, io, path::{Path, PathBuf}};

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "portal.toml";

pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 16;
const MIN_GROWTH_DURATION_S: f32 = 0.0;
const MAX_GROWTH_DURATION_S: f32 = 60.0;
const MIN_RADIUS: f32 = 0.01;
const MAX_RADIUS: f32 = 100.0;
const MIN_SURFACE_OFFSET: f32 = 0.0;
const MAX_SURFACE_OFFSET: f32 = 0.1;
const MIN_HALF_EXTENT: f32 = 0.01;
const MAX_HALF_EXTENT: f32 = 50.0;
const MIN_FOV_DEG: f32 = 10.0;
const MAX_FOV_DEG: f32 = 170.0;

/// Tunables of the portal system, loaded from `portal.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Nested portal views rendered per portal per frame. Each one costs a
    /// full scene render.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_growth_duration_s")]
    pub growth_duration_s: f32,
    #[serde(default = "default_max_radius")]
    pub max_radius: f32,
    /// Offset from the placement surface against z-fighting, in metres.
    #[serde(default = "default_surface_offset")]
    pub surface_offset: f32,
    #[serde(default = "default_half_width")]
    pub half_width: f32,
    #[serde(default = "default_half_height")]
    pub half_height: f32,
    #[serde(default = "default_fov_y_deg")]
    pub fov_y_deg: f32,
    #[serde(default = "default_znear")]
    pub znear: f32,
    #[serde(default = "default_zfar")]
    pub zfar: f32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            growth_duration_s: default_growth_duration_s(),
            max_radius: default_max_radius(),
            surface_offset: default_surface_offset(),
            half_width: default_half_width(),
            half_height: default_half_height(),
            fov_y_deg: default_fov_y_deg(),
            znear: default_znear(),
            zfar: default_zfar(),
        }
    }
}

impl PortalConfig {
    pub fn sanitize(mut self) -> Self {
        self.iterations = self.iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
        self.growth_duration_s = self.growth_duration_s.clamp(MIN_GROWTH_DURATION_S, MAX_GROWTH_DURATION_S);
        self.max_radius = self.max_radius.clamp(MIN_RADIUS, MAX_RADIUS);
        self.surface_offset = self.surface_offset.clamp(MIN_SURFACE_OFFSET, MAX_SURFACE_OFFSET);
        self.half_width = self.half_width.clamp(MIN_HALF_EXTENT, MAX_HALF_EXTENT);
        self.half_height = self.half_height.clamp(MIN_HALF_EXTENT, MAX_HALF_EXTENT);
        self.fov_y_deg = self.fov_y_deg.clamp(MIN_FOV_DEG, MAX_FOV_DEG);
        self.znear = self.znear.max(0.0001);
        self.zfar = self.zfar.max(self.znear + 0.0001);
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Self>(contents).map(Self::sanitize)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!("loaded portal config from {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("no portal config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("{e}; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = toml::to_string_pretty(&self.clone().sanitize()).map_err(ConfigError::Serialize)?;
        fs::write(path, serialized).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to access portal config {}: {source}", path.display()),
            Self::Parse { path, source } => write!(f, "failed to parse portal config {}: {source}", path.display()),
            Self::Serialize(source) => write!(f, "failed to serialize portal config: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(source) => Some(source),
        }
    }
}

fn default_iterations() -> u32 {
    7
}

fn default_growth_duration_s() -> f32 {
    2.0
}

fn default_max_radius() -> f32 {
    1.0
}

fn default_surface_offset() -> f32 {
    0.001
}

fn default_half_width() -> f32 {
    0.6
}

fn default_half_height() -> f32 {
    1.0
}

fn default_fov_y_deg() -> f32 {
    75.0
}

fn default_znear() -> f32 {
    0.1
}

fn default_zfar() -> f32 {
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = PortalConfig::from_toml_str("iterations = 3\nmax_radius = 2.5\n").unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.max_radius, 2.5);
        assert_eq!(config.growth_duration_s, 2.0);
        assert_eq!(config.surface_offset, 0.001);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = PortalConfig::from_toml_str("iterations = 0\nfov_y_deg = 400.0\nzfar = 0.0\n").unwrap();
        assert_eq!(config.iterations, MIN_ITERATIONS);
        assert_eq!(config.fov_y_deg, MAX_FOV_DEG);
        assert!(config.zfar > config.znear);

        let config = PortalConfig::from_toml_str("iterations = 99").unwrap();
        assert_eq!(config.iterations, MAX_ITERATIONS);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(PortalConfig::from_toml_str("iterations = \"seven\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("definitely/not/here/portal.toml");
        assert!(matches!(PortalConfig::load(path), Err(ConfigError::Io { .. })));
        assert_eq!(PortalConfig::load_or_default(path), PortalConfig::default());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("magic_portal_config_{}.toml", std::process::id()));
        let config = PortalConfig { iterations: 4, half_width: 0.8, ..PortalConfig::default() };
        config.save(&path).unwrap();
        assert_eq!(PortalConfig::load(&path).unwrap(), config);
        let _ = fs::remove_file(&path);
    }
}
