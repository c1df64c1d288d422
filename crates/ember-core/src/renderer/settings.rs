// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer configuration, persisted as JSON.

use super::light_grid::LightGridConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How the editor viewport shades geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewportShading {
    /// Flat lit shading without materials.
    Solid,
    /// Full material shading.
    #[default]
    Rendered,
    /// Triangle edges only.
    Wireframe,
}

/// Which visibility tests the culling pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingSettings {
    /// Test instances against the camera frustum.
    pub frustum: bool,
    /// Test instances against the Hi-Z depth pyramid.
    pub occlusion: bool,
}

impl Default for CullingSettings {
    fn default() -> Self {
        Self {
            frustum: true,
            occlusion: true,
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
    /// Cap the frame rate at `target_fps`.
    pub limit_fps: bool,
    /// Frame rate cap.
    pub target_fps: u32,
    /// Scale of the internal render size relative to the output.
    pub render_resolution: f32,
    /// Viewport shading mode.
    pub shading: ViewportShading,
    /// Culling tests.
    pub culling: CullingSettings,
    /// Edge of the square shadow atlas in texels.
    pub shadow_atlas_size: u32,
    /// Edge of the square BRDF lookup table in texels.
    pub brdf_lut_size: u32,
    /// Light grid tiling.
    pub tiles: LightGridConfig,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            vsync: false,
            limit_fps: false,
            target_fps: 120,
            render_resolution: 1.0,
            shading: ViewportShading::default(),
            culling: CullingSettings::default(),
            shadow_atlas_size: 4096,
            brdf_lut_size: 512,
            tiles: LightGridConfig::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(SettingsError::Parse)
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No renderer settings at '{}', using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(SettingsError::Io(err)),
        }
    }

    /// Writes the settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(SettingsError::Parse)?;
        std::fs::write(path, json).map_err(SettingsError::Io)
    }

    /// The internal render size: output size scaled by `render_resolution`,
    /// never smaller than 1x1.
    pub fn render_size(&self) -> (u32, u32) {
        let scale = if self.render_resolution.is_finite() && self.render_resolution > 0.0 {
            self.render_resolution
        } else {
            1.0
        };
        let w = ((self.width as f32 * scale).round() as u32).max(1);
        let h = ((self.height as f32 * scale).round() as u32).max(1);
        (w, h)
    }
}

/// An error raised while loading or saving [`RendererSettings`].
#[derive(Debug)]
pub enum SettingsError {
    /// Reading or writing the file failed.
    Io(std::io::Error),
    /// The JSON was malformed.
    Parse(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "Failed to access renderer settings: {err}"),
            SettingsError::Parse(err) => write!(f, "Malformed renderer settings: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::light_grid::TileSize;

    #[test]
    fn test_defaults() {
        let settings = RendererSettings::default();
        assert_eq!((settings.width, settings.height), (1920, 1080));
        assert_eq!(settings.target_fps, 120);
        assert!(settings.culling.frustum && settings.culling.occlusion);
        assert_eq!(settings.tiles.tile_size, TileSize::X16);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings =
            RendererSettings::from_json_str(r#"{ "width": 1280, "culling": { "occlusion": false } }"#)
                .expect("valid json");
        assert_eq!(settings.width, 1280);
        assert_eq!(settings.height, 1080);
        assert!(settings.culling.frustum);
        assert!(!settings.culling.occlusion);
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = RendererSettings::from_json_str("{ width: ").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_render_size_scales_and_clamps() {
        let mut settings = RendererSettings {
            render_resolution: 0.5,
            ..Default::default()
        };
        assert_eq!(settings.render_size(), (960, 540));
        settings.width = 1;
        settings.height = 1;
        assert_eq!(settings.render_size(), (1, 1));
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("ember-settings-{}.json", std::process::id()));
        let settings = RendererSettings {
            vsync: true,
            shading: ViewportShading::Wireframe,
            ..Default::default()
        };
        settings.save(&path).expect("settings are writable");
        let loaded = RendererSettings::load(&path).expect("settings are readable");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loaded = RendererSettings::load("/definitely/not/here/ember.json").expect("defaults");
        assert_eq!(loaded, RendererSettings::default());
    }
}
