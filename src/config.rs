// config.rs: 查看器选项（JSON，键名沿用 camelCase）

use crate::error::ViewerError;
use crate::media::VideoOptions;
use crate::orientation::InteractionMode;
use crate::projection::ProjectionMode;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// true: 按下拖拽；false: 悬停即转动
    pub click_and_drag: bool,
    pub fov: f32,
    pub fov_min: f32,
    pub fov_max: f32,
    pub hide_controls: bool,
    pub lon: f32,
    pub lat: f32,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub muted: bool,
    pub debug: bool,
    pub flat_projection: bool,
    pub autoplay: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            click_and_drag: true,
            fov: 35.0,
            fov_min: 3.0,
            fov_max: 100.0,
            hide_controls: false,
            lon: 0.0,
            lat: 0.0,
            looping: true,
            muted: true,
            debug: false,
            flat_projection: false,
            autoplay: true,
        }
    }
}

impl ViewerConfig {
    /// Parse and validate. Keys missing from `json` take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ViewerError> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        let fields = [
            ("fov", self.fov),
            ("fovMin", self.fov_min),
            ("fovMax", self.fov_max),
            ("lon", self.lon),
            ("lat", self.lat),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ViewerError::InvalidConfig(format!("{name} must be finite")));
        }
        if self.fov_min > self.fov_max {
            return Err(ViewerError::InvalidConfig(format!(
                "fovMin ({}) is greater than fovMax ({})",
                self.fov_min, self.fov_max
            )));
        }
        if self.fov_min <= 0.0 || self.fov_max >= 180.0 {
            return Err(ViewerError::InvalidConfig(format!(
                "fov range [{}, {}] must lie inside (0, 180)",
                self.fov_min, self.fov_max
            )));
        }
        Ok(())
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        InteractionMode::from_click_and_drag(self.click_and_drag)
    }

    pub fn projection_mode(&self) -> ProjectionMode {
        ProjectionMode::from_flat_flag(self.flat_projection)
    }

    pub fn video_options(&self) -> VideoOptions {
        VideoOptions {
            muted: self.muted,
            looping: self.looping,
            autoplay: self.autoplay,
        }
    }

    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let c = ViewerConfig::from_json_str("{}").unwrap();
        assert_eq!(c, ViewerConfig::default());
        assert_eq!(c.interaction_mode(), InteractionMode::ClickAndDrag);
        assert_eq!(c.projection_mode(), ProjectionMode::Spherical);
    }

    #[test]
    fn camel_case_keys_override_defaults() {
        let c = ViewerConfig::from_json_str(
            r#"{ "clickAndDrag": false, "fovMin": 10, "fovMax": 90, "flatProjection": true, "loop": false, "lat": 12.5 }"#,
        )
        .unwrap();
        assert_eq!(c.interaction_mode(), InteractionMode::Absolute);
        assert_eq!(c.projection_mode(), ProjectionMode::Flat);
        assert_eq!(c.fov_min, 10.0);
        assert_eq!(c.fov_max, 90.0);
        assert_eq!(c.lat, 12.5);
        assert!(!c.video_options().looping);
        assert_eq!(c.fov, 35.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let c = ViewerConfig::from_json_str(r#"{ "crossOrigin": "anonymous" }"#).unwrap();
        assert_eq!(c, ViewerConfig::default());
    }

    #[test]
    fn inverted_fov_range_is_rejected() {
        let err = ViewerConfig::from_json_str(r#"{ "fovMin": 80, "fovMax": 20 }"#).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ViewerConfig::from_json_str("{ fov: }").unwrap_err();
        assert!(matches!(err, ViewerError::ConfigParse(_)));
    }

    #[test]
    fn debug_raises_log_level() {
        let c = ViewerConfig {
            debug: true,
            ..Default::default()
        };
        assert_eq!(c.default_log_level(), "debug");
    }
}
