//! Parser and geometry defaults supplied by the host application.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::excellon::types::{CoordinateFormat, Units, ZeroMode};

/// Per-tool CAM parameters copied onto every tool when geometry is built.
///
/// The engine never interprets the values; they are carried for the
/// toolpath stage (cut depth, feed rate, spindle speed and so on).
pub type ToolConfig = BTreeMap<String, serde_json::Value>;

const DEFAULT_STEPS_PER_CIRCLE: u32 = 64;
const DEFAULT_TOOLLESS_DIAMETER_MM: f64 = 1.0;

/// Defaults used when a drill file does not declare its own settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExcellonConfig {
    /// Units assumed before the file declares any, and applied to
    /// headerless files.
    pub default_units: Units,
    /// Zero suppression assumed until the file declares one.
    pub zeros: ZeroMode,
    /// Fixed-point digit format for inch coordinates.
    pub format_in: CoordinateFormat,
    /// Fixed-point digit format for millimetre coordinates.
    pub format_mm: CoordinateFormat,
    /// Circle resolution; buffering uses a quarter of it per quadrant.
    pub steps_per_circle: u32,
    /// Base diameter in millimetres for tools that carry no size.
    pub toolless_diameter: f64,
    /// Default CAM parameters given to every tool.
    pub tool_defaults: ToolConfig,
}

impl Default for ExcellonConfig {
    fn default() -> Self {
        Self {
            default_units: Units::Inch,
            zeros: ZeroMode::Leading,
            format_in: CoordinateFormat::new(2, 4),
            format_mm: CoordinateFormat::new(3, 3),
            steps_per_circle: DEFAULT_STEPS_PER_CIRCLE,
            toolless_diameter: DEFAULT_TOOLLESS_DIAMETER_MM,
            tool_defaults: ToolConfig::new(),
        }
    }
}

impl ExcellonConfig {
    /// Segments per quarter circle used when buffering drills and slots.
    pub fn quadrant_segments(&self) -> u32 {
        (self.steps_per_circle / 4).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quadrant_segments_is_sixteen() {
        assert_eq!(ExcellonConfig::default().quadrant_segments(), 16);
    }

    #[test]
    fn tiny_circle_resolution_clamps_to_one_segment() {
        let config = ExcellonConfig {
            steps_per_circle: 3,
            ..ExcellonConfig::default()
        };
        assert_eq!(config.quadrant_segments(), 1);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let parsed: Result<ExcellonConfig, _> = serde_json::from_str(
            r#"{"default_units":"MM","format_mm":{"upper":4,"lower":2},"tool_defaults":{"cutz":-1.7}}"#,
        );
        assert!(parsed.is_ok(), "config should deserialize: {parsed:?}");
        if let Ok(config) = parsed {
            assert_eq!(config.default_units, Units::Millimeter);
            assert_eq!(config.format_mm, CoordinateFormat::new(4, 2));
            assert_eq!(config.format_in, CoordinateFormat::new(2, 4));
            assert_eq!(config.steps_per_circle, 64);
            assert_eq!(
                config.tool_defaults.get("cutz"),
                Some(&serde_json::json!(-1.7))
            );
        }
    }
}
