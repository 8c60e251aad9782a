//! Excellon drill file types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ExcellonConfig, ToolConfig};
use crate::geometry::types::{Point, Polygon};

/// Tool number (T1, T2, etc.).
pub type ToolId = u32;

const MM_PER_INCH: f64 = 25.4;

/// Unit system for Excellon files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Imperial (inches).
    #[serde(rename = "IN", alias = "INCH")]
    Inch,
    /// Metric (millimeters).
    #[serde(rename = "MM", alias = "METRIC")]
    Millimeter,
}

impl Units {
    /// Factor that converts a length in `self` into `target` units.
    pub fn factor_to(self, target: Self) -> f64 {
        match (self, target) {
            (Self::Inch, Self::Millimeter) => MM_PER_INCH,
            (Self::Millimeter, Self::Inch) => 1.0 / MM_PER_INCH,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inch => f.write_str("IN"),
            Self::Millimeter => f.write_str("MM"),
        }
    }
}

/// Which zeros a fixed-point coordinate keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroMode {
    /// Leading zeros are present, trailing zeros may be omitted (`LZ`).
    #[serde(rename = "L", alias = "LZ")]
    Leading,
    /// Trailing zeros are present, leading zeros may be omitted (`TZ`).
    #[serde(rename = "T", alias = "TZ")]
    Trailing,
}

/// Fixed-point digit counts, e.g. `2:4` for `00.0000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateFormat {
    /// Digits before the implied decimal point.
    pub upper: u8,
    /// Digits after the implied decimal point.
    pub lower: u8,
}

impl CoordinateFormat {
    /// Creates a format from its digit counts.
    pub const fn new(upper: u8, lower: u8) -> Self {
        Self { upper, lower }
    }
}

impl fmt::Display for CoordinateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.upper, self.lower)
    }
}

/// Corner style applied at the ends of a buffered slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    /// Semicircular ends.
    #[default]
    Round,
    /// Ends extended by the radius with square corners.
    Square,
    /// Ends cut flat at the slot endpoints.
    Bevel,
}

/// A milled slot from `start` to `stop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    /// Slot start point.
    pub start: Point,
    /// Slot stop point.
    pub stop: Point,
}

/// A drill tool and everything drilled or milled with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    /// Tool diameter in document units.
    pub diameter: f64,
    /// Drill hit centers, in file order.
    pub drills: Vec<Point>,
    /// Slots, in file order.
    pub slots: Vec<Slot>,
    /// Derived polygons; rebuilt from `drills`/`slots` on every geometry build.
    pub solid_geometry: Vec<Polygon>,
    /// Copy of the document-wide default tool config.
    pub config: ToolConfig,
    /// End style used when slots are buffered.
    pub slot_join: JoinStyle,
}

impl Tool {
    /// Creates an empty tool with the given diameter.
    pub fn new(diameter: f64) -> Self {
        Self {
            diameter,
            drills: Vec::new(),
            slots: Vec::new(),
            solid_geometry: Vec::new(),
            config: ToolConfig::new(),
            slot_join: JoinStyle::Round,
        }
    }
}

/// Where the document's current units came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitsOrigin {
    /// Configured default, not yet confirmed by anything in the file.
    Assumed,
    /// Declared by the file (`INCH`, `METRIC`, `M71`, `M72`, hole-size comment).
    Declared,
    /// Applied from configuration because the file has no usable header.
    Defaulted,
    /// Guessed from the tool diameters.
    Inferred,
}

/// Position of the parser within the file structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserPhase {
    /// Nothing structural seen yet.
    PreHeader,
    /// Between `M48` (or `;HEADER`) and the header end.
    InHeader,
    /// After a header end.
    InBody,
    /// Body commands without a usable header.
    Headerless,
}

/// Document-wide parse state: units, zeros, formats and phase.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    /// Active units.
    pub units: Units,
    /// Active zero suppression.
    pub zeros: ZeroMode,
    /// Fixed-point format for inch coordinates.
    pub format_in: CoordinateFormat,
    /// Fixed-point format for millimetre coordinates.
    pub format_mm: CoordinateFormat,
    /// Where `units` came from.
    pub units_origin: UnitsOrigin,
    /// Current structural phase.
    pub phase: ParserPhase,
    /// Currently selected tool.
    pub current_tool: Option<ToolId>,
    /// Cadence Allegro dialect (`;HEADER`) detected.
    pub allegro: bool,
}

impl DocumentState {
    /// Creates the initial state from host defaults.
    pub const fn from_config(config: &ExcellonConfig) -> Self {
        Self {
            units: config.default_units,
            zeros: config.zeros,
            format_in: config.format_in,
            format_mm: config.format_mm,
            units_origin: UnitsOrigin::Assumed,
            phase: ParserPhase::PreHeader,
            current_tool: None,
            allegro: false,
        }
    }

    /// Digit format for the active units.
    pub const fn format(&self) -> CoordinateFormat {
        self.format_for(self.units)
    }

    /// Digit format for one unit system.
    pub const fn format_for(&self, units: Units) -> CoordinateFormat {
        match units {
            Units::Inch => self.format_in,
            Units::Millimeter => self.format_mm,
        }
    }

    /// Sets the digit format for one unit system.
    pub fn set_format(&mut self, units: Units, format: CoordinateFormat) {
        match units {
            Units::Inch => self.format_in = format,
            Units::Millimeter => self.format_mm = format,
        }
    }

    /// Whether the file itself declared its units.
    pub fn units_declared(&self) -> bool {
        self.units_origin == UnitsOrigin::Declared
    }

    /// Whether the units are more than the initial assumption.
    pub fn units_established(&self) -> bool {
        self.units_origin != UnitsOrigin::Assumed
    }

    /// Whether the parser is inside a header.
    pub fn in_header(&self) -> bool {
        self.phase == ParserPhase::InHeader
    }

    /// Whether the file is being read without a usable header.
    pub fn headerless(&self) -> bool {
        self.phase == ParserPhase::Headerless
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_factors_are_reciprocal() {
        let there = Units::Inch.factor_to(Units::Millimeter);
        let back = Units::Millimeter.factor_to(Units::Inch);
        assert!((there * back - 1.0).abs() < 1e-12);
        assert!((Units::Inch.factor_to(Units::Inch) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn state_format_follows_active_units() {
        let mut state = DocumentState::from_config(&ExcellonConfig::default());
        assert_eq!(state.format(), CoordinateFormat::new(2, 4));
        state.units = Units::Millimeter;
        assert_eq!(state.format(), CoordinateFormat::new(3, 3));
        state.set_format(Units::Millimeter, CoordinateFormat::new(4, 2));
        assert_eq!(state.format(), CoordinateFormat::new(4, 2));
    }

    #[test]
    fn units_deserialize_from_short_and_long_names() {
        let short: Result<Units, _> = serde_json::from_str("\"MM\"");
        let long: Result<Units, _> = serde_json::from_str("\"INCH\"");
        assert_eq!(short.ok(), Some(Units::Millimeter));
        assert_eq!(long.ok(), Some(Units::Inch));
    }
}
