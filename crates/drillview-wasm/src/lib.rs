#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `DrillView` WASM module: Excellon drill parsing, transforms and mesh export.

pub mod config;
pub mod error;
pub mod excellon;
pub mod geometry;

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::config::ExcellonConfig;
use crate::error::ExcellonError;
use crate::excellon::context::{LogContext, ParseContext};
use crate::excellon::transform::{MirrorAxis, RotateOrigin};
use crate::excellon::types::{JoinStyle, ToolId, Units};
use crate::excellon::ExcellonDocument;
use crate::geometry::types::saturate_u32;
use crate::geometry::{BoundingBox, LayerGeometry, LayerMeta, Point};

thread_local! {
    static LAST_DOCUMENT: RefCell<Option<ExcellonDocument>> = const { RefCell::new(None) };
    static LAST_GEOMETRY: RefCell<Option<LayerGeometry>> = const { RefCell::new(None) };
}

fn store_geometry(geom: LayerGeometry) {
    LAST_GEOMETRY.with(|g| {
        *g.borrow_mut() = Some(geom);
    });
}

/// One transform call from the host, tagged by `op`.
///
/// ```json
/// { "op": "rotate", "angle": 90, "origin": { "x": 0, "y": 0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformRequest {
    /// Scale about `origin` (default `(0, 0)`).
    Scale {
        /// X factor.
        x_factor: f64,
        /// Y factor.
        y_factor: f64,
        /// Fixed point.
        #[serde(default)]
        origin: Point,
    },
    /// Translate.
    Offset {
        /// X distance.
        dx: f64,
        /// Y distance.
        dy: f64,
    },
    /// Mirror across the line through `point` parallel to `axis`.
    Mirror {
        /// `"X"` or `"Y"`.
        axis: MirrorAxis,
        /// A point on the axis of symmetry.
        #[serde(default)]
        point: Point,
    },
    /// Shear about `origin`.
    Skew {
        /// Shear angle along X, in degrees.
        angle_x: f64,
        /// Shear angle along Y, in degrees.
        angle_y: f64,
        /// Fixed point.
        #[serde(default)]
        origin: Point,
    },
    /// Rotate counter-clockwise; without `origin` each primitive turns
    /// about its own centre.
    Rotate {
        /// Angle in degrees.
        angle: f64,
        /// Shared pivot.
        #[serde(default)]
        origin: Option<Point>,
    },
    /// Change tool diameters.
    Buffer {
        /// Added to, or multiplied into, every diameter.
        distance: f64,
        /// Slot end style.
        #[serde(default)]
        join: JoinStyle,
        /// Multiply instead of add.
        #[serde(default)]
        is_scale_factor: bool,
    },
    /// Convert every coordinate and diameter to other units.
    ConvertUnits {
        /// Target units, `"IN"` or `"MM"`.
        units: Units,
    },
}

impl TransformRequest {
    /// Runs the request against `doc`.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if `ctx` aborts.
    pub fn apply(
        &self,
        doc: &mut ExcellonDocument,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        match *self {
            Self::Scale {
                x_factor,
                y_factor,
                origin,
            } => doc.scale(x_factor, y_factor, origin, ctx),
            Self::Offset { dx, dy } => doc.offset(dx, dy, ctx),
            Self::Mirror { axis, point } => doc.mirror(axis, point, ctx),
            Self::Skew {
                angle_x,
                angle_y,
                origin,
            } => doc.skew(angle_x, angle_y, origin, ctx),
            Self::Rotate { angle, origin } => {
                let origin = origin.map_or(RotateOrigin::Center, RotateOrigin::Point);
                doc.rotate(angle, origin, ctx)
            }
            Self::Buffer {
                distance,
                join,
                is_scale_factor,
            } => doc.buffer(distance, join, is_scale_factor, ctx),
            Self::ConvertUnits { units } => {
                doc.convert_units(units);
                Ok(())
            }
        }
    }
}

/// Per-tool summary returned by [`get_tools`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSummary {
    /// Tool number.
    pub id: ToolId,
    /// Diameter in document units.
    pub diameter: f64,
    /// Number of drill hits.
    pub drill_count: u32,
    /// Number of slots.
    pub slot_count: u32,
}

/// Initialize the WASM module. Sets up the panic hook for debugging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Parse an Excellon drill file from raw bytes and generate renderable geometry.
///
/// `options` is an optional [`ExcellonConfig`] object; missing fields keep
/// their defaults. Returns `LayerMeta` as a `JsValue` via
/// `serde-wasm-bindgen`. Geometry buffers are stored internally; retrieve
/// with [`get_positions`] and [`get_indices`].
///
/// # Errors
///
/// Returns a descriptive error string if the options are invalid or
/// parsing fails.
#[allow(clippy::needless_pass_by_value)]
#[wasm_bindgen]
pub fn parse_excellon(data: &[u8], options: JsValue) -> Result<JsValue, JsValue> {
    let config = if options.is_undefined() || options.is_null() {
        ExcellonConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    let meta = parse_excellon_internal(data, &config).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&meta).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Internal parse logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn parse_excellon_internal(data: &[u8], config: &ExcellonConfig) -> Result<LayerMeta, String> {
    let doc = excellon::parse(data, config).map_err(|err| err.to_string())?;
    let meta = publish(&doc);
    LAST_DOCUMENT.with(|d| {
        *d.borrow_mut() = Some(doc);
    });
    Ok(meta)
}

/// Apply a [`TransformRequest`] to the last parsed drill file.
///
/// Returns the updated `LayerMeta`; the geometry buffers are replaced.
///
/// # Errors
///
/// Returns a descriptive error string if the request is invalid or no file
/// has been parsed.
#[allow(clippy::needless_pass_by_value)]
#[wasm_bindgen]
pub fn transform_excellon(request: JsValue) -> Result<JsValue, JsValue> {
    let request: TransformRequest =
        serde_wasm_bindgen::from_value(request).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let meta = transform_excellon_internal(&request).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&meta).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Internal transform logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn transform_excellon_internal(request: &TransformRequest) -> Result<LayerMeta, String> {
    LAST_DOCUMENT.with(|d| -> Result<LayerMeta, String> {
        let mut slot = d.borrow_mut();
        let doc = slot
            .as_mut()
            .ok_or_else(|| "no drill file has been parsed".to_string())?;
        request
            .apply(doc, &mut LogContext)
            .map_err(|err| err.to_string())?;
        Ok(publish(doc))
    })
}

/// Mesh the document, store the buffers and describe the result.
fn publish(doc: &ExcellonDocument) -> LayerMeta {
    let geom = doc.mesh();
    let (min_x, min_y, max_x, max_y) = doc.bounds();
    let meta = LayerMeta {
        bounds: BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        },
        vertex_count: geom.vertex_count,
        index_count: saturate_u32(geom.indices.len()),
        command_count: saturate_u32(doc.tools.hit_count()),
        tool_count: saturate_u32(doc.tools.len()),
        units: doc.state.units.to_string(),
        warning_count: saturate_u32(doc.warnings.len() + geom.warnings.len()),
        warnings: doc
            .warnings
            .iter()
            .chain(&geom.warnings)
            .cloned()
            .collect(),
    };
    store_geometry(geom);
    meta
}

/// Bounds of the last drill file as `[min_x, min_y, max_x, max_y]`.
///
/// All zeros if nothing has been parsed or the file has no geometry.
#[wasm_bindgen]
pub fn get_bounds() -> Vec<f64> {
    LAST_DOCUMENT.with(|d| {
        let (min_x, min_y, max_x, max_y) = d
            .borrow()
            .as_ref()
            .map_or((0.0, 0.0, 0.0, 0.0), ExcellonDocument::bounds);
        vec![min_x, min_y, max_x, max_y]
    })
}

/// Retrieve the position buffer for the last parsed layer.
///
/// Returns a copy of the interleaved `[x0, y0, x1, y1, ...]` positions.
/// Returns an empty array if no layer has been parsed yet.
#[wasm_bindgen]
pub fn get_positions() -> Vec<f32> {
    LAST_GEOMETRY.with(|g| {
        g.borrow()
            .as_ref()
            .map_or_else(Vec::new, |geom| geom.positions.clone())
    })
}

/// Retrieve the index buffer for the last parsed layer.
///
/// Returns a copy of the triangle-list indices.
/// Returns an empty array if no layer has been parsed yet.
#[wasm_bindgen]
pub fn get_indices() -> Vec<u32> {
    LAST_GEOMETRY.with(|g| {
        g.borrow()
            .as_ref()
            .map_or_else(Vec::new, |geom| geom.indices.clone())
    })
}

/// Tool table of the last drill file as an array of [`ToolSummary`].
///
/// # Errors
///
/// Returns an error string if serialization fails.
#[wasm_bindgen]
pub fn get_tools() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&get_tools_internal())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Internal tool table logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn get_tools_internal() -> Vec<ToolSummary> {
    LAST_DOCUMENT.with(|d| {
        d.borrow().as_ref().map_or_else(Vec::new, |doc| {
            doc.tools
                .iter()
                .map(|(id, tool)| ToolSummary {
                    id,
                    diameter: tool.diameter,
                    drill_count: saturate_u32(tool.drills.len()),
                    slot_count: saturate_u32(tool.slots.len()),
                })
                .collect()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRILL: &[u8] = b"M48\nMETRIC,TZ\nT1C0.8\nT2C1.0\n%\nT1\nX1000Y1000\nX2000Y1000\nT2\nX3000Y3000\nX4000Y3000G85X5000Y3000\nM30\n";

    fn clear_state() {
        LAST_DOCUMENT.with(|d| *d.borrow_mut() = None);
        LAST_GEOMETRY.with(|g| *g.borrow_mut() = None);
    }

    #[test]
    fn parse_excellon_reports_meta_and_stores_buffers() {
        let result = parse_excellon_internal(DRILL, &ExcellonConfig::default());
        assert!(
            result.is_ok(),
            "expected Ok, got Err: {:?}",
            result.as_ref().err()
        );
        let Some(meta) = result.ok() else {
            return;
        };
        assert_eq!(meta.command_count, 4, "three drills and one slot");
        assert_eq!(meta.tool_count, 2);
        assert_eq!(meta.units, "MM");
        assert!(meta.vertex_count > 0, "expected generated drill geometry");
        assert_eq!(get_positions().len(), meta.vertex_count as usize * 2);
        assert_eq!(get_indices().len(), meta.index_count as usize);
    }

    #[test]
    fn parse_excellon_empty_bytes() {
        let result = parse_excellon_internal(&[], &ExcellonConfig::default());
        assert_eq!(result.err(), Some("empty input".to_string()));
    }

    #[test]
    fn parse_excellon_gcode_is_rejected() {
        let result = parse_excellon_internal(b"G21\nG90\n", &ExcellonConfig::default());
        assert!(result.is_err_and(|e| e.contains("not an Excellon file")));
    }

    #[test]
    fn get_buffers_empty_without_parse() {
        clear_state();
        assert!(get_positions().is_empty(), "no parse yet => empty positions");
        assert!(get_indices().is_empty(), "no parse yet => empty indices");
        assert_eq!(get_bounds(), vec![0.0; 4]);
        assert!(get_tools_internal().is_empty());
    }

    #[test]
    fn transform_without_parse_fails() {
        clear_state();
        let request = TransformRequest::Offset { dx: 1.0, dy: 1.0 };
        assert!(transform_excellon_internal(&request).is_err());
    }

    #[test]
    fn transform_moves_bounds_and_keeps_tools() {
        assert!(parse_excellon_internal(DRILL, &ExcellonConfig::default()).is_ok());
        let before = get_bounds();
        let result = transform_excellon_internal(&TransformRequest::Offset { dx: 5.0, dy: -1.0 });
        assert!(result.is_ok(), "{result:?}");
        let after = get_bounds();
        for (old, new) in before.iter().zip(&after).step_by(2) {
            assert!((new - old - 5.0).abs() < 1e-9);
        }
        assert_eq!(get_tools_internal().len(), 2);
    }

    #[test]
    fn transform_requests_deserialize_from_json() {
        let rotate: Result<TransformRequest, _> =
            serde_json::from_str(r#"{"op":"rotate","angle":180}"#);
        assert_eq!(
            rotate.ok(),
            Some(TransformRequest::Rotate {
                angle: 180.0,
                origin: None,
            })
        );

        let mirror: Result<TransformRequest, _> =
            serde_json::from_str(r#"{"op":"mirror","axis":"X","point":{"x":1.0,"y":2.0}}"#);
        assert_eq!(
            mirror.ok(),
            Some(TransformRequest::Mirror {
                axis: MirrorAxis::X,
                point: Point::new(1.0, 2.0),
            })
        );

        let buffer: Result<TransformRequest, _> =
            serde_json::from_str(r#"{"op":"buffer","distance":0.1,"join":"bevel"}"#);
        assert_eq!(
            buffer.ok(),
            Some(TransformRequest::Buffer {
                distance: 0.1,
                join: JoinStyle::Bevel,
                is_scale_factor: false,
            })
        );
    }

    #[test]
    fn get_tools_lists_counts_in_tool_order() {
        assert!(parse_excellon_internal(DRILL, &ExcellonConfig::default()).is_ok());
        let tools = get_tools_internal();
        assert_eq!(
            tools,
            vec![
                ToolSummary {
                    id: 1,
                    diameter: 0.8,
                    drill_count: 2,
                    slot_count: 0,
                },
                ToolSummary {
                    id: 2,
                    diameter: 1.0,
                    drill_count: 1,
                    slot_count: 1,
                },
            ]
        );
    }
}
