//! Solid geometry construction from the tool registry.
//!
//! Geometry is always rebuilt wholesale from the drill points and slot
//! segments; polygons are never transformed in place.

use crate::config::ToolConfig;
use crate::excellon::registry::ToolRegistry;

use super::buffer::{buffer_point, buffer_segment};
use super::types::{BoundingBox, Polygon};

/// Nested polygon tree: one group per tool under a root group.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoNode {
    /// A single polygon.
    Leaf(Polygon),
    /// A list of nodes.
    Group(Vec<GeoNode>),
}

impl GeoNode {
    /// Bounding box of every leaf below this node.
    ///
    /// Empty leaves leave the box untouched, so an empty tree yields an empty box.
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Self::Leaf(polygon) => polygon.bounds(),
            Self::Group(children) => {
                children
                    .iter()
                    .fold(BoundingBox::new(), |mut acc, child| {
                        acc.merge(&child.bounds());
                        acc
                    })
            }
        }
    }

    /// Number of polygons below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group(children) => children.iter().map(Self::leaf_count).sum(),
        }
    }
}

/// Output of one geometry build.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidGeometry {
    /// Root group with one child group per tool, in tool order.
    pub tree: GeoNode,
    /// Every polygon, flattened in tool order, drills before slots.
    pub polygons: Vec<Polygon>,
    /// Primitives that were skipped.
    pub warnings: Vec<String>,
}

/// Rebuild every tool's `solid_geometry` and collect the document geometry.
///
/// Each tool receives a fresh copy of `default_config`. Tools whose diameter
/// is not a positive finite number keep their drills and slots but produce
/// no polygons.
pub fn build_geometry(
    registry: &mut ToolRegistry,
    default_config: &ToolConfig,
    quadrant_segments: u32,
) -> SolidGeometry {
    let mut groups = Vec::with_capacity(registry.len());
    let mut polygons = Vec::new();
    let mut warnings = Vec::new();

    for (id, tool) in registry.iter_mut() {
        tool.config = default_config.clone();
        tool.solid_geometry.clear();

        let primitive_count = tool.drills.len() + tool.slots.len();
        if !(tool.diameter.is_finite() && tool.diameter > 0.0) {
            if primitive_count > 0 {
                warnings.push(format!(
                    "tool T{id} has diameter {}; {primitive_count} hole(s) produce no geometry",
                    tool.diameter
                ));
            }
            groups.push(GeoNode::Group(Vec::new()));
            continue;
        }

        let radius = tool.diameter / 2.0;
        let mut tool_polygons = Vec::with_capacity(primitive_count);
        for drill in &tool.drills {
            tool_polygons.push(buffer_point(*drill, radius, quadrant_segments));
        }
        for slot in &tool.slots {
            tool_polygons.push(buffer_segment(
                slot.start,
                slot.stop,
                radius,
                quadrant_segments,
                tool.slot_join,
            ));
        }

        polygons.extend(tool_polygons.iter().cloned());
        groups.push(GeoNode::Group(
            tool_polygons.iter().cloned().map(GeoNode::Leaf).collect(),
        ));
        tool.solid_geometry = tool_polygons;
    }

    SolidGeometry {
        tree: GeoNode::Group(groups),
        polygons,
        warnings,
    }
}
