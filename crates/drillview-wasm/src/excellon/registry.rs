//! Tool registry and drill/slot collector.

use std::collections::BTreeMap;

use crate::geometry::types::Point;

use super::types::{Slot, Tool, ToolId};

/// Tools keyed by number, iterated in ascending tool order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Tool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registers `id` with `diameter`, or updates the diameter of an existing
    /// tool without touching its holes.
    ///
    /// Returns `true` when the tool was already present.
    pub fn define(&mut self, id: ToolId, diameter: f64) -> bool {
        match self.tools.get_mut(&id) {
            Some(tool) => {
                tool.diameter = diameter;
                true
            }
            None => {
                self.tools.insert(id, Tool::new(diameter));
                false
            }
        }
    }

    /// Returns the tool, creating a zero-diameter placeholder when missing.
    pub fn ensure(&mut self, id: ToolId) -> &mut Tool {
        self.tools.entry(id).or_insert_with(|| Tool::new(0.0))
    }

    /// Appends a drill hit to `id`.
    pub fn add_drill(&mut self, id: ToolId, point: Point) {
        self.ensure(id).drills.push(point);
    }

    /// Appends a slot to `id`.
    pub fn add_slot(&mut self, id: ToolId, start: Point, stop: Point) {
        self.ensure(id).slots.push(Slot { start, stop });
    }

    /// Looks up a tool.
    pub fn get(&self, id: ToolId) -> Option<&Tool> {
        self.tools.get(&id)
    }

    /// Looks up a tool for modification.
    pub fn get_mut(&mut self, id: ToolId) -> Option<&mut Tool> {
        self.tools.get_mut(&id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: ToolId) -> bool {
        self.tools.contains_key(&id)
    }

    /// Lowest registered tool number.
    pub fn first_id(&self) -> Option<ToolId> {
        self.tools.keys().next().copied()
    }

    /// Iterates tools in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (ToolId, &Tool)> {
        self.tools.iter().map(|(id, tool)| (*id, tool))
    }

    /// Iterates tools in ascending order for modification.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ToolId, &mut Tool)> {
        self.tools.iter_mut().map(|(id, tool)| (*id, tool))
    }

    /// Tool diameters in ascending tool order.
    pub fn diameters(&self) -> impl Iterator<Item = f64> + '_ {
        self.tools.values().map(|tool| tool.diameter)
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Total drill hits plus slots over all tools.
    pub fn hit_count(&self) -> usize {
        self.tools
            .values()
            .map(|tool| tool.drills.len() + tool.slots.len())
            .sum()
    }

    /// Multiplies every coordinate and diameter by `factor`.
    pub fn convert_units(&mut self, factor: f64) {
        for tool in self.tools.values_mut() {
            tool.diameter *= factor;
        }
        self.scale_positions(factor);
    }

    /// Multiplies every drill and slot coordinate by `factor`; diameters
    /// are left alone.
    pub fn scale_positions(&mut self, factor: f64) {
        let scale = |p: &mut Point| {
            p.x *= factor;
            p.y *= factor;
        };
        for tool in self.tools.values_mut() {
            tool.drills.iter_mut().for_each(scale);
            for slot in &mut tool.slots {
                scale(&mut slot.start);
                scale(&mut slot.stop);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn ut_reg_001_redefinition_updates_diameter_without_duplicating() {
        let mut registry = ToolRegistry::new();
        assert!(!registry.define(1, 0.8));
        registry.add_drill(1, Point::new(1.0, 1.0));
        assert!(registry.define(1, 1.0));

        assert_eq!(registry.len(), 1);
        let tool = registry.get(1);
        assert!(tool.is_some_and(|t| (t.diameter - 1.0).abs() < EPSILON));
        assert!(tool.is_some_and(|t| t.drills.len() == 1));
    }

    #[test]
    fn ut_reg_002_holes_create_placeholder_tools() {
        let mut registry = ToolRegistry::new();
        registry.add_slot(3, Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let tool = registry.get(3);
        assert!(tool.is_some_and(|t| t.diameter == 0.0));
        assert!(tool.is_some_and(|t| t.drills.is_empty() && t.slots.len() == 1));
        assert_eq!(registry.hit_count(), 1);
    }

    #[test]
    fn ut_reg_003_iteration_is_ordered_by_tool_number() {
        let mut registry = ToolRegistry::new();
        registry.define(5, 1.0);
        registry.define(2, 1.0);
        registry.define(9, 1.0);
        let ids: Vec<ToolId> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        assert_eq!(registry.first_id(), Some(2));
    }

    #[test]
    fn ut_reg_004_convert_units_scales_points_and_diameters() {
        let mut registry = ToolRegistry::new();
        registry.define(1, 0.1);
        registry.add_drill(1, Point::new(1.0, 2.0));
        registry.add_slot(1, Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        registry.convert_units(25.4);

        let tool = registry.get(1);
        assert!(tool.is_some_and(|t| (t.diameter - 2.54).abs() < EPSILON));
        assert!(tool.is_some_and(|t| t
            .drills
            .first()
            .is_some_and(|p| (p.y - 50.8).abs() < EPSILON)));
        assert!(tool.is_some_and(|t| t
            .slots
            .first()
            .is_some_and(|s| (s.stop.x - 25.4).abs() < EPSILON)));
    }

    #[test]
    fn ut_reg_005_diameters_follow_tool_order() {
        let mut registry = ToolRegistry::new();
        registry.define(4, 0.9);
        registry.define(1, 0.3);
        registry.ensure(2);
        let diameters: Vec<f64> = registry.diameters().collect();
        assert_eq!(diameters, vec![0.3, 0.0, 0.9]);
    }

    #[test]
    fn ut_reg_006_scale_positions_keeps_diameters() {
        let mut registry = ToolRegistry::new();
        registry.define(2, 0.8);
        registry.add_drill(2, Point::new(1.0, -2.0));
        registry.add_slot(2, Point::new(0.5, 0.0), Point::new(1.5, 0.0));
        registry.scale_positions(10.0);

        let tool = registry.get(2);
        assert!(tool.is_some_and(|t| (t.diameter - 0.8).abs() < EPSILON));
        assert!(tool.is_some_and(|t| t
            .drills
            .first()
            .is_some_and(|p| (p.x - 10.0).abs() < EPSILON && (p.y + 20.0).abs() < EPSILON)));
        assert!(tool.is_some_and(|t| t
            .slots
            .first()
            .is_some_and(|s| (s.start.x - 5.0).abs() < EPSILON && (s.stop.x - 15.0).abs() < EPSILON)));
    }
}
