//! Transforms over a parsed drill document.
//!
//! Every transform moves the drill centres and slot endpoints tool by tool,
//! leaves diameters alone (only [`ExcellonDocument::buffer`] touches them),
//! then rebuilds the geometry from scratch. Cancellation is checked before
//! each tool; a cancelled transform leaves the tools it already visited
//! transformed and the geometry invalidated.

use log::Level;
use serde::Deserialize;

use crate::error::ExcellonError;
use crate::geometry::affine::Affine;
use crate::geometry::types::Point;

use super::context::{ParseContext, ProgressTracker};
use super::types::{JoinStyle, Slot, Tool, ToolId};
use super::ExcellonDocument;

/// Axis of symmetry for [`ExcellonDocument::mirror`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MirrorAxis {
    /// Mirror across a horizontal line: Y is flipped.
    X,
    /// Mirror across a vertical line: X is flipped.
    Y,
}

/// Pivot for [`ExcellonDocument::rotate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotateOrigin {
    /// Rotate everything about one point.
    Point(Point),
    /// Rotate each primitive about its own centre.
    Center,
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Shared(Affine),
    RotateInPlace(f64),
}

impl Placement {
    const fn for_drill(self) -> Option<Affine> {
        match self {
            Self::Shared(affine) => Some(affine),
            Self::RotateInPlace(_) => None,
        }
    }

    fn for_slot(self, slot: &Slot) -> Affine {
        match self {
            Self::Shared(affine) => affine,
            Self::RotateInPlace(angle_deg) => {
                Affine::rotate(angle_deg, slot.start.midpoint(slot.stop))
            }
        }
    }
}

impl ExcellonDocument {
    /// Scales about `origin`.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn scale(
        &mut self,
        x_factor: f64,
        y_factor: f64,
        origin: Point,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        let placement = Placement::Shared(Affine::scale(x_factor, y_factor, origin));
        self.place(placement, ctx)
    }

    /// Translates by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn offset(
        &mut self,
        dx: f64,
        dy: f64,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        self.place(Placement::Shared(Affine::translate(dx, dy)), ctx)
    }

    /// Mirrors across the line through `point` parallel to `axis`.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn mirror(
        &mut self,
        axis: MirrorAxis,
        point: Point,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        let affine = match axis {
            MirrorAxis::X => Affine::scale(1.0, -1.0, point),
            MirrorAxis::Y => Affine::scale(-1.0, 1.0, point),
        };
        self.place(Placement::Shared(affine), ctx)
    }

    /// Shears by the given angles about `origin`:
    /// `x' = x + tan(ax)·(y - oy)`, `y' = y + tan(ay)·(x - ox)`.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn skew(
        &mut self,
        angle_x_deg: f64,
        angle_y_deg: f64,
        origin: Point,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        let placement = Placement::Shared(Affine::skew(angle_x_deg, angle_y_deg, origin));
        self.place(placement, ctx)
    }

    /// Rotates counter-clockwise by `angle_deg`.
    ///
    /// With [`RotateOrigin::Center`] each primitive turns about its own
    /// centre: drills stay put and slots pivot on their midpoint.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn rotate(
        &mut self,
        angle_deg: f64,
        origin: RotateOrigin,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        let placement = match origin {
            RotateOrigin::Point(point) => Placement::Shared(Affine::rotate(angle_deg, point)),
            RotateOrigin::Center => Placement::RotateInPlace(angle_deg),
        };
        self.place(placement, ctx)
    }

    /// Grows every tool diameter by `distance`, or multiplies it by
    /// `distance` when `is_scale_factor` is set. Coordinates do not move.
    ///
    /// `join` becomes the end style of every tool's slots.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::Cancelled`] if the host aborts.
    pub fn buffer(
        &mut self,
        distance: f64,
        join: JoinStyle,
        is_scale_factor: bool,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        self.for_each_tool(ctx, |id, tool, skipped| {
            let diameter = if is_scale_factor {
                tool.diameter * distance
            } else {
                tool.diameter + distance
            };
            if diameter.is_finite() {
                tool.diameter = diameter;
            } else {
                skipped.push(format!(
                    "T{id}: buffered diameter is not finite; kept {}",
                    tool.diameter
                ));
            }
            tool.slot_join = join;
        })
    }

    fn place(
        &mut self,
        placement: Placement,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError> {
        self.for_each_tool(ctx, |id, tool, skipped| {
            if let Some(affine) = placement.for_drill() {
                for drill in &mut tool.drills {
                    let moved = affine.apply(*drill);
                    if moved.is_finite() {
                        *drill = moved;
                    } else {
                        skipped.push(format!(
                            "T{id}: drill at ({}, {}) kept; transformed position is not finite",
                            drill.x, drill.y
                        ));
                    }
                }
            }
            for slot in &mut tool.slots {
                let affine = placement.for_slot(slot);
                let start = affine.apply(slot.start);
                let stop = affine.apply(slot.stop);
                if start.is_finite() && stop.is_finite() {
                    slot.start = start;
                    slot.stop = stop;
                } else {
                    skipped.push(format!(
                        "T{id}: slot from ({}, {}) kept; transformed position is not finite",
                        slot.start.x, slot.start.y
                    ));
                }
            }
        })
    }

    fn for_each_tool<F>(
        &mut self,
        ctx: &mut dyn ParseContext,
        mut apply: F,
    ) -> Result<(), ExcellonError>
    where
        F: FnMut(ToolId, &mut Tool, &mut Vec<String>),
    {
        let mut progress = ProgressTracker::new(self.tools.len());
        let mut skipped = Vec::new();

        for (id, tool) in self.tools.iter_mut() {
            if ctx.should_abort() {
                self.solid = None;
                return Err(ExcellonError::Cancelled);
            }
            apply(id, tool, &mut skipped);
            progress.advance(ctx);
        }

        for message in skipped {
            ctx.log(Level::Warn, &message);
            self.warnings.push(message);
        }
        self.rebuild_geometry(ctx);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ExcellonConfig;
    use crate::excellon::context::LogContext;

    const EPSILON: f64 = 1e-9;

    fn sample() -> ExcellonDocument {
        let result = crate::excellon::parse(
            b"M48\nMETRIC\nT1C1.0\nT2C2.0\n%\nT1\nX1.0Y2.0\nX-3.0Y0.5\nT2\nX0.0Y0.0G85X4.0Y2.0\nM30\n",
            &ExcellonConfig::default(),
        );
        assert!(result.is_ok(), "sample should parse: {result:?}");
        result.unwrap_or_else(|_| ExcellonDocument::new(ExcellonConfig::default()))
    }

    fn points(doc: &ExcellonDocument) -> Vec<Point> {
        doc.tools
            .iter()
            .flat_map(|(_, tool)| {
                tool.drills
                    .iter()
                    .copied()
                    .chain(tool.slots.iter().flat_map(|s| [s.start, s.stop]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn diameters(doc: &ExcellonDocument) -> Vec<f64> {
        doc.tools.iter().map(|(_, tool)| tool.diameter).collect()
    }

    fn same(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
    }

    #[derive(Default)]
    struct Recorder {
        progress: Vec<u8>,
        warnings: usize,
        abort: bool,
    }

    impl ParseContext for Recorder {
        fn should_abort(&self) -> bool {
            self.abort
        }

        fn report_progress(&mut self, percent: u8) {
            self.progress.push(percent);
        }

        fn log(&mut self, level: Level, _message: &str) {
            if level == Level::Warn {
                self.warnings += 1;
            }
        }
    }

    #[test]
    fn ut_xf_001_scale_doubles_coordinates_not_diameters() {
        let mut doc = sample();
        let before = points(&doc);
        let before_diameters = diameters(&doc);
        assert!(doc.scale(2.0, 2.0, Point::new(0.0, 0.0), &mut LogContext).is_ok());

        for (old, new) in before.iter().zip(points(&doc)) {
            assert!(same(Point::new(old.x * 2.0, old.y * 2.0), new));
        }
        assert_eq!(diameters(&doc), before_diameters);
    }

    #[test]
    fn ut_xf_002_buffer_adds_distance_to_diameters_only() {
        let mut doc = sample();
        let before = points(&doc);
        assert!(doc
            .buffer(0.1, JoinStyle::Round, false, &mut LogContext)
            .is_ok());

        assert_eq!(points(&doc), before);
        for (new, old) in diameters(&doc).iter().zip([1.0, 2.0]) {
            assert!((new - (old + 0.1)).abs() < EPSILON);
        }
    }

    #[test]
    fn ut_xf_003_buffer_scale_factor_and_join_style() {
        let mut doc = sample();
        assert!(doc
            .buffer(1.5, JoinStyle::Square, true, &mut LogContext)
            .is_ok());
        let tool = doc.tools.get(2);
        assert!(tool.is_some_and(|t| (t.diameter - 3.0).abs() < EPSILON));
        assert!(tool.is_some_and(|t| t.slot_join == JoinStyle::Square));
    }

    #[test]
    fn ut_xf_004_rotate_center_twice_by_180_is_identity() {
        let mut doc = sample();
        let before = points(&doc);
        assert!(doc.rotate(180.0, RotateOrigin::Center, &mut LogContext).is_ok());
        let drill = points(&doc).first().copied();
        assert!(drill.is_some_and(|p| same(p, Point::new(1.0, 2.0))));
        assert!(doc.rotate(180.0, RotateOrigin::Center, &mut LogContext).is_ok());

        for (old, new) in before.iter().zip(points(&doc)) {
            assert!(same(*old, new), "{old:?} vs {new:?}");
        }
    }

    #[test]
    fn ut_xf_005_rotate_about_point() {
        let mut doc = sample();
        let origin = Point::new(1.0, 0.0);
        assert!(doc
            .rotate(90.0, RotateOrigin::Point(origin), &mut LogContext)
            .is_ok());
        let first = points(&doc).first().copied();
        assert!(first.is_some_and(|p| same(p, Point::new(-1.0, 0.0))));
    }

    #[test]
    fn ut_xf_006_mirror_axis_is_axis_of_symmetry() {
        let mut doc = sample();
        assert!(doc
            .mirror(MirrorAxis::X, Point::new(0.0, 1.0), &mut LogContext)
            .is_ok());
        assert!(points(&doc).first().is_some_and(|p| same(*p, Point::new(1.0, 0.0))));

        let mut doc = sample();
        assert!(doc
            .mirror(MirrorAxis::Y, Point::new(2.0, 0.0), &mut LogContext)
            .is_ok());
        assert!(points(&doc).first().is_some_and(|p| same(*p, Point::new(3.0, 2.0))));
    }

    #[test]
    fn ut_xf_007_offset_and_skew() {
        let mut doc = sample();
        assert!(doc.offset(0.5, -1.0, &mut LogContext).is_ok());
        assert!(points(&doc).first().is_some_and(|p| same(*p, Point::new(1.5, 1.0))));

        let mut doc = sample();
        assert!(doc
            .skew(45.0, 0.0, Point::new(0.0, 0.0), &mut LogContext)
            .is_ok());
        assert!(points(&doc).first().is_some_and(|p| same(*p, Point::new(3.0, 2.0))));
    }

    #[test]
    fn ut_xf_008_progress_is_per_tool_and_geometry_rebuilt() {
        let mut doc = sample();
        let mut recorder = Recorder::default();
        assert!(doc.offset(10.0, 0.0, &mut recorder).is_ok());
        assert_eq!(recorder.progress, vec![50, 100]);

        let (min_x, _, _, _) = doc.bounds();
        assert!((min_x - 6.5).abs() < EPSILON);
    }

    #[test]
    fn bc_xf_001_cancellation_invalidates_geometry() {
        let mut doc = sample();
        let mut recorder = Recorder {
            abort: true,
            ..Recorder::default()
        };
        assert_eq!(
            doc.scale(2.0, 2.0, Point::new(0.0, 0.0), &mut recorder),
            Err(ExcellonError::Cancelled)
        );
        assert!(doc.solid_geometry().is_none());
        assert_eq!(doc.bounds(), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn bc_xf_002_non_finite_results_leave_primitives_in_place() {
        let mut doc = sample();
        let before = points(&doc);
        let mut recorder = Recorder::default();
        assert!(doc
            .scale(f64::INFINITY, 1.0, Point::new(0.0, 0.0), &mut recorder)
            .is_ok());
        assert_eq!(points(&doc), before);
        assert_eq!(recorder.warnings, 3);
        assert!(doc.solid_geometry().is_some());
    }

    #[test]
    fn bc_xf_003_rebuild_warnings_reach_the_callers_context() {
        let result = crate::excellon::parse(
            b"M48\nMETRIC\nT1C1.0\n%\nT1\nX1.0Y1.0\nT2\nX2.0Y2.0\nM30\n",
            &ExcellonConfig::default(),
        );
        let Ok(mut doc) = result else {
            panic!("parse failed: {result:?}");
        };
        let mut recorder = Recorder::default();
        assert!(doc.offset(1.0, 0.0, &mut recorder).is_ok());
        assert_eq!(recorder.warnings, 1, "zero-diameter T2 is reported once");
        assert!(doc
            .solid_geometry()
            .is_some_and(|solid| solid.warnings.iter().any(|w| w.contains("T2"))));
    }
}
