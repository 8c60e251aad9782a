//! Excellon drill parser.
//!
//! Lines are classified one at a time and applied to the document. The
//! document holds the persistent state (units, formats, tools); everything
//! that only matters from one line to the next lives in [`ParserCursorState`].

use log::Level;

use crate::error::ExcellonError;
use crate::geometry::types::Point;

use super::classify::{
    classify, Axes, CoordinateLine, HoleSizeUnit, Line, LineContext, Motion, Positioning, Repeat,
};
use super::context::ParseContext;
use super::decode::{decode_coordinate, decode_decimal};
use super::types::{CoordinateFormat, ParserPhase, ToolId, Units, UnitsOrigin, ZeroMode};
use super::ExcellonDocument;

const MILS_PER_INCH: f64 = 1000.0;
const MM_PER_INCH: f64 = 25.4;
const INCH_DIAMETER_THRESHOLD: f64 = 0.1;
const FALLBACK_TOOL: ToolId = 1;
const MAX_REPEAT_COUNT: u32 = 10_000;

/// Line-to-line scratch state: cursor, routing and dialect counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserCursorState {
    /// Last known X, if any line has set it.
    pub x: Option<f64>,
    /// Last known Y, if any line has set it.
    pub y: Option<f64>,
    /// A `G00` route start is waiting for its `G01` stop.
    pub routing_active: bool,
    /// Start point of the pending route.
    pub slot_start: Option<Point>,
    /// Absolute or incremental coordinates.
    pub positioning: Positioning,
    /// Last tool selected by the Allegro stop-code counter.
    pub allegro_tool: ToolId,
    /// Set once the "no tool selected" warning has been issued.
    pub implicit_tool_warned: bool,
    /// Number of tools given a generated diameter.
    pub synthesized_diameters: usize,
    /// Coordinate tokens decoded with the fixed-point digit format.
    pub fixed_point_tokens: usize,
    /// Coordinate tokens written with a decimal point.
    pub decimal_tokens: usize,
}

impl ParserCursorState {
    /// The cursor as a point, once both axes are known.
    pub fn point(&self) -> Option<Point> {
        Some(Point::new(self.x?, self.y?))
    }

    fn scale(&mut self, factor: f64) {
        self.x = self.x.map(|x| x * factor);
        self.y = self.y.map(|y| y * factor);
        self.slot_start = self
            .slot_start
            .map(|p| Point::new(p.x * factor, p.y * factor));
    }
}

/// Where a line came from, for error reporting.
#[derive(Debug, Clone, Copy)]
struct LineRef<'t> {
    no: usize,
    text: &'t str,
}

impl LineRef<'_> {
    fn malformed(self) -> ExcellonError {
        ExcellonError::Malformed {
            line_no: self.no,
            text: self.text.to_string(),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Applies `lines` to `doc` in order.
///
/// Stops at `M30`, the first fatal error, or cancellation. On error the
/// document keeps whatever earlier lines put into it.
pub(crate) fn parse_lines<'l, I>(
    doc: &mut ExcellonDocument,
    lines: I,
    ctx: &mut dyn ParseContext,
) -> Result<ParserCursorState, ExcellonError>
where
    I: IntoIterator<Item = &'l str>,
{
    let mut parser = Parser { doc, ctx };
    let mut cursor = ParserCursorState::default();

    for (index, raw_line) in lines.into_iter().enumerate() {
        if parser.ctx.should_abort() {
            return Err(ExcellonError::Cancelled);
        }

        let text = raw_line.trim();
        if text.is_empty() {
            continue;
        }

        let normalized = text.to_ascii_uppercase();
        let context = if parser.doc.state.in_header() {
            LineContext::Header
        } else {
            LineContext::Body
        };
        let at = LineRef {
            no: index + 1,
            text,
        };
        match parser.apply(&mut cursor, classify(&normalized, context), at)? {
            Flow::Continue => {}
            Flow::Stop => break,
        }
    }

    parser.finish(&mut cursor);
    Ok(cursor)
}

struct Parser<'d, 'c> {
    doc: &'d mut ExcellonDocument,
    ctx: &'c mut dyn ParseContext,
}

impl Parser<'_, '_> {
    fn apply(
        &mut self,
        cursor: &mut ParserCursorState,
        line: Line<'_>,
        at: LineRef<'_>,
    ) -> Result<Flow, ExcellonError> {
        match line {
            Line::GcodeUnits => {
                return Err(ExcellonError::WrongFormat {
                    line_no: at.no,
                    text: at.text.to_string(),
                });
            }
            Line::EndOfProgram => return Ok(Flow::Stop),
            Line::HeaderBegin => self.begin_header(false),
            Line::AllegroHeader => self.begin_header(true),
            Line::HeaderEnd => self.end_header(cursor),
            Line::HoleSize { tool, size, unit } => self.hole_size(cursor, tool, size, unit, at)?,
            Line::FileFormat { upper, lower } => {
                let upper = upper.parse::<u8>().map_err(|_| at.malformed())?;
                let lower = lower.parse::<u8>().map_err(|_| at.malformed())?;
                let format = CoordinateFormat::new(upper, lower);
                self.doc.state.set_format(Units::Inch, format);
                self.doc.state.set_format(Units::Millimeter, format);
            }
            Line::MeasuringMode(units) => self.declare_units(cursor, units),
            Line::UnitsDirective {
                units,
                zeros,
                format,
            } => {
                self.declare_units(cursor, units);
                if let Some(zeros) = zeros {
                    self.doc.state.zeros = zeros;
                }
                if let Some(format) = format {
                    let format = parse_format_text(format).ok_or_else(|| at.malformed())?;
                    self.doc.state.set_format(units, format);
                }
            }
            Line::Zeros(zeros) => self.doc.state.zeros = zeros,
            Line::Positioning(positioning) => {
                cursor.positioning = positioning;
                self.allegro_tool_change(cursor);
            }
            Line::Stop(_) => self.allegro_tool_change(cursor),
            Line::ToolDefinition { tool, diameter } => {
                let id = parse_tool_id(tool, at)?;
                match diameter {
                    Some(diameter) => self.define_tool(id, parse_diameter(diameter, at)?),
                    None => {
                        self.doc.tools.ensure(id);
                        self.warn(format!(
                            "line {}: tool T{id} defined without a diameter",
                            at.no
                        ));
                    }
                }
            }
            Line::ToolSelect { tool, diameter } => {
                self.enter_headerless_on_body_command();
                self.select_tool(cursor, tool, diameter, at)?;
            }
            Line::Slot { start, stop } => {
                self.enter_headerless_on_body_command();
                self.drilled_slot(cursor, start, stop, at)?;
            }
            Line::Coordinate(coordinate) => {
                self.enter_headerless_on_body_command();
                self.coordinate(cursor, coordinate, at)?;
            }
            Line::Comment(_) | Line::Directive(_) => {}
            Line::Unrecognized => {
                self.warn(format!("line {}: unrecognized command `{}`", at.no, at.text));
            }
        }
        Ok(Flow::Continue)
    }

    fn warn(&mut self, message: String) {
        self.ctx.log(Level::Warn, &message);
        self.doc.warnings.push(message);
    }

    fn begin_header(&mut self, allegro: bool) {
        self.doc.state.phase = ParserPhase::InHeader;
        if allegro {
            self.doc.state.allegro = true;
        }
    }

    /// `%` and `M95` only mean something inside a header; a leading `%`
    /// (tape rewind stop) is ignored.
    fn end_header(&mut self, cursor: &mut ParserCursorState) {
        match self.doc.state.phase {
            ParserPhase::InHeader if !self.doc.tools.is_empty() => {
                self.doc.state.phase = ParserPhase::InBody;
                if !self.doc.state.units_declared() {
                    self.infer_units(cursor);
                }
            }
            ParserPhase::InHeader => {
                self.doc.state.phase = ParserPhase::Headerless;
                if !self.doc.state.units_established() {
                    self.doc.state.units = self.doc.config.default_units;
                    self.doc.state.units_origin = UnitsOrigin::Defaulted;
                }
                let units = self.doc.state.units;
                self.warn(format!(
                    "header end without tool definitions; reading body as {units}"
                ));
            }
            ParserPhase::PreHeader | ParserPhase::InBody | ParserPhase::Headerless => {}
        }
    }

    fn enter_headerless_on_body_command(&mut self) {
        if self.doc.state.phase != ParserPhase::PreHeader {
            return;
        }
        self.doc.state.phase = ParserPhase::Headerless;
        let units = self.doc.state.units;
        self.warn(format!(
            "no header found; reading body with default format ({units})"
        ));
    }

    /// Guess units from tool sizes: inch diameters are mostly at or below
    /// 0.1, millimetre diameters mostly above it.
    ///
    /// Diameters and decimal coordinates are plain numbers and only get
    /// relabelled. Fixed-point coordinates already read with the previous
    /// unit system's digit format are re-fitted to the inferred one.
    fn infer_units(&mut self, cursor: &mut ParserCursorState) {
        let (small, large) = self
            .doc
            .tools
            .diameters()
            .fold((0_usize, 0_usize), |(small, large), diameter| {
                if diameter <= INCH_DIAMETER_THRESHOLD {
                    (small + 1, large)
                } else {
                    (small, large + 1)
                }
            });
        let inferred = if small > large {
            Units::Inch
        } else {
            Units::Millimeter
        };
        let previous = self.doc.state.units;
        if previous != inferred {
            self.refit_fixed_point(cursor, previous, inferred);
        }
        self.doc.state.units = inferred;
        self.doc.state.units_origin = UnitsOrigin::Inferred;
        self.warn(format!(
            "units not declared; inferred {inferred} from tool diameters \
             ({small} at or below {INCH_DIAMETER_THRESHOLD}, {large} above)"
        ));
    }

    /// Rescale coordinates decoded with `from`'s digit format to what
    /// `to`'s format gives for the same digits.
    ///
    /// Leading-zero values scale by `10^(upper_to - upper_from)`,
    /// trailing-zero values by `10^(lower_from - lower_to)`.
    fn refit_fixed_point(&mut self, cursor: &mut ParserCursorState, from: Units, to: Units) {
        if cursor.fixed_point_tokens == 0 {
            return;
        }
        let old = self.doc.state.format_for(from);
        let new = self.doc.state.format_for(to);
        let exponent = match self.doc.state.zeros {
            ZeroMode::Leading => i32::from(new.upper) - i32::from(old.upper),
            ZeroMode::Trailing => i32::from(old.lower) - i32::from(new.lower),
        };
        if exponent == 0 {
            return;
        }
        if cursor.decimal_tokens > 0 {
            self.warn(format!(
                "file mixes decimal and fixed-point coordinates; fixed-point values \
                 keep the {from} format {old}"
            ));
            return;
        }
        let factor = 10_f64.powi(exponent);
        self.doc.tools.scale_positions(factor);
        cursor.scale(factor);
        self.ctx.log(
            Level::Info,
            &format!("re-read fixed-point coordinates with the {to} format {new}"),
        );
    }

    /// Switch to `units`. Once the units are established, everything parsed
    /// so far is converted; before that the switch only relabels.
    fn declare_units(&mut self, cursor: &mut ParserCursorState, units: Units) {
        let current = self.doc.state.units;
        if current != units {
            if self.doc.state.units_declared() {
                self.warn(format!(
                    "units redeclared from {current} to {units}; last declaration wins"
                ));
            }
            if self.doc.state.units_established() {
                let factor = current.factor_to(units);
                self.doc.tools.convert_units(factor);
                cursor.scale(factor);
                self.ctx.log(
                    Level::Info,
                    &format!("converted parsed tools from {current} to {units}"),
                );
            }
        }
        self.doc.state.units = units;
        self.doc.state.units_origin = UnitsOrigin::Declared;
    }

    fn define_tool(&mut self, id: ToolId, diameter: f64) {
        if self.doc.tools.define(id, diameter) {
            self.warn(format!(
                "duplicate tool definition for T{id}; last definition wins"
            ));
        }
    }

    fn hole_size(
        &mut self,
        cursor: &mut ParserCursorState,
        tool: &str,
        size: &str,
        unit: Option<HoleSizeUnit>,
        at: LineRef<'_>,
    ) -> Result<(), ExcellonError> {
        let id = parse_tool_id(tool, at)?;
        let size = parse_diameter(size, at)?;
        let diameter = match unit {
            Some(HoleSizeUnit::Mils) => {
                self.declare_units(cursor, Units::Inch);
                size / MILS_PER_INCH
            }
            Some(HoleSizeUnit::Millimeter) => {
                self.declare_units(cursor, Units::Millimeter);
                size
            }
            None => size,
        };
        self.define_tool(id, diameter);
        Ok(())
    }

    fn select_tool(
        &mut self,
        cursor: &mut ParserCursorState,
        tool: &str,
        diameter: Option<&str>,
        at: LineRef<'_>,
    ) -> Result<(), ExcellonError> {
        let id = parse_tool_id(tool, at)?;
        if id == 0 {
            self.doc.state.current_tool = None;
            return Ok(());
        }

        if let Some(diameter) = diameter {
            self.define_tool(id, parse_diameter(diameter, at)?);
        } else if !self.doc.tools.contains(id) {
            if self.doc.state.headerless() {
                self.synthesize_tool(cursor, id);
            } else {
                self.doc.tools.ensure(id);
                self.warn(format!(
                    "line {}: tool T{id} selected but not defined; created with zero diameter",
                    at.no
                ));
            }
        }

        self.doc.state.current_tool = Some(id);
        cursor.allegro_tool = id;
        Ok(())
    }

    /// Gives a size-less headerless tool an increasing diameter so that it
    /// still renders and stays editable.
    fn synthesize_tool(&mut self, cursor: &mut ParserCursorState, id: ToolId) {
        let step = f64::from(id.saturating_sub(1)) / 100.0;
        let millimeters = self.doc.config.toolless_diameter + step;
        let diameter = match self.doc.state.units {
            Units::Inch => millimeters / MM_PER_INCH,
            Units::Millimeter => millimeters,
        };
        self.doc.tools.define(id, diameter);
        cursor.synthesized_diameters += 1;
        let units = self.doc.state.units;
        self.warn(format!(
            "tool T{id} has no diameter; using generated diameter {diameter} {units}"
        ));
    }

    /// Allegro files change tools on `G90`/`G91` and stop codes instead of
    /// `T` words.
    fn allegro_tool_change(&mut self, cursor: &mut ParserCursorState) {
        if !self.doc.state.allegro || self.doc.state.in_header() {
            return;
        }
        cursor.allegro_tool = cursor.allegro_tool.saturating_add(1);
        let id = cursor.allegro_tool;
        if !self.doc.tools.contains(id) {
            self.doc.tools.ensure(id);
            self.warn(format!(
                "Allegro tool change to T{id}, which has no hole size"
            ));
        }
        self.doc.state.current_tool = Some(id);
    }

    fn coordinate(
        &mut self,
        cursor: &mut ParserCursorState,
        line: CoordinateLine<'_>,
        at: LineRef<'_>,
    ) -> Result<(), ExcellonError> {
        let target = if line.target.is_empty() {
            None
        } else {
            Some(self.move_cursor(cursor, line.target, at)?)
        };

        match line.motion {
            Some(Motion::Rapid) => {
                cursor.slot_start = target.flatten();
                cursor.routing_active = true;
                if cursor.slot_start.is_none() {
                    self.warn(format!("line {}: route start has no position", at.no));
                }
            }
            Some(Motion::Linear) => {
                if cursor.routing_active {
                    match (cursor.slot_start.take(), target.flatten()) {
                        (Some(start), Some(stop)) => self.add_slot(cursor, start, stop),
                        _ => self.warn(format!(
                            "line {}: route without a complete start and stop was dropped",
                            at.no
                        )),
                    }
                    cursor.routing_active = false;
                }
            }
            None => {
                if cursor.routing_active {
                    return Ok(());
                }
                if let Some(target) = target {
                    self.drill_at(cursor, target, at);
                }
                if let Some(repeat) = line.repeat {
                    self.repeat(cursor, repeat, line.decimal, at)?;
                }
            }
        }
        Ok(())
    }

    fn drilled_slot(
        &mut self,
        cursor: &mut ParserCursorState,
        start: Axes<'_>,
        stop: Axes<'_>,
        at: LineRef<'_>,
    ) -> Result<(), ExcellonError> {
        let start = self.move_cursor(cursor, start, at)?;
        let stop = self.move_cursor(cursor, stop, at)?;
        match (start, stop) {
            (Some(start), Some(stop)) => self.add_slot(cursor, start, stop),
            _ => self.warn(format!(
                "line {}: slot endpoint has no previous position; slot skipped",
                at.no
            )),
        }
        Ok(())
    }

    /// `R<n>` repeats. Fixed-point files step the cursor by the offset `n`
    /// times; decimal files place holes at `base + k * offset` for `k = n..1`.
    fn repeat(
        &mut self,
        cursor: &mut ParserCursorState,
        repeat: Repeat<'_>,
        decimal: bool,
        at: LineRef<'_>,
    ) -> Result<(), ExcellonError> {
        let mut count = repeat.count.parse::<u32>().map_err(|_| at.malformed())?;
        if count > MAX_REPEAT_COUNT {
            self.warn(format!(
                "line {}: repeat count {count} clamped to {MAX_REPEAT_COUNT}",
                at.no
            ));
            count = MAX_REPEAT_COUNT;
        }
        let dx = self.decode_optional(cursor, repeat.offset.x, at)?.unwrap_or(0.0);
        let dy = self.decode_optional(cursor, repeat.offset.y, at)?.unwrap_or(0.0);
        let Some(base) = cursor.point() else {
            self.warn(format!("line {}: repeat has no start position", at.no));
            return Ok(());
        };

        let step = |k: u32| Point::new(base.x + f64::from(k) * dx, base.y + f64::from(k) * dy);
        if decimal {
            for k in (1..=count).rev() {
                self.add_drill(cursor, step(k));
            }
        } else {
            for k in 1..=count {
                self.add_drill(cursor, step(k));
            }
        }

        let last = step(count);
        cursor.x = Some(last.x);
        cursor.y = Some(last.y);
        Ok(())
    }

    /// Applies the given axes to the cursor and returns the new position,
    /// or `None` while an axis has never been set.
    fn move_cursor(
        &self,
        cursor: &mut ParserCursorState,
        axes: Axes<'_>,
        at: LineRef<'_>,
    ) -> Result<Option<Point>, ExcellonError> {
        let incremental = cursor.positioning == Positioning::Incremental;
        let advance = |current: Option<f64>, value: f64| {
            if incremental {
                current.unwrap_or(0.0) + value
            } else {
                value
            }
        };
        if let Some(x) = self.decode_optional(cursor, axes.x, at)? {
            cursor.x = Some(advance(cursor.x, x));
        }
        if let Some(y) = self.decode_optional(cursor, axes.y, at)? {
            cursor.y = Some(advance(cursor.y, y));
        }
        Ok(cursor.point())
    }

    fn decode_optional(
        &self,
        cursor: &mut ParserCursorState,
        token: Option<&str>,
        at: LineRef<'_>,
    ) -> Result<Option<f64>, ExcellonError> {
        let Some(token) = token else {
            return Ok(None);
        };
        if token.contains('.') {
            cursor.decimal_tokens += 1;
        } else {
            cursor.fixed_point_tokens += 1;
        }
        let state = &self.doc.state;
        decode_coordinate(token, state.format(), state.zeros)
            .map(Some)
            .ok_or_else(|| at.malformed())
    }

    fn drill_at(
        &mut self,
        cursor: &mut ParserCursorState,
        target: Option<Point>,
        at: LineRef<'_>,
    ) {
        match target {
            Some(point) => self.add_drill(cursor, point),
            None => self.warn(format!(
                "line {}: hole has no previous position for the omitted axis; skipped",
                at.no
            )),
        }
    }

    fn add_drill(&mut self, cursor: &mut ParserCursorState, point: Point) {
        let id = self.active_tool(cursor);
        self.doc.tools.add_drill(id, point);
    }

    fn add_slot(&mut self, cursor: &mut ParserCursorState, start: Point, stop: Point) {
        let id = self.active_tool(cursor);
        self.doc.tools.add_slot(id, start, stop);
    }

    /// The selected tool, or the lowest registered one (tool 1 if none)
    /// when holes arrive before any selection.
    fn active_tool(&mut self, cursor: &mut ParserCursorState) -> ToolId {
        if let Some(id) = self.doc.state.current_tool {
            return id;
        }
        let id = self.doc.tools.first_id().unwrap_or(FALLBACK_TOOL);
        if !cursor.implicit_tool_warned {
            cursor.implicit_tool_warned = true;
            self.warn(format!("holes before any tool selection assigned to T{id}"));
        }
        id
    }

    fn finish(&mut self, cursor: &mut ParserCursorState) {
        if cursor.routing_active {
            self.warn("route started with G00 was never finished with G01".to_string());
        }
        if self.doc.state.in_header() {
            self.warn("file ended inside the header".to_string());
        }
        if !self.doc.state.units_established() && !self.doc.tools.is_empty() {
            self.infer_units(cursor);
        }
    }
}

fn parse_tool_id(text: &str, at: LineRef<'_>) -> Result<ToolId, ExcellonError> {
    text.parse::<ToolId>().map_err(|_| at.malformed())
}

fn parse_diameter(text: &str, at: LineRef<'_>) -> Result<f64, ExcellonError> {
    decode_decimal(text).ok_or_else(|| at.malformed())
}

/// `000.000` → `3:3`.
fn parse_format_text(text: &str) -> Option<CoordinateFormat> {
    let (upper, lower) = text.split_once('.')?;
    Some(CoordinateFormat::new(
        u8::try_from(upper.len()).ok()?,
        u8::try_from(lower.len()).ok()?,
    ))
}
