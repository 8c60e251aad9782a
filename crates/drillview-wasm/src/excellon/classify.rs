//! Line classifier.
//!
//! Each recognizer is a pure function over one trimmed, upper-cased line.
//! Recognizers are tried in a fixed order and the first match wins: the
//! common list first, then the header or body list depending on where the
//! parser is. Numeric captures are returned as text; converting them is the
//! parser's job so that failures can carry a line number.

use super::types::{Units, ZeroMode};

/// Which recognizer list applies after the common one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineContext {
    /// Inside an `M48` or `;HEADER` header.
    Header,
    /// Anywhere else.
    Body,
}

/// Unit given at the end of an Allegro hole-size comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleSizeUnit {
    /// Thousandths of an inch.
    Mils,
    /// Millimetres.
    Millimeter,
}

/// Absolute or incremental coordinate input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Positioning {
    /// `G90`, `ICI,OFF`.
    #[default]
    Absolute,
    /// `G91`, `ICI,ON`.
    Incremental,
}

/// Motion prefix on a coordinate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// `G00`: start of a routed slot.
    Rapid,
    /// `G01`: end of a routed slot.
    Linear,
}

/// Optional X and Y captures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Axes<'a> {
    /// X value text.
    pub x: Option<&'a str>,
    /// Y value text.
    pub y: Option<&'a str>,
}

impl Axes<'_> {
    /// Whether neither axis was given.
    pub const fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }

    fn has_decimal_point(&self) -> bool {
        self.x.is_some_and(|v| v.contains('.')) || self.y.is_some_and(|v| v.contains('.'))
    }
}

/// `R<count>` followed by the offset to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repeat<'a> {
    /// Repeat count text.
    pub count: &'a str,
    /// Offset applied per repetition.
    pub offset: Axes<'a>,
}

/// A drill or route coordinate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateLine<'a> {
    /// `G00`/`G01` prefix, if any.
    pub motion: Option<Motion>,
    /// Coordinates before any `R`.
    pub target: Axes<'a>,
    /// Repeat clause.
    pub repeat: Option<Repeat<'a>>,
    /// Whether any coordinate on the line has a decimal point.
    pub decimal: bool,
}

/// Classification of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `G20`/`G21`: the file is G-code, not Excellon.
    GcodeUnits,
    /// `M48`.
    HeaderBegin,
    /// `;HEADER` (Cadence Allegro).
    AllegroHeader,
    /// `;Holesize <n> = <size> ... MILS|MM`.
    HoleSize {
        /// Tool number text.
        tool: &'a str,
        /// Size text.
        size: &'a str,
        /// Unit suffix, if present.
        unit: Option<HoleSizeUnit>,
    },
    /// `;FILE_FORMAT=U:L` or `;FORMAT=U:L`.
    FileFormat {
        /// Integer digit count text.
        upper: &'a str,
        /// Decimal digit count text.
        lower: &'a str,
    },
    /// Any other `;` comment (text after the semicolon).
    Comment(&'a str),
    /// `M95` or `%`.
    HeaderEnd,
    /// `M71` (metric) or `M72` (inch).
    MeasuringMode(Units),
    /// `INCH`/`METRIC` with optional zeros and format.
    UnitsDirective {
        /// Declared units.
        units: Units,
        /// `LZ`/`TZ`, if present.
        zeros: Option<ZeroMode>,
        /// Format text such as `000.000`, if present.
        format: Option<&'a str>,
    },
    /// Standalone `LZ`/`TZ`.
    Zeros(ZeroMode),
    /// Absolute/incremental switch.
    Positioning(Positioning),
    /// `M30`.
    EndOfProgram,
    /// `G04`, `M09`, `M06`, `M00`.
    Stop(&'a str),
    /// Header tool definition `T<n>C<d>...`.
    ToolDefinition {
        /// Tool number text.
        tool: &'a str,
        /// Diameter text, if a `C` word is present.
        diameter: Option<&'a str>,
    },
    /// Body tool change `T<n>`, optionally with a diameter.
    ToolSelect {
        /// Tool number text.
        tool: &'a str,
        /// Diameter text, if a `C` word is present.
        diameter: Option<&'a str>,
    },
    /// `X..Y..G85X..Y..` drilled slot.
    Slot {
        /// Coordinates before `G85`.
        start: Axes<'a>,
        /// Coordinates after `G85`.
        stop: Axes<'a>,
    },
    /// Drill or route coordinates.
    Coordinate(CoordinateLine<'a>),
    /// A known command with no effect on the model.
    Directive(&'a str),
    /// Nothing matched.
    Unrecognized,
}

type Recognizer = for<'a> fn(&'a str) -> Option<Line<'a>>;

const COMMON_RECOGNIZERS: &[Recognizer] = &[
    recognize_gcode_units,
    recognize_header_begin,
    recognize_comment,
    recognize_header_end,
    recognize_measuring_mode,
    recognize_units_directive,
    recognize_file_format,
    recognize_positioning,
    recognize_end_of_program,
    recognize_stop,
];

const HEADER_RECOGNIZERS: &[Recognizer] = &[
    recognize_tool_definition,
    recognize_zeros,
    recognize_header_directive,
];

const BODY_RECOGNIZERS: &[Recognizer] = &[
    recognize_tool_select,
    recognize_slot,
    recognize_coordinate,
    recognize_body_directive,
];

const HEADER_DIRECTIVES: &[&str] = &[
    "AFS", "ATC", "BLKD", "CCW", "CP", "DETECT", "DN", "DTMDIST", "EXDA", "FMAT", "FSB", "HPCK",
    "NCSL", "OM48", "OSTOP", "OTCLMP", "PCKPARAM", "PF", "PPR", "PVS", "RSB", "SBK", "SG",
    "SIXM", "TCST", "UP", "VER",
];

const BODY_DIRECTIVES: &[&str] = &[
    "G00", "G01", "G05", "G40", "G81", "M15", "M16", "M17", "M47", "M50", "M51", "M52", "M97",
    "M98",
];

const TOOL_PARAMETER_LETTERS: &[u8] = b"CFSBHZ";

/// Classify a trimmed, upper-cased line.
pub fn classify(line: &str, context: LineContext) -> Line<'_> {
    let contextual = match context {
        LineContext::Header => HEADER_RECOGNIZERS,
        LineContext::Body => BODY_RECOGNIZERS,
    };
    COMMON_RECOGNIZERS
        .iter()
        .chain(contextual)
        .find_map(|recognize| recognize(line))
        .unwrap_or(Line::Unrecognized)
}

fn recognize_gcode_units(line: &str) -> Option<Line<'_>> {
    matches!(line, "G20" | "G21").then_some(Line::GcodeUnits)
}

fn recognize_header_begin(line: &str) -> Option<Line<'_>> {
    (line == "M48").then_some(Line::HeaderBegin)
}

fn recognize_header_end(line: &str) -> Option<Line<'_>> {
    matches!(line, "M95" | "%").then_some(Line::HeaderEnd)
}

fn recognize_measuring_mode(line: &str) -> Option<Line<'_>> {
    match line {
        "M71" => Some(Line::MeasuringMode(Units::Millimeter)),
        "M72" => Some(Line::MeasuringMode(Units::Inch)),
        _ => None,
    }
}

fn recognize_comment(line: &str) -> Option<Line<'_>> {
    let body = line.strip_prefix(';')?.trim();

    if body.starts_with("HEADER") {
        return Some(Line::AllegroHeader);
    }
    if let Some(hole_size) = parse_hole_size(body) {
        return Some(hole_size);
    }
    if let Some(format) = parse_format_assignment(body) {
        return Some(format);
    }
    Some(Line::Comment(body))
}

/// `HOLESIZE 1 = 0.0200 TOLERANCE = ... PLATED MILS QUANTITY = 4`
fn parse_hole_size(body: &str) -> Option<Line<'_>> {
    let rest = body.strip_prefix("HOLESIZE")?.trim_start();
    let tool_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let tool = rest.get(..tool_len).filter(|t| !t.is_empty())?;
    let rest = rest.get(tool_len..)?.trim_start().strip_prefix('=')?.trim_start();
    let size_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-'))
        .count();
    let size = rest.get(..size_len).filter(|s| !s.is_empty())?;
    let tail = rest.get(size_len..).unwrap_or_default();

    let unit = if tail.split_whitespace().any(|w| w == "MILS") {
        Some(HoleSizeUnit::Mils)
    } else if tail.split_whitespace().any(|w| w == "MM") {
        Some(HoleSizeUnit::Millimeter)
    } else {
        None
    };
    Some(Line::HoleSize { tool, size, unit })
}

fn recognize_file_format(line: &str) -> Option<Line<'_>> {
    parse_format_assignment(line)
}

/// `FILE_FORMAT=2:4` or `FORMAT=2:4`; anything else (e.g. KiCad's
/// `FORMAT={-:-/ absolute / metric / decimal}`) is not a format.
fn parse_format_assignment(text: &str) -> Option<Line<'_>> {
    let start = text.find("FORMAT=")?;
    let value = text.get(start + "FORMAT=".len()..)?.trim_start();
    let (upper, rest) = value.split_once(':')?;
    let lower_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let lower = rest.get(..lower_len)?;
    let upper = upper.trim();
    if upper.is_empty() || lower.is_empty() || !upper.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Line::FileFormat { upper, lower })
}

fn recognize_units_directive(line: &str) -> Option<Line<'_>> {
    let (units, rest) = if let Some(rest) = line.strip_prefix("METRIC") {
        (Units::Millimeter, rest)
    } else if let Some(rest) = line.strip_prefix("INCH") {
        (Units::Inch, rest)
    } else {
        return None;
    };
    if !(rest.is_empty() || rest.starts_with(',')) {
        return None;
    }

    let mut zeros = None;
    let mut format = None;
    for part in rest.split(',').map(str::trim) {
        match part {
            "LZ" => zeros = Some(ZeroMode::Leading),
            "TZ" => zeros = Some(ZeroMode::Trailing),
            _ if part.contains('.') && part.bytes().all(|b| b == b'0' || b == b'.') => {
                format = Some(part);
            }
            _ => {}
        }
    }
    Some(Line::UnitsDirective {
        units,
        zeros,
        format,
    })
}

fn recognize_positioning(line: &str) -> Option<Line<'_>> {
    match line {
        "G90" | "ICI,OFF" => Some(Line::Positioning(Positioning::Absolute)),
        "G91" | "ICI" | "ICI,ON" => Some(Line::Positioning(Positioning::Incremental)),
        _ => None,
    }
}

fn recognize_end_of_program(line: &str) -> Option<Line<'_>> {
    line.starts_with("M30").then_some(Line::EndOfProgram)
}

fn recognize_stop(line: &str) -> Option<Line<'_>> {
    ["G04", "M09", "M06", "M00"]
        .iter()
        .any(|code| line.starts_with(code))
        .then_some(Line::Stop(line))
}

fn recognize_zeros(line: &str) -> Option<Line<'_>> {
    match line {
        "LZ" => Some(Line::Zeros(ZeroMode::Leading)),
        "TZ" => Some(Line::Zeros(ZeroMode::Trailing)),
        _ => None,
    }
}

fn recognize_header_directive(line: &str) -> Option<Line<'_>> {
    let name = line.split(',').next().unwrap_or_default();
    HEADER_DIRECTIVES
        .contains(&name)
        .then_some(Line::Directive(line))
}

fn recognize_body_directive(line: &str) -> Option<Line<'_>> {
    BODY_DIRECTIVES
        .contains(&line)
        .then_some(Line::Directive(line))
}

fn recognize_tool_definition(line: &str) -> Option<Line<'_>> {
    let (tool, diameter, has_parameters) = parse_tool_words(line)?;
    has_parameters.then_some(Line::ToolDefinition { tool, diameter })
}

fn recognize_tool_select(line: &str) -> Option<Line<'_>> {
    let (tool, diameter, _) = parse_tool_words(line)?;
    Some(Line::ToolSelect { tool, diameter })
}

/// `T<digits>[.]` followed only by tool parameter words.
///
/// Returns the tool number, the `C` value if present, and whether any
/// parameter word followed the number.
fn parse_tool_words(line: &str) -> Option<(&str, Option<&str>, bool)> {
    let words = split_words(line)?;
    let (first, parameters) = words.split_first()?;
    let tool = first.value.strip_suffix('.').unwrap_or(first.value);
    if first.letter != b'T' || tool.is_empty() || !tool.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !parameters
        .iter()
        .all(|word| TOOL_PARAMETER_LETTERS.contains(&word.letter))
    {
        return None;
    }
    let diameter = parameters
        .iter()
        .find(|word| word.letter == b'C')
        .map(|word| word.value);
    Some((tool, diameter, !parameters.is_empty()))
}

fn recognize_slot(line: &str) -> Option<Line<'_>> {
    let words = split_words(line)?;
    let split = words
        .iter()
        .position(|word| word.letter == b'G' && word.value == "85")?;
    let start = collect_axes(words.get(..split)?)?;
    let stop = collect_axes(words.get(split + 1..)?)?;
    if start.is_empty() || stop.is_empty() {
        return None;
    }
    Some(Line::Slot { start, stop })
}

fn recognize_coordinate(line: &str) -> Option<Line<'_>> {
    let words = split_words(line)?;
    let (motion, rest) = match words.split_first() {
        Some((first, rest)) if first.letter == b'G' => {
            let motion = match first.value {
                "00" | "0" => Motion::Rapid,
                "01" | "1" => Motion::Linear,
                _ => return None,
            };
            (Some(motion), rest)
        }
        _ => (None, words.as_slice()),
    };

    let repeat_at = rest.iter().position(|word| word.letter == b'R');
    let (target_words, repeat) = match repeat_at {
        Some(at) => {
            let count_word = rest.get(at)?;
            if count_word.value.is_empty() || !count_word.value.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let offset = collect_axes(rest.get(at + 1..)?)?;
            (
                rest.get(..at)?,
                Some(Repeat {
                    count: count_word.value,
                    offset,
                }),
            )
        }
        None => (rest, None),
    };
    let target = collect_axes(target_words)?;
    if target.is_empty() && repeat.is_none() {
        return None;
    }

    let decimal =
        target.has_decimal_point() || repeat.is_some_and(|r| r.offset.has_decimal_point());
    Some(Line::Coordinate(CoordinateLine {
        motion,
        target,
        repeat,
        decimal,
    }))
}

/// X/Y words only, each at most once.
fn collect_axes<'a>(words: &[Word<'a>]) -> Option<Axes<'a>> {
    let mut axes = Axes::default();
    for word in words {
        let slot = match word.letter {
            b'X' => &mut axes.x,
            b'Y' => &mut axes.y,
            _ => return None,
        };
        if slot.is_some() {
            return None;
        }
        *slot = Some(word.value);
    }
    Some(axes)
}

/// An address letter and the numeric text after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Word<'a> {
    letter: u8,
    value: &'a str,
}

/// Split `X0100Y-02.5T3` into words; `None` if the line has anything else.
fn split_words(line: &str) -> Option<Vec<Word<'_>>> {
    let bytes = line.as_bytes();
    let mut words = Vec::new();
    let mut index = 0;
    while let Some(&letter) = bytes.get(index) {
        if letter == b' ' || letter == b'\t' {
            index += 1;
            continue;
        }
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let start = index + 1;
        let mut end = start;
        while bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-'))
        {
            end += 1;
        }
        words.push(Word {
            letter,
            value: line.get(start..end)?,
        });
        index = end;
    }
    (!words.is_empty()).then_some(words)
}
