//! Format engine
//!
//! A format template is compiled once into a sequence of steps; rendering a
//! record is a single pass over the steps into one output string. The same
//! plan also reports which optional record fields it consults so the engine
//! can skip capturing the rest.

use std::time::Duration;

use colored::Color;

use super::markup::{render_markup, MarkupMode};
use super::record::LogRecord;
use super::requirements::CollectionRequirements;

/// Default template, matching the usual console line shape.
pub const DEFAULT_TEMPLATE: &str = "{time} | {level:<8} | {name}:{function}:{line} - {message}";

/// Default time format with milliseconds.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Capacity hint added on top of the template length for rendered lines.
const RENDER_EXTRA_CAPACITY: usize = 64;

/// Field alignment inside a fixed width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    /// `<N`: value first, spaces after.
    #[default]
    Left,
    /// `>N`: spaces first, value after.
    Right,
}

/// The record field a step reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Time,
    Level,
    Message,
    Name,
    Function,
    Line,
    File,
    Elapsed,
    Thread,
    Process,
    Extra(String),
}

/// One compiled template step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Literal(String),
    Field {
        kind: FieldKind,
        width: Option<usize>,
        align: Align,
    },
}

/// Parse the inside of a braced token, e.g. `level:<8` or `extra[user]`.
/// Unknown tokens yield `None` and render as nothing.
fn parse_token(token: &str) -> Option<Step> {
    let (name, width, align) = match token.split_once(':') {
        Some((name, spec)) => {
            let (align, digits) = match spec.as_bytes().first() {
                Some(b'<') => (Align::Left, &spec[1..]),
                Some(b'>') => (Align::Right, &spec[1..]),
                _ => return None,
            };
            let width: usize = digits.parse().ok()?;
            (name, Some(width), align)
        }
        None => (token, None, Align::Left),
    };

    let kind = match name {
        "time" => FieldKind::Time,
        "level" => FieldKind::Level,
        "message" => FieldKind::Message,
        "name" | "module" => FieldKind::Name,
        "function" => FieldKind::Function,
        "line" => FieldKind::Line,
        "file" => FieldKind::File,
        "elapsed" => FieldKind::Elapsed,
        "thread" => FieldKind::Thread,
        "process" => FieldKind::Process,
        _ => {
            if let Some(key) = name.strip_prefix("extra[").and_then(|k| k.strip_suffix(']')) {
                FieldKind::Extra(key.to_string())
            } else {
                return None;
            }
        }
    };

    Some(Step::Field { kind, width, align })
}

fn compile_steps(template: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        rest = &rest[open..];
        match rest[1..].find(['{', '}']) {
            Some(pos) if rest.as_bytes()[1 + pos] == b'}' => {
                let token = &rest[1..1 + pos];
                if let Some(step) = parse_token(token) {
                    if !literal.is_empty() {
                        steps.push(Step::Literal(std::mem::take(&mut literal)));
                    }
                    steps.push(step);
                }
                // Unknown tokens are dropped: they render as the empty string.
                rest = &rest[pos + 2..];
            }
            _ => {
                // No closing brace before the next `{` or end: literal brace.
                literal.push('{');
                rest = &rest[1..];
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        steps.push(Step::Literal(literal));
    }
    steps
}

fn compute_requirements(steps: &[Step]) -> CollectionRequirements {
    let mut reqs = CollectionRequirements::none();
    for step in steps {
        if let Step::Field { kind, .. } = step {
            match kind {
                FieldKind::Name | FieldKind::Function | FieldKind::Line | FieldKind::File => {
                    reqs.caller = true;
                }
                FieldKind::Thread => reqs.thread = true,
                FieldKind::Process => reqs.process = true,
                FieldKind::Elapsed => reqs.elapsed = true,
                _ => {}
            }
        }
    }
    reqs
}

/// Format a duration as `HH:MM:SS.mmm`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_millis = elapsed.as_millis() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        millis
    )
}

fn ansi_code(color: Color) -> &'static str {
    match color {
        Color::Black => "30",
        Color::Red => "31",
        Color::Green => "32",
        Color::Yellow => "33",
        Color::Blue => "34",
        Color::Magenta => "35",
        Color::Cyan => "36",
        Color::White => "37",
        Color::BrightBlack => "90",
        Color::BrightRed => "91",
        Color::BrightGreen => "92",
        Color::BrightYellow => "93",
        Color::BrightBlue => "94",
        Color::BrightMagenta => "95",
        Color::BrightCyan => "96",
        Color::BrightWhite => "97",
        _ => "0",
    }
}

fn colorize_text(text: &str, color: Color, bold: bool) -> String {
    if bold {
        format!("\x1b[1;{}m{}\x1b[0m", ansi_code(color), text)
    } else {
        format!("\x1b[{}m{}\x1b[0m", ansi_code(color), text)
    }
}

fn dim_text(text: &str) -> String {
    format!("\x1b[2m{}\x1b[0m", text)
}

fn cyan_text(text: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", text)
}

/// Pad `value` to `width` given its visible length. Padding happens before
/// any ANSI escapes are added so they never count toward the width.
fn pad(value: &mut String, visible: usize, width: Option<usize>, align: Align) {
    let Some(width) = width else { return };
    if visible >= width {
        return;
    }
    let fill = width - visible;
    match align {
        Align::Left => value.extend(std::iter::repeat(' ').take(fill)),
        Align::Right => {
            let mut padded = String::with_capacity(value.len() + fill);
            padded.extend(std::iter::repeat(' ').take(fill));
            padded.push_str(value);
            *value = padded;
        }
    }
}

/// A compiled format template.
#[derive(Clone, Debug)]
pub struct FormatPlan {
    template: String,
    steps: Vec<Step>,
    time_format: String,
    requirements: CollectionRequirements,
}

impl Default for FormatPlan {
    fn default() -> Self {
        Self::compile(DEFAULT_TEMPLATE)
    }
}

impl FormatPlan {
    /// Compile a template. Never fails: unknown tokens render as empty
    /// strings and unmatched braces are literal.
    pub fn compile(template: &str) -> Self {
        let steps = compile_steps(template);
        let requirements = compute_requirements(&steps);
        FormatPlan {
            template: template.to_string(),
            steps,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            requirements,
        }
    }

    /// The template this plan was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Which optional record fields the template references.
    pub fn requirements(&self) -> CollectionRequirements {
        self.requirements
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Render a record. The returned line carries no trailing newline; sinks
    /// own line termination.
    pub fn render(&self, record: &LogRecord, colorize: bool) -> String {
        let mut out = String::with_capacity(self.template.len() + RENDER_EXTRA_CAPACITY);

        for step in &self.steps {
            match step {
                Step::Literal(text) => out.push_str(text),
                Step::Field { kind, width, align } => {
                    self.render_field(record, kind, *width, *align, colorize, &mut out);
                }
            }
        }

        if let Some(ref exc) = record.exception {
            out.push('\n');
            out.push_str(exc);
        }

        out
    }

    fn render_field(
        &self,
        record: &LogRecord,
        kind: &FieldKind,
        width: Option<usize>,
        align: Align,
        colorize: bool,
        out: &mut String,
    ) {
        let mut value = match kind {
            FieldKind::Time => record.timestamp.format(&self.time_format).to_string(),
            FieldKind::Level => record.level_name().to_string(),
            FieldKind::Message => {
                let mode = if colorize {
                    MarkupMode::Colorize
                } else {
                    MarkupMode::Strip
                };
                render_markup(&record.message, mode)
            }
            FieldKind::Name => record
                .caller
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            FieldKind::Function => record
                .caller
                .as_ref()
                .map(|c| c.function.clone())
                .unwrap_or_default(),
            FieldKind::Line => record
                .caller
                .as_ref()
                .map(|c| c.line.to_string())
                .unwrap_or_default(),
            FieldKind::File => record
                .caller
                .as_ref()
                .map(|c| c.file.clone())
                .unwrap_or_default(),
            FieldKind::Elapsed => record.elapsed.map(format_elapsed).unwrap_or_default(),
            FieldKind::Thread => record
                .thread
                .as_ref()
                .map(|t| format!("{}:{}", t.name, t.id))
                .unwrap_or_default(),
            FieldKind::Process => record
                .process
                .as_ref()
                .map(|p| format!("{}:{}", p.name, p.id))
                .unwrap_or_default(),
            FieldKind::Extra(key) => record
                .extra
                .get(key)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        };

        let visible = if matches!(kind, FieldKind::Message) && colorize {
            render_markup(&record.message, MarkupMode::Strip).chars().count()
        } else {
            value.chars().count()
        };
        pad(&mut value, visible, width, align);

        if !colorize {
            out.push_str(&value);
            return;
        }

        match kind {
            FieldKind::Time | FieldKind::Elapsed => out.push_str(&dim_text(&value)),
            FieldKind::Level => {
                out.push_str(&colorize_text(&value, record.level.color_or_default(), true))
            }
            FieldKind::Name
            | FieldKind::Function
            | FieldKind::Line
            | FieldKind::File
            | FieldKind::Thread
            | FieldKind::Process => out.push_str(&cyan_text(&value)),
            _ => out.push_str(&value),
        }
    }

    /// Serialize a record as one canonical JSON object. Absent optional
    /// fields are `null`; `extra` is always an object. The returned line
    /// carries no trailing newline.
    pub fn serialize(&self, record: &LogRecord) -> String {
        use serde_json::Value;

        let mut obj = serde_json::Map::new();
        obj.insert(
            "time".to_string(),
            Value::String(record.timestamp.format(&self.time_format).to_string()),
        );
        obj.insert(
            "level".to_string(),
            Value::String(record.level_name().to_string()),
        );
        obj.insert(
            "message".to_string(),
            Value::String(record.message.clone()),
        );

        let caller = record.caller.as_ref();
        obj.insert(
            "name".to_string(),
            caller.map_or(Value::Null, |c| Value::String(c.name.clone())),
        );
        obj.insert(
            "function".to_string(),
            caller.map_or(Value::Null, |c| Value::String(c.function.clone())),
        );
        obj.insert(
            "line".to_string(),
            caller.map_or(Value::Null, |c| Value::Number(c.line.into())),
        );
        obj.insert(
            "file".to_string(),
            caller.map_or(Value::Null, |c| Value::String(c.file.clone())),
        );

        obj.insert(
            "elapsed".to_string(),
            record
                .elapsed
                .map_or(Value::Null, |e| Value::String(format_elapsed(e))),
        );

        let thread = record.thread.as_ref();
        obj.insert(
            "thread_name".to_string(),
            thread.map_or(Value::Null, |t| Value::String(t.name.clone())),
        );
        obj.insert(
            "thread_id".to_string(),
            thread.map_or(Value::Null, |t| Value::Number(t.id.into())),
        );

        let process = record.process.as_ref();
        obj.insert(
            "process_name".to_string(),
            process.map_or(Value::Null, |p| Value::String(p.name.clone())),
        );
        obj.insert(
            "process_id".to_string(),
            process.map_or(Value::Null, |p| Value::Number(p.id.into())),
        );

        obj.insert(
            "exception".to_string(),
            record
                .exception
                .as_ref()
                .map_or(Value::Null, |e| Value::String(e.clone())),
        );

        let mut extra = serde_json::Map::new();
        for (key, value) in record.extra.iter() {
            extra.insert(key.clone(), value.to_json_value());
        }
        obj.insert("extra".to_string(), Value::Object(extra));

        serde_json::to_string(&Value::Object(obj)).unwrap_or_else(|_| record.message.clone())
    }
}
