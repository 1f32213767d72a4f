//! The diagnostics object collects the errors generated by the semantic
//! analysis passes and tracks whether any were emitted, for flow control
//! by the driver.
//!
//! Instead of writing errors directly to stderr, the passes append them
//! here. This has several advantages:
//! - the driver has a single gate (`errored`) deciding whether the next
//!   pass may run,
//! - the full ordered record list stays available after the run,
//! - we have a single source responsible for formatting messages.
//!
//! This implementation is NOT thread-safe.

use failure::AsFail;
use location::Span;
use std::{cell::RefCell, fmt, io::Write};
use termcolor::{Buffer, Color, ColorSpec, WriteColor};

/// The pass a record originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Bind,
    Type,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bind => write!(f, "bind"),
            Phase::Type => write!(f, "type"),
        }
    }
}

/// One accumulated error: which pass raised it, where, and the rendered
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub phase: Phase,
    pub span: Span,
    pub message: String,
}

pub struct Diagnostics {
    records: RefCell<Vec<Record>>,
    writer: RefCell<Box<dyn WriteColor>>,
}

impl Diagnostics {
    pub fn new(writer: Box<dyn WriteColor>) -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            writer: RefCell::new(writer),
        }
    }

    /// A diagnostics object that renders into an in-memory buffer.
    /// Meant for tests and for drivers that print on their own schedule.
    pub fn buffered() -> Self {
        Self::new(Box::new(Buffer::no_color()))
    }

    /// Append an error raised by `phase` at `span` and render it to the
    /// writer given in the constructor.
    pub fn error(&self, phase: Phase, span: Span, kind: &dyn AsFail) {
        let record = Record {
            phase,
            span,
            message: kind.as_fail().to_string(),
        };

        let mut writer = self.writer.borrow_mut();
        write_colored(&mut **writer, &record);
        self.records.borrow_mut().push(record);
    }

    /// True when at least one error was emitted. This is the sole gate
    /// for proceeding to the next pass or to code generation.
    pub fn errored(&self) -> bool {
        !self.records.borrow().is_empty()
    }

    pub fn count(&self) -> usize {
        self.records.borrow().len()
    }

    /// The accumulated records, in emission order.
    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().clone()
    }

    pub fn write_statistics(&self) {
        let mut writer = self.writer.borrow_mut();
        let mut output = ColorOutput::new(&mut **writer);

        output.set_bold(true);
        if self.errored() {
            output.set_color(Some(Color::Red));
            let _ = writeln!(
                output.writer(),
                "Compilation aborted due to {}",
                match self.count() {
                    1 => "an error".to_string(),
                    n => format!("{} errors", n),
                }
            );
        } else {
            output.set_color(Some(Color::Green));
            let _ = writeln!(output.writer(), "Compilation finished successfully");
        }
    }
}

fn write_colored(writer: &mut dyn WriteColor, record: &Record) {
    let mut output = ColorOutput::new(writer);
    output.set_color(Some(Color::Red));
    output.set_bold(true);
    let _ = write!(output.writer(), "{} error: ", record.phase);

    output.set_color(None);
    output.set_bold(false);
    let _ = writeln!(output.writer(), "{}: {}", record.span, record.message);
}

/// Calls to functions should pass the raw writer, each function should
/// create its own ColorOutput object that is dropped on return. This
/// guarantees correct coloring in nested calls.
struct ColorOutput<'a> {
    writer: &'a mut dyn WriteColor,
    spec: ColorSpec,
}

impl<'a> ColorOutput<'a> {
    fn new(writer: &'a mut dyn WriteColor) -> Self {
        writer.reset().ok();

        Self {
            writer,
            spec: ColorSpec::new(),
        }
    }

    fn set_color(&mut self, color: Option<Color>) {
        // ignore coloring failures using ok()
        self.spec.set_fg(color);
        self.writer.set_color(&self.spec).ok();
    }

    fn set_bold(&mut self, yes: bool) {
        self.spec.set_bold(yes);
        self.writer.set_color(&self.spec).ok();
    }

    fn writer(&mut self) -> &mut dyn WriteColor {
        self.writer
    }
}

/// Reset to no color by default. Otherwise code that is not color aware
/// will print everything in the color last used.
impl<'a> Drop for ColorOutput<'a> {
    fn drop(&mut self) {
        self.writer.reset().ok();
    }
}
