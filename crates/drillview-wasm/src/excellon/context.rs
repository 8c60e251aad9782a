//! Host capabilities used by the parser and the transform engine.

use log::Level;

/// Cancellation, progress and logging hooks supplied by the host.
///
/// The engine never blocks on these calls. Cancellation is polled once per
/// input line while parsing and once per tool while transforming.
pub trait ParseContext {
    /// Whether the current operation should stop.
    fn should_abort(&self) -> bool {
        false
    }

    /// Called with a percentage in `0..=100` as a transform advances.
    fn report_progress(&mut self, _percent: u8) {}

    /// Receives parser and transform diagnostics.
    fn log(&mut self, level: Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// Context that forwards diagnostics to the `log` facade and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContext;

impl ParseContext for LogContext {}

/// Emits integer percentages over a fixed number of steps, once per change.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: usize,
    done: usize,
    last: Option<u8>,
}

impl ProgressTracker {
    pub(crate) const fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            last: None,
        }
    }

    /// Marks one more step as done and reports the percentage if it moved.
    pub(crate) fn advance(&mut self, ctx: &mut dyn ParseContext) {
        if self.total == 0 {
            return;
        }
        self.done = (self.done + 1).min(self.total);
        let percent = u8::try_from(self.done * 100 / self.total).unwrap_or(100);
        if self.last != Some(percent) {
            self.last = Some(percent);
            ctx.report_progress(percent);
        }
    }
}
