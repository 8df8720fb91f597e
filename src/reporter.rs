//! Hierarchical, indent-scoped logging plus an end-of-run summary roll-up.
//!
//! Mirrors `slicetool.cli.Prindenter`/`Indent`: `emit` writes at the current
//! indent, `scope` raises the indent for the enclosed region and lowers it
//! again on every exit path (including `?`-propagated errors, which a bare
//! counter increment/decrement in calling code would not survive), and
//! `append_summary` buffers a line that `flush_summary` prints at shutdown.
//!
//! This is the *value-bearing* log a human reads to understand a run.
//! Ordinary diagnostic detail (every query, every subprocess spawn) goes to
//! `tracing` instead — see [`TracingReporter`], which forwards `emit` there
//! too so a structured log collector sees the same narrative.

use chrono::Local;

/// A hierarchical, scope-indented log with a buffered summary.
///
/// Object-safe so callers can inject any implementation — a real one backed
/// by `tracing`, or a fixture that just records lines for a test assertion.
pub trait Reporter {
    /// Write `msg` at the current indent level.
    fn emit(&mut self, msg: &str);

    /// Raise the indent level by one. Paired with [`Reporter::dedent`];
    /// prefer [`scope`] over calling this directly.
    fn indent(&mut self);

    /// Lower the indent level by one.
    fn dedent(&mut self);

    /// Buffer a timestamped line for the end-of-run summary.
    fn append_summary(&mut self, msg: &str);

    /// Emit every buffered summary line, in order, then clear the buffer.
    fn flush_summary(&mut self);

    /// Render one scanned address as `.` (fingerprints match) or `!`
    /// (mismatch), wrapping every 100 columns. Purely a presentation aid for
    /// the Diff Finder; does not affect the returned address set.
    fn visualize_diff(&mut self, changed: bool);
}

/// RAII guard that raises a [`Reporter`]'s indent on construction and lowers
/// it on drop, so the indent is restored on every exit path — early return,
/// `?`, or panic unwind — not just the happy path.
pub struct ReporterScope<'a> {
    reporter: &'a mut dyn Reporter,
}

impl<'a> ReporterScope<'a> {
    pub fn new(reporter: &'a mut dyn Reporter) -> Self {
        reporter.indent();
        ReporterScope { reporter }
    }

    pub fn reporter(&mut self) -> &mut dyn Reporter {
        self.reporter
    }
}

impl Drop for ReporterScope<'_> {
    fn drop(&mut self) {
        self.reporter.dedent();
    }
}

/// Open an indent scope for the duration of the returned guard.
pub fn scope(reporter: &mut dyn Reporter) -> ReporterScope<'_> {
    ReporterScope::new(reporter)
}

/// The default [`Reporter`]: indents with two spaces per level, forwards
/// every line to `tracing::info!`, and timestamps summary lines with
/// `chrono::Local::now()` the way the original tool stamped its own
/// end-of-run report.
pub struct TracingReporter {
    level: usize,
    summary: Vec<String>,
    scan_col: usize,
    scan_line: String,
}

impl TracingReporter {
    pub fn new() -> Self {
        TracingReporter {
            level: 0,
            summary: Vec::new(),
            scan_col: 0,
            scan_line: String::new(),
        }
    }

    fn prefix(&self) -> String {
        "  ".repeat(self.level)
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TracingReporter {
    fn emit(&mut self, msg: &str) {
        tracing::info!(target: "slicetool_sync::report", "{}{}", self.prefix(), msg);
    }

    fn indent(&mut self) {
        self.level += 1;
    }

    fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    fn append_summary(&mut self, msg: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.summary.push(format!("[{stamp}] {msg}"));
    }

    fn flush_summary(&mut self) {
        for line in self.summary.drain(..) {
            tracing::info!(target: "slicetool_sync::summary", "{}", line);
        }
    }

    fn visualize_diff(&mut self, changed: bool) {
        self.scan_line.push(if changed { '!' } else { '.' });
        self.scan_col += 1;
        if self.scan_col >= 100 {
            tracing::debug!(target: "slicetool_sync::scan", "{}", self.scan_line);
            self.scan_line.clear();
            self.scan_col = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingReporter {
        level: usize,
        lines: Vec<String>,
        summary: Vec<String>,
    }

    impl Reporter for RecordingReporter {
        fn emit(&mut self, msg: &str) {
            self.lines.push(format!("{}{}", "  ".repeat(self.level), msg));
        }
        fn indent(&mut self) {
            self.level += 1;
        }
        fn dedent(&mut self) {
            self.level = self.level.saturating_sub(1);
        }
        fn append_summary(&mut self, msg: &str) {
            self.summary.push(msg.to_string());
        }
        fn flush_summary(&mut self) {
            self.summary.clear();
        }
        fn visualize_diff(&mut self, _changed: bool) {}
    }

    #[test]
    fn scope_restores_indent_on_early_return() {
        fn inner(r: &mut dyn Reporter) -> Result<(), ()> {
            let mut s = scope(r);
            s.reporter().emit("inside");
            Err(())
        }

        let mut r = RecordingReporter::default();
        r.emit("before");
        let _ = inner(&mut r);
        r.emit("after");

        assert_eq!(r.lines[0], "before");
        assert_eq!(r.lines[1], "  inside");
        assert_eq!(r.lines[2], "after");
    }

    #[test]
    fn nested_scopes_stack_indent() {
        let mut r = RecordingReporter::default();
        {
            let mut s1 = scope(&mut r);
            s1.reporter().emit("one");
            {
                let mut s2 = scope(s1.reporter());
                s2.reporter().emit("two");
            }
            s1.reporter().emit("one again");
        }
        r.emit("zero");

        assert_eq!(r.lines, vec!["  one", "    two", "  one again", "zero"]);
    }
}
