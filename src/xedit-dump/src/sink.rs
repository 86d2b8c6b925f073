//! Output sinks
//!
//! The extractor streams finished lines, in order, into an [`OutputSink`].

use std::io::{self, Write};

/// Ordered receiver of document lines
pub trait OutputSink {
    fn write_line(&mut self, line: &str);
}

impl OutputSink for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

/// Newline-terminated lines into any writer.
///
/// The first I/O error is kept and later lines are dropped; [`finish`]
/// reports it.
///
/// [`finish`]: WriterSink::finish
pub struct WriterSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
    lines: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
            lines: 0,
        }
    }

    /// Lines written successfully so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush and hand back the writer, or the first error seen
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) {
        if self.error.is_some() {
            return;
        }
        match writeln!(self.writer, "{}", line) {
            Ok(()) => self.lines += 1,
            Err(e) => self.error = Some(e),
        }
    }
}
