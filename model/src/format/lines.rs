use std::io::BufRead;

use crate::{ModelErr, Result};

/// A line cursor over a model file that strips trailing whitespace and remembers where it is.
pub struct Lines<R> {
    inner: R,
    buf: String,
    line: usize,
    pending: bool,
}

impl<R: BufRead> Lines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
            line: 0,
            pending: false,
        }
    }

    /// Advances to the next line.
    ///
    /// # Returns
    /// The 1-based line number and the line with trailing whitespace removed, or `None` at the end
    /// of the stream.
    pub fn next_line(&mut self) -> Result<Option<(usize, &str)>> {
        if self.pending {
            self.pending = false;
            return Ok(Some((self.line, self.buf.trim_end())));
        }

        self.buf.clear();

        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }

        self.line += 1;
        Ok(Some((self.line, self.buf.trim_end())))
    }

    /// Makes the next call to [`Lines::next_line`] return the last line again.
    pub fn unread(&mut self) {
        self.pending = true;
    }

    /// Consumes the rest of a section: lines up to and including the next blank line, or up to but
    /// excluding the next marker line.
    ///
    /// # Returns
    /// The amount of lines skipped, not counting the terminator.
    pub fn skip_section(&mut self) -> Result<usize> {
        let mut skipped = 0;

        while let Some((_, line)) = self.next_line()? {
            if line.is_empty() {
                break;
            }
            if line.starts_with('\\') {
                self.unread();
                break;
            }

            skipped += 1;
        }

        Ok(skipped)
    }

    /// The 1-based number of the line last returned.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Builds a parse error pointing at the current line.
    pub fn error(&self, msg: impl Into<String>) -> ModelErr {
        parse_error(self.line, msg)
    }
}

pub fn parse_error(line: usize, msg: impl Into<String>) -> ModelErr {
    ModelErr::Parse {
        line,
        msg: msg.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn skip_stops_before_a_marker() {
        let mut lines = Lines::new(Cursor::new("a b\nc\n\\output_biases\n1\n"));

        assert_eq!(lines.skip_section().unwrap(), 2);
        assert_eq!(lines.next_line().unwrap(), Some((3, "\\output_biases")));
        assert_eq!(lines.next_line().unwrap(), Some((4, "1")));
    }

    #[test]
    fn skip_consumes_the_blank_line() {
        let mut lines = Lines::new(Cursor::new("x\n\n\\end\n"));

        assert_eq!(lines.skip_section().unwrap(), 1);
        assert_eq!(lines.next_line().unwrap(), Some((3, "\\end")));
        assert_eq!(lines.next_line().unwrap(), None);
    }
}
