use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, SketchError};

/// One input observation: a flow label, an element id, and an arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub flow: u64,
    pub element: u64,
    pub timestamp: u64,
}

impl FromStr for Record {
    type Err = String;

    /// Parses the three-column `<flow> <element> <timestamp>` line format.
    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let mut fields = s.split_whitespace();
        let mut next = |name: &str| -> std::result::Result<u64, String> {
            let field = fields
                .next()
                .ok_or_else(|| format!("missing {} column", name))?;
            field
                .parse::<u64>()
                .map_err(|e| format!("bad {} `{}`: {}", name, field, e))
        };
        let flow = next("flow")?;
        let element = next("element")?;
        let timestamp = next("timestamp")?;
        if let Some(extra) = fields.next() {
            return Err(format!("unexpected trailing column `{}`", extra));
        }
        Ok(Record {
            flow,
            element,
            timestamp,
        })
    }
}

/// Iterator of records over a line-oriented trace.
///
/// Blank lines and lines starting with `#` are skipped. Parse failures are
/// reported with their 1-based line number and do not stop the iterator, so
/// callers choose whether to bail or skip.
pub struct TraceReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
}

impl TraceReader<BufReader<File>> {
    /// Opens a trace file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(SketchError::Io(e))),
            };
            self.line += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(trimmed.parse::<Record>().map_err(|reason| {
                SketchError::Parse {
                    line: self.line,
                    reason,
                }
            }));
        }
    }
}
