//! Multi-line stitching state machine.
//!
//! Consumes the lines of one archive in file order and decides, per line,
//! whether it opens a record, continues the open record's message, extends
//! the pending stack trace, or is an orphan. State never crosses archives:
//! build one `Stitcher` per archive.
//!
//! A stack trace is owned by the record that was open while its lines
//! arrived. It is closed when the next record starts (or the archive ends)
//! and leaves the stitcher *attached* to its owner inside a
//! [`FinishedRecord`], so the batch writer can link it to the owner's
//! identifier once that identifier exists.

use crate::error::LineFault;
use crate::matcher::{self, LineClass, Shape};
use crate::types::{
    Emitted, FinishedRecord, LogRecord, ParsingError, REASON_ORPHAN_CONTINUATION,
    REASON_ORPHAN_STACK_TRACE,
};

/// Default maximum length of a single line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default maximum size of a record's raw text.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// Size guards applied per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_line_bytes: usize,
    pub max_record_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// What a single line did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Empty after trimming; ignored.
    Blank,
    /// Opened a new record.
    Opened(Shape),
    /// Appended to the open record's message.
    Continued,
    /// Appended to the pending stack trace.
    StackTrace,
    /// Unclassified with no open record; reported as a parsing error.
    Orphaned,
    /// Dropped by a size limit; the caller records the fault.
    Rejected(LineFault),
}

/// Result of feeding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub outcome: LineOutcome,
    /// Entity finalized by this line, if any.
    pub emitted: Option<Emitted>,
}

impl Step {
    fn new(outcome: LineOutcome) -> Self {
        Self {
            outcome,
            emitted: None,
        }
    }
}

/// Per-archive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchStats {
    /// Non-blank lines fed.
    pub lines: u64,
    pub records: u64,
    pub continuations: u64,
    pub stack_trace_lines: u64,
    /// Closed stack traces attached to a record.
    pub stack_traces: u64,
    /// Orphan continuations and orphan traces.
    pub orphans: u64,
    /// Lines rejected by a size limit.
    pub faults: u64,
}

/// Line classification and stitching state for one archive.
#[derive(Debug)]
pub struct Stitcher {
    source_file: String,
    limits: Limits,
    current: Option<LogRecord>,
    pending_trace: Vec<String>,
    /// Length of `pending_trace` joined with newlines.
    pending_trace_bytes: usize,
    stats: StitchStats,
}

impl Stitcher {
    pub fn new(source_file: impl Into<String>, limits: Limits) -> Self {
        Self {
            source_file: source_file.into(),
            limits,
            current: None,
            pending_trace: Vec::new(),
            pending_trace_bytes: 0,
            stats: StitchStats::default(),
        }
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn stats(&self) -> StitchStats {
        self.stats
    }

    /// The record currently being built, if any.
    pub fn current(&self) -> Option<&LogRecord> {
        self.current.as_ref()
    }

    /// Lines collected for the stack trace that has not been closed yet.
    pub fn pending_trace(&self) -> &[String] {
        &self.pending_trace
    }

    /// Feed the next line of the archive.
    ///
    /// Surrounding whitespace is trimmed before classification. A line over
    /// `max_line_bytes` is classified on its leading `max_line_bytes` and
    /// then rejected. A rejected record head still ends the open record, so
    /// the lines after it become orphans instead of joining that record.
    pub fn feed(&mut self, line: &str) -> Step {
        let line = line.trim();
        if line.is_empty() {
            return Step::new(LineOutcome::Blank);
        }
        self.stats.lines += 1;

        if line.len() > self.limits.max_line_bytes {
            let head = truncate(line, self.limits.max_line_bytes);
            let emitted = match matcher::classify(head) {
                LineClass::NewRecord(_) => self.close_current(),
                _ => None,
            };
            return Step {
                emitted,
                ..self.reject(LineFault::LineTooLong {
                    len: line.len(),
                    limit: self.limits.max_line_bytes,
                })
            };
        }

        match matcher::classify(line) {
            LineClass::NewRecord(head) => {
                let shape = head.shape;
                let emitted = self.close_current();
                self.current = Some(head.into_record(&self.source_file, line));
                self.stats.records += 1;
                Step {
                    outcome: LineOutcome::Opened(shape),
                    emitted,
                }
            }
            LineClass::StackTraceLine => {
                let len = match self.pending_trace_bytes {
                    0 => line.len(),
                    n => n + 1 + line.len(),
                };
                if len > self.limits.max_record_bytes {
                    return self.reject(LineFault::RecordTooLarge {
                        len,
                        limit: self.limits.max_record_bytes,
                    });
                }
                self.pending_trace.push(line.to_string());
                self.pending_trace_bytes = len;
                if let Some(current) = self.current.as_mut() {
                    current.has_stack_trace = true;
                }
                self.stats.stack_trace_lines += 1;
                Step::new(LineOutcome::StackTrace)
            }
            LineClass::Unclassified => match self.current.as_mut() {
                Some(current) => {
                    let len = current.raw_log.len() + 1 + line.len();
                    if len > self.limits.max_record_bytes {
                        return self.reject(LineFault::RecordTooLarge {
                            len,
                            limit: self.limits.max_record_bytes,
                        });
                    }
                    current.append_continuation(line);
                    self.stats.continuations += 1;
                    Step::new(LineOutcome::Continued)
                }
                None => {
                    self.stats.orphans += 1;
                    Step {
                        outcome: LineOutcome::Orphaned,
                        emitted: Some(Emitted::Error(ParsingError::new(
                            line,
                            &self.source_file,
                            REASON_ORPHAN_CONTINUATION,
                        ))),
                    }
                }
            },
        }
    }

    fn reject(&mut self, fault: LineFault) -> Step {
        self.stats.faults += 1;
        Step::new(LineOutcome::Rejected(fault))
    }

    /// End of archive: finalize the open record and close its pending trace.
    pub fn finish(&mut self) -> Option<Emitted> {
        self.close_current()
    }

    /// Close the pending trace and finalize the open record together with it.
    ///
    /// Trace lines collected while no record was open have no owner and
    /// become a single parsing error instead.
    fn close_current(&mut self) -> Option<Emitted> {
        let trace = if self.pending_trace.is_empty() {
            None
        } else {
            self.pending_trace_bytes = 0;
            Some(std::mem::take(&mut self.pending_trace).join("\n"))
        };

        match (self.current.take(), trace) {
            (Some(record), stack_trace) => {
                if stack_trace.is_some() {
                    self.stats.stack_traces += 1;
                }
                Some(Emitted::Record(FinishedRecord {
                    record,
                    stack_trace,
                }))
            }
            (None, Some(trace)) => {
                self.stats.orphans += 1;
                Some(Emitted::Error(ParsingError::new(
                    trace,
                    &self.source_file,
                    REASON_ORPHAN_STACK_TRACE,
                )))
            }
            (None, None) => None,
        }
    }
}

/// Longest prefix of `line` within `max` bytes, cut on a char boundary.
pub fn truncate(line: &str, max: usize) -> &str {
    let mut end = line.len().min(max);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
