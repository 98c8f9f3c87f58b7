//! Line classifier for `timestamp [thread] LEVEL module - message` logs.
//!
//! Stateless: every function here is a pure function of the line text.
//! Lines are expected to be trimmed by the caller.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::LogRecord;

// `2025-03-06 00:00:00,024 [UserServer-2] INFO  c.d.s.r.UserRPCServer - message`
static RE_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) \[([^\]]+)\] ([A-Z]+)\s+(\S+) - (.+)$",
    )
    .unwrap()
});

// Same anchor, no isolable module: everything after the level is the message.
static RE_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) \[([^\]]+)\] ([A-Z]+)\s+(.+)$")
        .unwrap()
});

// Recognized starts of exception output.
static RE_STACK_TRACE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:[A-Za-z_$][\w$]*\.)+[\w$]*(?:Exception|Error)\b|Caused by:|Suppressed:|at [\w.$<>]+\(|\.\.\. \d+ (?:more|common frames omitted))",
    )
    .unwrap()
});

/// Which structural pattern produced a record head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// All five fields, including the module token.
    Primary,
    /// No module token; module is left empty.
    Fallback,
}

/// Fields extracted from the first line of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHead<'a> {
    pub shape: Shape,
    pub timestamp: &'a str,
    pub thread: &'a str,
    pub level: &'a str,
    pub module: &'a str,
    pub message: &'a str,
}

impl RecordHead<'_> {
    /// Open a record from this head; `raw` is the full line it came from.
    pub fn into_record(self, source_file: &str, raw: &str) -> LogRecord {
        LogRecord {
            timestamp: self.timestamp.to_string(),
            thread: self.thread.to_string(),
            level: self.level.to_string(),
            module: self.module.to_string(),
            message: self.message.to_string(),
            source_file: source_file.to_string(),
            raw_log: raw.to_string(),
            has_stack_trace: false,
        }
    }
}

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// The line starts a new record.
    NewRecord(RecordHead<'a>),
    /// The line looks like exception output.
    StackTraceLine,
    /// None of the above; a continuation candidate.
    Unclassified,
}

/// Classify a line: primary shape, then fallback, then stack-trace heuristics.
pub fn classify(line: &str) -> LineClass<'_> {
    if let Some(head) = match_primary(line).or_else(|| match_fallback(line)) {
        return LineClass::NewRecord(head);
    }
    if is_stack_trace_line(line) {
        return LineClass::StackTraceLine;
    }
    LineClass::Unclassified
}

/// Match the five-field shape.
///
/// Fails when the text between the level and ` - ` contains whitespace or
/// is a bare dash.
pub fn match_primary(line: &str) -> Option<RecordHead<'_>> {
    let caps = RE_PRIMARY.captures(line)?;
    let module = caps.get(4)?.as_str();
    if module == "-" {
        return None;
    }
    Some(RecordHead {
        shape: Shape::Primary,
        timestamp: caps.get(1)?.as_str(),
        thread: caps.get(2)?.as_str(),
        level: caps.get(3)?.as_str(),
        module,
        message: caps.get(5)?.as_str(),
    })
}

/// Match the four-field shape; the module is always empty.
pub fn match_fallback(line: &str) -> Option<RecordHead<'_>> {
    let caps = RE_FALLBACK.captures(line)?;
    Some(RecordHead {
        shape: Shape::Fallback,
        timestamp: caps.get(1)?.as_str(),
        thread: caps.get(2)?.as_str(),
        level: caps.get(3)?.as_str(),
        module: "",
        message: caps.get(4)?.as_str(),
    })
}

/// Heuristic check for exception / stack frame content.
pub fn is_stack_trace_line(line: &str) -> bool {
    RE_STACK_TRACE_START.is_match(line) || line.starts_with("at ") || line.contains("Exception")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_extracts_all_fields() {
        let line = "2025-03-06 00:00:00,024 [UserServer-2] INFO  c.d.s.r.user.EnterpriseUserRPCServer - [USER]: Channel opened";
        let head = match_primary(line).unwrap();
        assert_eq!(head.shape, Shape::Primary);
        assert_eq!(head.timestamp, "2025-03-06 00:00:00,024");
        assert_eq!(head.thread, "UserServer-2");
        assert_eq!(head.level, "INFO");
        assert_eq!(head.module, "c.d.s.r.user.EnterpriseUserRPCServer");
        assert_eq!(head.message, "[USER]: Channel opened");
    }

    #[test]
    fn primary_module_is_text_before_separator() {
        let line = "2025-03-06 00:00:00,024 [T-1] ERROR c.x.my-mod - a - b";
        let head = match_primary(line).unwrap();
        assert_eq!(head.module, "c.x.my-mod");
        assert_eq!(head.message, "a - b");
        assert!(!head.module.chars().any(char::is_whitespace));
    }

    #[test]
    fn whitespace_before_separator_falls_back() {
        let line = "2025-03-06 00:00:00,024 [T-1] WARN Retrying in 5s - attempt 2";
        assert!(match_primary(line).is_none());
        let LineClass::NewRecord(head) = classify(line) else {
            panic!("expected a record head");
        };
        assert_eq!(head.shape, Shape::Fallback);
        assert_eq!(head.module, "");
        assert_eq!(head.message, "Retrying in 5s - attempt 2");
    }

    #[test]
    fn bare_dash_module_falls_back() {
        let line = "2025-03-06 00:00:00,024 [T-1] INFO - - message";
        assert!(match_primary(line).is_none());
        let head = match_fallback(line).unwrap();
        assert_eq!(head.module, "");
        assert_eq!(head.message, "- - message");
    }

    #[test]
    fn fallback_without_separator() {
        let line = "2025-03-06 00:00:01,500 [main] DEBUG starting up";
        let LineClass::NewRecord(head) = classify(line) else {
            panic!("expected a record head");
        };
        assert_eq!(head.shape, Shape::Fallback);
        assert_eq!(head.thread, "main");
        assert_eq!(head.message, "starting up");
    }

    #[test]
    fn timestamp_must_be_fixed_width() {
        assert_eq!(
            classify("2025-3-06 00:00:00,024 [T-1] INFO c.x.Y - short month"),
            LineClass::Unclassified
        );
        assert_eq!(
            classify("2025-03-06 00:00:00.024 [T-1] INFO c.x.Y - dot fraction"),
            LineClass::Unclassified
        );
    }

    #[test]
    fn lowercase_level_is_not_a_record() {
        assert_eq!(
            classify("2025-03-06 00:00:00,024 [T-1] info c.x.Y - lower"),
            LineClass::Unclassified
        );
    }

    #[test]
    fn stack_trace_shapes() {
        for line in [
            "java.lang.RuntimeException: boom",
            "java.lang.OutOfMemoryError: Java heap space",
            "Caused by: java.io.IOException: closed",
            "at c.x.Y.run(Y.java:10)",
            "at sun.reflect.GeneratedMethodAccessor12.invoke(Unknown Source)",
            "... 12 more",
            "... 3 common frames omitted",
            "Suppressed: java.lang.IllegalStateException",
            "wrapped: SomeException was thrown",
        ] {
            assert_eq!(classify(line), LineClass::StackTraceLine, "{line}");
        }
    }

    #[test]
    fn plain_text_is_unclassified() {
        assert_eq!(classify("not a log line"), LineClass::Unclassified);
        assert_eq!(classify("com.foo.ErrorHandler started"), LineClass::Unclassified);
        assert_eq!(classify("  payload={\"a\":1}"), LineClass::Unclassified);
    }

    #[test]
    fn record_shape_wins_over_exception_substring() {
        let line = "2025-03-06 00:00:00,024 [T-1] ERROR c.x.Y - NullPointerException at startup";
        assert!(matches!(classify(line), LineClass::NewRecord(_)));
    }

    #[test]
    fn into_record_copies_fields() {
        let line = "2025-03-06 00:00:00,024 [T-1] ERROR c.x.Y - boom";
        let record = match_primary(line).unwrap().into_record("a.gz", line);
        assert_eq!(record.module, "c.x.Y");
        assert_eq!(record.message, "boom");
        assert_eq!(record.raw_log, line);
        assert_eq!(record.source_file, "a.gz");
        assert!(!record.has_stack_trace);
    }
}
