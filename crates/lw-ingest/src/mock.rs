//! In-memory archive source and sink for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::error::{IngestError, IngestResult};
use crate::sink::LogSink;
use crate::source::{ArchiveSource, LineStream};
use crate::types::{LogRecord, ParsingError, RecordId, StackTraceRow};

// ── Mock archive source ───────────────────────────────────────

/// Serves pre-loaded archives by name, in name order.
pub struct MockArchiveSource {
    archives: BTreeMap<String, Vec<IngestResult<String>>>,
}

impl MockArchiveSource {
    pub fn new() -> Self {
        Self {
            archives: BTreeMap::new(),
        }
    }

    /// Add an archive with the given lines.
    pub fn add_archive(&mut self, name: impl Into<String>, lines: Vec<String>) {
        self.archives
            .insert(name.into(), lines.into_iter().map(Ok).collect());
    }

    /// Add an archive whose read fails after `lines` were delivered.
    pub fn add_failing_archive(
        &mut self,
        name: impl Into<String>,
        lines: Vec<String>,
        message: impl Into<String>,
    ) {
        let name = name.into();
        let mut items: Vec<IngestResult<String>> = lines.into_iter().map(Ok).collect();
        items.push(Err(IngestError::Decode {
            archive: name.clone(),
            message: message.into(),
        }));
        self.archives.insert(name, items);
    }

    /// A single archive mixing records, a stack trace and continuations.
    pub fn with_sample() -> Self {
        let mut m = Self::new();
        m.add_archive(
            "app-2025-03-06.log.gz",
            vec![
                "2025-03-06 00:00:00,024 [UserServer-2] INFO  c.d.s.r.user.EnterpriseUserRPCServer - [USER]: Channel opened".into(),
                "2025-03-06 00:00:00,310 [UserServer-2] ERROR c.d.s.r.user.EnterpriseUserRPCServer - request failed".into(),
                "java.lang.IllegalStateException: channel closed".into(),
                "\tat c.d.s.r.user.EnterpriseUserRPCServer.handle(EnterpriseUserRPCServer.java:88)".into(),
                "\tat c.d.s.r.RpcDispatcher.dispatch(RpcDispatcher.java:41)".into(),
                "".into(),
                "2025-03-06 00:00:01,002 [main] WARN  Retrying in 5s - attempt 2".into(),
                "2025-03-06 00:00:02,500 [Scheduler-1] INFO  c.d.s.job.Cleanup - removed entries:".into(),
                "  session-17".into(),
                "  session-42".into(),
            ],
        );
        m
    }
}

impl Default for MockArchiveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveSource for MockArchiveSource {
    async fn list_archives(&self) -> IngestResult<Vec<String>> {
        Ok(self.archives.keys().cloned().collect())
    }

    async fn open(&self, name: &str) -> IngestResult<LineStream> {
        let items = self
            .archives
            .get(name)
            .ok_or_else(|| IngestError::NotFound(name.to_string()))?;
        let copied = items
            .iter()
            .map(|item| match item {
                Ok(line) => Ok(line.clone()),
                Err(e) => Err(IngestError::Other(e.to_string())),
            })
            .collect();
        Ok(LineStream::from_results(copied))
    }
}

// ── Memory sink ───────────────────────────────────────────────

#[derive(Default)]
struct Staged {
    records: Vec<(RecordId, LogRecord)>,
    stack_traces: Vec<StackTraceRow>,
    errors: Vec<ParsingError>,
}

/// Sink that keeps committed entities in memory.
///
/// Identifiers come from a configurable arithmetic sequence so tests can
/// tell "the right id" from "an id that happens to be adjacent".
pub struct MemorySink {
    next_id: RecordId,
    id_step: RecordId,
    committed: Staged,
    staged: Staged,
    in_unit: bool,
    commits: usize,
    rollbacks: usize,
    failing_archives: HashSet<String>,
    drop_last_id: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_id_sequence(1, 1)
    }

    /// Assign ids `start, start + step, start + 2 * step, ...`.
    pub fn with_id_sequence(start: RecordId, step: RecordId) -> Self {
        Self {
            next_id: start,
            id_step: step,
            committed: Staged::default(),
            staged: Staged::default(),
            in_unit: false,
            commits: 0,
            rollbacks: 0,
            failing_archives: HashSet::new(),
            drop_last_id: false,
        }
    }

    /// Make every insert touching `archive` fail.
    pub fn fail_archive(&mut self, archive: impl Into<String>) {
        self.failing_archives.insert(archive.into());
    }

    /// Return one identifier fewer than records inserted.
    pub fn drop_last_id(&mut self, enabled: bool) {
        self.drop_last_id = enabled;
    }

    /// Committed records in insertion order.
    pub fn records(&self) -> Vec<&LogRecord> {
        self.committed.records.iter().map(|(_, r)| r).collect()
    }

    /// Committed record by id.
    pub fn record(&self, id: RecordId) -> Option<&LogRecord> {
        self.committed
            .records
            .iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, r)| r)
    }

    /// Committed record ids in insertion order.
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.committed.records.iter().map(|(id, _)| *id).collect()
    }

    pub fn stack_traces(&self) -> &[StackTraceRow] {
        &self.committed.stack_traces
    }

    pub fn errors(&self) -> &[ParsingError] {
        &self.committed.errors
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn ensure_unit(&self) -> IngestResult<()> {
        if self.in_unit {
            Ok(())
        } else {
            Err(IngestError::Storage("no open unit of work".into()))
        }
    }

    fn check_archive<'a>(&self, mut sources: impl Iterator<Item = &'a str>) -> IngestResult<()> {
        match sources.find(|s| self.failing_archives.contains(*s)) {
            Some(archive) => Err(IngestError::Storage(format!(
                "injected failure for {archive}"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn begin(&mut self) -> IngestResult<()> {
        self.staged = Staged::default();
        self.in_unit = true;
        Ok(())
    }

    async fn insert_records(&mut self, records: &[LogRecord]) -> IngestResult<Vec<RecordId>> {
        self.ensure_unit()?;
        self.check_archive(records.iter().map(|r| r.source_file.as_str()))?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = self.next_id;
            self.next_id += self.id_step;
            self.staged.records.push((id, record.clone()));
            ids.push(id);
        }
        if self.drop_last_id {
            ids.pop();
        }
        Ok(ids)
    }

    async fn insert_stack_traces(&mut self, traces: &[StackTraceRow]) -> IngestResult<()> {
        self.ensure_unit()?;
        self.staged.stack_traces.extend_from_slice(traces);
        Ok(())
    }

    async fn insert_errors(&mut self, errors: &[ParsingError]) -> IngestResult<()> {
        self.ensure_unit()?;
        self.check_archive(errors.iter().map(|e| e.source_file.as_str()))?;
        self.staged.errors.extend_from_slice(errors);
        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        self.ensure_unit()?;
        let staged = std::mem::take(&mut self.staged);
        self.committed.records.extend(staged.records);
        self.committed.stack_traces.extend(staged.stack_traces);
        self.committed.errors.extend(staged.errors);
        self.in_unit = false;
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        if self.in_unit {
            self.staged = Staged::default();
            self.in_unit = false;
            self.rollbacks += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_source_lists_in_name_order() {
        let mut m = MockArchiveSource::new();
        m.add_archive("b.gz", vec!["x".into()]);
        m.add_archive("a.gz", vec!["y".into()]);
        assert_eq!(m.list_archives().await.unwrap(), vec!["a.gz", "b.gz"]);
    }

    #[tokio::test]
    async fn mock_source_failing_archive() {
        let mut m = MockArchiveSource::new();
        m.add_failing_archive("a.gz", vec!["x".into()], "truncated");
        let mut stream = m.open("a.gz").await.unwrap();
        assert_eq!(stream.next_line().await.unwrap().unwrap(), "x");
        assert!(stream.next_line().await.unwrap().is_err());
        assert!(stream.next_line().await.is_none());
    }

    #[tokio::test]
    async fn mock_source_not_found() {
        let m = MockArchiveSource::new();
        assert!(matches!(m.open("nope").await, Err(IngestError::NotFound(_))));
    }

    #[tokio::test]
    async fn memory_sink_requires_unit_of_work() {
        let mut sink = MemorySink::new();
        assert!(sink.insert_errors(&[]).await.is_err());
        sink.begin().await.unwrap();
        assert!(sink.insert_errors(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn memory_sink_rollback_discards_staged() {
        let mut sink = MemorySink::new();
        sink.begin().await.unwrap();
        sink.insert_errors(&[ParsingError::new("x", "a.gz", "r")])
            .await
            .unwrap();
        sink.rollback().await.unwrap();
        assert!(sink.errors().is_empty());
        assert_eq!(sink.rollbacks(), 1);
    }
}
