//! Archive driver — runs every archive through the stitcher and batch writer.
//!
//! Archives are processed one after another, lines strictly in file order.
//! A fault inside one archive rolls back that archive's open unit of work
//! and the run continues with the next archive.

use serde::Serialize;

use crate::batch::BatchWriter;
use crate::config::IngestConfig;
use crate::error::{IngestResult, LineFault};
use crate::sink::LogSink;
use crate::source::{ArchiveSource, LineStream};
use crate::stitch::{self, LineOutcome, StitchStats, Stitcher};
use crate::types::ParsingError;

/// Outcome of one successfully ingested archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub archive: String,
    /// Lines read, blank ones included.
    pub lines: u64,
    pub records: u64,
    pub stack_traces: u64,
    pub errors: u64,
    /// Lines merged into an open record's message.
    pub continuations: u64,
    pub stack_trace_lines: u64,
    /// Orphan continuations and orphan traces (also counted in `errors`).
    pub orphans: u64,
    /// Lines rejected by a per-line fault (also counted in `errors`).
    pub line_faults: u64,
    pub checkpoints: u64,
}

/// An archive that was abandoned and rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedArchive {
    pub archive: String,
    pub error: String,
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub archives: Vec<ArchiveReport>,
    pub failed: Vec<FailedArchive>,
}

impl IngestSummary {
    pub fn total_records(&self) -> u64 {
        self.archives.iter().map(|a| a.records).sum()
    }

    pub fn total_stack_traces(&self) -> u64 {
        self.archives.iter().map(|a| a.stack_traces).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.archives.iter().map(|a| a.errors).sum()
    }
}

/// Ingestion entry point, parameterized by an explicit configuration.
#[derive(Debug, Clone)]
pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest every archive the source lists.
    ///
    /// Only a failure to list archives is returned as an error; per-archive
    /// faults are collected in [`IngestSummary::failed`].
    pub async fn run<A, S>(&self, source: &A, sink: &mut S) -> IngestResult<IngestSummary>
    where
        A: ArchiveSource + ?Sized,
        S: LogSink + ?Sized,
    {
        let archives = source.list_archives().await?;
        if archives.is_empty() {
            tracing::warn!(pattern = %self.config.input_pattern, "no archives found");
            return Ok(IngestSummary::default());
        }
        tracing::info!(count = archives.len(), archives = ?archives, "found archives");

        let mut summary = IngestSummary::default();
        for archive in archives {
            tracing::info!(archive = %archive, "processing archive");
            match self.ingest_archive(source, sink, &archive).await {
                Ok(report) => {
                    tracing::info!(
                        archive = %archive,
                        lines = report.lines,
                        records = report.records,
                        stack_traces = report.stack_traces,
                        errors = report.errors,
                        "finished archive"
                    );
                    summary.archives.push(report);
                }
                Err(e) => {
                    tracing::error!(archive = %archive, error = %e, "archive failed, rolled back");
                    summary.failed.push(FailedArchive {
                        archive,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Ingest a single archive inside its own unit(s) of work.
    pub async fn ingest_archive<A, S>(
        &self,
        source: &A,
        sink: &mut S,
        archive: &str,
    ) -> IngestResult<ArchiveReport>
    where
        A: ArchiveSource + ?Sized,
        S: LogSink + ?Sized,
    {
        let mut lines = source.open(archive).await?;
        let mut writer = BatchWriter::begin(sink, self.config.batch_size).await?;

        let mut report = ArchiveReport {
            archive: archive.to_string(),
            ..ArchiveReport::default()
        };
        let stitched = match self.drive(archive, &mut lines, &mut writer, &mut report).await {
            Ok(stitched) => stitched,
            Err(e) => {
                if let Err(rollback) = writer.abort().await {
                    tracing::error!(archive = %archive, error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        };
        report.continuations = stitched.continuations;
        report.stack_trace_lines = stitched.stack_trace_lines;
        report.orphans = stitched.orphans;
        report.line_faults = stitched.faults;

        let stats = writer.finish().await?;
        report.records = stats.records;
        report.stack_traces = stats.stack_traces;
        report.errors = stats.errors;
        report.checkpoints = stats.checkpoints;
        Ok(report)
    }

    async fn drive<S>(
        &self,
        archive: &str,
        lines: &mut LineStream,
        writer: &mut BatchWriter<'_, S>,
        report: &mut ArchiveReport,
    ) -> IngestResult<StitchStats>
    where
        S: LogSink + ?Sized,
    {
        let mut stitcher = Stitcher::new(archive, self.config.limits());

        while let Some(item) = lines.next_line().await {
            let line = item?;
            report.lines += 1;

            let step = stitcher.feed(&line);
            if let Some(emitted) = step.emitted {
                writer.accept(emitted).await?;
            }
            if let LineOutcome::Rejected(fault) = step.outcome {
                tracing::debug!(archive = %archive, line = report.lines, error = %fault, "line fault");
                writer
                    .push_error(fault_error(&line, archive, &fault, self.config.max_line_bytes))
                    .await?;
            }

            if report.lines % self.config.checkpoint_interval == 0 {
                writer.checkpoint().await?;
                tracing::info!(archive = %archive, lines = report.lines, "processed lines");
            }
        }

        if let Some(emitted) = stitcher.finish() {
            writer.accept(emitted).await?;
        }
        writer.flush_all().await?;
        Ok(stitcher.stats())
    }
}

/// Parsing error for a line rejected by a per-line fault. The stored line is
/// cut to `max_bytes` so one oversized line cannot bloat the error table.
fn fault_error(line: &str, archive: &str, fault: &LineFault, max_bytes: usize) -> ParsingError {
    ParsingError::new(
        stitch::truncate(line.trim(), max_bytes),
        archive,
        format!("Exception: {fault}"),
    )
}
