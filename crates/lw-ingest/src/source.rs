//! Archive source abstraction — discover archives and stream their lines.

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{IngestError, IngestResult};

/// Lines buffered between the decoding thread and the stitcher.
const LINE_CHANNEL_CAPACITY: usize = 4096;

/// Abstraction over where archives come from.
///
/// Enables an in-memory [`crate::MockArchiveSource`] for tests next to the
/// gzip-on-disk implementation.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Names of the archives to ingest, in processing order.
    async fn list_archives(&self) -> IngestResult<Vec<String>>;

    /// Open an archive for line-by-line reading.
    async fn open(&self, name: &str) -> IngestResult<LineStream>;
}

// ── Line stream ───────────────────────────────────────────────

/// Ordered stream of decoded lines from one archive.
///
/// An `Err` item ends the archive: it is a read/decode fault, not a bad line.
pub struct LineStream {
    inner: LineStreamInner,
}

enum LineStreamInner {
    Channel {
        archive: String,
        rx: mpsc::Receiver<IngestResult<String>>,
        reader: Option<JoinHandle<()>>,
    },
    Buffered(std::vec::IntoIter<IngestResult<String>>),
}

impl LineStream {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self::from_results(lines.into_iter().map(Ok).collect())
    }

    pub fn from_results(items: Vec<IngestResult<String>>) -> Self {
        Self {
            inner: LineStreamInner::Buffered(items.into_iter()),
        }
    }

    /// Lines produced by a reader task. The task is joined once the channel
    /// drains, so a reader that died early ends the archive with an error.
    pub fn from_reader(
        archive: impl Into<String>,
        rx: mpsc::Receiver<IngestResult<String>>,
        reader: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: LineStreamInner::Channel {
                archive: archive.into(),
                rx,
                reader: Some(reader),
            },
        }
    }

    /// Next line, or `None` at end of archive.
    pub async fn next_line(&mut self) -> Option<IngestResult<String>> {
        match &mut self.inner {
            LineStreamInner::Channel {
                archive,
                rx,
                reader,
            } => {
                if let Some(item) = rx.recv().await {
                    return Some(item);
                }
                match reader.take()?.await {
                    Ok(()) => None,
                    Err(e) => Some(Err(IngestError::Decode {
                        archive: archive.clone(),
                        message: format!("reader stopped: {e}"),
                    })),
                }
            }
            LineStreamInner::Buffered(items) => items.next(),
        }
    }
}

// ── Gzip files on disk ────────────────────────────────────────

/// Reads archives from a directory, selecting files by a wildcard pattern.
///
/// Names ending in `.gz` are decompressed (multi-member aware); anything
/// else is read as plain text. Invalid UTF-8 is replaced, never fatal.
#[derive(Debug, Clone)]
pub struct GzipArchiveSource {
    dir: PathBuf,
    pattern: String,
}

impl GzipArchiveSource {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArchiveSource for GzipArchiveSource {
    async fn list_archives(&self) -> IngestResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| IngestError::Io(format!("{}: {e}", self.dir.display())))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IngestError::Io(format!("{}: {e}", self.dir.display())))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && wildcard_match(&self.pattern, name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, name: &str) -> IngestResult<LineStream> {
        let path = self.dir.join(name);
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(IngestError::NotFound(path.display().to_string()));
        }

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let archive = name.to_string();
        let reader = tokio::task::spawn_blocking(move || read_archive(&path, &archive, &tx));
        Ok(LineStream::from_reader(name, rx, reader))
    }
}

/// Decode `path` line by line into `tx`. Stops early if the receiver is gone.
fn read_archive(path: &Path, archive: &str, tx: &mpsc::Sender<IngestResult<String>>) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            let _ = tx.blocking_send(Err(IngestError::Io(format!("{}: {e}", path.display()))));
            return;
        }
    };
    let mut reader: Box<dyn BufRead> = if archive.ends_with(".gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.blocking_send(Ok(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(IngestError::Decode {
                    archive: archive.to_string(),
                    message: e.to_string(),
                }));
                break;
            }
        }
    }
}

/// Match `name` against a pattern where `*` is any run of characters and
/// `?` is exactly one.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if let Some((sp, sn)) = star {
            // Let the last `*` swallow one more character.
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
