//! Append-only output file.
//!
//! Each flush appends the replies buffered since the previous flush and
//! never rewrites earlier content, so a crash or a failed patient cannot
//! lose replies that were already written.
//!
//! Two layouts are supported:
//!
//! | Format | One flush writes | Empty flush |
//! |--------|------------------|-------------|
//! | `json_lines` | one `{"id","pathology","reply"}` object per line | nothing |
//! | `legacy_fragments` | a 2-space-indented JSON array of replies, then `,` | `[],` |
//!
//! Legacy files are not one JSON document; [`repair_fragments`] joins them.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use mcqgen_core::{OutputFormat, Pathology};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from writing or reading the output file.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Output file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// One successful reply, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedReply {
    pub id: String,
    pub pathology: Pathology,
    pub reply: String,
}

/// The single writer for one output file.
///
/// Writes are serialised through a mutex, so the sink may be shared
/// between tasks without interleaving fragments.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    format: OutputFormat,
    file: Mutex<File>,
}

impl OutputSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| SinkError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        Ok(Self {
            path,
            format,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Append one batch. Returns the number of bytes written.
    pub fn append(&self, batch: &[GeneratedReply]) -> Result<usize, SinkError> {
        let fragment = encode(self.format, batch)?;
        if fragment.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.lock();
        file.write_all(fragment.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|source| SinkError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            replies = batch.len(),
            bytes = fragment.len(),
            "Flushed output fragment"
        );
        Ok(fragment.len())
    }
}

/// Render one batch in the given layout.
pub fn encode(format: OutputFormat, batch: &[GeneratedReply]) -> Result<String, SinkError> {
    match format {
        OutputFormat::JsonLines => {
            let mut out = String::new();
            for reply in batch {
                out.push_str(&serde_json::to_string(reply)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::LegacyFragments => {
            let replies: Vec<&str> = batch.iter().map(|r| r.reply.as_str()).collect();
            let mut out = serde_json::to_string_pretty(&replies)?;
            out.push(',');
            Ok(out)
        }
    }
}

/// Join a legacy fragment file into the flat list of replies.
pub fn repair_fragments(contents: &str) -> Result<Vec<String>, SinkError> {
    let body = contents.trim().trim_end_matches(',');
    let fragments: Vec<Vec<String>> = serde_json::from_str(&format!("[{}]", body))?;
    Ok(fragments.into_iter().flatten().collect())
}

/// Read a JSON-lines output file.
pub fn read_json_lines(contents: &str) -> Result<Vec<GeneratedReply>, SinkError> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(SinkError::from))
        .collect()
}
