//! File-backed line sink with optional daily rotation.

use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::LineSink;
use crate::{AppError, Result, SinkError, SinkResult};

/// On-disk representation of each line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    /// The line followed by `\n`.
    #[default]
    Text,
    /// One JSON object per line carrying a UTC timestamp and the line.
    Jsonl,
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    timestamp: String,
    line: &'a str,
}

/// Where the sink writes.
#[derive(Debug, Clone)]
enum Target {
    Fixed(PathBuf),
    Daily { dir: PathBuf, prefix: String },
}

impl Target {
    fn path_for(&self, date: NaiveDate) -> PathBuf {
        match self {
            Self::Fixed(path) => path.clone(),
            Self::Daily { dir, prefix } => dir.join(format!("{prefix}-{date}.log")),
        }
    }
}

/// Internal state protected by a mutex.
enum WriterState {
    /// No file opened yet (daily target before first write).
    Pending,
    Open {
        current_date: NaiveDate,
        writer: BufWriter<fs::File>,
    },
    Closed,
}

/// A line sink appending to a file.
///
/// With [`FileLineSink::daily`] the sink writes to
/// `<dir>/<prefix>-YYYY-MM-DD.log` and opens a new file when the UTC date
/// changes between writes. Every line is flushed before `write_line`
/// returns.
pub struct FileLineSink {
    name: String,
    target: Target,
    format: LineFormat,
    today: fn() -> NaiveDate,
    state: Mutex<WriterState>,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl FileLineSink {
    /// Open `path` for appending, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory or file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        let writer = open_append(&path).map_err(|e| {
            AppError::Io(format!("failed to open log file {}: {e}", path.display()))
        })?;
        Ok(Self {
            name: format!("file:{}", path.display()),
            target: Target::Fixed(path),
            format: LineFormat::Text,
            today: utc_today,
            state: Mutex::new(WriterState::Open {
                current_date: utc_today(),
                writer,
            }),
        })
    }

    /// Write into daily-rotating files under `dir`.
    ///
    /// Creates `dir` and all parent directories if they do not exist. The
    /// first file is opened lazily on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn daily(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        let prefix = prefix.into();
        create_dir(&dir)?;
        Ok(Self {
            name: format!("daily:{}/{prefix}", dir.display()),
            target: Target::Daily { dir, prefix },
            format: LineFormat::Text,
            today: utc_today,
            state: Mutex::new(WriterState::Pending),
        })
    }

    /// Select how each line is laid out on disk.
    #[must_use]
    pub fn with_format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the source of the current UTC date used for rotation.
    ///
    /// Only the daily file name depends on it; JSONL timestamps always use
    /// the system clock.
    #[must_use]
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Path the next line would be written to.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.target.path_for((self.today)())
    }

    fn render(&self, line: &str) -> SinkResult<String> {
        match self.format {
            LineFormat::Text => Ok(line.to_owned()),
            LineFormat::Jsonl => {
                let record = JsonlRecord {
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    line,
                };
                serde_json::to_string(&record)
                    .map_err(|e| SinkError::Io(format!("failed to serialize line: {e}")))
            }
        }
    }
}

impl LineSink for FileLineSink {
    fn write_line(&self, line: &str) -> SinkResult<()> {
        let rendered = self.render(line)?;
        let today = (self.today)();

        let mut guard = self
            .state
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;

        let needs_rotation = match &*guard {
            WriterState::Closed => {
                return Err(SinkError::ConsumerClosed(format!("{} is closed", self.name)));
            }
            WriterState::Pending => true,
            WriterState::Open { current_date, .. } => {
                matches!(self.target, Target::Daily { .. }) && *current_date != today
            }
        };

        if needs_rotation {
            let path = self.target.path_for(today);
            let writer = open_append(&path).map_err(|e| {
                warn!(sink = self.name.as_str(), error = %e, "failed to open rotated log file");
                SinkError::Io(format!("failed to open {}: {e}", path.display()))
            })?;
            debug!(sink = self.name.as_str(), path = %path.display(), "opened log file");
            *guard = WriterState::Open {
                current_date: today,
                writer,
            };
        }

        if let WriterState::Open { writer, .. } = &mut *guard {
            writeln!(writer, "{rendered}")?;
            writer.flush()?;
        }

        Ok(())
    }

    fn close(&self) -> SinkResult<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;

        match std::mem::replace(&mut *guard, WriterState::Closed) {
            WriterState::Open { mut writer, .. } => writer.flush().map_err(SinkError::from),
            WriterState::Pending | WriterState::Closed => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        AppError::Io(format!(
            "failed to create log directory {}: {e}",
            dir.display()
        ))
    })
}

fn open_append(path: &Path) -> std::io::Result<BufWriter<fs::File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}
