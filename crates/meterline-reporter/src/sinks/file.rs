//! Rotating CSV files.
//!
//! Metrics go to `{dir}/{base}-{stamp}.{ext}`, request timings to
//! `{dir}/{base}-requests-{stamp}.{ext}`. `stamp` is the cycle time rendered
//! with the configured chrono format (UTC); a new file starts whenever it
//! changes. Only the newest `keep_files` of each set are kept, ordered by
//! file name, so the format should sort chronologically (the default does).

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use meterline_core::error::{MeterError, Result};
use meterline_core::wire::csv;

use super::MetricSink;
use crate::config::FileSinkConfig;
use crate::cycle::ReportBatch;

const REQUESTS_TAG: &str = "requests";

pub struct RotatingFileSink {
    dir: PathBuf,
    metrics: Mutex<FileSet>,
    requests: Mutex<FileSet>,
    timestamp_format: String,
}

/// One rotating family of files sharing a prefix.
struct FileSet {
    prefix: String,
    suffix: String,
    header: &'static str,
    keep: usize,
    current: Option<OpenFile>,
}

struct OpenFile {
    stamp: String,
    file: File,
}

impl RotatingFileSink {
    /// Creates the directory if needed. Fails if it cannot be used.
    pub fn new(cfg: &FileSinkConfig) -> Result<Self> {
        let dir = PathBuf::from(&cfg.directory);
        fs::create_dir_all(&dir).map_err(|e| {
            MeterError::Config(format!("file.directory {} unusable: {e}", dir.display()))
        })?;
        let meta = fs::metadata(&dir)?;
        if !meta.is_dir() {
            return Err(MeterError::Config(format!(
                "file.directory {} is not a directory",
                dir.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(MeterError::Config(format!(
                "file.directory {} is read-only",
                dir.display()
            )));
        }
        // reject formats chrono cannot render before the first cycle does
        render_stamp(&cfg.timestamp_format, Utc::now())?;

        let suffix = match cfg.extension.as_str() {
            "" => String::new(),
            ext => format!(".{ext}"),
        };
        let set = |prefix: String, header: &'static str| {
            Mutex::new(FileSet {
                prefix,
                suffix: suffix.clone(),
                header,
                keep: cfg.keep_files,
                current: None,
            })
        };
        Ok(Self {
            metrics: set(format!("{}-", cfg.base_file_name), csv::METRICS_HEADER),
            requests: set(
                format!("{}-{REQUESTS_TAG}-", cfg.base_file_name),
                csv::TIMING_HEADER,
            ),
            dir,
            timestamp_format: cfg.timestamp_format.clone(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn write_set(&self, set: &Mutex<FileSet>, stamp: &str, body: &str) -> Result<()> {
        let mut set = set
            .lock()
            .map_err(|_| MeterError::InvalidState("file sink lock poisoned"))?;
        set.append(&self.dir, stamp, body)
    }
}

impl MetricSink for RotatingFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn report(&self, batch: &ReportBatch) -> Result<()> {
        let at = cycle_time(batch.collected_at_millis);
        let stamp = render_stamp(&self.timestamp_format, at)?;
        let time = at.to_rfc3339_opts(SecondsFormat::Millis, true);

        if !batch.stats.is_empty() {
            let mut body = String::new();
            csv::write_metric_rows(&time, &batch.stats, &mut body);
            self.write_set(&self.metrics, &stamp, &body)?;
        }
        if !batch.timings.is_empty() {
            let mut body = String::new();
            for tree in &batch.timings {
                csv::write_timing_rows(&time, tree, batch.timing_threshold_percent, &mut body);
            }
            self.write_set(&self.requests, &stamp, &body)?;
        }
        Ok(())
    }
}

impl FileSet {
    fn file_name(&self, stamp: &str) -> String {
        format!("{}{stamp}{}", self.prefix, self.suffix)
    }

    fn append(&mut self, dir: &Path, stamp: &str, body: &str) -> Result<()> {
        let rotate = self.current.as_ref().map_or(true, |f| f.stamp != stamp);
        if rotate {
            let path = dir.join(self.file_name(stamp));
            let existed = path.exists();
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            if !existed {
                writeln!(file, "{}", self.header)?;
            }
            tracing::info!(path = %path.display(), "metrics file opened");
            self.current = Some(OpenFile {
                stamp: stamp.to_string(),
                file,
            });
            self.prune(dir);
        }

        let Some(open) = self.current.as_mut() else {
            return Err(MeterError::InvalidState("file sink has no open file"));
        };
        let res = open.file.write_all(body.as_bytes()).and_then(|_| open.file.flush());
        if let Err(e) = res {
            // reopen on the next cycle
            self.current = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete all but the newest `keep` files of this set.
    fn prune(&self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list metrics directory");
                return;
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| self.owns(n))
            .collect();
        if names.len() <= self.keep {
            return;
        }
        names.sort();
        let excess = names.len() - self.keep;
        for name in &names[..excess] {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "old metrics file removed"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove old metrics file"),
            }
        }
    }

    fn owns(&self, name: &str) -> bool {
        let Some(stamp) = name
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_suffix(&self.suffix))
        else {
            return false;
        };
        // `{base}-requests-x` also starts with `{base}-`
        !stamp.is_empty() && !stamp.starts_with(&format!("{REQUESTS_TAG}-"))
    }
}

fn cycle_time(millis: u64) -> DateTime<Utc> {
    i64::try_from(millis)
        .ok()
        .and_then(|m| Utc.timestamp_millis_opt(m).single())
        .unwrap_or_else(Utc::now)
}

/// Render `format` without letting chrono panic on a bad specifier.
pub fn render_stamp(format: &str, at: DateTime<Utc>) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", at.format(format))
        .map_err(|_| MeterError::Config(format!("file.timestamp_format {format:?} is invalid")))?;
    Ok(out)
}
