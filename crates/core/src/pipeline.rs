//! Pipeline for normalizing JSONL record files.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::normalizer::{LineOutcome, LineStatus, Normalizer, NormalizerConfig};
use crate::record::{RawLine, RecordReader, RecordWriter};
use crate::report::Report;
use crate::DEFAULT_BATCH_SIZE;

/// Configuration for the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    /// Normalize records of a batch in parallel.
    pub parallel: bool,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            parallel: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// I/O failure inside a record stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open input {path:?}: {source}")]
    OpenInput { path: PathBuf, source: io::Error },
    #[error("failed to create output {path:?}: {source}")]
    CreateOutput { path: PathBuf, source: io::Error },
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("no .jsonl files found under {0:?}")]
    NoInputFiles(PathBuf),
}

/// Discover all JSONL files in a directory, sorted.
pub fn discover_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Normalize every record of `reader` into `writer`, in input order.
///
/// Each line is written as soon as it (or its batch) is done.
pub fn process_stream<R, W>(
    reader: R,
    writer: W,
    normalizer: &Normalizer,
    config: &PipelineConfig,
) -> Result<Report, StreamError>
where
    R: BufRead,
    W: Write,
{
    let mut lines = RecordReader::new(reader);
    let mut writer = RecordWriter::new(writer);
    let mut report = Report::default();

    if config.parallel {
        let batch_size = config.batch_size.max(1);
        loop {
            let batch: Vec<RawLine> = lines
                .by_ref()
                .take(batch_size)
                .collect::<io::Result<_>>()
                .map_err(StreamError::Read)?;
            if batch.is_empty() {
                break;
            }
            let outcomes: Vec<LineOutcome> = batch
                .par_iter()
                .map(|line| normalizer.normalize_line(line))
                .collect();
            for outcome in outcomes {
                emit(&mut writer, &mut report, outcome)?;
            }
        }
    } else {
        for line in lines {
            let line = line.map_err(StreamError::Read)?;
            emit(&mut writer, &mut report, normalizer.normalize_line(&line))?;
        }
    }

    writer.flush().map_err(StreamError::Write)?;
    Ok(report)
}

fn emit<W: Write>(
    writer: &mut RecordWriter<W>,
    report: &mut Report,
    outcome: LineOutcome,
) -> Result<(), StreamError> {
    writer.write_raw(&outcome.bytes).map_err(StreamError::Write)?;
    match &outcome.status {
        LineStatus::Normalized(fixes) => report.tally(outcome.index, fixes),
        LineStatus::PassedThrough { reason, excerpt } => {
            report.tally_pass_through(outcome.index, reason, excerpt)
        }
    }
    Ok(())
}

/// Normalize a single JSONL file.
pub fn process_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<Report, PipelineError> {
    let normalizer = Normalizer::new(config.normalizer.clone());
    normalize_file(input, output, &normalizer, config)
}

fn normalize_file(
    input: &Path,
    output: &Path,
    normalizer: &Normalizer,
    config: &PipelineConfig,
) -> Result<Report, PipelineError> {
    let reader = File::open(input).map_err(|source| PipelineError::OpenInput {
        path: input.to_path_buf(),
        source,
    })?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::CreateOutput {
            path: output.to_path_buf(),
            source,
        })?;
    }
    let writer = File::create(output).map_err(|source| PipelineError::CreateOutput {
        path: output.to_path_buf(),
        source,
    })?;

    let mut report = process_stream(BufReader::new(reader), writer, normalizer, config)
        .map_err(|e| match e {
            StreamError::Read(source) => PipelineError::Read {
                path: input.to_path_buf(),
                source,
            },
            StreamError::Write(source) => PipelineError::Write {
                path: output.to_path_buf(),
                source,
            },
        })?;
    report.files = 1;
    report.output_path = Some(output.to_path_buf());

    info!(
        input = %input.display(),
        records = report.records_read,
        fixed = report.records_fixed,
        "Normalized file"
    );
    Ok(report)
}

/// Normalize a file, or every `.jsonl` file under a directory.
///
/// Directory inputs are mirrored into `output` under their relative paths.
pub fn process_path(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<Report, PipelineError> {
    if !input.is_dir() {
        return process_file(input, output, config);
    }

    let files = discover_jsonl_files(input);
    if files.is_empty() {
        return Err(PipelineError::NoInputFiles(input.to_path_buf()));
    }

    let normalizer = Normalizer::new(config.normalizer.clone());
    let total_files = files.len();
    let mut total = Report::default();
    for (count, path) in files.iter().enumerate() {
        let relative = path.strip_prefix(input).unwrap_or(path.as_path());
        let report = normalize_file(path, &output.join(relative), &normalizer, config)?;
        total.merge(report);
        if (count + 1) % 100 == 0 {
            info!("Processed {}/{} files...", count + 1, total_files);
        }
    }
    total.output_path = Some(output.to_path_buf());
    Ok(total)
}
