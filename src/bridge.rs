use crate::embed::Embedder;
use crate::protocol::{self, ErrorRecord, LineError, OutputBatch};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

const FAILURE_SENTINEL: &str = "[]\n";

/// What one input line turned into.
#[derive(Debug)]
pub enum LineOutcome {
    Skipped,
    Embedded(OutputBatch),
    Failed(LineError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub lines: u64,
    pub batches: u64,
    pub texts: u64,
    pub failures: u64,
}

pub fn process_line<E: Embedder + ?Sized>(embedder: &mut E, raw: &[u8]) -> LineOutcome {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(err) => return LineOutcome::Failed(err.into()),
    };
    if protocol::is_blank(line) {
        return LineOutcome::Skipped;
    }
    match embed_line(embedder, line) {
        Ok(batch) => LineOutcome::Embedded(batch),
        Err(err) => LineOutcome::Failed(err),
    }
}

fn embed_line<E: Embedder + ?Sized>(
    embedder: &mut E,
    line: &str,
) -> Result<OutputBatch, LineError> {
    let texts = protocol::decode_batch(line)?;
    let vectors = embedder.embed_texts(&texts).map_err(LineError::Embed)?;
    if vectors.len() != texts.len() {
        return Err(LineError::CountMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }
    let dims = embedder.dims();
    if let Some((index, vec)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
        return Err(LineError::DimensionMismatch {
            index,
            expected: dims,
            got: vec.len(),
        });
    }
    Ok(vectors)
}

/// Reads lines until end of input, answering each non-blank one with
/// exactly one stdout line. Only I/O failures on the streams themselves
/// end the loop early.
pub fn run<E, R, O, W>(
    embedder: &mut E,
    mut input: R,
    out: &mut O,
    err: &mut W,
) -> Result<BridgeStats>
where
    E: Embedder + ?Sized,
    R: BufRead,
    O: Write,
    W: Write,
{
    let mut stats = BridgeStats::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = input
            .read_until(b'\n', &mut buf)
            .context("failed to read input")?;
        if read == 0 {
            break;
        }
        stats.lines += 1;

        match process_line(embedder, &buf) {
            LineOutcome::Skipped => continue,
            LineOutcome::Embedded(batch) => match protocol::encode_line(&batch) {
                Ok(line) => {
                    stats.batches += 1;
                    stats.texts += batch.len() as u64;
                    debug!(line = stats.lines, texts = batch.len(), "batch written");
                    write_flushed(out, &line)?;
                }
                Err(e) => report_failure(&LineError::Json(e), stats.lines, &mut stats, out, err)?,
            },
            LineOutcome::Failed(e) => report_failure(&e, stats.lines, &mut stats, out, err)?,
        }
    }

    info!(
        model = embedder.model_name(),
        lines = stats.lines,
        batches = stats.batches,
        texts = stats.texts,
        failures = stats.failures,
        "end of input"
    );
    Ok(stats)
}

fn report_failure<O: Write, W: Write>(
    error: &LineError,
    line_no: u64,
    stats: &mut BridgeStats,
    out: &mut O,
    err: &mut W,
) -> Result<()> {
    stats.failures += 1;
    warn!(line = line_no, error = %error, "line failed");
    let record = protocol::encode_line(&ErrorRecord::from(error))
        .context("failed to encode error record")?;
    write_flushed(err, &record)?;
    write_flushed(out, FAILURE_SENTINEL)
}

fn write_flushed<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.flush())
        .context("failed to write output")
}
