//! The parallel alignment pipeline.
//!
//! One reader thread parses mapping records and feeds a bounded channel; N
//! worker threads align records (each owning its own FASTA handles and
//! wavefront aligner); one writer thread appends PAF lines in completion
//! order. Records are uniquely owned values moved through the channels, so
//! termination is simply channel disconnect: the reader drops its sender
//! when the input is exhausted, workers exit when the sequence channel
//! closes, and each writer drains its channel until every producer is
//! gone. A record can never be lost in a queue that all consumers have
//! already left.
//!
//! Memory stays bounded because the channels have fixed capacity and
//! producers block when one fills up.

use crate::aligner::AlignerAdapter;
use crate::constants::PIPELINE_QUEUE_CAP;
use crate::fasta::FastaHandle;
use crate::mapping::{self, MappingRecord};
use crate::params::AlignParams;
use crate::progress::ProgressMeter;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Counters of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Mapping records read and dispatched.
    pub records: u64,
    /// PAF lines written.
    pub emitted: u64,
    /// Query bases aligned.
    pub aligned_bp: u64,
}

/// Run the alignment pipeline to completion.
pub fn run(params: Arc<AlignParams>) -> Result<PipelineStats> {
    // pre-pass: total query bases, for the progress meter
    let total_alignment_length = prepass_total_length(&params.mapping_path)?;
    let progress = Arc::new(ProgressMeter::new(total_alignment_length));
    let threads = params.effective_threads();
    info!(
        "aligning {} bp of mappings with {} worker threads",
        total_alignment_length, threads
    );

    let (seq_tx, seq_rx) = bounded::<MappingRecord>(PIPELINE_QUEUE_CAP);
    let (paf_tx, paf_rx) = bounded::<String>(PIPELINE_QUEUE_CAP);
    let (tsv_tx, tsv_rx) = optional_channel(params.tsv_prefix.is_some());
    let (patching_tx, patching_rx) = optional_channel(params.patching_tsv_path.is_some());

    // reader
    let reader_params = params.clone();
    let reader = thread::spawn(move || read_mappings(&reader_params, seq_tx));

    // writers
    let writer_params = params.clone();
    let writer = thread::spawn(move || write_paf(&writer_params, paf_rx));
    let tsv_writer = tsv_rx.map(|rx| {
        let prefix = params.tsv_prefix.clone().unwrap_or_default();
        thread::spawn(move || write_numbered_tsv(&prefix, rx))
    });
    let patching_writer = patching_rx.map(|rx| {
        let path = params.patching_tsv_path.clone().unwrap_or_default();
        thread::spawn(move || write_patching_tsv(&path, rx))
    });

    // workers
    let mut workers = Vec::with_capacity(threads);
    for _ in 0..threads {
        let params = params.clone();
        let progress = progress.clone();
        let seq_rx = seq_rx.clone();
        let paf_tx = paf_tx.clone();
        let tsv_tx = tsv_tx.clone();
        let patching_tx = patching_tx.clone();
        workers.push(thread::spawn(move || {
            worker_loop(&params, &progress, seq_rx, paf_tx, tsv_tx, patching_tx)
        }));
    }
    // drop the main copies so channels disconnect once their threads finish
    drop(seq_rx);
    drop(paf_tx);
    drop(tsv_tx);
    drop(patching_tx);

    let records = reader
        .join()
        .map_err(|_| anyhow!("reader thread panicked"))??;
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))??;
    }
    let emitted = writer
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;
    if let Some(handle) = tsv_writer {
        handle
            .join()
            .map_err(|_| anyhow!("tsv writer thread panicked"))??;
    }
    if let Some(handle) = patching_writer {
        handle
            .join()
            .map_err(|_| anyhow!("patching tsv writer thread panicked"))??;
    }

    progress.finish();
    let stats = PipelineStats {
        records,
        emitted,
        aligned_bp: progress.done(),
    };
    info!(
        "count of mapped records = {}, alignments written = {}, total aligned bp = {}",
        stats.records, stats.emitted, stats.aligned_bp
    );
    Ok(stats)
}

fn optional_channel(active: bool) -> (Option<Sender<String>>, Option<Receiver<String>>) {
    if active {
        let (tx, rx) = bounded::<String>(PIPELINE_QUEUE_CAP);
        (Some(tx), Some(rx))
    } else {
        (None, None)
    }
}

/// Sum of `query_end - query_start` over the mapping file; also validates
/// every line before any thread starts.
fn prepass_total_length(path: &Path) -> Result<u64> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open mapping list {}", path.display()))?,
    );
    let mut total = 0u64;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let rec = mapping::parse_mapping_line(&line)
            .with_context(|| format!("malformed mapping at {}:{}", path.display(), lineno + 1))?;
        total += rec.query_end - rec.query_start;
    }
    Ok(total)
}

/// Reader: parse records, assign split ranks, push into the pipeline.
fn read_mappings(params: &AlignParams, seq_tx: Sender<MappingRecord>) -> Result<u64> {
    let path = &params.mapping_path;
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open mapping list {}", path.display()))?,
    );
    let mut records = 0u64;
    let mut prev_query = String::new();
    let mut rank = 0u32;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut rec = mapping::parse_mapping_line(&line)
            .with_context(|| format!("malformed mapping at {}:{}", path.display(), lineno + 1))?;
        if rec.query_name == prev_query {
            rank += 1;
        } else {
            prev_query.clone_from(&rec.query_name);
            rank = 0;
        }
        rec.rank = rank;
        seq_tx
            .send(rec)
            .map_err(|_| anyhow!("sequence channel closed before input was exhausted"))?;
        records += 1;
    }
    Ok(records)
}

/// Worker: own FASTA handles and aligner, drain the sequence channel.
fn worker_loop(
    params: &Arc<AlignParams>,
    progress: &ProgressMeter,
    seq_rx: Receiver<MappingRecord>,
    paf_tx: Sender<String>,
    tsv_tx: Option<Sender<String>>,
    patching_tx: Option<Sender<String>>,
) -> Result<()> {
    let mut target = FastaHandle::open(&params.target_path)
        .with_context(|| format!("opening target FASTA {}", params.target_path.display()))?;
    let mut query = FastaHandle::open(&params.query_path)
        .with_context(|| format!("opening query FASTA {}", params.query_path.display()))?;
    let mut adapter = AlignerAdapter::new(params.clone());

    while let Ok(rec) = seq_rx.recv() {
        let span = rec.query_end - rec.query_start;
        let output = adapter.align_record(&rec, &mut target, &mut query)?;
        progress.increment(span);
        if let Some(line) = output.paf {
            paf_tx
                .send(line)
                .map_err(|_| anyhow!("paf channel closed"))?;
        }
        if let (Some(tx), Some(row)) = (&tsv_tx, output.tsv) {
            tx.send(row).map_err(|_| anyhow!("tsv channel closed"))?;
        }
        if let (Some(tx), Some(row)) = (&patching_tx, output.patching_tsv) {
            tx.send(row)
                .map_err(|_| anyhow!("patching tsv channel closed"))?;
        }
    }
    Ok(())
}

/// Writer: append PAF lines in completion order.
fn write_paf(params: &AlignParams, paf_rx: Receiver<String>) -> Result<u64> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&params.output_path)
        .with_context(|| format!("failed to open output {}", params.output_path.display()))?;
    let mut out = BufWriter::new(file);
    let mut emitted = 0u64;
    while let Ok(line) = paf_rx.recv() {
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        emitted += 1;
    }
    out.flush()?;
    Ok(emitted)
}

/// One numbered TSV file per alignment, in completion order.
fn write_numbered_tsv(prefix: &str, rx: Receiver<String>) -> Result<()> {
    let mut completed = 0u64;
    while let Ok(row) = rx.recv() {
        let path = format!("{prefix}{completed}.tsv");
        let mut out = BufWriter::new(
            File::create(&path).with_context(|| format!("failed to create {path}"))?,
        );
        out.write_all(row.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        completed += 1;
    }
    Ok(())
}

/// Single TSV with the flank padding applied per record.
fn write_patching_tsv(path: &Path, rx: Receiver<String>) -> Result<()> {
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
    );
    while let Ok(row) = rx.recv() {
        out.write_all(row.as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
