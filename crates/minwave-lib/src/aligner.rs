//! Wavefront aligner adapter.
//!
//! Turns one mapping record into at most one PAF line: fetches the
//! flanked reference and the query interval, orients and normalizes them,
//! runs the external affine wavefront aligner, and formats the result.
//! The flanks around the reference interval let downstream boundary
//! patching see context beyond a noisy mapping edge; the aligner itself
//! runs on the core interval.

use crate::constants::PAF_MAPPING_QUALITY;
use crate::fasta::FastaHandle;
use crate::hash::{self, Strand};
use crate::mapping::MappingRecord;
use crate::params::AlignParams;
use anyhow::{anyhow, Result};
use lib_wfa2::affine_wavefront::{AffineWavefronts, AlignmentStatus, MemoryMode};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

/// Outputs of one record: each stream is present only when produced.
#[derive(Debug, Default)]
pub struct RecordOutput {
    /// PAF line (without trailing newline), absent when the alignment
    /// failed to complete or fell below the identity floor.
    pub paf: Option<String>,
    /// Per-alignment summary TSV row.
    pub tsv: Option<String>,
    /// Flank padding TSV row.
    pub patching_tsv: Option<String>,
}

/// Wraps one `AffineWavefronts` instance; owned by exactly one worker.
pub struct AlignerAdapter {
    wf: AffineWavefronts,
    params: Arc<AlignParams>,
}

impl AlignerAdapter {
    /// Build an aligner with the configured penalties (match cost 0, as
    /// WFA requires) in ultralow-memory (bidirectional) mode.
    pub fn new(params: Arc<AlignParams>) -> Self {
        let mut wf = AffineWavefronts::with_penalties(
            0,
            params.wfa_mismatch_score,
            params.wfa_gap_opening_score,
            params.wfa_gap_extension_score,
        );
        wf.set_memory_mode(MemoryMode::Ultralow);
        Self { wf, params }
    }

    /// Align one mapping record. Fetch or coordinate failures are errors
    /// (fatal upstream); an incomplete or below-threshold alignment is a
    /// success with no PAF output.
    pub fn align_record(
        &mut self,
        rec: &MappingRecord,
        target: &mut FastaHandle,
        query: &mut FastaHandle,
    ) -> Result<RecordOutput> {
        let t0 = Instant::now();

        let target_len = target
            .seq_len(&rec.target_name)
            .ok_or_else(|| anyhow!("target contig {} not in FASTA index", rec.target_name))?;
        let query_len = query
            .seq_len(&rec.query_name)
            .ok_or_else(|| anyhow!("query contig {} not in FASTA index", rec.query_name))?;
        if rec.target_start > rec.target_end || rec.target_end > target_len {
            return Err(anyhow!(
                "mapping interval {}:{}-{} out of range (contig length {})",
                rec.target_name,
                rec.target_start,
                rec.target_end,
                target_len
            ));
        }
        if rec.query_start > rec.query_end || rec.query_end > query_len {
            return Err(anyhow!(
                "mapping interval {}:{}-{} out of range (contig length {})",
                rec.query_name,
                rec.query_start,
                rec.query_end,
                query_len
            ));
        }

        let target_span = (rec.target_end - rec.target_start) as usize;
        let query_span = (rec.query_end - rec.query_start) as usize;
        if target_span == 0 || query_span == 0 {
            return Ok(RecordOutput::default());
        }

        // flanks for boundary patching around the mapped interval
        let head_pad = rec.target_start.min(self.params.wflign_max_len_minor);
        let tail_pad = (target_len - rec.target_end).min(self.params.wflign_max_len_minor);

        let mut target_buf = target.fetch(
            &rec.target_name,
            rec.target_start - head_pad,
            rec.target_end + tail_pad,
        )?;
        hash::normalize_dna_in_place(&mut target_buf);
        let target_core = &target_buf[head_pad as usize..head_pad as usize + target_span];

        let mut query_buf = query.fetch(&rec.query_name, rec.query_start, rec.query_end)?;
        hash::normalize_dna_in_place(&mut query_buf);
        let query_oriented = match rec.strand {
            Strand::Fwd => query_buf,
            Strand::Rev => hash::reverse_complement(&query_buf),
        };

        let status = self.wf.align(target_core, &query_oriented);
        if !matches!(status, AlignmentStatus::Completed) {
            return Ok(RecordOutput::default());
        }
        let score = self.wf.score();
        let stats = CigarStats::from_ops(self.wf.cigar());

        let identity = stats.block_identity();
        if identity < self.params.min_identity {
            return Ok(RecordOutput::default());
        }

        let paf = self.format_paf(rec, query_len, target_len, score, &stats, target_core);
        let tsv = self.params.tsv_prefix.as_ref().map(|_| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.2}\t{}",
                rec.query_name,
                rec.target_name,
                rec.query_start,
                rec.query_end,
                rec.target_start,
                rec.target_end,
                rec.strand.symbol(),
                score,
                stats.matches,
                stats.mismatches,
                stats.ins_bases,
                stats.del_bases,
                identity,
                rec.estimated_identity,
                t0.elapsed().as_micros()
            )
        });
        let patching_tsv = self.params.patching_tsv_path.as_ref().map(|_| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                rec.query_name, rec.target_name, rec.target_start, rec.target_end, head_pad, tail_pad
            )
        });

        Ok(RecordOutput {
            paf: Some(paf),
            tsv,
            patching_tsv,
        })
    }

    fn format_paf(
        &self,
        rec: &MappingRecord,
        query_len: u64,
        target_len: u64,
        score: i32,
        stats: &CigarStats,
        target_core: &[u8],
    ) -> String {
        // rank-suffix split query names so SAM consumers can tell split
        // alignments of one query apart
        let query_name = if self.params.split && self.params.sam_format {
            format!("{}_{}", rec.query_name, rec.rank)
        } else {
            rec.query_name.clone()
        };

        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            query_name,
            query_len,
            rec.query_start,
            rec.query_end,
            rec.strand.symbol(),
            rec.target_name,
            target_len,
            rec.target_start,
            rec.target_end,
            stats.matches,
            stats.block_len(),
            PAF_MAPPING_QUALITY
        );
        let _ = write!(
            line,
            "\tNM:i:{}\tAS:i:{}\tgi:f:{:.6}\tbi:f:{:.6}",
            stats.edit_distance(),
            score,
            stats.gap_compressed_identity(),
            stats.block_identity()
        );
        if self.params.emit_md_tag {
            let _ = write!(line, "\t{}", stats.md_tag(target_core));
        }
        let _ = write!(line, "\tcg:Z:{}", stats.cigar_string());
        line
    }
}

/// Operation tallies and run-length encoding of a per-base CIGAR.
///
/// The aligner is invoked as `align(target, query)`, so an `I` consumes
/// query and a `D` consumes target, matching PAF/SAM conventions.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CigarStats {
    /// Run-length encoded operations.
    pub runs: Vec<(u8, u64)>,
    /// Matched bases.
    pub matches: u64,
    /// Mismatched bases.
    pub mismatches: u64,
    /// Insertion events (gaps in the target).
    pub ins_events: u64,
    /// Inserted bases.
    pub ins_bases: u64,
    /// Deletion events (gaps in the query).
    pub del_events: u64,
    /// Deleted bases.
    pub del_bases: u64,
}

impl CigarStats {
    /// Tally a per-base operation string (`M`/`=`/`X`/`I`/`D`).
    pub fn from_ops(ops: &[u8]) -> Self {
        let mut stats = Self::default();
        for &raw in ops {
            let op = if raw == b'=' { b'M' } else { raw };
            match stats.runs.last_mut() {
                Some((last, len)) if *last == op => *len += 1,
                _ => stats.runs.push((op, 1)),
            }
            match op {
                b'M' => stats.matches += 1,
                b'X' => stats.mismatches += 1,
                b'I' => stats.ins_bases += 1,
                b'D' => stats.del_bases += 1,
                _ => {}
            }
        }
        for &(op, _) in &stats.runs {
            match op {
                b'I' => stats.ins_events += 1,
                b'D' => stats.del_events += 1,
                _ => {}
            }
        }
        stats
    }

    /// Bases of query consumed.
    pub fn query_span(&self) -> u64 {
        self.matches + self.mismatches + self.ins_bases
    }

    /// Bases of target consumed.
    pub fn target_span(&self) -> u64 {
        self.matches + self.mismatches + self.del_bases
    }

    /// Total alignment columns.
    pub fn block_len(&self) -> u64 {
        self.matches + self.mismatches + self.ins_bases + self.del_bases
    }

    /// Mismatches plus gap bases.
    pub fn edit_distance(&self) -> u64 {
        self.mismatches + self.ins_bases + self.del_bases
    }

    /// Matches over all alignment columns.
    pub fn block_identity(&self) -> f64 {
        let len = self.block_len();
        if len == 0 {
            0.0
        } else {
            self.matches as f64 / len as f64
        }
    }

    /// Matches over columns with gaps counted once per event.
    pub fn gap_compressed_identity(&self) -> f64 {
        let denom = self.matches + self.mismatches + self.ins_events + self.del_events;
        if denom == 0 {
            0.0
        } else {
            self.matches as f64 / denom as f64
        }
    }

    /// Run-length encoded CIGAR string.
    pub fn cigar_string(&self) -> String {
        let mut out = String::with_capacity(self.runs.len() * 4);
        for &(op, len) in &self.runs {
            let _ = write!(out, "{}{}", len, op as char);
        }
        out
    }

    /// MD tag over the aligned target slice.
    pub fn md_tag(&self, target: &[u8]) -> String {
        let mut out = String::from("MD:Z:");
        let mut match_run = 0u64;
        let mut tpos = 0usize;
        for &(op, len) in &self.runs {
            match op {
                b'M' => {
                    match_run += len;
                    tpos += len as usize;
                }
                b'X' => {
                    for _ in 0..len {
                        let _ = write!(out, "{}", match_run);
                        match_run = 0;
                        out.push(target[tpos] as char);
                        tpos += 1;
                    }
                }
                b'D' => {
                    let _ = write!(out, "{}", match_run);
                    match_run = 0;
                    out.push('^');
                    for _ in 0..len {
                        out.push(target[tpos] as char);
                        tpos += 1;
                    }
                }
                _ => {}
            }
        }
        let _ = write!(out, "{}", match_run);
        out
    }
}
