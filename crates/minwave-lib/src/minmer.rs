//! Streaming minmer selection over a DNA sequence.
//!
//! A minmer is a k-mer whose canonical hash is among the `s` smallest in a
//! sliding window of `seg_length` bases (a bottom-s generalization of a
//! minimizer). The stream walks the sequence once, maintaining the window
//! occupancy in an ordered multiset so that each step costs O(log w) plus
//! O(s) to refresh the sketch, and emits one window record per maximal run
//! of consecutive windows in which a hash stays in the sketch.

use crate::hash::{self, Strand};
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, VecDeque};

/// One minmer occurrence: a hash that is part of the bottom-s sketch for
/// every window position in `[wpos_start, wpos_end)` of sequence `seq_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MinmerWindow {
    /// Canonical k-mer hash.
    pub hash: u64,
    /// First window position covered (inclusive).
    pub wpos_start: u64,
    /// Past-the-end window position.
    pub wpos_end: u64,
    /// Sequence this occurrence belongs to.
    pub seq_id: u32,
    /// Orientation of the winning k-mer.
    pub strand: Strand,
}

/// A k-mer currently inside the sliding window.
struct KmerEntry {
    pos: usize,
    hash: u64,
    strand: Strand,
}

/// Occupancy of one hash value within the current window.
#[derive(Default)]
struct Occupancy {
    count: u32,
    strand_votes: i32,
}

impl Occupancy {
    fn strand(&self) -> Strand {
        if self.strand_votes >= 0 {
            Strand::Fwd
        } else {
            Strand::Rev
        }
    }
}

/// Compute the minmer windows of one sequence.
///
/// The input may be mixed-case and may contain ambiguous bases; every
/// k-mer covering a non-ACGT byte is skipped. Sequences shorter than
/// `seg_length` produce no output (callers skip them with a warning before
/// sketching). The result is ordered by `wpos_start` and deterministic for
/// a fixed sequence and parameter set.
pub fn window_minmers(
    seq: &[u8],
    seq_id: u32,
    kmer_size: usize,
    seg_length: u64,
    sketch_size: u64,
) -> Vec<MinmerWindow> {
    let len = seq.len();
    let seg = seg_length as usize;
    let s = sketch_size as usize;
    if kmer_size == 0 || s == 0 || seg < kmer_size || len < seg {
        return Vec::new();
    }

    // k-mer slots per window, and total k-mer/window counts
    let w = seg - kmer_size + 1;
    let num_kmers = len - kmer_size + 1;
    let num_windows = (num_kmers - w + 1) as u64;

    let norm = hash::normalize_dna(seq);
    let rc = hash::reverse_complement(&norm);

    let mut out: Vec<MinmerWindow> = Vec::new();
    // hash -> index of its currently open record in `out`
    let mut open: AHashMap<u64, usize> = AHashMap::new();
    let mut active: VecDeque<KmerEntry> = VecDeque::with_capacity(w);
    let mut ordered: BTreeMap<u64, Occupancy> = BTreeMap::new();
    let mut sketch_prev: AHashSet<u64> = AHashSet::with_capacity(s);
    let mut sketch_now: Vec<u64> = Vec::with_capacity(s);

    // Most recent ambiguous base among the scanned prefix; a k-mer at
    // position i is valid iff no N lies in [i, i + k).
    let mut last_ambiguous: Option<usize> = None;
    for (j, &b) in norm.iter().take(kmer_size - 1).enumerate() {
        if !hash::is_canonical_base(b) {
            last_ambiguous = Some(j);
        }
    }

    for i in 0..num_kmers {
        let tail = i + kmer_size - 1;
        if !hash::is_canonical_base(norm[tail]) {
            last_ambiguous = Some(tail);
        }
        if last_ambiguous.map_or(true, |p| p < i) {
            let fwd = &norm[i..i + kmer_size];
            let rev = &rc[len - i - kmer_size..len - i];
            let (h, strand) = hash::canonical_kmer_hash(fwd, rev);
            active.push_back(KmerEntry {
                pos: i,
                hash: h,
                strand,
            });
            let occ = ordered.entry(h).or_default();
            occ.count += 1;
            occ.strand_votes += strand.to_i8() as i32;
        }

        if i + 1 < w {
            continue;
        }
        let wpos = i + 1 - w;

        // expire k-mers that fell out of window [wpos, wpos + w)
        while active.front().is_some_and(|e| e.pos < wpos) {
            if let Some(e) = active.pop_front() {
                if let Some(occ) = ordered.get_mut(&e.hash) {
                    occ.count -= 1;
                    occ.strand_votes -= e.strand.to_i8() as i32;
                    if occ.count == 0 {
                        ordered.remove(&e.hash);
                    }
                }
            }
        }

        // bottom-s distinct hashes of this window
        sketch_now.clear();
        sketch_now.extend(ordered.keys().take(s).copied());

        for &h in &sketch_now {
            if !sketch_prev.remove(&h) {
                // entered the sketch at this window
                let strand = ordered
                    .get(&h)
                    .map(Occupancy::strand)
                    .unwrap_or(Strand::Fwd);
                open.insert(h, out.len());
                out.push(MinmerWindow {
                    hash: h,
                    wpos_start: wpos as u64,
                    wpos_end: wpos as u64 + 1,
                    seq_id,
                    strand,
                });
            }
        }
        // whatever is left in sketch_prev dropped out of the sketch
        for h in sketch_prev.drain() {
            if let Some(idx) = open.remove(&h) {
                out[idx].wpos_end = wpos as u64;
            }
        }
        sketch_prev.extend(sketch_now.iter().copied());
    }

    // close records that survive to the last window
    for (_, idx) in open.drain() {
        out[idx].wpos_end = num_windows;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Deterministic pseudo-random DNA.
    fn random_dna(len: usize, mut state: u64) -> Vec<u8> {
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                b"ACGT"[(state >> 33) as usize % 4]
            })
            .collect()
    }

    /// Brute-force bottom-s sketch per window, expressed as window records.
    fn naive_window_minmers(
        seq: &[u8],
        seq_id: u32,
        k: usize,
        seg: u64,
        s: u64,
    ) -> BTreeSet<(u64, u64, u64, u32)> {
        let norm = hash::normalize_dna(seq);
        let rc = hash::reverse_complement(&norm);
        let len = norm.len();
        let w = seg as usize - k + 1;
        let num_kmers = len - k + 1;
        let num_windows = num_kmers - w + 1;

        let hashes: Vec<Option<u64>> = (0..num_kmers)
            .map(|i| {
                let fwd = &norm[i..i + k];
                if fwd.iter().all(|&b| hash::is_canonical_base(b)) {
                    let rev = &rc[len - i - k..len - i];
                    Some(hash::canonical_kmer_hash(fwd, rev).0)
                } else {
                    None
                }
            })
            .collect();

        let sketches: Vec<BTreeSet<u64>> = (0..num_windows)
            .map(|j| {
                let mut distinct: BTreeSet<u64> =
                    hashes[j..j + w].iter().flatten().copied().collect();
                while distinct.len() > s as usize {
                    let last = *distinct.iter().next_back().unwrap();
                    distinct.remove(&last);
                }
                distinct
            })
            .collect();

        // collapse per-hash membership into maximal runs
        let mut runs = BTreeSet::new();
        let all_hashes: BTreeSet<u64> = sketches.iter().flatten().copied().collect();
        for h in all_hashes {
            let mut start = None;
            for (j, sk) in sketches.iter().enumerate() {
                match (sk.contains(&h), start) {
                    (true, None) => start = Some(j as u64),
                    (false, Some(st)) => {
                        runs.insert((h, st, j as u64, seq_id));
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(st) = start {
                runs.insert((h, st, num_windows as u64, seq_id));
            }
        }
        runs
    }

    #[test]
    fn test_matches_brute_force() {
        let seq = random_dna(400, 7);
        let windows = window_minmers(&seq, 3, 11, 100, 4);
        let got: BTreeSet<_> = windows
            .iter()
            .map(|m| (m.hash, m.wpos_start, m.wpos_end, m.seq_id))
            .collect();
        let expected = naive_window_minmers(&seq, 3, 11, 100, 4);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_ordered_and_in_bounds() {
        let seq = random_dna(2_000, 99);
        let seg = 500u64;
        let windows = window_minmers(&seq, 0, 15, seg, 5);
        assert!(!windows.is_empty());
        let num_windows = (seq.len() as u64) - seg + 1;
        let mut prev_start = 0;
        for m in &windows {
            assert!(m.wpos_start < m.wpos_end);
            assert!(m.wpos_end <= num_windows);
            assert!(m.wpos_start >= prev_start, "output ordered by wpos_start");
            prev_start = m.wpos_start;
        }
    }

    #[test]
    fn test_deterministic() {
        let seq = random_dna(1_500, 5);
        let a = window_minmers(&seq, 1, 15, 300, 8);
        let b = window_minmers(&seq, 1, 15, 300, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_sequence_is_empty() {
        let seq = random_dna(99, 1);
        assert!(window_minmers(&seq, 0, 15, 100, 5).is_empty());
    }

    #[test]
    fn test_ambiguous_bases_break_kmers() {
        // all k-mers cover the central N, so nothing can be sketched
        let mut seq = random_dna(30, 11);
        seq[15] = b'N';
        assert!(window_minmers(&seq, 0, 20, 30, 4).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let seq = random_dna(600, 21);
        let lower: Vec<u8> = seq.iter().map(u8::to_ascii_lowercase).collect();
        assert_eq!(
            window_minmers(&seq, 0, 13, 200, 6),
            window_minmers(&lower, 0, 13, 200, 6)
        );
    }

    #[test]
    fn test_runs_are_merged() {
        // no two records of the same hash may touch: that would be a run
        // that should have been merged into one window record
        let seq = random_dna(3_000, 17);
        let windows = window_minmers(&seq, 0, 15, 250, 3);
        let mut by_hash: AHashMap<u64, Vec<(u64, u64)>> = AHashMap::new();
        for m in &windows {
            by_hash
                .entry(m.hash)
                .or_default()
                .push((m.wpos_start, m.wpos_end));
        }
        for (_, mut spans) in by_hash {
            spans.sort_unstable();
            for pair in spans.windows(2) {
                assert!(pair[0].1 < pair[1].0);
            }
        }
    }

    #[test]
    fn test_small_sketch_keeps_all_hashes() {
        // a window with fewer distinct hashes than s keeps every hash
        let seq = b"ACGTACGTACGTACGTACGT".to_vec();
        let windows = window_minmers(&seq, 0, 4, 20, 64);
        // period-4 repeat: ACGT and GTAC are palindromic, CGTA/TACG are
        // reverse complements of each other, so 3 canonical hashes remain,
        // each in the sketch for the whole (single) window
        assert_eq!(windows.len(), 3);
        for m in &windows {
            assert_eq!((m.wpos_start, m.wpos_end), (0, 1));
        }
    }
}
