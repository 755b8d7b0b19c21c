//! Constants shared across the library.

/// Seed for MurmurHash3 k-mer hashing. Changing it changes every sketch,
/// so it is part of the on-disk format contract.
pub const KMER_HASH_SEED: u32 = 42;

/// Identity (in percent) assumed for a mapping record whose identity tag
/// cannot be parsed.
pub const FIXED_PERCENTAGE_IDENTITY: f64 = 85.0;

/// Default k-mer size for sketching.
pub const DEFAULT_KMER_SIZE: usize = 19;

/// Default segment (sliding window) length in bases.
pub const DEFAULT_SEGMENT_LENGTH: u64 = 5_000;

/// Default bottom-s sketch size per window.
pub const DEFAULT_SKETCH_SIZE: u64 = 64;

/// Default percentage of unique minmers pruned as too frequent.
pub const DEFAULT_KMER_PCT_THRESHOLD: f64 = 0.001;

/// Default flank padding around the reference interval of a mapping,
/// in bases, so the aligner can correct noisy mapping boundaries.
pub const DEFAULT_MAX_LEN_MINOR: u64 = 8_192;

/// Capacity of the bounded queues in the alignment pipeline. Producers
/// block when a queue is full, which bounds resident memory.
pub const PIPELINE_QUEUE_CAP: usize = 1 << 16;

/// Mapping quality reported in PAF output. Base-level alignments of
/// pre-filtered mapping intervals carry no placement ambiguity estimate.
pub const PAF_MAPPING_QUALITY: u32 = 60;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_holds_a_kmer() {
        assert!(DEFAULT_SEGMENT_LENGTH >= DEFAULT_KMER_SIZE as u64);
    }

    #[test]
    fn test_queue_capacity_nonzero() {
        assert!(PIPELINE_QUEUE_CAP > 0);
    }
}
