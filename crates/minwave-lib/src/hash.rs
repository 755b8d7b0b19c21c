//! Canonical k-mer hashing and DNA utilities.
//!
//! K-mers are hashed with MurmurHash3 x64 in both orientations; the
//! canonical hash is the minimum of the two, taking the low 64 bits of the
//! 128-bit digest. This makes the sketch independent of the strand a
//! sequence happens to be stored on: a k-mer and its reverse complement
//! hash identically, and the losing orientation is recorded as a strand
//! bit.

use crate::constants::KMER_HASH_SEED;
use std::io::Cursor;

/// Orientation of a k-mer occurrence or of a mapping record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Forward orientation (`+`).
    Fwd,
    /// Reverse-complement orientation (`-`).
    Rev,
}

impl Strand {
    /// The PAF strand column symbol.
    pub fn symbol(self) -> char {
        match self {
            Strand::Fwd => '+',
            Strand::Rev => '-',
        }
    }

    /// Signed encoding used on disk and in strand vote tallies.
    pub fn to_i8(self) -> i8 {
        match self {
            Strand::Fwd => 1,
            Strand::Rev => -1,
        }
    }

    /// Decode the signed encoding; anything but +1/-1 is invalid.
    pub fn from_i8(v: i8) -> Option<Strand> {
        match v {
            1 => Some(Strand::Fwd),
            -1 => Some(Strand::Rev),
            _ => None,
        }
    }
}

/// Whether a byte is an upper-case canonical DNA base.
#[inline]
pub fn is_canonical_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

/// Complement of an upper-case canonical base; everything else maps to `N`.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

/// Upper-case a sequence and collapse every non-ACGT byte to `N`.
pub fn normalize_dna_in_place(seq: &mut [u8]) {
    for b in seq.iter_mut() {
        let up = b.to_ascii_uppercase();
        *b = if is_canonical_base(up) { up } else { b'N' };
    }
}

/// Owned normalized copy of a sequence.
pub fn normalize_dna(seq: &[u8]) -> Vec<u8> {
    let mut out = seq.to_vec();
    normalize_dna_in_place(&mut out);
    out
}

/// Reverse complement of a normalized sequence into a new buffer.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Low 64 bits of the MurmurHash3 x64 128-bit digest of a k-mer.
#[inline]
pub fn kmer_hash(kmer: &[u8]) -> u64 {
    // Reading from an in-memory slice cannot fail.
    murmur3::murmur3_x64_128(&mut Cursor::new(kmer), KMER_HASH_SEED)
        .expect("hashing an in-memory slice cannot fail") as u64
}

/// Canonical hash of a k-mer given both orientations, and the strand that
/// won. Forward wins ties, which covers palindromic k-mers.
#[inline]
pub fn canonical_kmer_hash(fwd: &[u8], rev: &[u8]) -> (u64, Strand) {
    let hf = kmer_hash(fwd);
    let hr = kmer_hash(rev);
    if hf <= hr {
        (hf, Strand::Fwd)
    } else {
        (hr, Strand::Rev)
    }
}
