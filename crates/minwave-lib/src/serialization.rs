//! Index file serialization.
//!
//! Single little-endian file:
//!
//! ```text
//! HEADER:   magic "MWVSKI01" (8 bytes)
//!           u32 version_major, u32 version_minor
//! PARAMS:   u64 seg_length, u64 sketch_size, u64 kmer_size
//!           u64 freq_threshold
//! WINDOWS:  u64 count, then per window:
//!           u64 hash, u64 wpos_start, u64 wpos_end, u32 seq_id, i8 strand
//! LOOKUP:   u64 num_hashes, then per hash (ascending hash order):
//!           u64 hash, u64 n_points, then per point:
//!           u64 pos, u32 seq_id, u8 side (0 = OPEN, 1 = CLOSE)
//! FREQUENT: u64 count, then count x u64 (ascending)
//! ```
//!
//! The LOOKUP and FREQUENT sections are written in sorted hash order, so
//! serialization is a pure function of index content and a write/read/write
//! round trip is byte-identical. Contig metadata is not part of the file;
//! it is rebuilt from the reference FASTA on the read path with the same
//! skip rule as the build.
//!
//! On read, the sketch parameters recorded in PARAMS are compared against
//! the CLI parameters before anything else is touched; a mismatch fails
//! with a diagnostic showing both sides.

use crate::hash::Strand;
use crate::minmer::MinmerWindow;
use crate::params::IndexParams;
use crate::sketch::{ContigInfo, IndexError, IntervalPoint, Side, SketchIndex, SketchParams};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes identifying a minwave sketch index.
const MAGIC: &[u8; 8] = b"MWVSKI01";

/// File format version: increment major on breaking changes.
const FORMAT_VERSION: (u32, u32) = (1, 0);

/// Header of the index file: format identification plus the sketch
/// parameters the index was built with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHeader {
    /// Sketch parameters recorded in the file.
    pub params: SketchParams,
    /// Frequency threshold the index was pruned at.
    pub freq_threshold: u64,
}

impl IndexHeader {
    /// Write the header.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.0.to_le_bytes())?;
        writer.write_all(&FORMAT_VERSION.1.to_le_bytes())?;
        writer.write_all(&self.params.seg_length.to_le_bytes())?;
        writer.write_all(&self.params.sketch_size.to_le_bytes())?;
        writer.write_all(&self.params.kmer_size.to_le_bytes())?;
        writer.write_all(&self.freq_threshold.to_le_bytes())?;
        Ok(())
    }

    /// Read and validate the header (magic and version only; parameter
    /// compatibility is a separate concern, see [`IndexHeader::verify_params`]).
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IndexError::BadMagic);
        }

        let version_major = read_u32(reader)?;
        let version_minor = read_u32(reader)?;
        if version_major != FORMAT_VERSION.0 {
            return Err(IndexError::UnsupportedVersion {
                found_major: version_major,
                found_minor: version_minor,
                expected_major: FORMAT_VERSION.0,
                expected_minor: FORMAT_VERSION.1,
            });
        }

        Ok(Self {
            params: SketchParams {
                seg_length: read_u64(reader)?,
                sketch_size: read_u64(reader)?,
                kmer_size: read_u64(reader)?,
            },
            freq_threshold: read_u64(reader)?,
        })
    }

    /// Fail when the indexed sketch parameters differ from the CLI
    /// parameters, with both sides in the diagnostic.
    pub fn verify_params(&self, params: &IndexParams) -> Result<(), IndexError> {
        let cli = SketchParams::from(params);
        if self.params != cli {
            return Err(IndexError::ParameterMismatch {
                index_seg_length: self.params.seg_length,
                index_sketch_size: self.params.sketch_size,
                index_kmer_size: self.params.kmer_size,
                cli_seg_length: cli.seg_length,
                cli_sketch_size: cli.sketch_size,
                cli_kmer_size: cli.kmer_size,
            });
        }
        Ok(())
    }
}

/// Serialize a complete index to `path`.
pub fn write_index_file(index: &SketchIndex, path: &Path) -> Result<(), IndexError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let header = IndexHeader {
        params: index.params,
        freq_threshold: index.freq_threshold(),
    };
    header.write(&mut writer)?;
    write_windows(&mut writer, &index.window_index)?;
    write_lookup(&mut writer, index)?;
    write_frequent(&mut writer, index)?;
    writer.flush()?;
    Ok(())
}

/// Deserialize an index from `path`, verifying parameters first. The
/// provided metadata comes from a fresh pass over the reference FASTA.
pub fn read_index_file(
    path: &Path,
    params: &IndexParams,
    metadata: Vec<ContigInfo>,
) -> Result<SketchIndex, IndexError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = IndexHeader::read(&mut reader)?;
    header.verify_params(params)?;

    let mut index = SketchIndex::new(header.params);
    index.metadata = metadata;
    index.freq_threshold = header.freq_threshold;
    read_windows(&mut reader, &mut index)?;
    read_lookup(&mut reader, &mut index)?;
    read_frequent(&mut reader, &mut index)?;
    Ok(index)
}

fn write_windows<W: Write>(writer: &mut W, windows: &[MinmerWindow]) -> io::Result<()> {
    writer.write_all(&(windows.len() as u64).to_le_bytes())?;
    for w in windows {
        writer.write_all(&w.hash.to_le_bytes())?;
        writer.write_all(&w.wpos_start.to_le_bytes())?;
        writer.write_all(&w.wpos_end.to_le_bytes())?;
        writer.write_all(&w.seq_id.to_le_bytes())?;
        writer.write_all(&w.strand.to_i8().to_le_bytes())?;
    }
    Ok(())
}

fn read_windows<R: Read>(reader: &mut R, index: &mut SketchIndex) -> Result<(), IndexError> {
    let count = read_u64(reader)?;
    index.window_index.reserve(count as usize);
    for _ in 0..count {
        let hash = read_u64(reader)?;
        let wpos_start = read_u64(reader)?;
        let wpos_end = read_u64(reader)?;
        let seq_id = read_u32(reader)?;
        let strand = Strand::from_i8(read_i8(reader)?)
            .ok_or_else(|| IndexError::Corrupt("invalid strand in window record".to_string()))?;
        if wpos_start >= wpos_end {
            return Err(IndexError::Corrupt(format!(
                "window with empty position interval [{}, {})",
                wpos_start, wpos_end
            )));
        }
        index.window_index.push(MinmerWindow {
            hash,
            wpos_start,
            wpos_end,
            seq_id,
            strand,
        });
    }
    Ok(())
}

fn write_lookup<W: Write>(writer: &mut W, index: &SketchIndex) -> io::Result<()> {
    writer.write_all(&(index.pos_lookup.len() as u64).to_le_bytes())?;
    let mut hashes: Vec<u64> = index.pos_lookup.keys().copied().collect();
    hashes.sort_unstable();
    for hash in hashes {
        let points = &index.pos_lookup[&hash];
        writer.write_all(&hash.to_le_bytes())?;
        writer.write_all(&(points.len() as u64).to_le_bytes())?;
        for p in points {
            writer.write_all(&p.pos.to_le_bytes())?;
            writer.write_all(&p.seq_id.to_le_bytes())?;
            let side: u8 = match p.side {
                Side::Open => 0,
                Side::Close => 1,
            };
            writer.write_all(&side.to_le_bytes())?;
        }
    }
    Ok(())
}

fn read_lookup<R: Read>(reader: &mut R, index: &mut SketchIndex) -> Result<(), IndexError> {
    let num_hashes = read_u64(reader)?;
    index.pos_lookup.reserve(num_hashes as usize);
    for _ in 0..num_hashes {
        let hash = read_u64(reader)?;
        let n_points = read_u64(reader)?;
        let mut points = Vec::with_capacity(n_points as usize);
        for _ in 0..n_points {
            let pos = read_u64(reader)?;
            let seq_id = read_u32(reader)?;
            let side = match read_u8(reader)? {
                0 => Side::Open,
                1 => Side::Close,
                other => {
                    return Err(IndexError::Corrupt(format!(
                        "invalid interval point side {}",
                        other
                    )))
                }
            };
            points.push(IntervalPoint { pos, seq_id, side });
        }
        index.pos_lookup.insert(hash, points);
    }
    Ok(())
}

fn write_frequent<W: Write>(writer: &mut W, index: &SketchIndex) -> io::Result<()> {
    let mut hashes: Vec<u64> = index.frequent_seeds.iter().copied().collect();
    hashes.sort_unstable();
    writer.write_all(&(hashes.len() as u64).to_le_bytes())?;
    for hash in hashes {
        writer.write_all(&hash.to_le_bytes())?;
    }
    Ok(())
}

fn read_frequent<R: Read>(reader: &mut R, index: &mut SketchIndex) -> Result<(), IndexError> {
    let count = read_u64(reader)?;
    index.frequent_seeds.reserve(count as usize);
    for _ in 0..count {
        index.frequent_seeds.insert(read_u64(reader)?);
    }
    Ok(())
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_i8<R: Read>(reader: &mut R) -> io::Result<i8> {
    Ok(read_u8(reader)? as i8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> IndexHeader {
        IndexHeader {
            params: SketchParams {
                kmer_size: 15,
                seg_length: 1000,
                sketch_size: 5,
            },
            freq_threshold: 42,
        }
    }

    fn cli_params(kmer_size: usize) -> IndexParams {
        IndexParams {
            kmer_size,
            seg_length: 1000,
            sketch_size: 5,
            ref_paths: vec!["ref.fa".into()],
            ..IndexParams::default()
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = header();
        let mut buffer = Vec::new();
        header.write(&mut buffer).unwrap();
        let read_back = IndexHeader::read(&mut buffer.as_slice()).unwrap();
        assert_eq!(header, read_back);
    }

    #[test]
    fn test_bad_magic() {
        let mut buffer = Vec::new();
        header().write(&mut buffer).unwrap();
        buffer[0] = b'X';
        assert!(matches!(
            IndexHeader::read(&mut buffer.as_slice()),
            Err(IndexError::BadMagic)
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buffer = Vec::new();
        header().write(&mut buffer).unwrap();
        // bump the major version in place
        buffer[8..12].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            IndexHeader::read(&mut buffer.as_slice()),
            Err(IndexError::UnsupportedVersion { found_major: 99, .. })
        ));
    }

    #[test]
    fn test_verify_params_accepts_match() {
        assert!(header().verify_params(&cli_params(15)).is_ok());
    }

    #[test]
    fn test_verify_params_rejects_mismatch() {
        let err = header().verify_params(&cli_params(17)).unwrap_err();
        match err {
            IndexError::ParameterMismatch {
                index_kmer_size,
                cli_kmer_size,
                ..
            } => {
                assert_eq!(index_kmer_size, 15);
                assert_eq!(cli_kmer_size, 17);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_file() {
        let mut buffer = Vec::new();
        header().write(&mut buffer).unwrap();
        buffer.truncate(12);
        assert!(IndexHeader::read(&mut buffer.as_slice()).is_err());
    }
}
