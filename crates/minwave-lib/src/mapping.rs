//! Mapping record codec.
//!
//! One line of the mapping list file describes one candidate alignment in
//! PAF-like columns. The fields this stage consumes sit at fixed columns;
//! anything else on the line is carried by the mapper for its own use.

use crate::constants::FIXED_PERCENTAGE_IDENTITY;
use crate::hash::Strand;
use thiserror::Error;

/// A parsed mapping record. Positions are 0-based half-open.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingRecord {
    /// Query sequence name.
    pub query_name: String,
    /// Query interval start.
    pub query_start: u64,
    /// Query interval end.
    pub query_end: u64,
    /// Mapping strand.
    pub strand: Strand,
    /// Target (reference) sequence name.
    pub target_name: String,
    /// Target interval start.
    pub target_start: u64,
    /// Target interval end.
    pub target_end: u64,
    /// Identity estimated by the mapper, in percent.
    pub estimated_identity: f64,
    /// Ordinal of this mapping among consecutive mappings of the same
    /// query, assigned by the pipeline reader.
    pub rank: u32,
}

/// A malformed mapping line. Any of these is fatal to the pipeline.
#[derive(Debug, Error)]
pub enum MappingParseError {
    /// Fewer columns than a mapping record needs.
    #[error("mapping line has {found} fields, expected at least 13")]
    TooFewFields {
        /// Number of whitespace-delimited fields found.
        found: usize,
    },

    /// A field failed to parse as its expected type.
    #[error("invalid {field} `{value}` in mapping line")]
    InvalidField {
        /// Which field was malformed.
        field: &'static str,
        /// The offending token.
        value: String,
    },
}

fn parse_pos(field: &'static str, token: &str) -> Result<u64, MappingParseError> {
    token.parse().map_err(|_| MappingParseError::InvalidField {
        field,
        value: token.to_string(),
    })
}

/// Parse one whitespace-delimited mapping line.
///
/// Column map: `0` query name, `2`/`3` query interval, `4` strand,
/// `5` target name, `7`/`8` target interval, `12` identity tag. The
/// identity tag is colon-delimited with the value last (`id:f:98.7`); a
/// non-numeric value falls back to [`FIXED_PERCENTAGE_IDENTITY`] rather
/// than assuming a too-low identity.
pub fn parse_mapping_line(line: &str) -> Result<MappingRecord, MappingParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 13 {
        return Err(MappingParseError::TooFewFields {
            found: tokens.len(),
        });
    }

    let strand = match tokens[4] {
        "+" => Strand::Fwd,
        "-" => Strand::Rev,
        other => {
            return Err(MappingParseError::InvalidField {
                field: "strand",
                value: other.to_string(),
            })
        }
    };

    let id_token = tokens[12].rsplit(':').next().unwrap_or(tokens[12]);
    let estimated_identity = id_token
        .parse::<f64>()
        .unwrap_or(FIXED_PERCENTAGE_IDENTITY);

    Ok(MappingRecord {
        query_name: tokens[0].to_string(),
        query_start: parse_pos("query start", tokens[2])?,
        query_end: parse_pos("query end", tokens[3])?,
        strand,
        target_name: tokens[5].to_string(),
        target_start: parse_pos("target start", tokens[7])?,
        target_end: parse_pos("target end", tokens[8])?,
        estimated_identity,
        rank: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "q1\t5000\t100\t4900\t+\tr1\t20000\t1000\t5800\t4500\t4800\t60\tid:f:98.5";

    #[test]
    fn test_parse_forward_record() {
        let rec = parse_mapping_line(LINE).unwrap();
        assert_eq!(rec.query_name, "q1");
        assert_eq!((rec.query_start, rec.query_end), (100, 4900));
        assert_eq!(rec.strand, Strand::Fwd);
        assert_eq!(rec.target_name, "r1");
        assert_eq!((rec.target_start, rec.target_end), (1000, 5800));
        assert!((rec.estimated_identity - 98.5).abs() < 1e-9);
        assert_eq!(rec.rank, 0);
    }

    #[test]
    fn test_parse_reverse_strand() {
        let line = LINE.replace('+', "-");
        assert_eq!(parse_mapping_line(&line).unwrap().strand, Strand::Rev);
    }

    #[test]
    fn test_space_delimited() {
        let line = LINE.replace('\t', " ");
        assert!(parse_mapping_line(&line).is_ok());
    }

    #[test]
    fn test_too_few_fields() {
        let result = parse_mapping_line("q1\t5000\t100\t4900\t+\tr1\t20000\t1000\t5800");
        assert!(matches!(
            result,
            Err(MappingParseError::TooFewFields { found: 9 })
        ));
    }

    #[test]
    fn test_non_numeric_identity_falls_back() {
        let line = LINE.replace("id:f:98.5", "id:f:nan-ish");
        let rec = parse_mapping_line(&line).unwrap();
        assert!((rec.estimated_identity - FIXED_PERCENTAGE_IDENTITY).abs() < 1e-9);
    }

    #[test]
    fn test_bad_position_is_error() {
        let line = LINE.replace("4900", "49x0");
        assert!(matches!(
            parse_mapping_line(&line),
            Err(MappingParseError::InvalidField { field: "query end", .. })
        ));
    }

    #[test]
    fn test_bad_strand_is_error() {
        let line = LINE.replace('+', "*");
        assert!(matches!(
            parse_mapping_line(&line),
            Err(MappingParseError::InvalidField { field: "strand", .. })
        ));
    }
}
