use clap::{Parser, Subcommand};
use minwave_lib::{pipeline, AlignParams, IndexParams, SketchIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "minwave")]
#[command(version = "0.1.0")]
#[command(about = "Minmer sketch indexing and wavefront alignment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reference minmer index
    Index {
        /// Reference FASTA file (repeatable, processed in order)
        #[arg(short = 'r', long = "reference", required = true)]
        references: Vec<PathBuf>,

        /// K-mer size
        #[arg(short, long, default_value_t = 19)]
        kmer: usize,

        /// Segment (sliding window) length in bases
        #[arg(short = 's', long, default_value_t = 5000)]
        seg_length: u64,

        /// Bottom-s sketch size per window
        #[arg(short = 'w', long, default_value_t = 64)]
        sketch_size: u64,

        /// Percentage of unique minmers to prune as too frequent
        #[arg(long, default_value_t = 0.001)]
        kmer_pct_threshold: f64,

        /// Index file to write (or reuse when it already exists)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Rebuild even when the index file exists
        #[arg(long)]
        overwrite: bool,

        /// Stop after the index has been written
        #[arg(long)]
        create_index_only: bool,

        /// Only sketch sequences with this name (repeatable)
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Worker threads (0 = all available cores)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Also dump the window list as TSV next to the index
        #[arg(long)]
        sketch_tsv: bool,
    },

    /// Align mapping records into base-level PAF output
    Align {
        /// Indexed target (reference) FASTA
        #[arg(long)]
        target: PathBuf,

        /// Indexed query FASTA
        #[arg(long)]
        query: PathBuf,

        /// Mapping list file from the mapping stage
        #[arg(short = 'i', long)]
        mappings: PathBuf,

        /// Output PAF path (lines are appended)
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Worker threads (0 = all available cores)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Minimum block identity (fraction) to emit an alignment
        #[arg(long, default_value_t = 0.0)]
        min_identity: f64,

        /// Flank padding around the reference interval, in bases
        #[arg(long, default_value_t = 8192)]
        max_len_minor: u64,

        /// WFA mismatch penalty
        #[arg(long, default_value_t = 4)]
        wfa_mismatch: i32,

        /// WFA gap opening penalty
        #[arg(long, default_value_t = 6)]
        wfa_gap_open: i32,

        /// WFA gap extension penalty
        #[arg(long, default_value_t = 1)]
        wfa_gap_extend: i32,

        /// Write one numbered TSV per alignment with this prefix
        #[arg(long)]
        tsv_prefix: Option<String>,

        /// Write flank padding info to this TSV
        #[arg(long)]
        patching_tsv: Option<PathBuf>,

        /// SAM-style naming conventions
        #[arg(long)]
        sam_format: bool,

        /// Emit the MD tag
        #[arg(long)]
        emit_md_tag: bool,

        /// Omit sequences from SAM output
        #[arg(long)]
        no_seq_in_sam: bool,

        /// Mappings were split; rank-suffix query names in SAM mode
        #[arg(long)]
        split: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            references,
            kmer,
            seg_length,
            sketch_size,
            kmer_pct_threshold,
            output,
            overwrite,
            create_index_only,
            targets,
            threads,
            sketch_tsv,
        } => {
            let params = IndexParams {
                threads,
                kmer_size: kmer,
                seg_length,
                sketch_size,
                kmer_pct_threshold,
                ref_paths: references,
                target_names: targets,
                index_path: output,
                overwrite_index: overwrite,
                create_index_only,
                ..IndexParams::default()
            };
            params.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
            params.print();

            let index = SketchIndex::initialize(&params)?;
            if params.create_index_only {
                info!("index created successfully, exiting");
                return Ok(());
            }
            if sketch_tsv {
                if let Some(path) = &params.index_path {
                    let tsv_path = path.with_extension("tsv");
                    index.write_sketch_tsv(&tsv_path)?;
                    info!("wrote sketch TSV to {}", tsv_path.display());
                }
            }
        }

        Commands::Align {
            target,
            query,
            mappings,
            output,
            threads,
            min_identity,
            max_len_minor,
            wfa_mismatch,
            wfa_gap_open,
            wfa_gap_extend,
            tsv_prefix,
            patching_tsv,
            sam_format,
            emit_md_tag,
            no_seq_in_sam,
            split,
        } => {
            let params = AlignParams {
                threads,
                target_path: target,
                query_path: query,
                mapping_path: mappings,
                output_path: output,
                tsv_prefix,
                patching_tsv_path: patching_tsv,
                min_identity,
                wflign_max_len_minor: max_len_minor,
                wfa_mismatch_score: wfa_mismatch,
                wfa_gap_opening_score: wfa_gap_open,
                wfa_gap_extension_score: wfa_gap_extend,
                sam_format,
                emit_md_tag,
                no_seq_in_sam,
                split,
            };
            params.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
            params.print();

            let stats = pipeline::run(Arc::new(params))?;
            info!(
                "alignment complete: {} records, {} lines emitted",
                stats.records, stats.emitted
            );
        }
    }

    Ok(())
}
