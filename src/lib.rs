//! # gxfmap
//!
//! Remap GFF3/GTF gene annotations from one genome assembly to another through
//! pairwise alignments, keeping every non-coordinate detail of the input.
//!
//! ## Overview
//!
//! Records are read one gene group at a time, assembled into a
//! gene → transcript → leaf tree, and projected exon by exon through an
//! [`AlignmentOracle`]. Leaves that fall across an alignment gap are split into
//! numbered fragments; transcript and gene spans are rebuilt from their mapped
//! children. Every mapped gene and transcript is labelled with a
//! [`RemapStatus`]:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `full_contig` | all bases mapped into one contiguous block |
//! | `full_fragment` | all bases mapped, over several blocks |
//! | `partial_contig` | some bases lost, the rest contiguous |
//! | `partial_fragment` | some bases lost, the rest fragmented |
//! | `deleted` | the sequence is aligned, this region is not |
//! | `no_seq_map` | the sequence has no alignment at all |
//! | `gene_conflict` | transcripts landed on different sequences/strands |
//! | `gene_expand` | the mapped gene grew past the expansion threshold |
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gxfmap::{ChainIndex, GeneRemapper, Reader, RemapOptions, Writer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chains = ChainIndex::from_path("hg19ToHg38.over.chain")?;
//!     let reader = Reader::from_path("gencode.v19.annotation.gff3")?;
//!     let mut out = Writer::to_path("gencode.v19.hg38.gff3")?;
//!     let mut unmapped = Writer::to_path("gencode.v19.unmapped.gff3")?;
//!
//!     let remapper = GeneRemapper::new(chains, RemapOptions::default())?;
//!     let stats = remapper.run_with_unmapped(reader, &mut out, &mut unmapped)?;
//!     println!("{} of {} genes mapped", stats.mapped_genes, stats.genes);
//!
//!     out.finish()?;
//!     unmapped.finish()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `gzip` / `compression`: gzip inputs, outputs and chain files (adds `flate2`)
//! - `zstd`: zstd inputs (adds `zstd`)
//! - `bz2`: bzip2 inputs (adds `bzip2`)
//! - `rayon`: [`GeneRemapper::run_parallel`] (adds `rayon`)
//! - `cli`: the `gxfmap` binary (adds `clap`, `simple_logger`)
//!
//! ## Thread Safety
//!
//! Gene trees are independent. With `rayon`, genes are mapped in parallel
//! batches and written back in input order; the oracle must be `Sync`.

#![cfg_attr(doc, warn(missing_docs))]

pub mod assembler;
pub mod attrs;
pub mod chain;
pub mod error;
pub mod feature;
pub mod gxf;
pub mod mapper;
pub mod options;
pub mod oracle;
pub mod reader;
pub mod remap;
pub mod status;
pub mod strand;
pub mod tree;
pub mod writer;

pub use assembler::{GroupItem, TreeAssembler};
pub use attrs::{AttrVal, AttrVals};
pub use chain::ChainIndex;
pub use error::{GxfError, GxfResult};
pub use feature::{Feature, Phase, Range, Record};
pub use gxf::GxfFormat;
pub use mapper::{GeneMapper, GeneMapping, TranscriptMapping};
pub use options::{GenePrecedence, ParIdHack, RemapOptions, UnmappedPolicy};
pub use oracle::{AlignmentOracle, BlockOracle, MappedBlock, RangeMapping};
pub use reader::{Compression, Reader, ReaderBuilder};
pub use remap::{GeneRemapper, RemapStats};
pub use status::RemapStatus;
pub use strand::Strand;
pub use tree::{FeatureTree, NodeId};
pub use writer::{FileSink, Writer};
