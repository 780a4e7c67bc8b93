//! Remap outcome classification.
//!
//! A transcript is classified from two numbers gathered while its exons are
//! projected: how many source bases reached the target, and how many
//! contiguous target blocks they form. A gene then takes the worst status of
//! its transcripts unless a cross-transcript check overrides it.

use std::fmt;
use std::str::FromStr;

use crate::error::{GxfError, GxfResult};

/// Attribute holding the remap status of a gene or transcript record.
pub const REMAP_STATUS_ATTR: &str = "remap_status";
/// Attribute holding `seqid:strand:start-end` of the source gene or transcript.
pub const REMAP_ORIGINAL_LOCATION_ATTR: &str = "remap_original_location";
/// Attribute numbering the fragments of a split feature, `1..n` by target start.
pub const REMAP_FRAGMENT_ATTR: &str = "remap_fragment";

/// The outcome of remapping a gene or transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RemapStatus {
    /// Not classified yet.
    #[default]
    None,
    /// Every base mapped into one contiguous block.
    FullContig,
    /// Every base mapped, spread over several blocks.
    FullFragment,
    /// Some bases lost, the rest in one contiguous block.
    PartialContig,
    /// Some bases lost, the rest spread over several blocks.
    PartialFragment,
    /// The source sequence has alignments, but none covering this feature.
    Deleted,
    /// The source sequence has no alignment at all.
    NoSeqMap,
    /// Transcripts of the gene landed on different sequences or strands.
    GeneConflict,
    /// The mapped gene grew past the configured expansion threshold.
    GeneExpand,
}

impl RemapStatus {
    /// Every status, in declaration order.
    pub const ALL: [RemapStatus; 9] = [
        RemapStatus::None,
        RemapStatus::FullContig,
        RemapStatus::FullFragment,
        RemapStatus::PartialContig,
        RemapStatus::PartialFragment,
        RemapStatus::Deleted,
        RemapStatus::NoSeqMap,
        RemapStatus::GeneConflict,
        RemapStatus::GeneExpand,
    ];

    /// Returns the attribute token, e.g. `partial_fragment`.
    pub const fn as_str(self) -> &'static str {
        match self {
            RemapStatus::None => "none",
            RemapStatus::FullContig => "full_contig",
            RemapStatus::FullFragment => "full_fragment",
            RemapStatus::PartialContig => "partial_contig",
            RemapStatus::PartialFragment => "partial_fragment",
            RemapStatus::Deleted => "deleted",
            RemapStatus::NoSeqMap => "no_seq_map",
            RemapStatus::GeneConflict => "gene_conflict",
            RemapStatus::GeneExpand => "gene_expand",
        }
    }

    /// Returns `true` if at least some bases reached the target.
    pub fn is_mapped(self) -> bool {
        matches!(
            self,
            RemapStatus::FullContig
                | RemapStatus::FullFragment
                | RemapStatus::PartialContig
                | RemapStatus::PartialFragment
        )
    }

    /// Position in the "worst status" order used to aggregate transcripts.
    ///
    /// Higher is worse. Gene-level flags rank above everything since they are
    /// never derived from transcript statuses.
    pub fn rank(self) -> u8 {
        match self {
            RemapStatus::None => 0,
            RemapStatus::FullContig => 1,
            RemapStatus::FullFragment => 2,
            RemapStatus::PartialContig => 3,
            RemapStatus::PartialFragment => 4,
            RemapStatus::Deleted => 5,
            RemapStatus::NoSeqMap => 6,
            RemapStatus::GeneConflict | RemapStatus::GeneExpand => 7,
        }
    }
}

impl fmt::Display for RemapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemapStatus {
    type Err = GxfError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        RemapStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| GxfError::invalid(format!("unknown remap status '{raw}'")))
    }
}

/// Coverage facts of one transcript, collected by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coverage {
    /// Source bases that reached the target (`C`).
    pub covered: u64,
    /// Source bases of all exons (`T`).
    pub total: u64,
    /// Contiguous target blocks spanned by the mapped exons (`B`).
    pub blocks: usize,
}

/// Classifies a transcript whose source sequence has an alignment.
///
/// `NO_SEQ_MAP` is decided before coverage exists and never comes from here.
pub fn classify_transcript(coverage: &Coverage) -> RemapStatus {
    if coverage.covered == 0 || coverage.blocks == 0 {
        return RemapStatus::Deleted;
    }
    let full = coverage.covered >= coverage.total;
    match (full, coverage.blocks == 1) {
        (true, true) => RemapStatus::FullContig,
        (true, false) => RemapStatus::FullFragment,
        (false, true) => RemapStatus::PartialContig,
        (false, false) => RemapStatus::PartialFragment,
    }
}

/// Returns the worst of a set of transcript statuses, `NONE` if empty.
pub fn worst_status<I>(statuses: I) -> RemapStatus
where
    I: IntoIterator<Item = RemapStatus>,
{
    statuses
        .into_iter()
        .max_by_key(|status| status.rank())
        .unwrap_or_default()
}

/// Which gene-level flag wins when a gene both conflicts and expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenePrecedence {
    /// Report `GENE_CONFLICT`.
    #[default]
    ConflictFirst,
    /// Report `GENE_EXPAND`.
    ExpandFirst,
}

impl FromStr for GenePrecedence {
    type Err = GxfError;

    fn from_str(raw: &str) -> GxfResult<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "conflict" | "conflict-first" => Ok(GenePrecedence::ConflictFirst),
            "expand" | "expand-first" => Ok(GenePrecedence::ExpandFirst),
            other => Err(GxfError::invalid(format!(
                "expected 'conflict' or 'expand' as gene precedence, got '{other}'"
            ))),
        }
    }
}

/// Folds transcript statuses and the gene checks into the gene status.
///
/// `conflict` and `expand` come from the mapper, which knows where each
/// transcript landed.
pub fn aggregate_gene(
    transcripts: &[RemapStatus],
    conflict: bool,
    expand: bool,
    precedence: GenePrecedence,
) -> RemapStatus {
    match (conflict, expand, precedence) {
        (true, true, GenePrecedence::ExpandFirst) => RemapStatus::GeneExpand,
        (true, _, _) => RemapStatus::GeneConflict,
        (false, true, _) => RemapStatus::GeneExpand,
        (false, false, _) => worst_status(transcripts.iter().copied()),
    }
}
