//! The alignment query interface the mapper projects through.

use std::collections::HashMap;

use crate::feature::Range;
use crate::strand::Strand;

/// One contiguous aligned piece: every base of `source` has a counterpart in
/// `target`, in order (or in reverse order when `reversed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedBlock {
    pub source: Range,
    pub target: Range,
    pub target_seqid: String,
    /// Strand a feature ends up on after projection through this block.
    pub target_strand: Strand,
    /// Target runs opposite to source.
    pub reversed: bool,
}

impl MappedBlock {
    /// Projects a sub-range of `source` to the target.
    ///
    /// `sub` must lie inside `source`; anything outside is clamped first.
    pub fn project(&self, sub: &Range) -> Range {
        let start = sub.start.max(self.source.start) - self.source.start;
        let end = sub.end.min(self.source.end) - self.source.start;
        if self.reversed {
            Range {
                start: self.target.end - end,
                end: self.target.end - start,
            }
        } else {
            Range {
                start: self.target.start + start,
                end: self.target.start + end,
            }
        }
    }

    /// Returns the part of this block covering `sub`, or `None` if they do not
    /// overlap.
    pub fn restrict(&self, sub: &Range) -> Option<MappedBlock> {
        let source = self.source.intersect(sub)?;
        Some(MappedBlock {
            source,
            target: self.project(&source),
            target_seqid: self.target_seqid.clone(),
            target_strand: self.target_strand,
            reversed: self.reversed,
        })
    }

    /// Number of aligned bases.
    pub fn aligned_bases(&self) -> u64 {
        self.source.len()
    }
}

/// The answer to one [`AlignmentOracle::map_ranges`] query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeMapping {
    /// Aligned pieces, each inside one query range, in query order.
    pub blocks: Vec<MappedBlock>,
    /// Query bases with no aligned counterpart.
    pub unmapped: u64,
}

impl RangeMapping {
    /// Number of query bases that reached the target.
    pub fn mapped(&self) -> u64 {
        self.blocks.iter().map(MappedBlock::aligned_bases).sum()
    }
}

/// Something that can project source-assembly ranges to a target assembly.
///
/// Implementations must be callable concurrently through `&self` when used
/// with the `rayon` driver.
pub trait AlignmentOracle {
    /// Maps `ranges` (ascending, non-overlapping, 1-based inclusive) on
    /// `seqid`/`strand`.
    ///
    /// Returns `None` when there is no alignment at all for `seqid`. A mapping
    /// with no blocks means the sequence is aligned but these ranges are not.
    fn map_ranges(&self, seqid: &str, strand: Strand, ranges: &[Range]) -> Option<RangeMapping>;
}

impl<T: AlignmentOracle + ?Sized> AlignmentOracle for &T {
    fn map_ranges(&self, seqid: &str, strand: Strand, ranges: &[Range]) -> Option<RangeMapping> {
        (**self).map_ranges(seqid, strand, ranges)
    }
}

impl<T: AlignmentOracle + ?Sized> AlignmentOracle for Box<T> {
    fn map_ranges(&self, seqid: &str, strand: Strand, ranges: &[Range]) -> Option<RangeMapping> {
        (**self).map_ranges(seqid, strand, ranges)
    }
}

/// An oracle over an explicit list of aligned blocks.
///
/// Useful for precomputed alignments (e.g. converted PSL) and for tests.
///
/// # Example
///
/// ```
/// use gxfmap::feature::Range;
/// use gxfmap::oracle::{AlignmentOracle, BlockOracle};
/// use gxfmap::strand::Strand;
///
/// let mut oracle = BlockOracle::new();
/// oracle.add_block("chr1", Range::new(1000, 1200).unwrap(), "chr1", 1500, false);
///
/// let mapping = oracle
///     .map_ranges("chr1", Strand::Forward, &[Range::new(1100, 1300).unwrap()])
///     .unwrap();
/// assert_eq!(mapping.blocks[0].target, Range::new(1600, 1700).unwrap());
/// assert_eq!(mapping.unmapped, 100);
/// assert!(oracle.map_ranges("chr2", Strand::Forward, &[]).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockOracle {
    blocks: HashMap<String, Vec<AlignedBlock>>,
}

#[derive(Debug, Clone)]
struct AlignedBlock {
    source: Range,
    target_seqid: String,
    target: Range,
    reversed: bool,
}

impl BlockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aligns `source` on `seqid` to the same number of bases starting at
    /// `target_start` on `target_seqid`, reversed when `reversed`.
    pub fn add_block(
        &mut self,
        seqid: &str,
        source: Range,
        target_seqid: &str,
        target_start: u64,
        reversed: bool,
    ) -> &mut Self {
        let target = Range {
            start: target_start,
            end: target_start + source.len() - 1,
        };
        let blocks = self.blocks.entry(seqid.to_string()).or_default();
        blocks.push(AlignedBlock {
            source,
            target_seqid: target_seqid.to_string(),
            target,
            reversed,
        });
        blocks.sort_by_key(|block| block.source);
        self
    }

    /// Registers `seqid` as aligned without any block.
    pub fn add_sequence(&mut self, seqid: &str) -> &mut Self {
        self.blocks.entry(seqid.to_string()).or_default();
        self
    }
}

impl AlignmentOracle for BlockOracle {
    fn map_ranges(&self, seqid: &str, strand: Strand, ranges: &[Range]) -> Option<RangeMapping> {
        let aligned = self.blocks.get(seqid)?;
        let mut mapping = RangeMapping::default();
        for range in ranges {
            let mut covered = 0;
            for block in aligned {
                let Some(source) = block.source.intersect(range) else {
                    continue;
                };
                let block = MappedBlock {
                    source: block.source,
                    target: block.target,
                    target_seqid: block.target_seqid.clone(),
                    target_strand: if block.reversed { strand.flip() } else { strand },
                    reversed: block.reversed,
                };
                covered += source.len();
                mapping.blocks.extend(block.restrict(&source));
            }
            mapping.unmapped += range.len().saturating_sub(covered);
        }
        Some(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    #[test]
    fn project_forward_and_reversed() {
        let block = MappedBlock {
            source: range(101, 200),
            target: range(1001, 1100),
            target_seqid: "chr1".into(),
            target_strand: Strand::Forward,
            reversed: false,
        };
        assert_eq!(block.project(&range(101, 110)), range(1001, 1010));

        let reversed = MappedBlock {
            reversed: true,
            target_strand: Strand::Reverse,
            ..block
        };
        assert_eq!(reversed.project(&range(101, 110)), range(1091, 1100));
        assert_eq!(reversed.project(&range(191, 200)), range(1001, 1010));
    }

    #[test]
    fn block_oracle_reports_gaps() {
        let mut oracle = BlockOracle::new();
        oracle
            .add_block("chr1", range(1800, 1850), "chr1", 2300, false)
            .add_block("chr1", range(1871, 2000), "chr1", 2371, false)
            .add_sequence("chr9");

        let mapping = oracle
            .map_ranges("chr1", Strand::Forward, &[range(1800, 2000)])
            .unwrap();
        assert_eq!(mapping.blocks.len(), 2);
        assert_eq!(mapping.mapped(), 181);
        assert_eq!(mapping.unmapped, 20);

        let empty = oracle
            .map_ranges("chr9", Strand::Forward, &[range(1, 10)])
            .unwrap();
        assert!(empty.blocks.is_empty());
        assert_eq!(empty.unmapped, 10);
    }

    #[test]
    fn reversed_block_flips_strand() {
        let mut oracle = BlockOracle::new();
        oracle.add_block("chr1", range(1, 100), "chrUn", 501, true);
        let mapping = oracle
            .map_ranges("chr1", Strand::Forward, &[range(1, 10)])
            .unwrap();
        assert_eq!(mapping.blocks[0].target_strand, Strand::Reverse);
        assert_eq!(mapping.blocks[0].target, range(591, 600));
    }
}
