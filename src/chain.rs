//! UCSC chain files as an [`AlignmentOracle`].
//!
//! The chain `t` side is the source assembly (the one the annotation is in),
//! the `q` side is the target. Chain coordinates are 0-based half-open; every
//! range leaving this module is 1-based inclusive.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
use log::debug;

use crate::error::{GxfError, GxfResult};
use crate::feature::Range;
use crate::oracle::{AlignmentOracle, MappedBlock, RangeMapping};
use crate::strand::Strand;

/// One ungapped aligned block, already in 1-based target-forward coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChainBlock {
    source: Range,
    target: Range,
}

/// A single chain between one source and one target sequence.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Chain ID.
    pub id: u64,
    /// Alignment score.
    pub score: u64,
    /// Source sequence name (`tName`).
    pub source_name: String,
    /// Target sequence name (`qName`).
    pub target_name: String,
    /// `true` when `qStrand` is `-`.
    pub reversed: bool,
    blocks: Vec<ChainBlock>,
}

impl Chain {
    /// Number of ungapped blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bases of `ranges` this chain aligns.
    fn coverage(&self, ranges: &[Range]) -> u64 {
        ranges
            .iter()
            .map(|range| {
                self.overlapping(range)
                    .filter_map(|block| block.source.intersect(range))
                    .map(|sub| sub.len())
                    .sum::<u64>()
            })
            .sum()
    }

    /// Blocks whose source intersects `range`, in source order.
    fn overlapping<'a>(&'a self, range: &'a Range) -> impl Iterator<Item = &'a ChainBlock> + 'a {
        let first = self
            .blocks
            .partition_point(|block| block.source.end < range.start);
        self.blocks[first..]
            .iter()
            .take_while(move |block| block.source.start <= range.end)
    }
}

/// Chains indexed by source sequence name.
///
/// # Example
///
/// ```
/// use gxfmap::chain::ChainIndex;
/// use gxfmap::feature::Range;
/// use gxfmap::oracle::AlignmentOracle;
/// use gxfmap::strand::Strand;
///
/// let data = "chain 1000 chr1 5000 + 0 300 chr1 5000 + 100 420 1\n100\t10\t30\n190\n";
/// let index = ChainIndex::parse(data.as_bytes()).unwrap();
///
/// let mapping = index
///     .map_ranges("chr1", Strand::Forward, &[Range::new(1, 50).unwrap()])
///     .unwrap();
/// assert_eq!(mapping.blocks[0].target, Range::new(101, 150).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    chains: HashMap<String, Vec<Chain>>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a chain file (`.chain` or, with the `gzip` feature, `.chain.gz`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> GxfResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let compressed = path.extension().is_some_and(|ext| ext == "gz");

        let index = if compressed {
            #[cfg(feature = "gzip")]
            {
                Self::parse(MultiGzDecoder::new(file))?
            }
            #[cfg(not(feature = "gzip"))]
            {
                return Err(GxfError::Builder(
                    "enable the `gzip` feature to read gzip chain files".into(),
                ));
            }
        } else {
            Self::parse(file)?
        };

        debug!(
            "loaded {} chains over {} source sequences from {}",
            index.chain_count(),
            index.chains.len(),
            path.display()
        );
        Ok(index)
    }

    /// Parses chain records from a stream.
    pub fn parse<R: Read>(reader: R) -> GxfResult<Self> {
        let reader = BufReader::new(reader);
        let mut index = ChainIndex::new();
        let mut current: Option<ChainBuilder> = None;

        for (idx, line) in reader.lines().enumerate() {
            let line_num = idx + 1;
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with("chain") {
                if let Some(builder) = current.take() {
                    index.add_chain(builder.finish(line_num)?);
                }
                current = Some(ChainBuilder::from_header(line, line_num)?);
            } else if let Some(builder) = current.as_mut() {
                builder.push_block(line, line_num)?;
            } else {
                return Err(GxfError::malformed(
                    line_num,
                    "alignment block before any chain header",
                ));
            }
        }

        if let Some(builder) = current {
            index.add_chain(builder.finish(0)?);
        }
        Ok(index)
    }

    /// Adds a chain to the index.
    pub fn add_chain(&mut self, chain: Chain) {
        self.chains
            .entry(chain.source_name.clone())
            .or_default()
            .push(chain);
    }

    /// Returns all chains for a source sequence.
    pub fn chains_for(&self, seqid: &str) -> Option<&[Chain]> {
        self.chains.get(seqid).map(Vec::as_slice)
    }

    /// Get total number of chains.
    pub fn chain_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }
}

impl AlignmentOracle for ChainIndex {
    /// Projects through the chain aligning the most query bases (ties go to
    /// the higher score), so a query never straddles two chains.
    fn map_ranges(&self, seqid: &str, strand: Strand, ranges: &[Range]) -> Option<RangeMapping> {
        let chains = self.chains.get(seqid)?;
        let total: u64 = ranges.iter().map(Range::len).sum();

        let best = chains
            .iter()
            .map(|chain| (chain.coverage(ranges), chain))
            .filter(|(covered, _)| *covered > 0)
            .max_by_key(|(covered, chain)| (*covered, chain.score));

        let Some((covered, chain)) = best else {
            return Some(RangeMapping {
                blocks: Vec::new(),
                unmapped: total,
            });
        };

        let target_strand = if chain.reversed { strand.flip() } else { strand };
        let mut blocks = Vec::new();
        for range in ranges {
            for block in chain.overlapping(range) {
                let aligned = MappedBlock {
                    source: block.source,
                    target: block.target,
                    target_seqid: chain.target_name.clone(),
                    target_strand,
                    reversed: chain.reversed,
                };
                blocks.extend(aligned.restrict(range));
            }
        }

        Some(RangeMapping {
            blocks,
            unmapped: total - covered,
        })
    }
}

/// Accumulates the block lines of one chain.
struct ChainBuilder {
    chain: Chain,
    target_size: u64,
    source_end: u64,
    target_end: u64,
    source_pos: u64,
    target_pos: u64,
    closed: bool,
}

impl ChainBuilder {
    /// Parses `chain score tName tSize tStrand tStart tEnd qName qSize qStrand qStart qEnd [id]`.
    fn from_header(line: &str, line_num: usize) -> GxfResult<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 12 {
            return Err(GxfError::malformed(
                line_num,
                format!(
                    "invalid chain header: expected 12+ fields, got {}",
                    parts.len()
                ),
            ));
        }

        let number = |idx: usize, field: &str| -> GxfResult<u64> {
            parts[idx].parse::<u64>().map_err(|_| {
                GxfError::malformed(line_num, format!("invalid {field} '{}'", parts[idx]))
            })
        };

        let score = number(1, "score")?;
        let source_start = number(5, "tStart")?;
        let source_end = number(6, "tEnd")?;
        let target_size = number(8, "qSize")?;
        let target_start = number(10, "qStart")?;
        let target_end = number(11, "qEnd")?;
        let id = if parts.len() > 12 { number(12, "id")? } else { 0 };

        if parts[4] != "+" {
            return Err(GxfError::malformed(
                line_num,
                format!("source strand must be '+', got '{}'", parts[4]),
            ));
        }
        let reversed = match parts[9] {
            "+" => false,
            "-" => true,
            other => {
                return Err(GxfError::malformed(
                    line_num,
                    format!("invalid query strand '{other}'"),
                ))
            }
        };
        if source_start > source_end || target_start > target_end || target_end > target_size {
            return Err(GxfError::malformed(line_num, "chain header coordinates out of order"));
        }

        Ok(Self {
            chain: Chain {
                id,
                score,
                source_name: parts[2].to_string(),
                target_name: parts[7].to_string(),
                reversed,
                blocks: Vec::new(),
            },
            target_size,
            source_end,
            target_end,
            source_pos: source_start,
            target_pos: target_start,
            closed: false,
        })
    }

    /// Parses `size [dt dq]`; the last line of a chain carries only `size`.
    fn push_block(&mut self, line: &str, line_num: usize) -> GxfResult<()> {
        if self.closed {
            return Err(GxfError::malformed(
                line_num,
                "block after the final line of a chain",
            ));
        }
        let mut numbers = line.split_whitespace().map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| GxfError::malformed(line_num, format!("invalid block field '{raw}'")))
        });
        let size = numbers
            .next()
            .ok_or_else(|| GxfError::malformed(line_num, "empty block line"))??;
        let gaps = (numbers.next().transpose()?, numbers.next().transpose()?);

        let source_next = self.source_pos.checked_add(size);
        let target_next = self.target_pos.checked_add(size);
        match (source_next, target_next) {
            (Some(source), Some(target))
                if source <= self.source_end && target <= self.target_end => {}
            _ => {
                return Err(GxfError::malformed(
                    line_num,
                    format!("block of {size} bases runs past the chain end"),
                ))
            }
        }

        if size > 0 {
            let source = Range {
                start: self.source_pos + 1,
                end: self.source_pos + size,
            };
            // target_pos + size <= qEnd <= qSize, so neither side underflows
            let target = if self.chain.reversed {
                let end = self.target_size - self.target_pos;
                Range {
                    start: end + 1 - size,
                    end,
                }
            } else {
                Range {
                    start: self.target_pos + 1,
                    end: self.target_pos + size,
                }
            };
            self.chain.blocks.push(ChainBlock { source, target });
        }

        self.source_pos += size;
        self.target_pos += size;
        match gaps {
            (Some(dt), Some(dq)) => {
                self.source_pos = self.source_pos.saturating_add(dt);
                self.target_pos = self.target_pos.saturating_add(dq);
            }
            (None, None) => self.closed = true,
            _ => {
                return Err(GxfError::malformed(
                    line_num,
                    "block line must hold one or three fields",
                ))
            }
        }

        if self.source_pos > self.source_end || self.target_pos > self.target_end {
            return Err(GxfError::malformed(line_num, "blocks run past the chain end"));
        }
        Ok(())
    }

    fn finish(self, line_num: usize) -> GxfResult<Chain> {
        if !self.closed {
            return Err(GxfError::malformed(
                line_num,
                format!("chain {} has no final block line", self.chain.id),
            ));
        }
        Ok(self.chain)
    }
}
