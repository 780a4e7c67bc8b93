//! Projects gene trees through an [`AlignmentOracle`].
//!
//! Only exons are sent to the oracle. Every other leaf (CDS, UTR, codons) is
//! projected through the blocks returned for its transcript's exons, so a
//! leaf and its exon always move together.

use std::collections::HashMap;

use log::{debug, warn};

use crate::attrs::AttrVal;
use crate::error::GxfResult;
use crate::feature::{Feature, Range};
use crate::oracle::{AlignmentOracle, MappedBlock};
use crate::options::RemapOptions;
use crate::status::{
    aggregate_gene, classify_transcript, Coverage, RemapStatus, REMAP_FRAGMENT_ATTR,
    REMAP_ORIGINAL_LOCATION_ATTR, REMAP_STATUS_ATTR,
};
use crate::strand::Strand;
use crate::tree::{FeatureTree, NodeId};

/// Sequence and strand a transcript landed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub seqid: String,
    pub strand: Strand,
}

impl Target {
    fn of(block: &MappedBlock) -> Self {
        Self {
            seqid: block.target_seqid.clone(),
            strand: block.target_strand,
        }
    }

    fn holds(&self, block: &MappedBlock) -> bool {
        self.seqid == block.target_seqid && self.strand == block.target_strand
    }
}

/// The outcome of projecting one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMapping {
    /// The transcript node in the source tree.
    pub node: NodeId,
    pub status: RemapStatus,
    pub coverage: Coverage,
    /// Where the transcript landed, if anywhere.
    pub target: Option<Target>,
    /// Min-start/max-end of the emitted leaves.
    pub span: Option<Range>,
    /// Projected leaves in file order, split leaves expanded in place, each
    /// with the source leaf it came from.
    pub leaves: Vec<(NodeId, Feature)>,
}

impl TranscriptMapping {
    fn unmapped(node: NodeId, status: RemapStatus, total: u64) -> Self {
        Self {
            node,
            status,
            coverage: Coverage {
                covered: 0,
                total,
                blocks: 0,
            },
            target: None,
            span: None,
            leaves: Vec::new(),
        }
    }

    /// Returns `true` if the transcript has target coordinates to write.
    pub fn is_emitted(&self) -> bool {
        self.status.is_mapped() && self.span.is_some()
    }
}

/// The outcome of projecting one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneMapping {
    pub gene_status: RemapStatus,
    /// The gene and its emitted transcripts in target coordinates.
    pub mapped: Option<FeatureTree>,
    /// The gene and every transcript not in `mapped`, in source coordinates.
    pub unmapped: Option<FeatureTree>,
}

/// Returns the exon ranges of a transcript in ascending coordinate order,
/// overlapping exons merged.
///
/// A transcript without exon children stands in for its own single exon.
pub fn collect_exon_ranges(tree: &FeatureTree, transcript: NodeId) -> Vec<Range> {
    let mut ranges: Vec<Range> = tree
        .children(transcript)
        .iter()
        .map(|&child| tree.feature(child))
        .filter(|feature| feature.is_exon())
        .map(Feature::range)
        .collect();
    if ranges.is_empty() {
        return vec![tree.feature(transcript).range()];
    }
    ranges.sort_unstable();

    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.end >= range.start => *last = last.span(&range),
            _ => merged.push(range),
        }
    }
    merged
}

/// Projects `range` through `blocks` (all on one target), returning the
/// covered target pieces ascending, abutting pieces merged.
fn project_range(range: &Range, blocks: &[MappedBlock]) -> Vec<Range> {
    let mut pieces: Vec<Range> = blocks
        .iter()
        .filter_map(|block| block.restrict(range))
        .map(|block| block.target)
        .collect();
    pieces.sort_unstable();

    let mut merged: Vec<Range> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match merged.last_mut() {
            Some(last) if last.abuts_or_overlaps(&piece) => *last = last.span(&piece),
            _ => merged.push(piece),
        }
    }
    merged
}

/// Keeps the blocks on the target holding the most mapped bases.
fn dominant_target_blocks(blocks: Vec<MappedBlock>, source: &Feature) -> Vec<MappedBlock> {
    let mut tally: Vec<(Target, u64)> = Vec::new();
    for block in &blocks {
        match tally.iter_mut().find(|(target, _)| target.holds(block)) {
            Some((_, bases)) => *bases += block.aligned_bases(),
            None => tally.push((Target::of(block), block.aligned_bases())),
        }
    }
    if tally.len() <= 1 {
        return blocks;
    }

    let mut best = 0;
    for (idx, (_, bases)) in tally.iter().enumerate() {
        if *bases > tally[best].1 {
            best = idx;
        }
    }
    let target = &tally[best].0;
    let (kept, dropped): (Vec<_>, Vec<_>) = blocks.into_iter().partition(|b| target.holds(b));
    warn!(
        "{}: {} bases on secondary targets dropped, keeping {}:{}",
        source.location(),
        dropped.iter().map(MappedBlock::aligned_bases).sum::<u64>(),
        target.seqid,
        target.strand
    );
    kept
}

/// Number of contiguous target blocks: one, plus one for every break inside
/// an exon.
fn count_target_blocks(ranges: &[Range], blocks: &[MappedBlock]) -> usize {
    let breaks: Vec<usize> = ranges
        .iter()
        .map(|range| project_range(range, blocks).len())
        .filter(|&pieces| pieces > 0)
        .collect();
    if breaks.is_empty() {
        return 0;
    }
    1 + breaks.iter().map(|pieces| pieces - 1).sum::<usize>()
}

/// Moves a leaf to the target. One piece updates it; several become numbered
/// fragments in ascending target order; none drops it.
fn project_leaf(leaf: &Feature, blocks: &[MappedBlock], target: &Target) -> GxfResult<Vec<Feature>> {
    let pieces = project_range(&leaf.range(), blocks);
    if pieces.len() == 1 {
        return Ok(vec![leaf.relocated(&target.seqid, pieces[0], target.strand)]);
    }

    let mut fragments = Vec::with_capacity(pieces.len());
    for (idx, piece) in pieces.into_iter().enumerate() {
        let mut fragment = leaf.relocated(&target.seqid, piece, target.strand);
        fragment
            .attrs_mut()
            .add(AttrVal::new(REMAP_FRAGMENT_ATTR, (idx + 1).to_string())?);
        fragments.push(fragment);
    }
    Ok(fragments)
}

/// Sets the status attribute and, for mapped records, where they came from.
fn annotate(feature: &mut Feature, status: RemapStatus, original: Option<String>) -> GxfResult<()> {
    feature
        .attrs_mut()
        .update(AttrVal::new(REMAP_STATUS_ATTR, status.as_str())?);
    if let Some(location) = original {
        feature
            .attrs_mut()
            .update(AttrVal::new(REMAP_ORIGINAL_LOCATION_ATTR, location)?);
    }
    Ok(())
}

/// Projects genes, one at a time, through an oracle.
#[derive(Debug, Clone)]
pub struct GeneMapper<O> {
    oracle: O,
    options: RemapOptions,
}

impl<O: AlignmentOracle> GeneMapper<O> {
    pub fn new(oracle: O, options: RemapOptions) -> Self {
        Self { oracle, options }
    }

    pub fn options(&self) -> &RemapOptions {
        &self.options
    }

    /// Projects one transcript and classifies it.
    ///
    /// Called on a gene without transcripts, the gene itself is projected as a
    /// single exon.
    pub fn map_transcript(&self, tree: &FeatureTree, node: NodeId) -> GxfResult<TranscriptMapping> {
        let feature = tree.feature(node);
        let ranges = collect_exon_ranges(tree, node);
        let total: u64 = ranges.iter().map(Range::len).sum();

        let Some(mapping) = self
            .oracle
            .map_ranges(feature.seqid(), feature.strand(), &ranges)
        else {
            return Ok(TranscriptMapping::unmapped(node, RemapStatus::NoSeqMap, total));
        };
        let blocks = dominant_target_blocks(mapping.blocks, feature);
        let Some(target) = blocks.first().map(Target::of) else {
            return Ok(TranscriptMapping::unmapped(node, RemapStatus::Deleted, total));
        };

        let coverage = Coverage {
            covered: blocks.iter().map(MappedBlock::aligned_bases).sum(),
            total,
            blocks: count_target_blocks(&ranges, &blocks),
        };

        let children = tree.children(node);
        let mut leaves = Vec::with_capacity(children.len());
        for &child in children {
            let pieces = project_leaf(tree.feature(child), &blocks, &target)?;
            leaves.extend(pieces.into_iter().map(|piece| (child, piece)));
        }

        let span = if children.is_empty() {
            project_range(&feature.range(), &blocks)
                .into_iter()
                .reduce(|acc, piece| acc.span(&piece))
        } else {
            leaves
                .iter()
                .map(|(_, leaf)| leaf.range())
                .reduce(|acc, range| acc.span(&range))
        };

        let status = match span {
            Some(_) => classify_transcript(&coverage),
            None => RemapStatus::Deleted,
        };
        Ok(TranscriptMapping {
            node,
            status,
            coverage,
            target: Some(target),
            span,
            leaves,
        })
    }

    /// Projects every transcript of a gene and decides the gene status.
    pub fn map_gene(&self, tree: &FeatureTree) -> GxfResult<GeneMapping> {
        let gene = tree.gene();
        let bare = tree.transcripts().is_empty();
        let results = if bare {
            vec![self.map_transcript(tree, tree.root())?]
        } else {
            tree.transcripts()
                .iter()
                .map(|&node| self.map_transcript(tree, node))
                .collect::<GxfResult<Vec<_>>>()?
        };

        let emitted: Vec<&TranscriptMapping> =
            results.iter().filter(|result| result.is_emitted()).collect();
        let conflict = has_conflict(&emitted);
        let expand = self.is_expanded(gene, &emitted);
        let statuses: Vec<RemapStatus> = results.iter().map(|result| result.status).collect();
        let gene_status = aggregate_gene(&statuses, conflict, expand, self.options.precedence());

        let keep_mapped = !emitted.is_empty()
            && !matches!(
                gene_status,
                RemapStatus::GeneConflict | RemapStatus::GeneExpand
            );

        debug!(
            "{} {}: {gene_status} ({} of {} transcripts emitted)",
            gene.feature_type(),
            gene.location(),
            if keep_mapped { emitted.len() } else { 0 },
            if bare { 0 } else { results.len() }
        );

        let mapped = if keep_mapped {
            build_mapped(tree, gene_status, &emitted, bare)?
        } else {
            None
        };
        let unmapped = build_unmapped(tree, gene_status, &results, keep_mapped, bare)?;

        Ok(GeneMapping {
            gene_status,
            mapped,
            unmapped,
        })
    }

    /// Checks the mapped/source span ratio, per target when transcripts
    /// disagree on where they landed.
    fn is_expanded(&self, gene: &Feature, emitted: &[&TranscriptMapping]) -> bool {
        let mut spans: Vec<(&Target, Range)> = Vec::new();
        for result in emitted {
            let (Some(target), Some(span)) = (result.target.as_ref(), result.span) else {
                continue;
            };
            match spans.iter_mut().find(|(seen, _)| *seen == target) {
                Some((_, total)) => *total = total.span(&span),
                None => spans.push((target, span)),
            }
        }

        let threshold = self.options.expansion_threshold();
        spans.iter().any(|(_, span)| {
            let ratio = span.len() as f64 / gene.size() as f64;
            ratio > threshold
        })
    }
}

/// `true` if emitted transcripts landed on more than one sequence/strand.
fn has_conflict(emitted: &[&TranscriptMapping]) -> bool {
    let mut targets = emitted.iter().filter_map(|result| result.target.as_ref());
    match targets.next() {
        Some(first) => targets.any(|target| target != first),
        None => false,
    }
}

fn build_mapped(
    tree: &FeatureTree,
    gene_status: RemapStatus,
    emitted: &[&TranscriptMapping],
    bare: bool,
) -> GxfResult<Option<FeatureTree>> {
    let source = tree.gene();
    let mut target = None;
    let mut span: Option<Range> = None;
    for result in emitted {
        if let (Some(t), Some(s)) = (result.target.as_ref(), result.span) {
            target.get_or_insert(t);
            span = Some(span.map_or(s, |acc| acc.span(&s)));
        }
    }
    let (Some(target), Some(span)) = (target, span) else {
        return Ok(None);
    };

    let mut gene = source.relocated(&target.seqid, span, target.strand);
    annotate(&mut gene, gene_status, Some(source.location()))?;
    let mut mapped = FeatureTree::new(gene);
    mapped.set_status(mapped.root(), gene_status);
    let mut moved = HashMap::from([(tree.root(), mapped.root())]);
    if bare {
        mapped.carry_lines(tree, &moved);
        return Ok(Some(mapped));
    }

    for result in emitted {
        let (Some(target), Some(span)) = (result.target.as_ref(), result.span) else {
            continue;
        };
        let original = tree.feature(result.node);
        let mut transcript = original.relocated(&target.seqid, span, target.strand);
        annotate(&mut transcript, result.status, Some(original.location()))?;
        let node = mapped.add_child(mapped.root(), transcript);
        mapped.set_status(node, result.status);
        moved.insert(result.node, node);
        for (source, leaf) in &result.leaves {
            let copy = mapped.add_child(node, leaf.clone());
            moved.insert(*source, copy);
        }
    }
    mapped.carry_lines(tree, &moved);
    Ok(Some(mapped))
}

fn build_unmapped(
    tree: &FeatureTree,
    gene_status: RemapStatus,
    results: &[TranscriptMapping],
    keep_mapped: bool,
    bare: bool,
) -> GxfResult<Option<FeatureTree>> {
    if bare {
        if keep_mapped {
            return Ok(None);
        }
        let mut gene = tree.gene().clone();
        annotate(&mut gene, gene_status, None)?;
        let mut unmapped = FeatureTree::new(gene);
        unmapped.set_status(unmapped.root(), gene_status);
        unmapped.carry_lines(tree, &HashMap::from([(tree.root(), unmapped.root())]));
        return Ok(Some(unmapped));
    }

    let left: Vec<&TranscriptMapping> = results
        .iter()
        .filter(|result| !keep_mapped || !result.is_emitted())
        .collect();
    if left.is_empty() {
        return Ok(None);
    }

    let mut gene = tree.gene().clone();
    annotate(&mut gene, gene_status, None)?;
    let mut unmapped = FeatureTree::new(gene);
    unmapped.set_status(unmapped.root(), gene_status);
    let mut moved = HashMap::from([(tree.root(), unmapped.root())]);
    for result in left {
        let mut transcript = tree.feature(result.node).clone();
        annotate(&mut transcript, result.status, None)?;
        let node = unmapped.add_child(unmapped.root(), transcript);
        unmapped.set_status(node, result.status);
        moved.insert(result.node, node);
        for &leaf in tree.children(result.node) {
            let copy = unmapped.add_child(node, tree.feature(leaf).clone());
            moved.insert(leaf, copy);
        }
    }
    unmapped.carry_lines(tree, &moved);
    Ok(Some(unmapped))
}
