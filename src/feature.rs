use std::fmt;

use crate::attrs::{AttrVal, AttrVals};
use crate::error::{GxfError, GxfResult};
use crate::gxf::{self, GxfFormat};
use crate::strand::Strand;

/// Standard feature type names.
pub const GENE: &str = "gene";
pub const TRANSCRIPT: &str = "transcript";
pub const EXON: &str = "exon";
pub const CDS: &str = "CDS";
pub const START_CODON: &str = "start_codon";
pub const STOP_CODON: &str = "stop_codon";
pub const UTR: &str = "UTR";

/// A 1-based, inclusive genomic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `start > end` or `start == 0`.
    pub fn new(start: u64, end: u64) -> GxfResult<Self> {
        if start == 0 || start > end {
            return Err(GxfError::invalid(format!(
                "invalid 1-based range {start}-{end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Returns the number of bases covered.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; a valid range covers at least one base.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the overlapping part of two ranges.
    #[inline]
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Range { start, end })
    }

    /// Returns the smallest range covering both.
    #[inline]
    pub fn span(&self, other: &Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns `true` if the ranges overlap or touch end to start.
    #[inline]
    pub fn abuts_or_overlaps(&self, other: &Range) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// CDS reading frame column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Zero,
    One,
    Two,
    /// `.`
    None,
}

impl Phase {
    /// Parses a phase column.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless the column is exactly `0`, `1`, `2` or `.`.
    pub fn parse(raw: &str) -> GxfResult<Self> {
        match raw {
            "0" => Ok(Phase::Zero),
            "1" => Ok(Phase::One),
            "2" => Ok(Phase::Two),
            "." => Ok(Phase::None),
            other => Err(GxfError::invalid(format!(
                "expected '0', '1', '2' or '.' as phase, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Zero => f.write_str("0"),
            Phase::One => f.write_str("1"),
            Phase::Two => f.write_str("2"),
            Phase::None => f.write_str("."),
        }
    }
}

/// One annotation row.
///
/// The eight leading columns are fixed at construction; only the attribute
/// block may change afterwards. Moving a feature to new coordinates produces a
/// new feature through [`Feature::relocated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    format: GxfFormat,
    seqid: String,
    source: String,
    feature_type: String,
    range: Range,
    score: String,
    strand: Strand,
    phase: Phase,
    attrs: AttrVals,
}

impl Feature {
    /// Creates a new feature.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `start > end`, `start` is zero, or a text
    /// column is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        format: GxfFormat,
        seqid: impl Into<String>,
        source: impl Into<String>,
        feature_type: impl Into<String>,
        start: u64,
        end: u64,
        score: impl Into<String>,
        strand: Strand,
        phase: Phase,
        attrs: AttrVals,
    ) -> GxfResult<Self> {
        let feature = Self {
            format,
            seqid: seqid.into(),
            source: source.into(),
            feature_type: feature_type.into(),
            range: Range::new(start, end)?,
            score: score.into(),
            strand,
            phase,
            attrs,
        };
        for (column, value) in [
            ("seqid", &feature.seqid),
            ("source", &feature.source),
            ("type", &feature.feature_type),
            ("score", &feature.score),
        ] {
            if value.is_empty() {
                return Err(GxfError::invalid(format!("empty {column} column")));
            }
        }
        Ok(feature)
    }

    /// Returns a copy of this feature moved to a new location.
    pub fn relocated(&self, seqid: &str, range: Range, strand: Strand) -> Self {
        Self {
            seqid: seqid.to_string(),
            range,
            strand,
            ..self.clone()
        }
    }

    #[inline]
    pub fn format(&self) -> GxfFormat {
        self.format
    }

    #[inline]
    pub fn seqid(&self) -> &str {
        &self.seqid
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.range.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.range.end
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    #[inline]
    pub fn score(&self) -> &str {
        &self.score
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn attrs(&self) -> &AttrVals {
        &self.attrs
    }

    #[inline]
    pub fn attrs_mut(&mut self) -> &mut AttrVals {
        &mut self.attrs
    }

    /// Returns the first value of an attribute, if present.
    pub fn attr_val(&self, name: &str) -> Option<&str> {
        self.attrs.find(name).map(AttrVal::val)
    }

    /// Returns the number of bases covered (`end - start + 1`).
    #[inline]
    pub fn size(&self) -> u64 {
        self.range.len()
    }

    /// Checks if two features share sequence, strand and at least one base.
    pub fn overlaps(&self, other: &Feature) -> bool {
        self.seqid == other.seqid
            && self.strand == other.strand
            && self.range.intersect(&other.range).is_some()
    }

    /// Returns `true` if this is a `gene` row.
    pub fn is_gene(&self) -> bool {
        self.feature_type.eq_ignore_ascii_case(GENE)
    }

    /// Returns `true` if this is a GTF `transcript` row.
    pub fn is_transcript(&self) -> bool {
        self.feature_type.eq_ignore_ascii_case(TRANSCRIPT)
    }

    /// Returns `true` if this is an `exon` row.
    pub fn is_exon(&self) -> bool {
        self.feature_type.eq_ignore_ascii_case(EXON)
    }

    /// Returns `seqid:strand:start-end`, used to record where a feature came from.
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.seqid, self.strand, self.range)
    }
}

impl fmt::Display for Feature {
    /// Renders the feature as one GFF3 or GTF line, without the newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            self.seqid,
            self.source,
            self.feature_type,
            self.range.start,
            self.range.end,
            self.score,
            self.strand,
            self.phase
        )?;
        match self.format {
            GxfFormat::Gff3 => gxf::write_gff3_attributes(f, &self.attrs),
            GxfFormat::Gtf => gxf::write_gtf_attributes(f, &self.attrs),
        }
    }
}

/// A parsed line: either a feature or text reproduced verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Comment, directive or blank line, without its newline.
    Line(String),
    Feature(Feature),
}

impl Record {
    /// Returns the feature if this record holds one.
    pub fn as_feature(&self) -> Option<&Feature> {
        match self {
            Record::Feature(feature) => Some(feature),
            Record::Line(_) => None,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Line(line) => f.write_str(line),
            Record::Feature(feature) => write!(f, "{feature}"),
        }
    }
}
