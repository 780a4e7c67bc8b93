//! Groups a flat record stream into gene-rooted [`FeatureTree`]s.
//!
//! GFF3 groups start at a `gene` row and run until the next `gene` or `###`;
//! children are linked through `Parent`/`ID`. GTF groups are runs of rows sharing
//! `gene_id`; rows attach to the transcript named by `transcript_id`.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::{GxfError, GxfResult};
use crate::feature::{Feature, Record};
use crate::gxf::GxfFormat;
use crate::options::ParIdHack;
use crate::reader::Reader;
use crate::tree::{FeatureTree, NodeId};

const ID_ATTR: &str = "ID";
const PARENT_ATTR: &str = "Parent";
const GENE_ID_ATTR: &str = "gene_id";
const TRANSCRIPT_ID_ATTR: &str = "transcript_id";
const EXON_ID_ATTR: &str = "exon_id";
const TAG_ATTR: &str = "tag";
const PAR_TAG: &str = "PAR";
const PAR_Y_SUFFIX: &str = "_PAR_Y";

/// Identifier attributes rewritten by the PAR hack.
const PAR_ID_ATTRS: [&str; 5] = [
    ID_ATTR,
    PARENT_ATTR,
    GENE_ID_ATTR,
    TRANSCRIPT_ID_ATTR,
    EXON_ID_ATTR,
];

/// One unit handed out by the assembler, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupItem {
    /// A passthrough line outside any gene group.
    Line(String),
    /// A complete gene.
    Gene(FeatureTree),
}

/// Pulls records from a [`Reader`] and yields one gene tree at a time.
///
/// # Example
///
/// ```
/// use gxfmap::assembler::{GroupItem, TreeAssembler};
/// use gxfmap::options::ParIdHack;
/// use gxfmap::{GxfFormat, Reader};
///
/// let data = "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
///             chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
///             chr1\tHAVANA\texon\t1000\t1200\t.\t+\t.\tParent=T1\n";
/// let reader = Reader::from_reader(std::io::Cursor::new(data), GxfFormat::Gff3).unwrap();
///
/// let mut assembler = TreeAssembler::new(reader, ParIdHack::New);
/// let Some(GroupItem::Gene(tree)) = assembler.next_item().unwrap() else {
///     panic!("expected a gene");
/// };
/// assert_eq!(tree.len(), 3);
/// assert!(assembler.next_item().unwrap().is_none());
/// ```
pub struct TreeAssembler {
    reader: Reader,
    par_hack: ParIdHack,
    seen_gene_ids: HashSet<String>,
}

impl TreeAssembler {
    pub fn new(reader: Reader, par_hack: ParIdHack) -> Self {
        Self {
            reader,
            par_hack,
            seen_gene_ids: HashSet::new(),
        }
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> Reader {
        self.reader
    }

    /// Returns the next passthrough line or gene tree, `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` for features outside a gene, unresolved
    /// parents, and hierarchies deeper than gene, transcript, leaf.
    pub fn next_item(&mut self) -> GxfResult<Option<GroupItem>> {
        let feature = match self.reader.next_record()? {
            None => return Ok(None),
            Some(Record::Line(line)) => return Ok(Some(GroupItem::Line(line))),
            Some(Record::Feature(feature)) => feature,
        };

        if !feature.is_gene() {
            return Err(GxfError::malformed(
                self.reader.current_line(),
                format!(
                    "'{}' feature at {} is not inside a gene",
                    feature.feature_type(),
                    feature.location()
                ),
            ));
        }

        let mut tree = match self.reader.format() {
            GxfFormat::Gff3 => self.assemble_gff3(feature)?,
            GxfFormat::Gtf => self.assemble_gtf(feature)?,
        };
        self.disambiguate_par(&mut tree);
        Ok(Some(GroupItem::Gene(tree)))
    }

    fn assemble_gff3(&mut self, gene: Feature) -> GxfResult<FeatureTree> {
        let mut ids: HashMap<String, NodeId> = HashMap::new();
        let gene_id = gene.attr_val(ID_ATTR).map(str::to_string);
        let mut tree = FeatureTree::new(gene);
        if let Some(id) = gene_id {
            ids.insert(id, tree.root());
        }

        while let Some(record) = self.reader.next_record()? {
            let feature = match record {
                // `###`: all forward references resolved
                Record::Line(line) if line == "###" => {
                    tree.push_line(line);
                    break;
                }
                Record::Line(line) => {
                    tree.push_line(line);
                    continue;
                }
                Record::Feature(feature) if feature.is_gene() => {
                    self.reader.push(Record::Feature(feature));
                    break;
                }
                Record::Feature(feature) => feature,
            };

            let line = self.reader.current_line();
            let parent_attr = feature.attrs().find(PARENT_ATTR).ok_or_else(|| {
                GxfError::malformed(
                    line,
                    format!(
                        "'{}' feature at {} has no Parent",
                        feature.feature_type(),
                        feature.location()
                    ),
                )
            })?;
            if parent_attr.len() > 1 {
                return Err(GxfError::malformed(
                    line,
                    format!("multiple parents are not supported: {}", parent_attr.vals().join(",")),
                ));
            }
            let parent = *ids.get(parent_attr.val()).ok_or_else(|| {
                GxfError::malformed(
                    line,
                    format!("parent '{}' not found in current gene", parent_attr.val()),
                )
            })?;
            if tree.depth(parent) >= 2 {
                return Err(GxfError::malformed(
                    line,
                    format!(
                        "'{}' feature nests below a leaf; only gene, transcript, leaf is supported",
                        feature.feature_type()
                    ),
                ));
            }

            let id = feature.attr_val(ID_ATTR).map(str::to_string);
            let node = tree.add_child(parent, feature);
            if let Some(id) = id {
                ids.entry(id).or_insert(node);
            }
        }
        Ok(tree)
    }

    fn assemble_gtf(&mut self, gene: Feature) -> GxfResult<FeatureTree> {
        let gene_id = gene
            .attr_val(GENE_ID_ATTR)
            .map(str::to_string)
            .ok_or_else(|| {
                GxfError::malformed(
                    self.reader.current_line(),
                    format!("gene at {} has no gene_id", gene.location()),
                )
            })?;
        let mut transcripts: HashMap<String, NodeId> = HashMap::new();
        let mut tree = FeatureTree::new(gene);

        while let Some(record) = self.reader.next_record()? {
            let feature = match record {
                Record::Line(line) => {
                    tree.push_line(line);
                    continue;
                }
                Record::Feature(feature)
                    if feature.is_gene() || feature.attr_val(GENE_ID_ATTR) != Some(gene_id.as_str()) =>
                {
                    self.reader.push(Record::Feature(feature));
                    break;
                }
                Record::Feature(feature) => feature,
            };

            let line = self.reader.current_line();
            let transcript_id = feature
                .attr_val(TRANSCRIPT_ID_ATTR)
                .map(str::to_string)
                .ok_or_else(|| {
                    GxfError::malformed(
                        line,
                        format!(
                            "'{}' feature at {} has no transcript_id",
                            feature.feature_type(),
                            feature.location()
                        ),
                    )
                })?;

            if feature.is_transcript() {
                let node = tree.add_child(tree.root(), feature);
                transcripts.entry(transcript_id).or_insert(node);
            } else {
                let parent = *transcripts.get(&transcript_id).ok_or_else(|| {
                    GxfError::malformed(
                        line,
                        format!("transcript '{transcript_id}' not found in current gene"),
                    )
                })?;
                tree.add_child(parent, feature);
            }
        }
        Ok(tree)
    }

    /// Applies the PAR id hack to Y copies and to genes whose id was already
    /// seen, then records the (possibly rewritten) gene id.
    fn disambiguate_par(&mut self, tree: &mut FeatureTree) {
        let id_attr = match tree.gene().format() {
            GxfFormat::Gff3 => ID_ATTR,
            GxfFormat::Gtf => GENE_ID_ATTR,
        };
        let Some(gene_id) = tree.gene().attr_val(id_attr).map(str::to_string) else {
            return;
        };

        let on_y = matches!(tree.gene().seqid(), "chrY" | "Y");
        let par_tagged = tree.gene().attrs().has_val(TAG_ATTR, PAR_TAG);
        let collides = self.seen_gene_ids.contains(&gene_id);

        let final_id = if (on_y && par_tagged) || collides {
            let method = self.par_hack;
            let mut rewritten: HashMap<String, String> = HashMap::new();
            for feature in tree.features_mut() {
                for attr in feature.attrs_mut().entries_mut() {
                    if !PAR_ID_ATTRS.contains(&attr.name()) {
                        continue;
                    }
                    attr.map_vals(|val| {
                        rewritten
                            .entry(val.to_string())
                            .or_insert_with(|| match par_hack_id(val, method) {
                                Some(hacked) => hacked,
                                None => {
                                    warn!("PAR id '{val}' already disambiguated, left as is");
                                    val.to_string()
                                }
                            })
                            .clone()
                    });
                }
            }
            let final_id = tree
                .gene()
                .attr_val(id_attr)
                .map(str::to_string)
                .unwrap_or(gene_id);
            debug!("PAR gene renamed to '{final_id}'");
            final_id
        } else {
            gene_id
        };
        self.seen_gene_ids.insert(final_id);
    }
}

impl Iterator for TreeAssembler {
    type Item = GxfResult<GroupItem>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item().transpose()
    }
}

/// Makes a PAR identifier unique; `None` if it already carries the marker.
///
/// ```
/// use gxfmap::assembler::par_hack_id;
/// use gxfmap::options::ParIdHack;
///
/// assert_eq!(par_hack_id("ENSG00000182378.14", ParIdHack::New).unwrap(), "ENSG00000182378.14_PAR_Y");
/// assert_eq!(par_hack_id("ENSG00000182378.14", ParIdHack::Old).unwrap(), "ENSGR0000182378.14");
/// assert_eq!(par_hack_id("exon:ENST00000381192.8:1", ParIdHack::Old).unwrap(), "exon:ENSTR0000381192.8:1");
/// assert!(par_hack_id("ENST00000381192_PAR_Y", ParIdHack::New).is_none());
/// ```
pub fn par_hack_id(id: &str, method: ParIdHack) -> Option<String> {
    match method {
        ParIdHack::New => {
            if id.ends_with(PAR_Y_SUFFIX) {
                None
            } else {
                Some(format!("{id}{PAR_Y_SUFFIX}"))
            }
        }
        ParIdHack::Old => {
            let bytes = id.as_bytes();
            let marked = bytes
                .windows(3)
                .any(|w| w[0].is_ascii_alphabetic() && w[1] == b'R' && w[2].is_ascii_digit());
            if marked {
                return None;
            }
            // first `0` directly after a letter
            match bytes
                .windows(2)
                .position(|w| w[0].is_ascii_alphabetic() && w[1] == b'0')
            {
                Some(pos) => {
                    let mut hacked = id.to_string();
                    hacked.replace_range(pos + 1..pos + 2, "R");
                    Some(hacked)
                }
                None => Some(format!("{id}R")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn assembler(data: &str, format: GxfFormat) -> TreeAssembler {
        let reader = Reader::from_reader(Cursor::new(data.to_string()), format).unwrap();
        TreeAssembler::new(reader, ParIdHack::New)
    }

    #[test]
    fn old_hack_without_digits_appends() {
        assert_eq!(par_hack_id("geneX", ParIdHack::Old).unwrap(), "geneXR");
        assert!(par_hack_id("ENSGR0000182378", ParIdHack::Old).is_none());
    }

    #[test]
    fn feature_before_gene_is_malformed() {
        let mut assembler = assembler(
            "chr1\tHAVANA\texon\t1\t10\t.\t+\t.\tParent=T1\n",
            GxfFormat::Gff3,
        );
        let err = assembler.next_item().unwrap_err();
        assert!(matches!(err, GxfError::MalformedInput { line: 1, .. }));
    }

    #[test]
    fn gtf_groups_split_on_gene_id() {
        let data = "chr1\tH\tgene\t1\t100\t.\t+\t.\tgene_id \"G1\";\n\
                    chr1\tH\ttranscript\t1\t100\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
                    chr1\tH\texon\t1\t100\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
                    chr1\tH\tgene\t200\t300\t.\t-\t.\tgene_id \"G2\";\n";
        let items: Vec<_> = assembler(data, GxfFormat::Gtf)
            .collect::<GxfResult<_>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        let GroupItem::Gene(first) = &items[0] else {
            panic!("expected gene");
        };
        assert_eq!(first.len(), 3);
        assert_eq!(first.depth(first.children(first.transcripts()[0])[0]), 2);
    }

    #[test]
    fn gtf_leaf_without_transcript_row_is_malformed() {
        let data = "chr1\tH\tgene\t1\t100\t.\t+\t.\tgene_id \"G1\";\n\
                    chr1\tH\texon\t1\t100\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T9\";\n";
        let err = assembler(data, GxfFormat::Gtf).next_item().unwrap_err();
        assert!(matches!(err, GxfError::MalformedInput { line: 2, .. }));
    }
}
