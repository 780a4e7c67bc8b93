use std::collections::HashMap;
use std::io::{self, Write};

use log::info;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::assembler::{GroupItem, TreeAssembler};
use crate::error::GxfResult;
use crate::mapper::{GeneMapper, GeneMapping};
use crate::options::{RemapOptions, UnmappedPolicy};
use crate::oracle::AlignmentOracle;
use crate::reader::Reader;
use crate::status::RemapStatus;
use crate::tree::FeatureTree;
use crate::writer::Writer;

/// Counters gathered over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapStats {
    /// Gene groups read.
    pub genes: usize,
    /// Genes written in target coordinates.
    pub mapped_genes: usize,
    /// Passthrough lines outside gene groups.
    pub lines: usize,
    statuses: HashMap<RemapStatus, usize>,
}

impl RemapStats {
    /// Number of genes that ended with `status`.
    pub fn count(&self, status: RemapStatus) -> usize {
        self.statuses.get(&status).copied().unwrap_or(0)
    }

    fn record(&mut self, mapping: &GeneMapping) {
        self.genes += 1;
        if mapping.mapped.is_some() {
            self.mapped_genes += 1;
        }
        *self.statuses.entry(mapping.gene_status).or_default() += 1;
    }

    fn log_summary(&self) {
        info!(
            "remapped {} of {} genes ({} passthrough lines)",
            self.mapped_genes, self.genes, self.lines
        );
        for status in RemapStatus::ALL {
            let count = self.count(status);
            if count > 0 {
                info!("  {status}: {count}");
            }
        }
    }
}

/// Drives a whole annotation file through assembly, mapping and output.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
///
/// use gxfmap::feature::Range;
/// use gxfmap::oracle::BlockOracle;
/// use gxfmap::{GeneRemapper, GxfFormat, Reader, RemapOptions, Writer};
///
/// let data = "##gff-version 3\n\
///             chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
///             chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
///             chr1\tHAVANA\texon\t1000\t2000\t.\t+\t.\tParent=T1\n";
/// let reader = Reader::from_reader(Cursor::new(data), GxfFormat::Gff3).unwrap();
///
/// let mut oracle = BlockOracle::new();
/// oracle.add_block("chr1", Range::new(1, 5000).unwrap(), "chr1", 101, false);
///
/// let remapper = GeneRemapper::new(oracle, RemapOptions::default()).unwrap();
/// let mut out = Writer::new(Vec::new());
/// let stats = remapper.run(reader, &mut out).unwrap();
///
/// assert_eq!(stats.mapped_genes, 1);
/// let text = String::from_utf8(out.into_inner()).unwrap();
/// assert!(text.contains("chr1\tHAVANA\tgene\t1100\t2100"));
/// ```
#[derive(Debug, Clone)]
pub struct GeneRemapper<O> {
    mapper: GeneMapper<O>,
}

impl<O: AlignmentOracle> GeneRemapper<O> {
    /// Creates a remapper.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the options do not validate.
    pub fn new(oracle: O, options: RemapOptions) -> GxfResult<Self> {
        options.validate()?;
        Ok(Self {
            mapper: GeneMapper::new(oracle, options),
        })
    }

    /// Maps one assembled gene.
    pub fn map_gene(&self, tree: &FeatureTree) -> GxfResult<GeneMapping> {
        self.mapper.map_gene(tree)
    }

    /// Remaps every gene of `reader` into `out`.
    pub fn run<W: Write>(&self, reader: Reader, out: &mut Writer<W>) -> GxfResult<RemapStats> {
        self.run_inner(reader, out, None::<&mut Writer<io::Sink>>)
    }

    /// Like [`GeneRemapper::run`], sending genes and transcripts that could not
    /// be written in target coordinates to `unmapped`.
    pub fn run_with_unmapped<W: Write, U: Write>(
        &self,
        reader: Reader,
        out: &mut Writer<W>,
        unmapped: &mut Writer<U>,
    ) -> GxfResult<RemapStats> {
        self.run_inner(reader, out, Some(unmapped))
    }

    fn run_inner<W: Write, U: Write>(
        &self,
        reader: Reader,
        out: &mut Writer<W>,
        mut unmapped: Option<&mut Writer<U>>,
    ) -> GxfResult<RemapStats> {
        let mut assembler = TreeAssembler::new(reader, self.mapper.options().par_hack_method());
        let mut stats = RemapStats::default();

        while let Some(item) = assembler.next_item()? {
            match item {
                GroupItem::Line(line) => {
                    out.write_line(&line)?;
                    stats.lines += 1;
                }
                GroupItem::Gene(tree) => {
                    let mapping = self.mapper.map_gene(&tree)?;
                    self.write_mapping(&tree, &mapping, out, unmapped.as_deref_mut())?;
                    stats.record(&mapping);
                }
            }
        }

        out.flush()?;
        if let Some(sink) = unmapped {
            sink.flush()?;
        }
        stats.log_summary();
        Ok(stats)
    }

    /// Writes the mapped tree and routes the unmapped one. Passthrough lines
    /// always land in the main output, next to whichever tree is written
    /// there, or on their own when neither is.
    fn write_mapping<W: Write, U: Write>(
        &self,
        source: &FeatureTree,
        mapping: &GeneMapping,
        out: &mut Writer<W>,
        unmapped: Option<&mut Writer<U>>,
    ) -> GxfResult<()> {
        let mut lines_written = false;
        if let Some(tree) = &mapping.mapped {
            out.write_tree(tree)?;
            lines_written = true;
        }
        if let Some(tree) = &mapping.unmapped {
            match unmapped {
                Some(sink) => sink.write_tree_features(tree)?,
                None if mapping.mapped.is_none()
                    && self.mapper.options().unmapped_handling() == UnmappedPolicy::Emit =>
                {
                    out.write_tree(tree)?;
                    lines_written = true;
                }
                None => {}
            }
        }
        if !lines_written {
            out.write_tree_lines(source)?;
        }
        Ok(())
    }
}

#[cfg(feature = "rayon")]
impl<O: AlignmentOracle + Sync> GeneRemapper<O> {
    /// Like [`GeneRemapper::run`], mapping up to `batch` genes at a time in
    /// parallel. Output order is input order.
    pub fn run_parallel<W: Write>(
        &self,
        reader: Reader,
        out: &mut Writer<W>,
        batch: usize,
    ) -> GxfResult<RemapStats> {
        let batch = batch.max(1);
        let mut assembler = TreeAssembler::new(reader, self.mapper.options().par_hack_method());
        let mut stats = RemapStats::default();
        let mut items = Vec::with_capacity(batch);

        loop {
            items.clear();
            while items.len() < batch {
                match assembler.next_item()? {
                    Some(item) => items.push(item),
                    None => break,
                }
            }
            if items.is_empty() {
                break;
            }

            let mappings = items
                .par_iter()
                .map(|item| match item {
                    GroupItem::Gene(tree) => self.mapper.map_gene(tree).map(Some),
                    GroupItem::Line(_) => Ok(None),
                })
                .collect::<GxfResult<Vec<_>>>()?;

            for (item, mapping) in items.iter().zip(mappings) {
                match (item, mapping) {
                    (GroupItem::Gene(tree), Some(mapping)) => {
                        self.write_mapping(tree, &mapping, out, None::<&mut Writer<io::Sink>>)?;
                        stats.record(&mapping);
                    }
                    (GroupItem::Line(line), _) => {
                        out.write_line(line)?;
                        stats.lines += 1;
                    }
                    (GroupItem::Gene(_), None) => {}
                }
            }
        }

        out.flush()?;
        stats.log_summary();
        Ok(stats)
    }
}
