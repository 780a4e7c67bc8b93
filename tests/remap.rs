use std::io::Cursor;

use gxfmap::assembler::{GroupItem, TreeAssembler};
use gxfmap::feature::Range;
use gxfmap::oracle::BlockOracle;
use gxfmap::{
    AlignmentOracle, ChainIndex, FeatureTree, GenePrecedence, GeneRemapper, GxfFormat, ParIdHack, Reader, RemapOptions,
    RemapStats, RemapStatus, Strand, UnmappedPolicy, Writer,
};

fn range(start: u64, end: u64) -> Range {
    Range::new(start, end).unwrap()
}

fn remap<O: AlignmentOracle>(
    data: &str,
    format: GxfFormat,
    oracle: &O,
    options: RemapOptions,
) -> (Vec<String>, Vec<String>, RemapStats) {
    let reader = Reader::from_reader(Cursor::new(data.to_string()), format).unwrap();
    let remapper = GeneRemapper::new(oracle, options).unwrap();
    let mut out = Writer::new(Vec::new());
    let mut unmapped = Writer::new(Vec::new());
    let stats = remapper
        .run_with_unmapped(reader, &mut out, &mut unmapped)
        .unwrap();
    let lines = |bytes: Vec<u8>| -> Vec<String> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    };
    (lines(out.into_inner()), lines(unmapped.into_inner()), stats)
}

fn first_gene(data: &str, format: GxfFormat) -> FeatureTree {
    let reader = Reader::from_reader(Cursor::new(data.to_string()), format).unwrap();
    TreeAssembler::new(reader, ParIdHack::New)
        .find_map(|item| match item.unwrap() {
            GroupItem::Gene(tree) => Some(tree),
            GroupItem::Line(_) => None,
        })
        .unwrap()
}

const SCENARIO: &str = "##gff-version 3\n\
chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
chr1\tHAVANA\texon\t1000\t1200\t.\t+\t.\tID=E1;Parent=T1\n\
chr1\tHAVANA\texon\t1800\t2000\t.\t+\t.\tID=E2;Parent=T1\n";

fn scenario_oracle() -> BlockOracle {
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(1000, 1200), "chr1", 1500, false)
        .add_block("chr1", range(1800, 1850), "chr1", 2300, false)
        .add_block("chr1", range(1870, 2000), "chr1", 2370, false);
    oracle
}

#[test]
fn end_to_end_partial_fragment() {
    let (out, unmapped, stats) = remap(
        SCENARIO,
        GxfFormat::Gff3,
        &scenario_oracle(),
        RemapOptions::default(),
    );

    assert_eq!(
        out,
        [
            "##gff-version 3",
            "chr1\tHAVANA\tgene\t1500\t2500\t.\t+\t.\tID=G1;remap_status=partial_fragment;remap_original_location=chr1:+:1000-2000",
            "chr1\tHAVANA\ttranscript\t1500\t2500\t.\t+\t.\tID=T1;Parent=G1;remap_status=partial_fragment;remap_original_location=chr1:+:1000-2000",
            "chr1\tHAVANA\texon\t1500\t1700\t.\t+\t.\tID=E1;Parent=T1",
            "chr1\tHAVANA\texon\t2300\t2350\t.\t+\t.\tID=E2;Parent=T1;remap_fragment=1",
            "chr1\tHAVANA\texon\t2370\t2500\t.\t+\t.\tID=E2;Parent=T1;remap_fragment=2",
        ]
    );
    assert!(unmapped.is_empty());
    assert_eq!(stats.genes, 1);
    assert_eq!(stats.mapped_genes, 1);
    assert_eq!(stats.lines, 1);
    assert_eq!(stats.count(RemapStatus::PartialFragment), 1);
}

#[test]
fn end_to_end_gtf() {
    let data = "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tgene_id \"G1\";\n\
                chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
                chr1\tHAVANA\texon\t1000\t1200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number 1;\n\
                chr1\tHAVANA\texon\t1800\t2000\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number 2;\n";
    let (out, _, _) = remap(
        data,
        GxfFormat::Gtf,
        &scenario_oracle(),
        RemapOptions::default(),
    );
    assert_eq!(out.len(), 5);
    assert_eq!(
        out[0],
        "chr1\tHAVANA\tgene\t1500\t2500\t.\t+\t.\tgene_id \"G1\"; remap_status \"partial_fragment\"; remap_original_location \"chr1:+:1000-2000\";"
    );
    assert_eq!(
        out[3],
        "chr1\tHAVANA\texon\t2300\t2350\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number 2; remap_fragment \"1\";"
    );
}

#[test]
fn split_fragments_partition_the_covered_bases() {
    let tree = first_gene(SCENARIO, GxfFormat::Gff3);
    let oracle = scenario_oracle();
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapped = remapper.map_gene(&tree).unwrap().mapped.unwrap();

    let transcript = mapped.transcripts()[0];
    let fragments: Vec<Range> = mapped
        .children(transcript)
        .iter()
        .map(|&leaf| mapped.feature(leaf))
        .filter(|leaf| leaf.attr_val("ID") == Some("E2"))
        .map(|leaf| leaf.range())
        .collect();
    assert_eq!(fragments, [range(2300, 2350), range(2370, 2500)]);
    assert!(fragments.windows(2).all(|w| w[0].end < w[1].start));

    let covered: u64 = fragments.iter().map(Range::len).sum();
    assert_eq!(covered, 51 + 131);
}

#[test]
fn spans_bound_children() {
    let tree = first_gene(SCENARIO, GxfFormat::Gff3);
    let oracle = scenario_oracle();
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapped = remapper.map_gene(&tree).unwrap().mapped.unwrap();

    let span_of = |ids: &[gxfmap::NodeId]| {
        ids.iter()
            .map(|&id| mapped.feature(id).range())
            .reduce(|a, b| a.span(&b))
            .unwrap()
    };
    for &transcript in mapped.transcripts() {
        assert_eq!(
            mapped.feature(transcript).range(),
            span_of(mapped.children(transcript))
        );
        assert_eq!(mapped.status(transcript), RemapStatus::PartialFragment);
    }
    assert_eq!(mapped.gene().range(), span_of(mapped.transcripts()));
}

const TWO_TRANSCRIPTS: &str = "chr1\tHAVANA\tgene\t1000\t1999\t.\t+\t.\tID=G1\n\
chr1\tHAVANA\ttranscript\t1000\t1099\t.\t+\t.\tID=T1;Parent=G1\n\
chr1\tHAVANA\texon\t1000\t1099\t.\t+\t.\tParent=T1\n\
chr1\tHAVANA\ttranscript\t1900\t1999\t.\t+\t.\tID=T2;Parent=G1\n\
chr1\tHAVANA\texon\t1900\t1999\t.\t+\t.\tParent=T2\n";

#[test]
fn strand_disagreement_is_gene_conflict() {
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(1000, 1099), "chr1", 10_000, false)
        .add_block("chr1", range(1900, 1999), "chr1", 10_500, true);
    let (out, unmapped, stats) = remap(
        TWO_TRANSCRIPTS,
        GxfFormat::Gff3,
        &oracle,
        RemapOptions::default(),
    );

    assert!(out.is_empty());
    assert_eq!(stats.count(RemapStatus::GeneConflict), 1);
    assert_eq!(unmapped.len(), 5);
    assert!(unmapped[0].ends_with("ID=G1;remap_status=gene_conflict"));
    // transcripts keep their own status, in source coordinates
    assert!(unmapped[1].contains("\t1000\t1099\t"));
    assert!(unmapped[1].ends_with("remap_status=full_contig"));
}

#[test]
fn sequence_disagreement_is_gene_conflict() {
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(1000, 1099), "chr1", 10_000, false)
        .add_block("chr1", range(1900, 1999), "chr5", 10_000, false);
    let tree = first_gene(TWO_TRANSCRIPTS, GxfFormat::Gff3);
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapping = remapper.map_gene(&tree).unwrap();
    assert_eq!(mapping.gene_status, RemapStatus::GeneConflict);
    assert!(mapping.mapped.is_none());
    assert_eq!(mapping.unmapped.unwrap().transcripts().len(), 2);
}

#[test]
fn large_expansion_is_gene_expand() {
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(1000, 1099), "chr1", 100_000, false)
        .add_block("chr1", range(1900, 1999), "chr1", 149_900, false);
    let tree = first_gene(TWO_TRANSCRIPTS, GxfFormat::Gff3);

    let options = RemapOptions::new().gene_expansion_threshold(10.0);
    let remapper = GeneRemapper::new(&oracle, options).unwrap();
    let mapping = remapper.map_gene(&tree).unwrap();
    assert_eq!(mapping.gene_status, RemapStatus::GeneExpand);
    assert!(mapping.mapped.is_none());

    // 50,000 / 1,000 stays under a 100x threshold
    let options = RemapOptions::new().gene_expansion_threshold(100.0);
    let remapper = GeneRemapper::new(&oracle, options).unwrap();
    let mapping = remapper.map_gene(&tree).unwrap();
    assert_eq!(mapping.gene_status, RemapStatus::FullContig);
    assert_eq!(
        mapping.mapped.unwrap().gene().range(),
        range(100_000, 149_999)
    );
}

#[test]
fn precedence_decides_conflict_with_expansion() {
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(1000, 1099), "chr1", 100_000, false)
        .add_block("chr1", range(1900, 1999), "chr1", 149_900, false)
        .add_block("chr1", range(1500, 1599), "chr2", 500, false);
    let data = "chr1\tHAVANA\tgene\t1000\t1999\t.\t+\t.\tID=G1\n\
                chr1\tHAVANA\ttranscript\t1000\t1999\t.\t+\t.\tID=T1;Parent=G1\n\
                chr1\tHAVANA\texon\t1000\t1099\t.\t+\t.\tParent=T1\n\
                chr1\tHAVANA\texon\t1900\t1999\t.\t+\t.\tParent=T1\n\
                chr1\tHAVANA\ttranscript\t1500\t1599\t.\t+\t.\tID=T2;Parent=G1\n\
                chr1\tHAVANA\texon\t1500\t1599\t.\t+\t.\tParent=T2\n";
    let tree = first_gene(data, GxfFormat::Gff3);

    let statuses: Vec<RemapStatus> = [GenePrecedence::ConflictFirst, GenePrecedence::ExpandFirst]
        .into_iter()
        .map(|precedence| {
            let options = RemapOptions::new()
                .gene_expansion_threshold(10.0)
                .gene_precedence(precedence);
            GeneRemapper::new(&oracle, options)
                .unwrap()
                .map_gene(&tree)
                .unwrap()
                .gene_status
        })
        .collect();
    assert_eq!(
        statuses,
        [RemapStatus::GeneConflict, RemapStatus::GeneExpand]
    );
}

#[test]
fn deleted_gene_is_emitted_on_request() {
    let mut oracle = BlockOracle::new();
    oracle.add_block("chr1", range(50_000, 60_000), "chr1", 1, false);

    let (out, _, stats) = remap(
        SCENARIO,
        GxfFormat::Gff3,
        &oracle,
        RemapOptions::default(),
    );
    assert_eq!(out, ["##gff-version 3"]);
    assert_eq!(stats.count(RemapStatus::Deleted), 1);

    let reader = Reader::from_reader(Cursor::new(SCENARIO), GxfFormat::Gff3).unwrap();
    let options = RemapOptions::new().unmapped_policy(UnmappedPolicy::Emit);
    let remapper = GeneRemapper::new(&oracle, options).unwrap();
    let mut writer = Writer::new(Vec::new());
    remapper.run(reader, &mut writer).unwrap();
    let text = String::from_utf8(writer.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[1],
        "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1;remap_status=deleted"
    );
    assert!(lines[2].ends_with("remap_status=deleted"));
}

#[test]
fn unaligned_sequence_is_no_seq_map() {
    let mut oracle = BlockOracle::new();
    oracle.add_block("chr2", range(1, 10_000), "chr2", 1, false);
    let tree = first_gene(SCENARIO, GxfFormat::Gff3);
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapping = remapper.map_gene(&tree).unwrap();
    assert_eq!(mapping.gene_status, RemapStatus::NoSeqMap);
    let unmapped = mapping.unmapped.unwrap();
    assert_eq!(unmapped.status(unmapped.transcripts()[0]), RemapStatus::NoSeqMap);
}

#[test]
fn partly_mapped_gene_splits_transcripts() {
    let mut oracle = BlockOracle::new();
    oracle.add_block("chr1", range(1000, 1099), "chr1", 5000, false);
    let (out, unmapped, stats) = remap(
        TWO_TRANSCRIPTS,
        GxfFormat::Gff3,
        &oracle,
        RemapOptions::default(),
    );

    // worst transcript status wins
    assert_eq!(stats.count(RemapStatus::Deleted), 1);
    assert_eq!(out.len(), 3);
    assert!(out[0].contains("\t5000\t5099\t"));
    assert!(out[0].contains("remap_status=deleted"));
    assert!(out[1].contains("ID=T1;Parent=G1;remap_status=full_contig"));

    assert_eq!(unmapped.len(), 3);
    assert!(unmapped[1].contains("ID=T2;Parent=G1;remap_status=deleted"));
}

#[test]
fn reverse_alignment_flips_strand_and_keeps_fragments_ascending() {
    let data = "chr1\tHAVANA\tgene\t100\t199\t.\t-\t.\tID=G1\n\
                chr1\tHAVANA\ttranscript\t100\t199\t.\t-\t.\tID=T1;Parent=G1\n\
                chr1\tHAVANA\texon\t100\t199\t.\t-\t.\tID=E1;Parent=T1\n";
    let mut oracle = BlockOracle::new();
    oracle
        .add_block("chr1", range(100, 149), "chrX", 1000, true)
        .add_block("chr1", range(150, 199), "chrX", 1060, true);
    let tree = first_gene(data, GxfFormat::Gff3);
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapped = remapper.map_gene(&tree).unwrap().mapped.unwrap();

    assert_eq!(mapped.gene().strand(), Strand::Forward);
    assert_eq!(mapped.gene().seqid(), "chrX");
    let exons: Vec<_> = mapped
        .children(mapped.transcripts()[0])
        .iter()
        .map(|&id| mapped.feature(id))
        .collect();
    assert_eq!(exons.len(), 2);
    assert_eq!(exons[0].range(), range(1000, 1049));
    assert_eq!(exons[0].attr_val("remap_fragment"), Some("1"));
    assert_eq!(exons[1].range(), range(1060, 1109));
}

#[test]
fn cds_split_inside_exon_is_fragmented() {
    let data = format!("{SCENARIO}chr1\tHAVANA\tCDS\t1840\t1900\t.\t+\t0\tID=C1;Parent=T1\n");
    let tree = first_gene(&data, GxfFormat::Gff3);
    let oracle = scenario_oracle();
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();
    let mapped = remapper.map_gene(&tree).unwrap().mapped.unwrap();

    let cds: Vec<_> = mapped
        .children(mapped.transcripts()[0])
        .iter()
        .map(|&id| mapped.feature(id))
        .filter(|leaf| leaf.feature_type() == "CDS")
        .collect();
    assert_eq!(cds.len(), 2);
    assert_eq!(cds[0].range(), range(2340, 2350));
    assert_eq!(cds[0].attr_val("remap_fragment"), Some("1"));
    assert_eq!(cds[1].range(), range(2370, 2400));
    assert_eq!(cds[1].attr_val("remap_fragment"), Some("2"));
    assert_eq!(mapped.status(mapped.transcripts()[0]), RemapStatus::PartialFragment);
}

#[test]
fn comment_inside_gene_stays_after_its_row() {
    let data = "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
                #note about T1\n\
                chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
                chr1\tHAVANA\texon\t1000\t1200\t.\t+\t.\tID=E1;Parent=T1\n\
                chr1\tHAVANA\texon\t1800\t2000\t.\t+\t.\tID=E2;Parent=T1\n";
    let (out, _, _) = remap(data, GxfFormat::Gff3, &scenario_oracle(), RemapOptions::default());

    assert_eq!(out.len(), 6);
    assert!(out[0].contains("\tgene\t1500\t2500\t"));
    assert_eq!(out[1], "#note about T1");
    assert!(out[2].contains("\ttranscript\t"));
}

#[test]
fn comment_of_unmapped_gene_stays_in_main_output() {
    let data = "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
                chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
                #note about T1\n\
                chr1\tHAVANA\texon\t1000\t2000\t.\t+\t.\tParent=T1\n";
    let mut oracle = BlockOracle::new();
    oracle.add_block("chr1", range(50_000, 60_000), "chr1", 1, false);
    let (out, unmapped, _) = remap(data, GxfFormat::Gff3, &oracle, RemapOptions::default());

    assert_eq!(out, ["#note about T1"]);
    assert_eq!(unmapped.len(), 3);
    assert!(unmapped.iter().all(|line| !line.starts_with('#')));
}

#[test]
fn emit_policy_skips_unmapped_transcripts_of_mapped_gene() {
    let mut oracle = BlockOracle::new();
    oracle.add_block("chr1", range(1000, 1099), "chr1", 5000, false);
    let reader = Reader::from_reader(Cursor::new(TWO_TRANSCRIPTS), GxfFormat::Gff3).unwrap();
    let options = RemapOptions::new().unmapped_policy(UnmappedPolicy::Emit);
    let remapper = GeneRemapper::new(&oracle, options).unwrap();
    let mut writer = Writer::new(Vec::new());
    remapper.run(reader, &mut writer).unwrap();

    let text = String::from_utf8(writer.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("ID=T1;Parent=G1"));
    assert!(!text.contains("ID=T2"));
}

const CHAINS: &str = "chain 1000 chr1 10000 + 0 10000 chr1 20000 + 500 10500 1\n10000\n\n\
chain 1000 chr2 10000 + 0 10000 chr2 20000 - 0 10000 2\n10000\n";

#[test]
fn chain_file_drives_remapping() {
    let chains = ChainIndex::parse(Cursor::new(CHAINS)).unwrap();
    assert_eq!(chains.chain_count(), 2);

    let data = "chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
                chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
                chr1\tHAVANA\texon\t1000\t2000\t.\t+\t.\tParent=T1\n\
                chr2\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G2\n\
                chr2\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T2;Parent=G2\n\
                chr2\tHAVANA\texon\t1000\t2000\t.\t+\t.\tParent=T2\n";
    let (out, unmapped, stats) = remap(data, GxfFormat::Gff3, &chains, RemapOptions::default());

    assert!(unmapped.is_empty());
    assert_eq!(stats.count(RemapStatus::FullContig), 2);
    assert_eq!(
        out[0],
        "chr1\tHAVANA\tgene\t1500\t2500\t.\t+\t.\tID=G1;remap_status=full_contig;remap_original_location=chr1:+:1000-2000"
    );
    assert_eq!(
        out[3],
        "chr2\tHAVANA\tgene\t18001\t19001\t.\t-\t.\tID=G2;remap_status=full_contig;remap_original_location=chr2:+:1000-2000"
    );
}

#[test]
fn invalid_threshold_is_rejected() {
    let options = RemapOptions::new().gene_expansion_threshold(0.0);
    assert!(GeneRemapper::new(BlockOracle::new(), options).is_err());
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_run_keeps_input_order() {
    let data = format!("{SCENARIO}###\n{}", TWO_TRANSCRIPTS);
    let oracle = scenario_oracle();
    let remapper = GeneRemapper::new(&oracle, RemapOptions::default()).unwrap();

    let mut serial = Writer::new(Vec::new());
    let reader = Reader::from_reader(Cursor::new(data.clone()), GxfFormat::Gff3).unwrap();
    remapper.run(reader, &mut serial).unwrap();

    let mut parallel = Writer::new(Vec::new());
    let reader = Reader::from_reader(Cursor::new(data), GxfFormat::Gff3).unwrap();
    let stats = remapper.run_parallel(reader, &mut parallel, 1).unwrap();

    assert_eq!(stats.genes, 2);
    assert_eq!(serial.into_inner(), parallel.into_inner());
}
