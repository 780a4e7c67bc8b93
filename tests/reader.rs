use std::io::{Cursor, Write};

use gxfmap::reader::{Compression, Reader};
use gxfmap::{GxfError, GxfFormat, Record, Strand};

const GFF3: &str = "##gff-version 3\n\
#description: test\n\
chr1\tHAVANA\tgene\t11869\t14409\t.\t+\t.\tID=ENSG00000223972.5;gene_name=DDX11L1;tag=basic,CCDS\n\
\n\
chr1\tHAVANA\texon\t11869\t12227\t.\t+\t.\tID=exon:ENST00000456328.2:1;Parent=ENST00000456328.2\n";

#[test]
fn test_reader_passthrough_and_features() {
    let reader = Reader::from_reader(Cursor::new(GFF3), GxfFormat::Gff3).unwrap();
    let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 5);

    assert_eq!(records[0], Record::Line("##gff-version 3".into()));
    assert_eq!(records[3], Record::Line(String::new()));

    let gene = records[2].as_feature().unwrap();
    assert_eq!(gene.seqid(), "chr1");
    assert_eq!(gene.start(), 11869);
    assert_eq!(gene.end(), 14409);
    assert_eq!(gene.strand(), Strand::Forward);
    assert_eq!(gene.attrs().get("tag").unwrap().len(), 2);
    assert_eq!(records[2].to_string(), GFF3.lines().nth(2).unwrap());
}

#[test]
fn test_reader_push_back_is_fifo() {
    let mut reader = Reader::from_reader(Cursor::new(GFF3), GxfFormat::Gff3).unwrap();
    let first = reader.next_record().unwrap().unwrap();
    let second = reader.next_record().unwrap().unwrap();
    assert_eq!(reader.current_line(), 2);

    reader.push(first.clone());
    reader.push(second.clone());
    assert_eq!(reader.next_record().unwrap().unwrap(), first);
    assert_eq!(reader.next_record().unwrap().unwrap(), second);
    assert!(reader.next_record().unwrap().unwrap().as_feature().is_some());
    assert_eq!(reader.current_line(), 3);
}

#[test]
fn test_reader_reports_line_numbers() {
    let data = "chr1\tHAVANA\tgene\t1\t10\t.\t+\t.\tID=G1\nchr1\tHAVANA\texon\t1\n";
    let mut reader = Reader::from_reader(Cursor::new(data), GxfFormat::Gff3).unwrap();
    assert!(reader.next_record().unwrap().is_some());
    match reader.next_record() {
        Err(GxfError::MalformedInput { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected malformed input, got {other:?}"),
    }
}

#[test]
fn test_reader_gtf_crlf() {
    let data = "chr1\tENSEMBL\ttranscript\t100\t200\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T1\"; level 2;\r\n";
    let mut reader = Reader::from_reader(Cursor::new(data), GxfFormat::Gtf).unwrap();
    let record = reader.next_record().unwrap().unwrap();
    let feature = record.as_feature().unwrap();
    assert_eq!(feature.strand(), Strand::Reverse);
    assert_eq!(feature.attr_val("transcript_id"), Some("T1"));
    assert!(!feature.attrs().get("level").unwrap().is_quoted());
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_reader_from_path_detects_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genes.gff3");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(GFF3.as_bytes())
        .unwrap();

    let reader = Reader::from_path(&path).unwrap();
    assert_eq!(reader.format(), GxfFormat::Gff3);
    assert_eq!(reader.count(), 5);
}

#[test]
fn test_reader_unknown_extension_needs_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genes.txt");
    std::fs::write(&path, GFF3).unwrap();

    assert!(matches!(Reader::from_path(&path), Err(GxfError::Builder(_))));
    let reader = Reader::builder()
        .from_path(&path)
        .format(GxfFormat::Gff3)
        .compression(Compression::None)
        .build()
        .unwrap();
    assert_eq!(reader.count(), 5);
}

#[test]
fn test_reader_stream_without_format_fails() {
    let result = Reader::builder().from_reader(Cursor::new(GFF3)).build();
    assert!(matches!(result, Err(GxfError::Builder(_))));
}

#[cfg(feature = "gzip")]
#[test]
fn test_reader_gzip_path() {
    use flate2::write::GzEncoder;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genes.gff3.gz");
    let mut encoder = GzEncoder::new(
        std::fs::File::create(&path).unwrap(),
        flate2::Compression::default(),
    );
    encoder.write_all(GFF3.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let reader = Reader::from_path(&path).unwrap();
    assert_eq!(reader.format(), GxfFormat::Gff3);
    assert_eq!(reader.count(), 5);
}
