use std::process::Command;

const CHAIN: &str = "chain 1000 chr1 10000 + 0 10000 chr1 20000 + 500 10500 1\n10000\n";

const GFF3: &str = "##gff-version 3\n\
chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tID=G1\n\
chr1\tHAVANA\ttranscript\t1000\t2000\t.\t+\t.\tID=T1;Parent=G1\n\
chr1\tHAVANA\texon\t1000\t2000\t.\t+\t.\tParent=T1\n\
chrUn\tHAVANA\tgene\t1\t100\t.\t+\t.\tID=G2\n";

#[test]
fn cli_remaps_and_splits_unmapped() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("test.chain");
    let input = dir.path().join("genes.gff3");
    let output = dir.path().join("mapped.gff3");
    let unmapped = dir.path().join("unmapped.gff3");
    std::fs::write(&chain, CHAIN).unwrap();
    std::fs::write(&input, GFF3).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_gxfmap"))
        .arg("-c")
        .arg(&chain)
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("-u")
        .arg(&unmapped)
        .status()
        .unwrap();
    assert!(status.success());

    let mapped = std::fs::read_to_string(&output).unwrap();
    assert!(mapped.starts_with("##gff-version 3\n"));
    assert!(mapped.contains("chr1\tHAVANA\tgene\t1500\t2500\t"));
    assert!(!mapped.contains("ID=G2"));

    let unmapped = std::fs::read_to_string(&unmapped).unwrap();
    assert_eq!(
        unmapped,
        "chrUn\tHAVANA\tgene\t1\t100\t.\t+\t.\tID=G2;remap_status=no_seq_map\n"
    );
}

#[test]
fn cli_rejects_bad_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("test.chain");
    let input = dir.path().join("genes.gff3");
    std::fs::write(&chain, CHAIN).unwrap();
    std::fs::write(&input, GFF3).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gxfmap"))
        .arg("-c")
        .arg(&chain)
        .arg("-i")
        .arg(&input)
        .args(["--expand-threshold", "0.5"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
