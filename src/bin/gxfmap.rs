//! gxfmap CLI
//!
//! Remap a GFF3/GTF annotation through a UCSC chain file.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use gxfmap::{
    ChainIndex, GenePrecedence, GeneRemapper, GxfFormat, ParIdHack, Reader, RemapOptions,
    UnmappedPolicy, Writer,
};
use log::{error, Level};

#[derive(Parser)]
#[command(name = "gxfmap")]
#[command(author, version, about = "Remap GFF3/GTF gene annotations between assemblies")]
#[command(long_about = "Remap GFF3/GTF gene annotations between assemblies.

Examples:
  gxfmap -c hg19ToHg38.over.chain -i gencode.v19.gff3 -o gencode.v19.hg38.gff3
  gxfmap -c mapping.chain.gz -i genes.gtf.gz -o mapped.gtf -u unmapped.gtf")]
struct Cli {
    /// Chain file aligning the source assembly (t) to the target (q)
    #[arg(short, long)]
    chain: PathBuf,

    /// Input annotation (.gff3/.gtf, optionally compressed)
    #[arg(short, long)]
    input: PathBuf,

    /// Output annotation (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Write genes and transcripts that did not map here
    #[arg(short, long)]
    unmapped: Option<PathBuf>,

    /// Input format, when the file name does not tell
    #[arg(short, long)]
    format: Option<GxfFormat>,

    /// PAR id disambiguation: 'old' (ENSGR...) or 'new' (_PAR_Y)
    #[arg(long, default_value = "new")]
    par_hack: ParIdHack,

    /// Mapped/source gene span ratio above which a gene is flagged gene_expand
    #[arg(long, default_value_t = 2.0)]
    expand_threshold: f64,

    /// Keep fully unmapped genes in the output, in source coordinates
    #[arg(long)]
    keep_unmapped: bool,

    /// Which gene flag wins when both apply: 'conflict' or 'expand'
    #[arg(long, default_value = "conflict")]
    precedence: GenePrecedence,

    /// Genes mapped per parallel batch
    #[cfg(feature = "rayon")]
    #[arg(short, long, default_value_t = 1024)]
    batch: usize,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::Warn,
        1 => Level::Info,
        _ => Level::Debug,
    };
    if let Err(err) = simple_logger::init_with_level(level) {
        eprintln!("failed to initialise logging: {err}");
    }

    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = RemapOptions::new()
        .par_id_hack(cli.par_hack)
        .gene_expansion_threshold(cli.expand_threshold)
        .unmapped_policy(if cli.keep_unmapped {
            UnmappedPolicy::Emit
        } else {
            UnmappedPolicy::Drop
        })
        .gene_precedence(cli.precedence);

    let chains = ChainIndex::from_path(&cli.chain)?;
    let remapper = GeneRemapper::new(chains, options)?;

    let mut builder = Reader::builder().from_path(&cli.input);
    if let Some(format) = cli.format {
        builder = builder.format(format);
    }
    let reader = builder.build()?;

    if cli.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = Writer::new(BufWriter::new(stdout.lock()));
        remap(&cli, &remapper, reader, &mut out)?;
    } else {
        let mut out = Writer::to_path(&cli.output)?;
        remap(&cli, &remapper, reader, &mut out)?;
        out.finish()?;
    }
    Ok(())
}

fn remap<W: Write>(
    cli: &Cli,
    remapper: &GeneRemapper<ChainIndex>,
    reader: Reader,
    out: &mut Writer<W>,
) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.unmapped {
        Some(path) => {
            let mut unmapped = Writer::to_path(path)?;
            remapper.run_with_unmapped(reader, out, &mut unmapped)?;
            unmapped.finish()?;
        }
        None => {
            #[cfg(feature = "rayon")]
            remapper.run_parallel(reader, out, cli.batch)?;
            #[cfg(not(feature = "rayon"))]
            remapper.run(reader, out)?;
        }
    }
    Ok(())
}
