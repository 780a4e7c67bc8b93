use std::fmt;
use std::path::Path;
use std::str::FromStr;

use memchr::{memchr, memchr_iter};

use crate::{
    attrs::{AttrVal, AttrVals},
    error::{GxfError, GxfResult},
    feature::{Feature, Phase, Record},
    strand::Strand,
};

/// Annotation dialect of a file.
///
/// Both dialects share the eight leading columns; they only differ in the
/// attribute column syntax and in how parent/child links are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GxfFormat {
    /// `key=value;key=v1,v2`, parents linked through `ID`/`Parent`.
    Gff3,
    /// `key "value"; key value;`, parents implied by `gene_id`/`transcript_id`.
    Gtf,
}

impl GxfFormat {
    /// Human readable format name (for error messages).
    pub const fn name(self) -> &'static str {
        match self {
            GxfFormat::Gff3 => "GFF3",
            GxfFormat::Gtf => "GTF",
        }
    }

    /// Guesses the format from a file name, looking through a trailing
    /// compression extension (`genes.gtf.gz` is GTF).
    ///
    /// # Example
    ///
    /// ```
    /// use gxfmap::gxf::GxfFormat;
    ///
    /// assert_eq!(GxfFormat::from_path("gencode.v44.gff3.gz"), Some(GxfFormat::Gff3));
    /// assert_eq!(GxfFormat::from_path("genes.gtf"), Some(GxfFormat::Gtf));
    /// assert_eq!(GxfFormat::from_path("genes.bed"), None);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let mut ext = path.extension()?.to_str()?;
        if matches!(ext, "gz" | "zst" | "zstd" | "bz2" | "bzip2") {
            ext = Path::new(path.file_stem()?).extension()?.to_str()?;
        }
        ext.parse().ok()
    }
}

impl FromStr for GxfFormat {
    type Err = GxfError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "gff3" | "gff" => Ok(GxfFormat::Gff3),
            "gtf" => Ok(GxfFormat::Gtf),
            other => Err(GxfError::invalid(format!(
                "unknown annotation format '{other}', expected gff3 or gtf"
            ))),
        }
    }
}

impl fmt::Display for GxfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses one line of a GFF3/GTF file into a [`Record`].
///
/// Blank lines and lines starting with `#` come back as [`Record::Line`] with
/// their text untouched (minus the line terminator).
///
/// # Errors
///
/// Returns `MalformedInput` carrying `line_number` if a feature line does not
/// have nine tab-separated columns or any column fails to parse.
///
/// # Example
///
/// ```
/// use gxfmap::gxf::{parse_line, GxfFormat};
///
/// let line = "chr1\tHAVANA\texon\t12010\t12057\t.\t+\t.\tgene_id \"G1\"; exon_number 1;";
/// let record = parse_line(line, 1, GxfFormat::Gtf).unwrap();
/// assert_eq!(record.to_string(), line);
/// ```
pub fn parse_line(line: &str, line_number: usize, format: GxfFormat) -> GxfResult<Record> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.trim().is_empty() || trimmed.starts_with('#') {
        return Ok(Record::Line(trimmed.to_string()));
    }
    parse_feature(trimmed, line_number, format).map(Record::Feature)
}

fn parse_feature(line: &str, line_number: usize, format: GxfFormat) -> GxfResult<Feature> {
    let mut fields = line.split('\t');
    let mut next = |field: &'static str| {
        fields
            .next()
            .ok_or_else(|| missing(field, line_number))
    };

    let seqid = next("seqid")?;
    let source = next("source")?;
    let feature_type = next("type")?;
    let start_raw = next("start")?;
    let end_raw = next("end")?;
    let score = next("score")?;
    let strand_raw = next("strand")?;
    let phase_raw = next("phase")?;
    let attributes_raw = next("attributes")?;
    if fields.next().is_some() {
        return Err(GxfError::malformed(
            line_number,
            format!("more than nine columns in {} feature line", format.name()),
        ));
    }

    let start = parse_coord(start_raw, "start", line_number)?;
    let end = parse_coord(end_raw, "end", line_number)?;
    let strand = Strand::parse(strand_raw).map_err(|err| at_line(err, line_number))?;
    let phase = Phase::parse(phase_raw).map_err(|err| at_line(err, line_number))?;
    let attrs = match format {
        GxfFormat::Gff3 => parse_gff3_attributes(attributes_raw),
        GxfFormat::Gtf => parse_gtf_attributes(attributes_raw),
    }
    .map_err(|err| at_line(err, line_number))?;

    Feature::new(
        format,
        seqid,
        source,
        feature_type,
        start,
        end,
        score,
        strand,
        phase,
        attrs,
    )
    .map_err(|err| at_line(err, line_number))
}

fn parse_coord(raw: &str, field: &str, line_number: usize) -> GxfResult<u64> {
    raw.parse::<u64>().map_err(|_| {
        GxfError::malformed(
            line_number,
            format!("could not parse {field} '{raw}' as integer"),
        )
    })
}

fn missing(field: &'static str, line_number: usize) -> GxfError {
    GxfError::malformed(line_number, format!("missing {field} column in input line"))
}

/// Re-labels a column-level error with the line it came from.
fn at_line(err: GxfError, line_number: usize) -> GxfError {
    match err {
        GxfError::InvalidArgument(message) | GxfError::NotFound(message) => {
            GxfError::malformed(line_number, message)
        }
        other => other,
    }
}

/// Parses a GFF3 attribute column (`ID=g1;tag=basic,CCDS`).
///
/// `.` or an empty column yields an empty list. Values are split on `,`.
///
/// # Errors
///
/// Returns `InvalidArgument` for a pair without `=` or with an empty name or value.
pub fn parse_gff3_attributes(raw: &str) -> GxfResult<AttrVals> {
    let raw = raw.trim();
    let mut attrs = AttrVals::new();
    if raw.is_empty() || raw == "." {
        return Ok(attrs);
    }

    let bytes = raw.as_bytes();
    let mut pos = 0usize;
    for semi in memchr_iter(b';', bytes).chain(std::iter::once(bytes.len())) {
        let pair = raw[pos..semi].trim();
        pos = semi + 1;
        if pair.is_empty() {
            continue;
        }
        let eq = memchr(b'=', pair.as_bytes()).ok_or_else(|| {
            GxfError::invalid(format!("GFF3 attribute '{pair}' has no '=' separator"))
        })?;
        let vals = pair[eq + 1..].split(',').map(str::to_string).collect();
        attrs.add(AttrVal::with_vals(&pair[..eq], vals)?);
    }
    Ok(attrs)
}

/// Parses a GTF attribute column (`gene_id "G1"; tag "basic"; level 2;`).
///
/// Repeated keys become separate entries in file order; unquoted values are
/// marked so they render back without quotes.
///
/// # Errors
///
/// Returns `InvalidArgument` for a key without value, an unterminated quote, or
/// an empty value.
pub fn parse_gtf_attributes(raw: &str) -> GxfResult<AttrVals> {
    let line = raw.trim();
    let mut attrs = AttrVals::new();
    if line.is_empty() || line == "." {
        return Ok(attrs);
    }

    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut pos = 0usize;

    while pos < len {
        while pos < len && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b';') {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let key_start = pos;
        let key_end = match memchr(b' ', &bytes[pos..]) {
            Some(sep) => pos + sep,
            None => {
                return Err(GxfError::invalid(format!(
                    "GTF attribute '{}' has no value",
                    &line[key_start..]
                )))
            }
        };
        let key = &line[key_start..key_end];
        pos = key_end + 1;
        while pos < len && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= len {
            return Err(GxfError::invalid(format!(
                "GTF attribute '{key}' has no value"
            )));
        }

        let (value, quoted) = if bytes[pos] == b'"' {
            pos += 1;
            let close = memchr(b'"', &bytes[pos..]).ok_or_else(|| {
                GxfError::invalid(format!("unterminated quote in GTF attribute '{key}'"))
            })?;
            let value = &line[pos..pos + close];
            pos += close + 1;
            (value, true)
        } else {
            let value_end = memchr(b';', &bytes[pos..]).map_or(len, |semi| pos + semi);
            let value = line[pos..value_end].trim_end();
            pos = value_end;
            (value, false)
        };
        attrs.add(AttrVal::new(key, value)?.quoted(quoted));

        match memchr(b';', &bytes[pos..]) {
            Some(semi) => pos += semi + 1,
            None => break,
        }
    }

    Ok(attrs)
}

/// Writes a GFF3 attribute column; an empty list becomes `.`.
pub(crate) fn write_gff3_attributes(f: &mut fmt::Formatter<'_>, attrs: &AttrVals) -> fmt::Result {
    if attrs.is_empty() {
        return f.write_str(".");
    }
    for (idx, attr) in attrs.iter().enumerate() {
        if idx > 0 {
            f.write_str(";")?;
        }
        write!(f, "{}={}", attr.name(), attr.vals().join(","))?;
    }
    Ok(())
}

/// Writes a GTF attribute column, one `key "value";` pair per value.
pub(crate) fn write_gtf_attributes(f: &mut fmt::Formatter<'_>, attrs: &AttrVals) -> fmt::Result {
    let mut first = true;
    for attr in attrs {
        for val in attr.vals() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if attr.is_quoted() {
                write!(f, "{} \"{}\";", attr.name(), val)?;
            } else {
                write!(f, "{} {};", attr.name(), val)?;
            }
        }
    }
    Ok(())
}
