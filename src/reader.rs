use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "bz2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::{
    error::{GxfError, GxfResult},
    feature::Record,
    gxf::{self, GxfFormat},
};

/// The compression format of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Automatically detect the compression format from the file extension.
    ///
    /// This is the default.
    #[default]
    Auto,
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Zstandard compression.
    Zstd,
    /// Bzip2 compression.
    Bzip2,
}

/// Detect compression from file extension
fn detect_compression_from_extension(path: &Path) -> Compression {
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match ext {
        "gz" => Compression::Gzip,
        "zst" | "zstd" => Compression::Zstd,
        "bz2" | "bzip2" => Compression::Bzip2,
        _ => Compression::None,
    }
}

/// Reader source
enum ReaderSource {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// A builder for creating a [`Reader`].
///
/// # Example
///
/// ```rust,no_run
/// use gxfmap::{GxfFormat, Reader};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let reader = Reader::builder()
///         .from_path("gencode.v44.annotation.gff3.gz")
///         .format(GxfFormat::Gff3)
///         .buffer_capacity(256 * 1024)
///         .build()?;
///
///     for record in reader {
///         let record = record?;
///         // ...
///     }
///
///     Ok(())
/// }
/// ```
pub struct ReaderBuilder {
    source: Option<ReaderSource>,
    format: Option<GxfFormat>,
    buffer_capacity: usize,
    compression: Compression,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            source: None,
            format: None,
            buffer_capacity: 128 * 1024,
            compression: Compression::default(),
        }
    }
}

impl ReaderBuilder {
    /// Reads from a filesystem path.
    pub fn from_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(ReaderSource::Path(path.as_ref().into()));
        self
    }

    /// Reads from an arbitrary stream.
    pub fn from_reader<T>(mut self, reader: T) -> Self
    where
        T: Read + Send + 'static,
    {
        self.source = Some(ReaderSource::Reader(Box::new(reader)));
        self
    }

    /// Sets the annotation dialect. Required for streams; paths fall back to
    /// the file extension.
    pub fn format(mut self, format: GxfFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the buffer capacity for the reader.
    ///
    /// The default is 128 KB.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(8 * 1024);
        self
    }

    /// Sets the compression format of a path input.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Builds the `Reader`.
    pub fn build(mut self) -> GxfResult<Reader> {
        let source = self
            .source
            .take()
            .ok_or_else(|| GxfError::Builder("no input source configured".into()))?;

        let (stream, format) = match source {
            ReaderSource::Path(path) => {
                let format = match self.format.or_else(|| GxfFormat::from_path(&path)) {
                    Some(format) => format,
                    None => {
                        return Err(GxfError::Builder(format!(
                            "cannot tell GFF3 from GTF for '{}'; set the format explicitly",
                            path.display()
                        )))
                    }
                };
                (self.open_path_stream(&path)?, format)
            }
            ReaderSource::Reader(reader) => {
                let format = self.format.ok_or_else(|| {
                    GxfError::Builder("a format is required when reading from a stream".into())
                })?;
                (reader, format)
            }
        };

        Ok(Reader {
            inner: BufReader::with_capacity(self.buffer_capacity, stream),
            format,
            buffer: String::with_capacity(1024),
            line_number: 0,
            pending: VecDeque::new(),
        })
    }

    /// Opens a path as a stream, decompressing when asked or detected.
    fn open_path_stream(&self, path: &Path) -> GxfResult<Box<dyn Read + Send>> {
        let file = File::open(path)?;
        let compression = match self.compression {
            Compression::Auto => detect_compression_from_extension(path),
            other => other,
        };

        match compression {
            Compression::None | Compression::Auto => Ok(Box::new(file)),
            Compression::Gzip => {
                #[cfg(feature = "gzip")]
                {
                    Ok(Box::new(MultiGzDecoder::new(file)))
                }
                #[cfg(not(feature = "gzip"))]
                {
                    Err(GxfError::Builder(
                        "gzip compression requested but the `gzip` feature is disabled".into(),
                    ))
                }
            }
            Compression::Zstd => {
                #[cfg(feature = "zstd")]
                {
                    Ok(Box::new(ZstdDecoder::new(file)?))
                }
                #[cfg(not(feature = "zstd"))]
                {
                    Err(GxfError::Builder(
                        "zstd compression requested but the `zstd` feature is disabled".into(),
                    ))
                }
            }
            Compression::Bzip2 => {
                #[cfg(feature = "bz2")]
                {
                    Ok(Box::new(BzDecoder::new(file)))
                }
                #[cfg(not(feature = "bz2"))]
                {
                    Err(GxfError::Builder(
                        "bzip2 compression requested but the `bz2` feature is disabled".into(),
                    ))
                }
            }
        }
    }
}

/// A streaming reader of GFF3/GTF [`Record`]s.
///
/// Records handed back through [`Reader::push`] are returned, in FIFO order,
/// before any further line is read from the stream. The tree assembler relies
/// on this to hand back the record that closes a gene group.
pub struct Reader {
    inner: BufReader<Box<dyn Read + Send>>,
    format: GxfFormat,
    buffer: String,
    line_number: usize,
    pending: VecDeque<Record>,
}

impl Reader {
    /// Creates a new `ReaderBuilder` to configure a `Reader`.
    pub fn builder() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Creates a reader for a path, guessing format and compression from the
    /// file name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> GxfResult<Self> {
        Self::builder().from_path(path).build()
    }

    /// Creates a reader over an arbitrary stream.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfmap::{GxfFormat, Reader};
    ///
    /// let data = "##gff-version 3\nchr1\tHAVANA\tgene\t1\t10\t.\t+\t.\tID=G1\n";
    /// let reader = Reader::from_reader(std::io::Cursor::new(data), GxfFormat::Gff3).unwrap();
    /// assert_eq!(reader.count(), 2);
    /// ```
    pub fn from_reader<T>(reader: T, format: GxfFormat) -> GxfResult<Self>
    where
        T: Read + Send + 'static,
    {
        Self::builder().from_reader(reader).format(format).build()
    }

    /// Returns the annotation dialect being read.
    pub fn format(&self) -> GxfFormat {
        self.format
    }

    /// Returns the number of lines consumed from the stream so far.
    pub fn current_line(&self) -> usize {
        self.line_number
    }

    /// Queues a record to be returned before anything else is read.
    pub fn push(&mut self, record: Record) {
        self.pending.push_back(record);
    }

    /// Returns the next record, either a pushed one or the next stream line.
    ///
    /// Returns `Ok(None)` at end of input.
    pub fn next_record(&mut self) -> GxfResult<Option<Record>> {
        if let Some(record) = self.pending.pop_front() {
            return Ok(Some(record));
        }
        if !self.fill_buffer()? {
            return Ok(None);
        }
        gxf::parse_line(&self.buffer, self.line_number, self.format).map(Some)
    }

    /// Fills the buffer with the next line of the stream.
    fn fill_buffer(&mut self) -> GxfResult<bool> {
        self.buffer.clear();
        let bytes = self.inner.read_line(&mut self.buffer)?;
        if bytes == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        trim_line(&mut self.buffer);
        Ok(true)
    }
}

impl Iterator for Reader {
    type Item = GxfResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Strips the line terminator.
fn trim_line(line: &mut String) {
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
}
