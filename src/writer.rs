use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::write::GzEncoder;
#[cfg(feature = "gzip")]
use flate2::Compression as GzCompression;

use crate::error::{GxfError, GxfResult};
use crate::feature::{Feature, Record};
use crate::tree::{FeatureTree, NodeId};

/// Serializes records, one physical line each.
///
/// Passthrough lines are written byte for byte; features are rendered in the
/// dialect they were parsed from.
pub struct Writer<W: Write> {
    inner: W,
    records: usize,
}

impl<W: Write> Writer<W> {
    /// Wraps a sink.
    pub fn new(inner: W) -> Self {
        Self { inner, records: 0 }
    }

    /// Writes any record.
    pub fn write_record(&mut self, record: &Record) -> GxfResult<()> {
        match record {
            Record::Line(line) => self.write_line(line),
            Record::Feature(feature) => self.write_feature(feature),
        }
    }

    /// Writes a passthrough line.
    pub fn write_line(&mut self, line: &str) -> GxfResult<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Writes a single feature.
    pub fn write_feature(&mut self, feature: &Feature) -> GxfResult<()> {
        writeln!(self.inner, "{feature}")?;
        self.records += 1;
        Ok(())
    }

    /// Writes a tree in pre-order (parent before its children, siblings in
    /// stored order), each passthrough line right after the row it followed.
    pub fn write_tree(&mut self, tree: &FeatureTree) -> GxfResult<()> {
        self.write_subtree(tree, tree.root(), true)
    }

    /// Like [`Writer::write_tree`], without the passthrough lines.
    pub fn write_tree_features(&mut self, tree: &FeatureTree) -> GxfResult<()> {
        self.write_subtree(tree, tree.root(), false)
    }

    fn write_subtree(&mut self, tree: &FeatureTree, id: NodeId, lines: bool) -> GxfResult<()> {
        self.write_feature(tree.feature(id))?;
        if lines {
            for line in tree.lines_after(id) {
                self.write_line(line)?;
            }
        }
        for &child in tree.children(id) {
            self.write_subtree(tree, child, lines)?;
        }
        Ok(())
    }

    /// Writes only the passthrough lines held by a tree.
    pub fn write_tree_lines(&mut self, tree: &FeatureTree) -> GxfResult<()> {
        for line in tree.lines() {
            self.write_line(line)?;
        }
        Ok(())
    }

    /// Returns the number of records written so far.
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> GxfResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// File sink behind [`Writer::to_path`].
pub enum FileSink {
    Plain(File),
    #[cfg(feature = "gzip")]
    Gzip(GzEncoder<File>),
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(file) => file.write(buf),
            #[cfg(feature = "gzip")]
            FileSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(file) => file.flush(),
            #[cfg(feature = "gzip")]
            FileSink::Gzip(encoder) => encoder.flush(),
        }
    }
}

impl Writer<BufWriter<FileSink>> {
    /// Creates a file, auto-detecting gzip output from the `.gz` extension when
    /// the `gzip` feature is enabled.
    pub fn to_path<P: AsRef<Path>>(path: P) -> GxfResult<Self> {
        let path = path.as_ref();
        let compressed = path.extension().is_some_and(|ext| ext == "gz");

        #[cfg(feature = "gzip")]
        let sink = if compressed {
            FileSink::Gzip(GzEncoder::new(File::create(path)?, GzCompression::fast()))
        } else {
            FileSink::Plain(File::create(path)?)
        };

        #[cfg(not(feature = "gzip"))]
        let sink = {
            if compressed {
                return Err(GxfError::Builder(
                    "enable the `gzip` feature to write gzip outputs".into(),
                ));
            }
            FileSink::Plain(File::create(path)?)
        };

        Ok(Writer::new(BufWriter::with_capacity(64 * 1024, sink)))
    }

    /// Flushes buffered output and, for gzip sinks, writes the trailer.
    pub fn finish(self) -> GxfResult<()> {
        let sink = self
            .inner
            .into_inner()
            .map_err(|err| GxfError::Io(err.into_error()))?;
        match sink {
            FileSink::Plain(mut file) => file.flush()?,
            #[cfg(feature = "gzip")]
            FileSink::Gzip(encoder) => {
                encoder.finish()?;
            }
        }
        Ok(())
    }
}
