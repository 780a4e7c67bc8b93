use std::fmt;

use crate::error::{GxfError, GxfResult};

/// Represents the strand of a genomic feature.
///
/// This enum is used to indicate the orientation of a feature on a reference sequence.
///
/// # Example
///
/// ```
/// use gxfmap::strand::Strand;
///
/// let strand = Strand::Forward;
/// assert_eq!(strand.flip(), Strand::Reverse);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Positive strand (`+`).
    Forward,
    /// Negative strand (`-`).
    Reverse,
    /// Unknown strand (`.`).
    Unknown,
    /// Stranded, but the strand is not known (`?`, GFF3 only).
    Unresolved,
}

impl Strand {
    /// Parses a strand column.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the column is not exactly one of `+`, `-`, `.`
    /// or `?`.
    pub fn parse(raw: &str) -> GxfResult<Self> {
        match raw {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." => Ok(Strand::Unknown),
            "?" => Ok(Strand::Unresolved),
            other => Err(GxfError::invalid(format!(
                "expected '+', '-', '.', or '?' as strand, got '{other}'"
            ))),
        }
    }

    /// Returns the opposite strand; unknown stays unknown.
    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
            other => other,
        }
    }

    /// Returns the single-character column value.
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unknown => '.',
            Strand::Unresolved => '?',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_wide_columns() {
        assert!(Strand::parse("++").is_err());
        assert!(Strand::parse("").is_err());
        assert_eq!(Strand::parse("?").unwrap(), Strand::Unresolved);
    }

    #[test]
    fn unknown_strands_render_as_read() {
        for raw in ["+", "-", ".", "?"] {
            assert_eq!(Strand::parse(raw).unwrap().to_string(), raw);
        }
        assert_eq!(Strand::Unresolved.flip(), Strand::Unresolved);
    }

    #[test]
    fn flip_keeps_unknown() {
        assert_eq!(Strand::Reverse.flip(), Strand::Forward);
        assert_eq!(Strand::Unknown.flip(), Strand::Unknown);
    }
}
