use std::str::FromStr;

use crate::error::{GxfError, GxfResult};

pub use crate::status::GenePrecedence;

/// How identifiers of Y-chromosome PAR copies are made unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParIdHack {
    /// Older Ensembl convention: the first `0` after the alphabetic prefix
    /// becomes `R` (`ENSG00000182378` to `ENSGR0000182378`).
    Old,
    /// Appends `_PAR_Y`.
    #[default]
    New,
}

impl FromStr for ParIdHack {
    type Err = GxfError;

    fn from_str(raw: &str) -> GxfResult<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "old" => Ok(ParIdHack::Old),
            "new" => Ok(ParIdHack::New),
            other => Err(GxfError::invalid(format!(
                "expected 'old' or 'new' as PAR id hack, got '{other}'"
            ))),
        }
    }
}

/// What happens to genes with nothing left to write in target coordinates.
///
/// Applies to whole genes only. When some transcripts of a gene map, the
/// rest go to the unmapped output if one is open and are dropped otherwise;
/// the main output never mixes source and target coordinates in one gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
    /// Leave them out of the main output.
    #[default]
    Drop,
    /// Write them to the main output in source coordinates, with their status.
    Emit,
}

/// Options for a remap run.
///
/// # Example
///
/// ```
/// use gxfmap::options::{GenePrecedence, ParIdHack, RemapOptions, UnmappedPolicy};
///
/// let options = RemapOptions::new()
///     .par_id_hack(ParIdHack::Old)
///     .gene_expansion_threshold(10.0)
///     .unmapped_policy(UnmappedPolicy::Emit)
///     .gene_precedence(GenePrecedence::ExpandFirst);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemapOptions {
    par_id_hack: ParIdHack,
    gene_expansion_threshold: f64,
    unmapped_policy: UnmappedPolicy,
    gene_precedence: GenePrecedence,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            par_id_hack: ParIdHack::default(),
            gene_expansion_threshold: 2.0,
            unmapped_policy: UnmappedPolicy::default(),
            gene_precedence: GenePrecedence::default(),
        }
    }
}

impl RemapOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn par_id_hack(mut self, hack: ParIdHack) -> Self {
        self.par_id_hack = hack;
        self
    }

    /// Sets the mapped/source span ratio above which a gene is flagged
    /// `GENE_EXPAND`.
    pub fn gene_expansion_threshold(mut self, threshold: f64) -> Self {
        self.gene_expansion_threshold = threshold;
        self
    }

    pub fn unmapped_policy(mut self, policy: UnmappedPolicy) -> Self {
        self.unmapped_policy = policy;
        self
    }

    pub fn gene_precedence(mut self, precedence: GenePrecedence) -> Self {
        self.gene_precedence = precedence;
        self
    }

    /// Checks the options before a run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the expansion threshold is not a finite
    /// number of at least 1.
    pub fn validate(&self) -> GxfResult<()> {
        let threshold = self.gene_expansion_threshold;
        if !threshold.is_finite() || threshold < 1.0 {
            return Err(GxfError::invalid(format!(
                "gene expansion threshold must be a finite ratio >= 1, got {threshold}"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn par_hack_method(&self) -> ParIdHack {
        self.par_id_hack
    }

    #[inline]
    pub fn expansion_threshold(&self) -> f64 {
        self.gene_expansion_threshold
    }

    #[inline]
    pub fn unmapped_handling(&self) -> UnmappedPolicy {
        self.unmapped_policy
    }

    #[inline]
    pub fn precedence(&self) -> GenePrecedence {
        self.gene_precedence
    }
}
