//! Ordered, possibly multi-valued attribute lists.
//!
//! Attribute order is significant: it is reproduced verbatim on output, so every
//! operation here preserves the relative order of untouched entries.

use std::slice;

use crate::error::{GxfError, GxfResult};

/// An attribute name with one or more values.
///
/// GFF3 multi-valued attributes (`tag=basic,CCDS`) are held as a single
/// `AttrVal` with several values. GTF repeats the key instead, which is kept as
/// separate entries in [`AttrVals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrVal {
    name: String,
    vals: Vec<String>,
    quoted: bool,
}

impl AttrVal {
    /// Creates a single-valued attribute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name or the value is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfmap::attrs::AttrVal;
    ///
    /// let attr = AttrVal::new("gene_id", "ENSG00000223972").unwrap();
    /// assert_eq!(attr.val(), "ENSG00000223972");
    /// assert!(AttrVal::new("gene_id", "").is_err());
    /// ```
    pub fn new(name: impl Into<String>, val: impl Into<String>) -> GxfResult<Self> {
        Self::with_vals(name, vec![val.into()])
    }

    /// Creates a multi-valued attribute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is empty, the value list is empty,
    /// or any value is empty.
    pub fn with_vals(name: impl Into<String>, vals: Vec<String>) -> GxfResult<Self> {
        let name = name.into();
        check_name(&name)?;
        if vals.is_empty() {
            return Err(GxfError::invalid(format!(
                "attribute '{name}' requires at least one value"
            )));
        }
        for val in &vals {
            check_val(&name, val)?;
        }
        Ok(Self {
            name,
            vals,
            quoted: true,
        })
    }

    /// Marks whether a GTF value is written inside double quotes.
    ///
    /// Ignored for GFF3, which never quotes.
    pub fn quoted(mut self, quoted: bool) -> Self {
        self.quoted = quoted;
        self
    }

    /// Appends one more value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the value is empty.
    pub fn add_val(&mut self, val: impl Into<String>) -> GxfResult<()> {
        let val = val.into();
        check_val(&self.name, &val)?;
        self.vals.push(val);
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first value.
    #[inline]
    pub fn val(&self) -> &str {
        &self.vals[0]
    }

    #[inline]
    pub fn vals(&self) -> &[String] {
        &self.vals
    }

    #[inline]
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Number of values held.
    #[inline]
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    /// Always `false`; construction guarantees at least one value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Replaces every value in place, keeping name and quoting.
    pub(crate) fn map_vals<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for val in self.vals.iter_mut() {
            *val = f(val);
        }
    }
}

fn check_name(name: &str) -> GxfResult<()> {
    if name.is_empty() {
        return Err(GxfError::invalid("empty attribute name"));
    }
    Ok(())
}

fn check_val(name: &str, val: &str) -> GxfResult<()> {
    if val.is_empty() {
        return Err(GxfError::invalid(format!(
            "empty value for attribute '{name}'"
        )));
    }
    Ok(())
}

/// Ordered list of attributes attached to a feature.
///
/// Names are unique except where a format repeats a key on purpose (GTF `tag`);
/// lookups always address the first entry with a given name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrVals {
    entries: Vec<AttrVal>,
}

impl AttrVals {
    /// Creates an empty attribute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if an attribute with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.find_idx(name).is_some()
    }

    fn find_idx(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|attr| attr.name == name)
    }

    /// Returns the first attribute named `name`, if any.
    pub fn find(&self, name: &str) -> Option<&AttrVal> {
        self.find_idx(name).map(|idx| &self.entries[idx])
    }

    /// Returns the first attribute named `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the attribute does not exist.
    pub fn get(&self, name: &str) -> GxfResult<&AttrVal> {
        self.find(name)
            .ok_or_else(|| GxfError::NotFound(format!("attribute '{name}'")))
    }

    /// Appends an attribute at the end.
    pub fn add(&mut self, attr: AttrVal) {
        self.entries.push(attr);
    }

    /// Inserts an attribute at the front.
    pub fn push(&mut self, attr: AttrVal) {
        self.entries.insert(0, attr);
    }

    /// Replaces the first attribute with the same name in place, or appends it.
    pub fn update(&mut self, attr: AttrVal) {
        match self.find_idx(&attr.name) {
            Some(idx) => self.entries[idx] = attr,
            None => self.entries.push(attr),
        }
    }

    /// Removes the first attribute named `name`, returning it.
    pub fn remove(&mut self, name: &str) -> Option<AttrVal> {
        self.find_idx(name).map(|idx| self.entries.remove(idx))
    }

    /// Returns every entry named `name`, in order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AttrVal> + 'a {
        self.entries.iter().filter(move |attr| attr.name == name)
    }

    /// Returns `true` if any value of any attribute named `name` equals `val`.
    pub fn has_val(&self, name: &str, val: &str) -> bool {
        self.find_all(name).any(|attr| attr.vals.iter().any(|v| v == val))
    }

    pub(crate) fn entries_mut(&mut self) -> slice::IterMut<'_, AttrVal> {
        self.entries.iter_mut()
    }

    pub fn iter(&self) -> slice::Iter<'_, AttrVal> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttrVals {
    type Item = &'a AttrVal;
    type IntoIter = slice::Iter<'a, AttrVal>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<AttrVal> for AttrVals {
    fn from_iter<I: IntoIterator<Item = AttrVal>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
