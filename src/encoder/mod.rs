//! Streaming structured encoder.
//!
//! Serializes a tree of [`Node`]s into JSON text without building the whole
//! document in memory. Output is produced as a lazy sequence of fragments
//! ([`Fragments`]) that the caller pulls and writes to any sink.
//!
//! Compared to a stock JSON serializer this encoder:
//! - renders floats with a fixed maximum number of decimals,
//! - indents mappings only; sequences always stay on one line,
//! - can drop mapping entries with empty values (`skip_empty`),
//! - accepts single-pass sequences and opaque domain values that are
//!   reduced through a callback at encode time.

pub mod format;
pub mod node;
mod stream;

pub use node::{LazySeq, Map, Node, Opaque, Seq};
pub use stream::Fragments;

use crate::error::Result;
use std::io::Write;

/// Encoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Maximum number of decimal places for floats.
    pub float_precision: usize,
    /// Whitespace repeated once per mapping depth. `None` writes no newlines.
    pub indent: Option<String>,
    /// Inserted between sibling items.
    pub item_separator: String,
    /// Inserted between a key and its value.
    pub key_separator: String,
    /// Drop mapping entries whose value is null or an empty string/container.
    pub skip_empty: bool,
    /// Emit mapping entries in ascending key order instead of insertion order.
    pub sort_keys: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::compact()
    }
}

impl EncoderConfig {
    /// No whitespace at all.
    pub fn compact() -> Self {
        Self {
            float_precision: 5,
            indent: None,
            item_separator: ",".to_string(),
            key_separator: ":".to_string(),
            skip_empty: true,
            sort_keys: false,
        }
    }

    /// Tab-indented mappings, inline sequences.
    pub fn pretty() -> Self {
        Self {
            indent: Some("\t".to_string()),
            key_separator: ": ".to_string(),
            ..Self::compact()
        }
    }

    pub fn with_precision(mut self, float_precision: usize) -> Self {
        self.float_precision = float_precision;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = Some(indent.into());
        self
    }

    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn with_sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }
}

/// Reduces an opaque domain value to an encodable node.
///
/// Returning `Ok(None)` means the value is not supported, which the encoder
/// reports as [`ExportError::Unencodable`](crate::ExportError::Unencodable).
pub trait Reduce {
    fn reduce(&self, value: &Opaque) -> Result<Option<Node>>;
}

impl<F> Reduce for F
where
    F: Fn(&Opaque) -> Result<Option<Node>>,
{
    fn reduce(&self, value: &Opaque) -> Result<Option<Node>> {
        self(value)
    }
}

/// Streaming JSON encoder.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode `root` as a lazy sequence of text fragments.
    ///
    /// The sequence is single-pass: lazy sequences inside the tree are
    /// drained while they are encoded.
    pub fn iter_encode<'a>(&'a self, root: &Node, reducer: Option<&'a dyn Reduce>) -> Fragments<'a> {
        Fragments::new(&self.config, root.clone(), reducer)
    }

    /// Encode `root` into `writer`, fragment by fragment.
    ///
    /// On error the fragments already written stay in the sink.
    pub fn encode_to_writer<W: Write>(
        &self,
        root: &Node,
        reducer: Option<&dyn Reduce>,
        mut writer: W,
    ) -> Result<()> {
        for fragment in self.iter_encode(root, reducer) {
            writer.write_all(fragment?.as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Encode `root` into a string.
    pub fn encode_to_string(&self, root: &Node, reducer: Option<&dyn Reduce>) -> Result<String> {
        self.iter_encode(root, reducer).collect()
    }
}
