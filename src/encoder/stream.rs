//! Pull-based fragment stream over an encoder tree.

use std::collections::{HashSet, VecDeque};

use super::format::{format_float, quote_str};
use super::node::{LazySeq, Map, Node, NodeId, Seq};
use super::{EncoderConfig, Reduce};
use crate::error::{ExportError, Result};

/// One open container on the active path.
enum Frame {
    Seq {
        seq: Seq,
        next: usize,
        level: usize,
    },
    Lazy {
        seq: LazySeq,
        first: bool,
        level: usize,
    },
    Map {
        map: Map,
        order: Option<Vec<usize>>,
        next: usize,
        first: bool,
        /// Nesting depth of this mapping's entries.
        level: usize,
    },
    /// An opaque value whose reduced form is being emitted.
    Reduced { id: NodeId },
}

/// What the top frame wants to do next.
enum Step {
    Child { node: Node, level: usize },
    Close,
}

/// Lazy sequence of text fragments produced by [`Encoder::iter_encode`].
///
/// The tree is walked depth-first with one frame per open container. After
/// the first error the stream yields nothing further.
///
/// [`Encoder::iter_encode`]: super::Encoder::iter_encode
pub struct Fragments<'a> {
    config: &'a EncoderConfig,
    reducer: Option<&'a dyn Reduce>,
    root: Option<Node>,
    stack: Vec<Frame>,
    open: HashSet<NodeId>,
    pending: VecDeque<String>,
    finished: bool,
}

impl<'a> Fragments<'a> {
    pub(crate) fn new(config: &'a EncoderConfig, root: Node, reducer: Option<&'a dyn Reduce>) -> Self {
        Self {
            config,
            reducer,
            root: Some(root),
            stack: Vec::new(),
            open: HashSet::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn emit(&mut self, fragment: impl Into<String>) {
        self.pending.push_back(fragment.into());
    }

    fn newline_indent(&self, level: usize) -> Option<String> {
        self.config
            .indent
            .as_ref()
            .map(|unit| format!("\n{}", unit.repeat(level)))
    }

    fn open_container(&mut self, id: NodeId) -> Result<()> {
        if self.open.insert(id) {
            Ok(())
        } else {
            Err(ExportError::CyclicReference)
        }
    }

    /// Start emitting `node`. Containers push a frame and are continued by
    /// [`advance`](Self::advance).
    fn enter(&mut self, node: Node, level: usize) -> Result<()> {
        match node {
            Node::Null => self.emit("null"),
            Node::Bool(value) => self.emit(if value { "true" } else { "false" }),
            Node::Int(value) => self.emit(value.to_string()),
            Node::Float(value) => {
                let text = format_float(value, self.config.float_precision)?;
                self.emit(text);
            }
            Node::Str(value) => {
                let quoted = quote_str(&value)?;
                self.emit(quoted);
            }
            Node::Seq(seq) => {
                if seq.is_empty() {
                    self.emit("[]");
                    return Ok(());
                }
                self.open_container(seq.id())?;
                self.emit("[");
                self.stack.push(Frame::Seq { seq, next: 0, level });
            }
            Node::Lazy(seq) => {
                if seq.is_exhausted() {
                    self.emit("[]");
                    return Ok(());
                }
                self.open_container(seq.id())?;
                self.emit("[");
                self.stack.push(Frame::Lazy {
                    seq,
                    first: true,
                    level,
                });
            }
            Node::Map(map) => {
                if map.is_empty() {
                    self.emit("{}");
                    return Ok(());
                }
                self.open_container(map.id())?;
                self.emit("{");
                let level = match self.newline_indent(level + 1) {
                    Some(newline) => {
                        self.emit(newline);
                        level + 1
                    }
                    None => level,
                };
                let order = self.config.sort_keys.then(|| map.sorted_order());
                self.stack.push(Frame::Map {
                    map,
                    order,
                    next: 0,
                    first: true,
                    level,
                });
            }
            Node::Opaque(opaque) => {
                let id = opaque.id();
                self.open_container(id)?;
                let reduced = match self.reducer {
                    Some(reducer) => reducer.reduce(&opaque)?,
                    None => None,
                };
                let reduced = reduced
                    .ok_or_else(|| ExportError::Unencodable(opaque.type_name().to_string()))?;
                self.stack.push(Frame::Reduced { id });
                self.enter(reduced, level)?;
            }
        }
        Ok(())
    }

    /// Continue the innermost open container by one child, or close it.
    fn advance(&mut self) -> Result<()> {
        let skip_empty = self.config.skip_empty;
        let item_separator = self.config.item_separator.clone();
        let key_separator = self.config.key_separator.clone();

        let mut prefix = Vec::new();
        let step = match self.stack.last_mut() {
            None => {
                self.finished = true;
                return Ok(());
            }
            Some(Frame::Reduced { .. }) => Step::Close,
            Some(Frame::Seq { seq, next, level }) => match seq.get(*next) {
                Some(node) => {
                    if *next > 0 {
                        prefix.push(item_separator);
                    }
                    *next += 1;
                    Step::Child {
                        node,
                        level: *level,
                    }
                }
                None => Step::Close,
            },
            Some(Frame::Lazy { seq, first, level }) => match seq.next_item() {
                Some(node) => {
                    if !std::mem::take(first) {
                        prefix.push(item_separator);
                    }
                    Step::Child {
                        node,
                        level: *level,
                    }
                }
                None => Step::Close,
            },
            Some(Frame::Map {
                map,
                order,
                next,
                first,
                level,
            }) => loop {
                let index = match order {
                    Some(order) => order.get(*next).copied(),
                    None => Some(*next),
                };
                *next += 1;
                let Some((key, node)) = index.and_then(|i| map.entry_at(i)) else {
                    break Step::Close;
                };
                if skip_empty && node.is_empty_value() {
                    continue;
                }
                if !std::mem::take(first) {
                    prefix.push(item_separator.clone());
                    if let Some(unit) = &self.config.indent {
                        prefix.push(format!("\n{}", unit.repeat(*level)));
                    }
                }
                prefix.push(quote_str(&key)?);
                prefix.push(key_separator.clone());
                break Step::Child {
                    node,
                    level: *level,
                };
            },
        };

        self.pending.extend(prefix);
        match step {
            Step::Child { node, level } => self.enter(node, level),
            Step::Close => {
                self.close();
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Seq { seq, .. } => {
                self.open.remove(&seq.id());
                self.emit("]");
            }
            Frame::Lazy { seq, .. } => {
                self.open.remove(&seq.id());
                self.emit("]");
            }
            Frame::Map { map, level, .. } => {
                self.open.remove(&map.id());
                if let Some(newline) = self.newline_indent(level.saturating_sub(1)) {
                    self.emit(newline);
                }
                self.emit("}");
            }
            Frame::Reduced { id } => {
                self.open.remove(&id);
            }
        }
    }
}

impl Iterator for Fragments<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Some(Ok(fragment));
            }
            if self.finished {
                return None;
            }
            let step = match self.root.take() {
                Some(root) => self.enter(root, 0),
                None => self.advance(),
            };
            if let Err(err) = step {
                self.finished = true;
                self.pending.clear();
                self.stack.clear();
                return Some(Err(err));
            }
        }
    }
}
