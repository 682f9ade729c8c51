//! Fresh, densely-numbered CFG labels.
//!
//! A [`Label`] is an opaque, comparable, hashable identifier with a stable
//! printable name. Labels are minted by a [`LabelFactory`] rather than a
//! true global counter, so that concurrent tests (each owning their own
//! factory) never collide.

use cranelift_entity::entity_impl;
use std::fmt;

/// An opaque control-flow label.
///
/// Dense and zero-based so it can key `cranelift_entity::SecondaryMap` and
/// similar dense maps directly, without an intermediate hash lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);
entity_impl!(Label, "L");

/// Mints fresh, uniquely-numbered labels for one function's compilation.
///
/// Two reserved labels, [`LabelFactory::entry`] and [`LabelFactory::exit`],
/// are minted eagerly by `new()` so every `BlockMap` can rely on them
/// existing with a stable identity across the passes that touch it.
pub struct LabelFactory {
    names: Vec<Option<String>>,
    entry: Label,
    exit: Label,
}

impl LabelFactory {
    /// Create a new factory with its reserved ENTRY/EXIT labels minted.
    pub fn new() -> Self {
        let mut f = LabelFactory {
            names: Vec::new(),
            entry: Label::from_u32(0),
            exit: Label::from_u32(0),
        };
        f.entry = f.fresh_named("ENTRY");
        f.exit = f.fresh_named("EXIT");
        f
    }

    /// The distinguished entry label, synthesized once per factory.
    pub fn entry(&self) -> Label {
        self.entry
    }

    /// The distinguished exit label, synthesized once per factory.
    pub fn exit(&self) -> Label {
        self.exit
    }

    /// Mint a fresh, anonymous label.
    pub fn fresh(&mut self) -> Label {
        let id = self.names.len() as u32;
        self.names.push(None);
        Label::from_u32(id)
    }

    /// Mint a fresh label carrying a human-supplied name for debug output.
    pub fn fresh_named(&mut self, name: impl Into<String>) -> Label {
        let id = self.names.len() as u32;
        self.names.push(Some(name.into()));
        Label::from_u32(id)
    }

    /// Look up the printable name of a label minted by this factory.
    pub fn name(&self, label: Label) -> String {
        match self.names.get(label.index()).and_then(|n| n.as_ref()) {
            Some(name) => name.clone(),
            None => format!("{label}"),
        }
    }

    /// Number of labels minted so far, including ENTRY/EXIT.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reset to a fresh state with new ENTRY/EXIT labels, reusing backing
    /// storage. Mirrors the `reset()` convention described for the
    /// process-wide counters this factory replaces.
    pub fn clear(&mut self) {
        self.names.clear();
        self.entry = self.fresh_named("ENTRY");
        self.exit = self.fresh_named("EXIT");
    }
}

impl Default for LabelFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LabelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelFactory")
            .field("count", &self.names.len())
            .field("entry", &self.entry)
            .field("exit", &self.exit)
            .finish()
    }
}
