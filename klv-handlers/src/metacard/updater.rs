//! Metacard update strategies.
//!
//! Each updater describes *what* to carry over from a child metacard (one
//! accumulation epoch) into its parent. *How* the record is mutated lives
//! in a [`MetacardUpdaterVisitor`]; `accept` dispatches to the visitor
//! method matching the updater's kind, once.

use log::debug;

use super::Metacard;

/// Receives one call per updater kind.
pub trait MetacardUpdaterVisitor {
    fn visit_temporal_start(&mut self, updater: &TemporalStartUpdater);
    fn visit_temporal_end(&mut self, updater: &TemporalEndUpdater);
    fn visit_attribute_merge(&mut self, updater: &AttributeMergeUpdater);
    fn visit_list(&mut self, updater: &ListUpdater);
}

/// Sets the parent's temporal start from the child if the parent has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalStartUpdater;

impl TemporalStartUpdater {
    pub fn accept<V: MetacardUpdaterVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_temporal_start(self);
    }
}

/// Extends the parent's temporal end to the child's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalEndUpdater;

impl TemporalEndUpdater {
    pub fn accept<V: MetacardUpdaterVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_temporal_end(self);
    }
}

/// Adds the child's values of one attribute to the parent's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMergeUpdater {
    attribute: String,
}

impl AttributeMergeUpdater {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn accept<V: MetacardUpdaterVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_attribute_merge(self);
    }
}

/// A sequence of updaters applied in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListUpdater {
    updaters: Vec<MetacardUpdater>,
}

impl ListUpdater {
    pub fn new(updaters: Vec<MetacardUpdater>) -> Self {
        Self { updaters }
    }

    pub fn updaters(&self) -> &[MetacardUpdater] {
        &self.updaters
    }

    pub fn accept<V: MetacardUpdaterVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_list(self);
    }
}

/// The closed set of update strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum MetacardUpdater {
    TemporalStart(TemporalStartUpdater),
    TemporalEnd(TemporalEndUpdater),
    AttributeMerge(AttributeMergeUpdater),
    List(ListUpdater),
}

impl MetacardUpdater {
    /// Dispatch to the visitor method for this updater's kind.
    pub fn accept<V: MetacardUpdaterVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            MetacardUpdater::TemporalStart(u) => u.accept(visitor),
            MetacardUpdater::TemporalEnd(u) => u.accept(visitor),
            MetacardUpdater::AttributeMerge(u) => u.accept(visitor),
            MetacardUpdater::List(u) => u.accept(visitor),
        }
    }

    /// Apply this updater, carrying values from `child` into `parent`.
    pub fn update(&self, parent: &mut Metacard, child: &Metacard) {
        self.accept(&mut MetacardMerger::new(parent, child));
    }
}

impl From<AttributeMergeUpdater> for MetacardUpdater {
    fn from(updater: AttributeMergeUpdater) -> Self {
        MetacardUpdater::AttributeMerge(updater)
    }
}

impl From<ListUpdater> for MetacardUpdater {
    fn from(updater: ListUpdater) -> Self {
        MetacardUpdater::List(updater)
    }
}

/// Visitor that merges a child metacard into its parent.
pub struct MetacardMerger<'a> {
    parent: &'a mut Metacard,
    child: &'a Metacard,
}

impl<'a> MetacardMerger<'a> {
    pub fn new(parent: &'a mut Metacard, child: &'a Metacard) -> Self {
        Self { parent, child }
    }
}

impl MetacardUpdaterVisitor for MetacardMerger<'_> {
    fn visit_temporal_start(&mut self, _updater: &TemporalStartUpdater) {
        if self.parent.temporal_start().is_some() {
            return;
        }
        if let Some(start) = self.child.temporal_start() {
            self.parent.set_temporal_start(start);
        }
    }

    fn visit_temporal_end(&mut self, _updater: &TemporalEndUpdater) {
        match self.child.temporal_end() {
            Some(end) => self.parent.set_temporal_end(end),
            None => debug!(
                "Child metacard {} has no temporal end, parent {} unchanged",
                self.child.id(),
                self.parent.id()
            ),
        }
    }

    fn visit_attribute_merge(&mut self, updater: &AttributeMergeUpdater) {
        if let Some(values) = self.child.attribute(updater.attribute()) {
            self.parent.merge_values(updater.attribute(), values);
        }
    }

    fn visit_list(&mut self, updater: &ListUpdater) {
        for nested in updater.updaters() {
            nested.accept(self);
        }
    }
}
