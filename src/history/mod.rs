//! History Manager
//! Linear, branchless undo/redo over whole-graph snapshots

use log::debug;

use crate::graph::Graph;

#[cfg(test)]
mod tests;

/// Ordered snapshots plus a cursor.
///
/// Every entry is an owned copy of the graph taken at commit time, so later
/// edits to the live graph never reach back into history.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Graph>,
    index: usize,
}

impl History {
    /// Start a history whose first entry is `initial`
    pub fn new(initial: &Graph) -> Self {
        Self {
            entries: vec![initial.clone()],
            index: 0,
        }
    }

    /// Forget everything and start again from `graph`
    pub fn reset(&mut self, graph: &Graph) {
        self.entries.clear();
        self.entries.push(graph.clone());
        self.index = 0;
    }

    /// Record `graph` as the newest state, discarding any redo entries
    pub fn commit(&mut self, graph: &Graph) {
        self.entries.truncate(self.index + 1);
        self.entries.push(graph.clone());
        self.index = self.entries.len() - 1;
        debug!("history commit: {} entries, index {}", self.entries.len(), self.index);
    }

    pub fn undo(&mut self) -> Option<&Graph> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    pub fn redo(&mut self) -> Option<&Graph> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn current(&self) -> &Graph {
        &self.entries[self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
