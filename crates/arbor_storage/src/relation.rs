//! Relation storage with bidirectional indices.
//!
//! Each descriptor keeps a child → parent map and a parent → ordered
//! children map. One-to-one descriptors use the same layout with lists of at
//! most one element. The index itself only moves edges; kind, type and
//! multiplicity checks happen before an edit reaches it.

use std::collections::HashSet;

use arbor_foundation::EntityId;

use crate::registry::DescriptorId;

/// One parent/child edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Relation the edge belongs to.
    pub descriptor: DescriptorId,
    /// Parent end.
    pub parent: EntityId,
    /// Child end.
    pub child: EntityId,
}

/// Edges added and removed by one relation edit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeDelta {
    /// Edges that did not exist before the edit.
    pub attached: Vec<Edge>,
    /// Edges that no longer exist after the edit.
    pub detached: Vec<Edge>,
    /// True if children kept by the edit changed relative order.
    pub reordered: bool,
}

impl EdgeDelta {
    /// Returns true if the edit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && !self.reordered
    }

    /// Every entity at either end of a changed edge, without duplicates.
    #[must_use]
    pub fn touched(&self) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        self.attached
            .iter()
            .chain(&self.detached)
            .flat_map(|edge| [edge.parent, edge.child])
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Edges {
    parent_of: im::HashMap<EntityId, EntityId>,
    children_of: im::HashMap<EntityId, im::Vector<EntityId>>,
}

impl Edges {
    fn link(&mut self, parent: EntityId, child: EntityId) {
        self.parent_of.insert(child, parent);
        self.children_of.entry(parent).or_default().push_back(child);
    }

    fn unlink(&mut self, child: EntityId) -> Option<EntityId> {
        let parent = self.parent_of.remove(&child)?;
        if let Some(list) = self.children_of.get_mut(&parent) {
            if let Some(pos) = list.index_of(&child) {
                list.remove(pos);
            }
            if list.is_empty() {
                self.children_of.remove(&parent);
            }
        }
        Some(parent)
    }

    fn first_child(&self, parent: EntityId) -> Option<EntityId> {
        self.children_of.get(&parent).and_then(|list| list.front().copied())
    }
}

/// Bidirectional parent/child maps for every descriptor.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RelationIndex {
    edges: im::HashMap<DescriptorId, Edges>,
}

impl RelationIndex {
    fn edges_mut(&mut self, d: DescriptorId) -> &mut Edges {
        self.edges.entry(d).or_default()
    }

    /// Parent of `child` under `d`.
    pub fn parent(&self, d: DescriptorId, child: EntityId) -> Option<EntityId> {
        self.edges.get(&d)?.parent_of.get(&child).copied()
    }

    /// Children of `parent` under `d`, in order.
    pub fn children(&self, d: DescriptorId, parent: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.edges
            .get(&d)
            .and_then(|edges| edges.children_of.get(&parent))
            .into_iter()
            .flat_map(|list| list.iter().copied())
    }

    /// The single (or first) child of `parent` under `d`.
    pub fn child(&self, d: DescriptorId, parent: EntityId) -> Option<EntityId> {
        self.edges.get(&d)?.first_child(parent)
    }

    /// Sets the child of a one-to-one parent.
    ///
    /// The parent's previous child and the new child's previous parent are
    /// both detached.
    pub fn set_one_to_one(
        &mut self,
        d: DescriptorId,
        parent: EntityId,
        child: Option<EntityId>,
    ) -> EdgeDelta {
        let mut delta = EdgeDelta::default();
        let edges = self.edges_mut(d);
        if edges.first_child(parent) == child {
            return delta;
        }
        if let Some(old) = edges.first_child(parent) {
            edges.unlink(old);
            delta.detached.push(edge(d, parent, old));
        }
        if let Some(child) = child {
            if let Some(previous) = edges.unlink(child) {
                delta.detached.push(edge(d, previous, child));
            }
            edges.link(parent, child);
            delta.attached.push(edge(d, parent, child));
        }
        delta
    }

    /// Sets the parent of a one-to-one child, the mirror of
    /// [`RelationIndex::set_one_to_one`].
    pub fn set_one_to_one_parent(
        &mut self,
        d: DescriptorId,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> EdgeDelta {
        let mut delta = EdgeDelta::default();
        let edges = self.edges_mut(d);
        if edges.parent_of.get(&child).copied() == parent {
            return delta;
        }
        if let Some(previous) = edges.unlink(child) {
            delta.detached.push(edge(d, previous, child));
        }
        if let Some(parent) = parent {
            if let Some(old) = edges.first_child(parent) {
                edges.unlink(old);
                delta.detached.push(edge(d, parent, old));
            }
            edges.link(parent, child);
            delta.attached.push(edge(d, parent, child));
        }
        delta
    }

    /// Moves a one-to-many child to the end of another parent's list, or
    /// clears its parent.
    ///
    /// Setting the parent a child already has keeps its position.
    pub fn set_parent(
        &mut self,
        d: DescriptorId,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> EdgeDelta {
        let mut delta = EdgeDelta::default();
        let edges = self.edges_mut(d);
        if edges.parent_of.get(&child).copied() == parent {
            return delta;
        }
        if let Some(previous) = edges.unlink(child) {
            delta.detached.push(edge(d, previous, child));
        }
        if let Some(parent) = parent {
            edges.link(parent, child);
            delta.attached.push(edge(d, parent, child));
        }
        delta
    }

    /// Replaces the full ordered child list of a one-to-many parent.
    ///
    /// Dropped children lose their edge; new children are detached from
    /// their previous parent first. `ordered` must not contain duplicates.
    pub fn set_children(
        &mut self,
        d: DescriptorId,
        parent: EntityId,
        ordered: &[EntityId],
    ) -> EdgeDelta {
        let mut delta = EdgeDelta::default();
        let edges = self.edges_mut(d);
        let old: Vec<EntityId> = edges
            .children_of
            .get(&parent)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();
        if old == ordered {
            return delta;
        }

        let old_set: HashSet<EntityId> = old.iter().copied().collect();
        let new_set: HashSet<EntityId> = ordered.iter().copied().collect();

        for &child in &old {
            if !new_set.contains(&child) {
                edges.parent_of.remove(&child);
                delta.detached.push(edge(d, parent, child));
            }
        }
        for &child in ordered {
            if old_set.contains(&child) {
                continue;
            }
            if let Some(previous) = edges.unlink(child) {
                delta.detached.push(edge(d, previous, child));
            }
            delta.attached.push(edge(d, parent, child));
        }

        for &child in ordered {
            edges.parent_of.insert(child, parent);
        }
        if ordered.is_empty() {
            edges.children_of.remove(&parent);
        } else {
            edges
                .children_of
                .insert(parent, ordered.iter().copied().collect());
        }

        let kept_before = old.iter().filter(|c| new_set.contains(*c));
        let kept_after = ordered.iter().filter(|c| old_set.contains(*c));
        delta.reordered = kept_before.ne(kept_after);
        delta
    }

    /// Removes every edge touching `id`, as parent or as child.
    pub fn remove_entity(&mut self, id: EntityId) -> EdgeDelta {
        let mut delta = EdgeDelta::default();
        let descriptors: Vec<DescriptorId> = self.edges.keys().copied().collect();
        for d in descriptors {
            let edges = self.edges_mut(d);
            if let Some(parent) = edges.unlink(id) {
                delta.detached.push(edge(d, parent, id));
            }
            if let Some(children) = edges.children_of.remove(&id) {
                for child in children {
                    edges.parent_of.remove(&child);
                    delta.detached.push(edge(d, id, child));
                }
            }
        }
        delta
    }

    /// Children of `id` across every descriptor.
    pub fn children_in_any(&self, id: EntityId) -> Vec<EntityId> {
        self.edges
            .values()
            .filter_map(|edges| edges.children_of.get(&id))
            .flat_map(|list| list.iter().copied())
            .collect()
    }

    /// Returns true if `ancestor` is `id` or reachable from it by parent
    /// edges under `d`.
    pub fn is_ancestor(&self, d: DescriptorId, ancestor: EntityId, id: EntityId) -> bool {
        let mut current = Some(id);
        let mut steps = 0usize;
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.edge_count(d) {
                return false;
            }
            current = self.parent(d, node);
        }
        false
    }

    fn edge_count(&self, d: DescriptorId) -> usize {
        self.edges.get(&d).map_or(0, |edges| edges.parent_of.len())
    }

    /// Every stored edge.
    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().flat_map(|(&d, edges)| {
            edges.children_of.iter().flat_map(move |(&parent, list)| {
                list.iter().map(move |&child| edge(d, parent, child))
            })
        })
    }

    /// Finds an edge whose two directions disagree.
    ///
    /// Returns the first offending edge, or `None` if the index is
    /// consistent.
    pub fn find_asymmetry(&self) -> Option<Edge> {
        for (&d, edges) in &self.edges {
            let mut listed = 0usize;
            for (&parent, list) in &edges.children_of {
                let mut seen = HashSet::new();
                for &child in list {
                    listed += 1;
                    if !seen.insert(child) || edges.parent_of.get(&child) != Some(&parent) {
                        return Some(edge(d, parent, child));
                    }
                }
            }
            if listed != edges.parent_of.len() {
                let (&child, &parent) = edges
                    .parent_of
                    .iter()
                    .find(|(child, parent)| {
                        edges
                            .children_of
                            .get(*parent)
                            .is_none_or(|list| !list.contains(*child))
                    })?;
                return Some(edge(d, parent, child));
            }
        }
        None
    }
}

fn edge(descriptor: DescriptorId, parent: EntityId, child: EntityId) -> Edge {
    Edge {
        descriptor,
        parent,
        child,
    }
}
