use super::space::Point;
use json::{object, JsonValue};
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeSet;

/// A point in 2D space which carries the nodal values of each field.
///
/// Nodes are owned by the `Mesh` and shared (by id) between all the `Elem`s which touch them.
/// They keep count of the alive and active `Elem`s which reference them: a Node with no
/// alive references has been retired, and a Node with no active references is only used by
/// the ancestors of the active `Elem`s (it carries no degrees of freedom).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub coords: Point,
    /// One value per field
    pub values: SmallVec<[f64; 2]>,
    /// Ids of the boundaries this Node lies on
    pub boundaries: BTreeSet<usize>,
    pinned: SmallVec<[bool; 2]>,
    refs: u32,
    active_refs: u32,
}

impl Node {
    pub fn new(id: usize, coords: Point, num_fields: usize) -> Self {
        Self {
            id,
            coords,
            values: smallvec![0.0; num_fields],
            boundaries: BTreeSet::new(),
            pinned: smallvec![false; num_fields],
            refs: 0,
            active_refs: 0,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn set_num_fields(&mut self, num_fields: usize) {
        self.values.resize(num_fields, 0.0);
        self.pinned.resize(num_fields, false);
    }

    pub fn is_pinned(&self, field: usize) -> bool {
        self.pinned.get(field).copied().unwrap_or(false)
    }

    pub fn pin(&mut self, field: usize) {
        self.pinned[field] = true;
    }

    pub fn unpin(&mut self, field: usize) {
        self.pinned[field] = false;
    }

    pub fn on_boundary(&self, boundary: usize) -> bool {
        self.boundaries.contains(&boundary)
    }

    /// Is this Node referenced by any active `Elem`
    pub fn is_active(&self) -> bool {
        self.active_refs > 0
    }

    /// Is this Node no longer referenced by any `Elem` in the refinement tree
    pub fn is_retired(&self) -> bool {
        self.refs == 0
    }

    pub(crate) fn add_ref(&mut self, active: bool) {
        self.refs += 1;
        if active {
            self.active_refs += 1;
        }
    }

    pub(crate) fn remove_ref(&mut self, active: bool) {
        debug_assert!(self.refs > 0, "Node {} has no references to remove!", self.id);
        self.refs = self.refs.saturating_sub(1);
        if active {
            self.active_refs = self.active_refs.saturating_sub(1);
        }
    }

    pub(crate) fn activate(&mut self) {
        self.active_refs += 1;
    }

    pub(crate) fn deactivate(&mut self) {
        self.active_refs = self.active_refs.saturating_sub(1);
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "coords": self.coords,
            "values": self.values.to_vec(),
            "pinned": self.pinned.to_vec(),
            "boundaries": self.boundaries.iter().copied().collect::<Vec<usize>>(),
            "active": self.is_active(),
            "retired": self.is_retired(),
        }
    }
}
