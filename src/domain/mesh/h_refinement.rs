use super::edge::{Edge, EdgeSegment};
use super::elem::ElemUninit;
use super::{Mesh, MIN_EDGE_LENGTH};
use crate::domain::IdTracker;
use crate::integration::Topology;

use log::info;
use std::collections::BTreeSet;

/// Quadrant of a child Elem following a T-Type h-Refinement (from the parent Elem's perspective)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    /// south west
    SW,
    /// south east
    SE,
    /// north west
    NW,
    /// north east
    NE,
}

impl Quadrant {
    pub const ALL: [Self; 4] = [Self::SW, Self::SE, Self::NW, Self::NE];

    pub fn index(&self) -> usize {
        match self {
            Self::SW => 0,
            Self::SE => 1,
            Self::NW => 2,
            Self::NE => 3,
        }
    }

    /// Lower left corner of the quadrant in the parent's local coordinates
    pub fn offset(&self) -> [f64; 2] {
        match self {
            Self::SW => [-1.0, -1.0],
            Self::SE => [0.0, -1.0],
            Self::NW => [-1.0, 0.0],
            Self::NE => [0.0, 0.0],
        }
    }

    /// Map a child's local coordinates into the parent's local coordinates
    pub fn to_parent(&self, s: [f64; 2]) -> [f64; 2] {
        let lo = self.offset();
        [lo[0] + 0.5 * (s[0] + 1.0), lo[1] + 0.5 * (s[1] + 1.0)]
    }

    /// Map the parent's local coordinates into this child's local coordinates
    pub fn from_parent(&self, s: [f64; 2]) -> [f64; 2] {
        let lo = self.offset();
        [2.0 * (s[0] - lo[0]) - 1.0, 2.0 * (s[1] - lo[1]) - 1.0]
    }

    /// A quadrant containing the parent local coordinates `s` (ties go to the north and east)
    pub fn containing(s: [f64; 2]) -> Self {
        match (s[0] >= 0.0, s[1] >= 0.0) {
            (false, false) => Self::SW,
            (true, false) => Self::SE,
            (false, true) => Self::NW,
            (true, true) => Self::NE,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HRefError {
    #[error("Elem {0} does not exist; Cannot apply h-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Elem {0} has children; Cannot apply h-Refinement!")]
    ElemHasChildren(usize),
    #[error("Multiple h-Refinements were specified for Elem {0}; Cannot apply h-Refinements!")]
    DoubleRefinement(usize),
    #[error("Elem {0} is a {1}; only Quad Elems can be h-Refined!")]
    UnsupportedTopology(usize, Topology),
    #[error("Elem {0} is not the parent of a family of active Elems; Cannot un-refine!")]
    NotAFamily(usize),
    #[error("Elem {0} has Edges shorter than the minimum edge length; Cannot apply h-Refinement!")]
    MinEdgeLength(usize),
    #[error("ElemUninit {0} was not fully initialized during h-Refinement!")]
    UninitializedElem(usize),
}

impl Mesh {
    /// Determine if this Elem can be h-refined
    /// * returns false if the Elem is not active, is not a Quad, or any of its Edges is shorter than [MIN_EDGE_LENGTH] after splitting
    /// * returns an `Err` if the Mesh doesn't have `elem_id`
    pub fn elem_is_h_refineable(&self, elem_id: usize) -> Result<bool, HRefError> {
        Ok(self.check_h_refineable(elem_id).is_ok())
    }

    fn check_h_refineable(&self, elem_id: usize) -> Result<(), HRefError> {
        let elem = self
            .elems
            .get(elem_id)
            .filter(|elem| elem.is_alive())
            .ok_or(HRefError::ElemDoesntExist(elem_id))?;

        if elem.has_children() {
            return Err(HRefError::ElemHasChildren(elem_id));
        }
        if elem.topology() != Topology::Quad {
            return Err(HRefError::UnsupportedTopology(elem_id, elem.topology()));
        }
        if elem.segments.len() != 4 {
            return Err(HRefError::UninitializedElem(elem_id));
        }
        if elem
            .segments
            .iter()
            .any(|seg| 0.5 * seg.length() * self.edges[seg.edge].length < MIN_EDGE_LENGTH)
        {
            return Err(HRefError::MinEdgeLength(elem_id));
        }

        Ok(())
    }

    /// T-Type h-Refinement of a list of [Elem](super::elem::Elem)s by their ID
    ///
    /// Returns the ids of the new child Elems (four per parent, ordered by [Quadrant])
    pub fn h_refine(&mut self, elem_ids: &[usize]) -> Result<Vec<usize>, HRefError> {
        let mut refinements = BTreeSet::new();
        for elem_id in elem_ids.iter().copied() {
            self.check_h_refineable(elem_id)?;
            if !refinements.insert(elem_id) {
                return Err(HRefError::DoubleRefinement(elem_id));
            }
        }

        let mut elem_id_tracker = IdTracker::new(self.elems.len());
        let mut edge_id_tracker = IdTracker::new(self.edges.len());
        let mut new_elem_ids = Vec::with_capacity(4 * refinements.len());

        for parent_id in refinements {
            new_elem_ids.extend(self.execute_t_refinement(
                parent_id,
                &mut elem_id_tracker,
                &mut edge_id_tracker,
            )?);
        }

        info!(
            "h-refined {} Elems; Mesh now has {} Elems ({} active) and {} Nodes",
            new_elem_ids.len() / 4,
            self.elems.len(),
            self.num_active_elems(),
            self.nodes.len()
        );

        Ok(new_elem_ids)
    }

    fn execute_t_refinement(
        &mut self,
        parent_id: usize,
        elem_id_tracker: &mut IdTracker,
        edge_id_tracker: &mut IdTracker,
    ) -> Result<[usize; 4], HRefError> {
        let basis = self.elems[parent_id].basis_arc();
        let parent_segments = self.elems[parent_id].segments.clone();
        let parent_boundaries = self.elems[parent_id].edge_boundaries.clone();
        let positions = self.elem_positions(parent_id);
        let values = self.elem_values(parent_id);
        let n1d = basis.nnode_1d();

        let mut children: Vec<ElemUninit> = Quadrant::ALL
            .iter()
            .map(|q| ElemUninit::new(elem_id_tracker.next_id(), *q, &self.elems[parent_id]))
            .collect();

        // create (or find) the child Nodes from the parent's mapping and fields
        for (quadrant, child) in Quadrant::ALL.iter().zip(children.iter_mut()) {
            for local in 0..basis.n_nodes() {
                let s_p = quadrant.to_parent(basis.local_coordinate_of_node(local));
                let (point, node_values) = Self::sample(basis.as_ref(), &positions, &values, s_p);
                let boundaries = Self::boundaries_at(basis.as_ref(), &parent_boundaries, s_p);
                child.set_node(local, self.find_or_create_node(point, &node_values, &boundaries));
            }
        }

        let corner = |child: &ElemUninit, local: usize| -> Result<usize, HRefError> {
            child.nodes[local].ok_or(HRefError::UninitializedElem(child.id))
        };
        let south_mid = corner(&children[0], n1d - 1)?;
        let center = corner(&children[0], n1d * n1d - 1)?;
        let west_mid = corner(&children[0], n1d * (n1d - 1))?;
        let north_mid = corner(&children[3], n1d * (n1d - 1))?;
        let east_mid = corner(&children[3], n1d - 1)?;

        // interior Edges all run toward increasing local coordinate
        let [e_s, e_n, e_w, e_e] = [
            [south_mid, center],
            [center, north_mid],
            [west_mid, center],
            [center, east_mid],
        ]
        .map(|nodes| {
            let edge_id = edge_id_tracker.next_id();
            let points = [&self.nodes[nodes[0]].coords, &self.nodes[nodes[1]].coords];
            self.edges
                .push(Edge::interior(edge_id, nodes, points, parent_id));
            edge_id
        });

        let [south, north, west, east] = [
            parent_segments[0],
            parent_segments[1],
            parent_segments[2],
            parent_segments[3],
        ];

        for (child, outer, inner) in [
            (
                0,
                [(0, south.half(false)), (2, west.half(false))],
                [(1, e_w), (3, e_s)],
            ),
            (
                1,
                [(0, south.half(true)), (3, east.half(false))],
                [(2, e_s), (1, e_e)],
            ),
            (
                2,
                [(1, north.half(false)), (2, west.half(true))],
                [(0, e_w), (3, e_n)],
            ),
            (
                3,
                [(1, north.half(true)), (3, east.half(true))],
                [(2, e_n), (0, e_e)],
            ),
        ] {
            for (local_edge, segment) in outer {
                children[child].set_segment(local_edge, segment);
                children[child].edge_boundaries[local_edge] = parent_boundaries[local_edge];
            }
            for (local_edge, edge_id) in inner {
                children[child].set_segment(local_edge, EdgeSegment::full(edge_id, false));
            }
        }

        let mut child_ids = [0; 4];
        for (idx, child) in children.into_iter().enumerate() {
            let elem = child.into_elem()?;
            child_ids[idx] = elem.id;
            debug_assert_eq!(elem.id, self.elems.len());
            self.attach_elem(elem);
        }

        for node_id in self.elems[parent_id].nodes.clone() {
            self.nodes[node_id].deactivate();
        }
        self.elems[parent_id].set_children(Some(child_ids));

        Ok(child_ids)
    }

    /// Undo the h-Refinement of a list of [Elem](super::elem::Elem)s by their ID
    ///
    /// Each parent's children must all be active. The children are retired, and the parent's
    /// Nodes which were not in use get their values from the child containing them.
    pub fn h_unrefine(&mut self, parent_ids: &[usize]) -> Result<(), HRefError> {
        let mut families = BTreeSet::new();
        for parent_id in parent_ids.iter().copied() {
            let parent = self
                .elems
                .get(parent_id)
                .filter(|elem| elem.is_alive())
                .ok_or(HRefError::ElemDoesntExist(parent_id))?;

            match parent.child_ids() {
                Some(child_ids) if child_ids.iter().all(|id| self.elems[*id].is_active()) => (),
                _ => return Err(HRefError::NotAFamily(parent_id)),
            }

            if !families.insert(parent_id) {
                return Err(HRefError::DoubleRefinement(parent_id));
            }
        }

        let num_families = families.len();
        for parent_id in families {
            self.execute_unrefinement(parent_id)?;
        }

        info!(
            "un-refined {} Elems; Mesh now has {} active Elems",
            num_families,
            self.num_active_elems()
        );

        Ok(())
    }

    fn execute_unrefinement(&mut self, parent_id: usize) -> Result<(), HRefError> {
        let child_ids = self.elems[parent_id]
            .child_ids()
            .ok_or(HRefError::NotAFamily(parent_id))?;
        let basis = self.elems[parent_id].basis_arc();
        let parent_nodes = self.elems[parent_id].nodes.clone();

        // re-interpolate the parent's unused Nodes before the children are removed
        let mut updates = Vec::new();
        for (local, node_id) in parent_nodes.iter().enumerate() {
            if !self.nodes[*node_id].is_active() {
                let s_p = basis.local_coordinate_of_node(local);
                let quadrant = Quadrant::containing(s_p);
                let child_id = child_ids[quadrant.index()];

                let child_basis = self.elems[child_id].basis_arc();
                let positions = self.elem_positions(child_id);
                let values = self.elem_values(child_id);
                let (_, node_values) = Self::sample(
                    child_basis.as_ref(),
                    &positions,
                    &values,
                    quadrant.from_parent(s_p),
                );
                updates.push((*node_id, node_values));
            }
        }

        for (node_id, node_values) in updates {
            self.nodes[node_id].values = node_values;
        }

        for child_id in child_ids {
            self.detach_elem(child_id);
        }

        for node_id in parent_nodes {
            self.nodes[node_id].activate();
        }
        self.elems[parent_id].set_children(None);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::NodeSpacing;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quadrant_maps() {
        for q in Quadrant::ALL {
            for s in [[-1.0, -1.0], [0.3, -0.2], [1.0, 1.0]] {
                let back = q.from_parent(q.to_parent(s));
                assert_abs_diff_eq!(back[0], s[0], epsilon = 1e-14);
                assert_abs_diff_eq!(back[1], s[1], epsilon = 1e-14);
            }
        }
        assert_eq!(Quadrant::SE.to_parent([1.0, 1.0]), [1.0, 0.0]);
        assert_eq!(Quadrant::containing([-0.5, 0.5]), Quadrant::NW);
        assert_eq!(Quadrant::containing([0.0, -0.5]), Quadrant::SE);
    }

    #[test]
    fn basic_h_refinement() {
        let mut mesh =
            Mesh::from_file("./test_input/unit_square.json", 2, NodeSpacing::Equispaced).unwrap();
        let children = mesh.h_refine(&[0]).unwrap();

        assert_eq!(children, vec![1, 2, 3, 4]);
        assert_eq!(mesh.elems.len(), 5);
        assert_eq!(mesh.num_active_elems(), 4);
        // 5 x 5 grid of Q2 Nodes, the parent's 9 Nodes are reused
        assert_eq!(mesh.nodes.len(), 25);
        assert_eq!(mesh.edges.len(), 8);

        assert_eq!(mesh.elems[3].quadrant(), Some(Quadrant::NW));
        assert_eq!(mesh.elems[3].parent_id(), Some(0));
        assert_eq!(mesh.elems[3].h_level, 1);

        let center = &mesh.nodes[mesh.elems[1].nodes[8]];
        assert_abs_diff_eq!(center.coords.x, 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(center.coords.y, 0.5, epsilon = 1e-14);
        assert_eq!(center.id, mesh.elems[0].nodes[4]);

        // children inherit the boundaries of the parent's Edges
        assert_eq!(mesh.elems[1].edge_boundaries[0], Some(0));
        assert_eq!(mesh.elems[1].edge_boundaries[1], None);
    }

    #[test]
    fn refine_then_unrefine() {
        let mut mesh =
            Mesh::from_file("./test_input/unit_square.json", 3, NodeSpacing::GaussLobatto).unwrap();
        for node in mesh.nodes.iter_mut() {
            node.values[0] = 1.0 + node.coords.x - 2.0 * node.coords.y;
        }
        let before: Vec<f64> = mesh.elems[0]
            .nodes
            .iter()
            .map(|id| mesh.nodes[*id].values[0])
            .collect();

        mesh.h_refine(&[0]).unwrap();
        for id in mesh.elems[0].nodes.iter() {
            assert!(!mesh.nodes[*id].is_active() || mesh.elems[1..].iter().any(|e| e.nodes.contains(id)));
        }

        mesh.h_unrefine(&[0]).unwrap();
        assert!(mesh.elems[0].is_active());
        assert_eq!(mesh.num_active_elems(), 1);
        assert!(mesh.elems[1..].iter().all(|e| !e.is_alive()));

        for (id, value) in mesh.elems[0].nodes.iter().zip(before) {
            assert!(mesh.nodes[*id].is_active());
            assert_abs_diff_eq!(mesh.nodes[*id].values[0], value, epsilon = 1e-12);
        }

        // nodes which only belonged to the children are retired
        assert_eq!(mesh.nodes.iter().filter(|n| !n.is_retired()).count(), 16);
    }

    #[test]
    #[should_panic]
    fn h_refine_non_existent() {
        let mut mesh =
            Mesh::from_file("./test_input/unit_square.json", 1, NodeSpacing::Equispaced).unwrap();
        mesh.h_refine(&[1]).unwrap();
    }

    #[test]
    fn h_refine_errors() {
        let mut mesh =
            Mesh::from_file("./test_input/two_elems.json", 1, NodeSpacing::Equispaced).unwrap();

        assert_eq!(mesh.h_refine(&[0, 0]), Err(HRefError::DoubleRefinement(0)));
        mesh.h_refine(&[0]).unwrap();
        assert_eq!(mesh.h_refine(&[0]), Err(HRefError::ElemHasChildren(0)));
        assert_eq!(mesh.h_unrefine(&[1]), Err(HRefError::NotAFamily(1)));

        mesh.h_refine(&[2]).unwrap();
        assert_eq!(mesh.h_unrefine(&[0]), Err(HRefError::NotAFamily(0)));
    }

    #[test]
    fn minimum_edge_length_exceeded() {
        let mut mesh =
            Mesh::from_file("./test_input/unit_square.json", 1, NodeSpacing::Equispaced).unwrap();
        let mut elem_id = 0;
        let result = loop {
            match mesh.h_refine(&[elem_id]) {
                Ok(children) => elem_id = children[0],
                Err(err) => break err,
            }
        };
        assert_eq!(result, HRefError::MinEdgeLength(elem_id));
        assert!(mesh.elems[elem_id].h_level > 10);
    }
}
