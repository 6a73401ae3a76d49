use super::space::Point;
use super::Mesh;
use crate::basis::{ShapeFn, MAX_POLYNOMIAL_ORDER};
use crate::integration::Topology;

use log::info;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PRefInt {
    Increment(u8),
    Decrement(u8),
    None,
}

impl PRefInt {
    fn refine(&self, n: u8) -> Result<u8, PRefError> {
        match self {
            Self::Increment(delta) => {
                if n + *delta > MAX_POLYNOMIAL_ORDER {
                    Err(PRefError::ExceededMaxExpansion)
                } else {
                    Ok(n + *delta)
                }
            }
            Self::Decrement(delta) => {
                if *delta >= n {
                    Err(PRefError::NegExpansion)
                } else {
                    Ok(n - *delta)
                }
            }
            Self::None => Ok(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Description of a p-Refinement: a change of an Elem's polynomial order
pub struct PRef {
    delta: PRefInt,
}

impl PRef {
    pub const fn from(delta: i8) -> Self {
        Self {
            delta: match delta {
                0 => PRefInt::None,
                d if d > 0 => PRefInt::Increment(d as u8),
                d => PRefInt::Decrement(d.unsigned_abs()),
            },
        }
    }

    /// The polynomial order after applying this refinement to `current`
    pub fn refined_order(&self, current: u8) -> Result<u8, PRefError> {
        self.delta.refine(current)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PRefError {
    #[error("Negative p-Refinement will result in 0 or negative expansion; Cannot p-Refine!")]
    NegExpansion,
    #[error("Positive p-Refinement will result in expansion order over maximum; Cannot p-Refine!")]
    ExceededMaxExpansion,
    #[error("Elem {0} does not exist; Cannot apply p-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Elem {0} has children; Cannot apply p-Refinement!")]
    ElemHasChildren(usize),
    #[error("Multiple p-refinements were specified for Elem {0}; Cannot apply p-Refinements!")]
    DoubleRefinement(usize),
    #[error("Elem {0} is a {1}; only Quad Elems can be p-Refined!")]
    UnsupportedTopology(usize, Topology),
}

/// Immutable copy of an Elem's state taken before its Node set is replaced
#[derive(Debug, Clone)]
pub struct ElemSnapshot {
    pub order: u8,
    pub basis: Arc<dyn ShapeFn>,
    pub node_ids: SmallVec<[usize; 16]>,
    pub positions: Vec<Point>,
    pub values: Vec<SmallVec<[f64; 2]>>,
    pub edge_boundaries: SmallVec<[Option<usize>; 4]>,
}

impl ElemSnapshot {
    /// Physical position and field values of the old Elem at local coordinates `s`
    pub fn sample(&self, s: [f64; 2]) -> (Point, SmallVec<[f64; 2]>) {
        Mesh::sample(self.basis.as_ref(), &self.positions, &self.values, s)
    }
}

impl Mesh {
    /// Capture the current state of an Elem
    pub fn snapshot(&self, elem_id: usize) -> ElemSnapshot {
        let elem = &self.elems[elem_id];
        ElemSnapshot {
            order: elem.order(),
            basis: elem.basis_arc(),
            node_ids: elem.nodes.clone(),
            positions: self.elem_positions(elem_id),
            values: self.elem_values(elem_id),
            edge_boundaries: elem.edge_boundaries.clone(),
        }
    }

    /// Determine if this Elem can be p-refined (in the positive direction)
    /// * returns false if the Elem's expansion order has reached [MAX_POLYNOMIAL_ORDER]
    /// * returns an `Err` if the Mesh doesn't have `elem_id`
    pub fn elem_is_p_refineable(&self, elem_id: usize) -> Result<bool, PRefError> {
        match self.elems.get(elem_id) {
            Some(elem) if elem.is_alive() => Ok(elem.is_active()
                && elem.topology() == Topology::Quad
                && elem.order() < MAX_POLYNOMIAL_ORDER),
            _ => Err(PRefError::ElemDoesntExist(elem_id)),
        }
    }

    /// Apply a [PRef] to a list of [Elem](super::elem::Elem)s by their ID
    pub fn p_refine(&mut self, elem_ids: &[usize], refinement: PRef) -> Result<(), PRefError> {
        let mut orders = Vec::with_capacity(elem_ids.len());
        for elem_id in elem_ids.iter().copied() {
            let elem = self
                .elems
                .get(elem_id)
                .ok_or(PRefError::ElemDoesntExist(elem_id))?;
            orders.push((elem_id, refinement.refined_order(elem.order())?));
        }
        self.change_order(&orders)
    }

    /// Set the polynomial order of a list of Elems, rebuilding their Nodes in place
    ///
    /// Values on the new Nodes are interpolated from a snapshot of each Elem taken before its Node set is replaced.
    /// New Nodes which coincide with existing Nodes reuse them.
    pub fn change_order(&mut self, elem_orders: &[(usize, u8)]) -> Result<(), PRefError> {
        let mut orders_map: BTreeMap<usize, u8> = BTreeMap::new();
        for (elem_id, order) in elem_orders.iter().copied() {
            let elem = self
                .elems
                .get(elem_id)
                .filter(|elem| elem.is_alive())
                .ok_or(PRefError::ElemDoesntExist(elem_id))?;
            if elem.has_children() {
                return Err(PRefError::ElemHasChildren(elem_id));
            }
            if elem.topology() != Topology::Quad {
                return Err(PRefError::UnsupportedTopology(elem_id, elem.topology()));
            }
            if order == 0 {
                return Err(PRefError::NegExpansion);
            }
            if order > MAX_POLYNOMIAL_ORDER {
                return Err(PRefError::ExceededMaxExpansion);
            }
            if orders_map.insert(elem_id, order).is_some() {
                return Err(PRefError::DoubleRefinement(elem_id));
            }
        }

        let mut num_changed = 0;
        for (elem_id, order) in orders_map {
            if order != self.elems[elem_id].order() {
                self.execute_order_change(elem_id, order)?;
                num_changed += 1;
            }
        }

        info!("p-refined {} Elems", num_changed);
        Ok(())
    }

    fn execute_order_change(&mut self, elem_id: usize, order: u8) -> Result<(), PRefError> {
        let snapshot = self.snapshot(elem_id);
        let basis = self
            .library
            .get(Topology::Quad, order, self.elems[elem_id].spacing())
            .map_err(|_| PRefError::ExceededMaxExpansion)?;

        let mut new_nodes: SmallVec<[usize; 16]> = SmallVec::with_capacity(basis.n_nodes());
        for local in 0..basis.n_nodes() {
            let s = basis.local_coordinate_of_node(local);
            let (point, node_values) = snapshot.sample(s);
            let boundaries = Self::boundaries_at(basis.as_ref(), &snapshot.edge_boundaries, s);
            let node_id = self.find_or_create_node(point, &node_values, &boundaries);
            // reference the new Nodes before the old ones are released so shared Nodes survive
            self.nodes[node_id].add_ref(true);
            new_nodes.push(node_id);
        }

        for node_id in snapshot.node_ids.iter() {
            self.release_node(*node_id, true);
        }

        self.elems[elem_id].set_basis(basis, new_nodes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::NodeSpacing;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pref_orders() {
        assert_eq!(PRef::from(2).refined_order(3), Ok(5));
        assert_eq!(PRef::from(-2).refined_order(3), Ok(1));
        assert_eq!(PRef::from(0).refined_order(3), Ok(3));
        assert_eq!(PRef::from(-3).refined_order(3), Err(PRefError::NegExpansion));
        assert_eq!(
            PRef::from(1).refined_order(MAX_POLYNOMIAL_ORDER),
            Err(PRefError::ExceededMaxExpansion)
        );
    }

    #[test]
    fn order_change_interpolates() {
        let mut mesh =
            Mesh::from_file("./test_input/two_elems.json", 2, NodeSpacing::GaussLobatto).unwrap();
        let field = |p: &Point| 0.5 + p.x * p.x - p.x * p.y;
        for node in mesh.nodes.iter_mut() {
            node.values[0] = field(&node.coords);
        }

        mesh.p_refine(&[0], PRef::from(2)).unwrap();
        assert_eq!(mesh.elems[0].order(), 4);
        assert_eq!(mesh.elems[0].num_nodes(), 25);
        assert_eq!(mesh.elems[1].order(), 2);

        // the quadratic field is represented exactly at the new Nodes
        for node_id in mesh.elems[0].nodes.iter() {
            let node = &mesh.nodes[*node_id];
            assert!(node.is_active());
            assert_abs_diff_eq!(node.values[0], field(&node.coords), epsilon = 1e-12);
        }

        // the corner Nodes shared with the neighbour are reused
        let shared: Vec<usize> = mesh.elems[0]
            .corner_node_ids()
            .into_iter()
            .filter(|id| mesh.elems[1].nodes.contains(id))
            .collect();
        assert_eq!(shared.len(), 2);

        // the old mid-edge Node on the shared edge is still used by the neighbour
        mesh.p_refine(&[0], PRef::from(-2)).unwrap();
        assert_eq!(mesh.elems[0].num_nodes(), 9);
        assert_eq!(
            mesh.elems[0].edge_node_ids(3).to_vec(),
            mesh.elems[1].edge_node_ids(2).to_vec()
        );
    }

    #[test]
    fn p_refine_errors() {
        let mut mesh =
            Mesh::from_file("./test_input/two_elems.json", 1, NodeSpacing::GaussLobatto).unwrap();

        assert_eq!(mesh.p_refine(&[5], PRef::from(1)), Err(PRefError::ElemDoesntExist(5)));
        assert_eq!(mesh.p_refine(&[0], PRef::from(-1)), Err(PRefError::NegExpansion));
        assert_eq!(
            mesh.change_order(&[(1, 2), (1, 3)]),
            Err(PRefError::DoubleRefinement(1))
        );

        mesh.h_refine(&[0]).unwrap();
        assert_eq!(mesh.change_order(&[(0, 2)]), Err(PRefError::ElemHasChildren(0)));
    }

    #[test]
    #[should_panic]
    fn p_refinement_over_max() {
        let mut mesh =
            Mesh::from_file("./test_input/unit_square.json", 1, NodeSpacing::GaussLobatto).unwrap();
        mesh.p_refine(&[0], PRef::from(MAX_POLYNOMIAL_ORDER as i8)).unwrap();
    }
}
