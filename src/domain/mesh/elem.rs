use super::edge::EdgeSegment;
use super::h_refinement::{HRefError, Quadrant};
use crate::basis::{NodeSpacing, ShapeFn};
use crate::integration::Topology;

use json::{object, JsonValue};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// `Elem`s are the unit of residual/Jacobian contribution in the `Mesh`
///
/// `Elem`s are responsible for keeping track of:
/// * Their `Node`s (by id), in the order defined by their shape functions
/// * Their shape function strategy (topology, polynomial order, and node spacing)
/// * Connections to their parent `Elem` and child `Elem`s (h-refinement state)
/// * The segments of the registry `Edge`s covered by their own edges (quadrilaterals only)
/// * Boundary membership of each of their edges and a scalar attribute (region tag)
///
/// ## Layout
/// Quadrilateral Corner `Node`s and edges are described as follows (`n` nodes along each edge):
///
/// ```text
///                   N
///   n(n-1) --------------- n²-1
///         |       1       |
///         |               |
///      W  |2             3|  E
///         |               |
///         |       0       |
///       0 --------------- n-1
///                   S
/// ```
///
/// ## h-Refinement
///
/// Quadrilaterals are split into four children (T-Type), numbered by [Quadrant]:
/// ```text
///     -----------------------
///     |          |          |
///     |    NW    |    NE    |
///     |          |          |
///     |----------|----------|
///     |          |          |
///     |    SW    |    SE    |
///     |          |          |
///     -----------------------
/// ```
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    pub nodes: SmallVec<[usize; 16]>,
    pub segments: SmallVec<[EdgeSegment; 4]>,
    pub edge_boundaries: SmallVec<[Option<usize>; 4]>,
    pub attribute: f64,
    pub h_level: u8,
    basis: Arc<dyn ShapeFn>,
    parent: Option<(usize, Quadrant)>,
    children: Option<[usize; 4]>,
    alive: bool,
}

impl Elem {
    pub fn new(
        id: usize,
        basis: Arc<dyn ShapeFn>,
        nodes: SmallVec<[usize; 16]>,
        edge_boundaries: SmallVec<[Option<usize>; 4]>,
        attribute: f64,
    ) -> Self {
        Self {
            id,
            nodes,
            segments: SmallVec::new(),
            edge_boundaries,
            attribute,
            h_level: 0,
            basis,
            parent: None,
            children: None,
            alive: true,
        }
    }

    pub fn basis(&self) -> &dyn ShapeFn {
        self.basis.as_ref()
    }

    pub fn basis_arc(&self) -> Arc<dyn ShapeFn> {
        self.basis.clone()
    }

    pub fn topology(&self) -> Topology {
        self.basis.topology()
    }

    pub fn order(&self) -> u8 {
        self.basis.order()
    }

    pub fn spacing(&self) -> NodeSpacing {
        self.basis.spacing()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Global ids of the `Node`s along a local edge, in increasing local edge parameter
    pub fn edge_node_ids(&self, edge: usize) -> SmallVec<[usize; 8]> {
        self.basis
            .edge_nodes(edge)
            .iter()
            .map(|local| self.nodes[*local])
            .collect()
    }

    /// Global ids of the corner `Node`s
    pub fn corner_node_ids(&self) -> SmallVec<[usize; 4]> {
        match self.topology() {
            Topology::Triangle => self.nodes[0..3].iter().copied().collect(),
            _ => {
                let n = self.basis.nnode_1d();
                [0, n - 1, n * (n - 1), n * n - 1]
                    .iter()
                    .map(|local| self.nodes[*local])
                    .collect()
            }
        }
    }

    /// Id of the Parent Elem if this Elem has a parent
    pub fn parent_id(&self) -> Option<usize> {
        self.parent.map(|(id, _)| id)
    }

    /// Location of this Elem relative to its parent
    pub fn quadrant(&self) -> Option<Quadrant> {
        self.parent.map(|(_, q)| q)
    }

    /// Returns a vector of ids for this Elem's children. Returns `None` if this Elem has no children.
    pub fn child_ids(&self) -> Option<[usize; 4]> {
        self.children
    }

    /// Has this `Elem` been h-Refined
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// Is this Elem part of the refinement tree (not removed by an un-refinement)
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Does this Elem contribute to the system of equations (alive and without children)
    pub fn is_active(&self) -> bool {
        self.alive && self.children.is_none()
    }

    pub(crate) fn set_basis(&mut self, basis: Arc<dyn ShapeFn>, nodes: SmallVec<[usize; 16]>) {
        self.basis = basis;
        self.nodes = nodes;
    }

    pub(crate) fn set_children(&mut self, children: Option<[usize; 4]>) {
        self.children = children;
    }

    pub(crate) fn retire(&mut self) {
        self.alive = false;
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "topology": self.topology().to_string(),
            "order": self.order(),
            "spacing": format!("{:?}", self.spacing()),
            "parent": self.parent_id(),
            "alive": self.alive,
            "active": self.is_active(),
            "attribute": self.attribute,
            "h_level": self.h_level,
            "nodes": self.nodes.to_vec(),
            "edges": self.segments.iter().map(|seg| seg.edge).collect::<Vec<usize>>(),
            "edge_boundaries": self.edge_boundaries.iter().map(|b| match b {
                Some(b) => JsonValue::from(*b),
                None => JsonValue::Null,
            }).collect::<Vec<JsonValue>>(),
            "children": JsonValue::from(
                match &self.children {
                    Some(ids) => ids.to_vec(),
                    None => Vec::new(),
                }
            )
        }
    }
}

impl fmt::Display for Elem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Elem {} ({} order {}) \t nodes: {:?}",
            self.id,
            self.topology(),
            self.order(),
            self.nodes.as_slice(),
        )
    }
}

// Intermediate data structure used to represent a child [Elem] during the execution of an h-refinement
#[derive(Debug, Clone)]
pub(crate) struct ElemUninit {
    pub id: usize,
    pub nodes: SmallVec<[Option<usize>; 16]>,
    pub segments: [Option<EdgeSegment>; 4],
    pub edge_boundaries: [Option<usize>; 4],
    basis: Arc<dyn ShapeFn>,
    parent: (usize, Quadrant),
    attribute: f64,
    h_level: u8,
}

impl ElemUninit {
    pub fn new(id: usize, quadrant: Quadrant, parent: &Elem) -> Self {
        Self {
            id,
            nodes: SmallVec::from_elem(None, parent.num_nodes()),
            segments: [None; 4],
            edge_boundaries: [None; 4],
            basis: parent.basis_arc(),
            parent: (parent.id, quadrant),
            attribute: parent.attribute,
            h_level: parent.h_level + 1,
        }
    }

    pub fn set_node(&mut self, node_idx: usize, node_id: usize) {
        assert!(
            node_idx < self.nodes.len(),
            "Node index {} is out of range; cannot set Node to {} on ElemUninit {}!",
            node_idx,
            node_id,
            self.id
        );
        self.nodes[node_idx] = Some(node_id);
    }

    pub fn set_segment(&mut self, edge_idx: usize, segment: EdgeSegment) {
        assert!(
            self.segments[edge_idx].is_none(),
            "Edge ({}) has already been set on ElemUninit {}; Cannot set to {}",
            edge_idx,
            self.id,
            segment.edge
        );
        self.segments[edge_idx] = Some(segment);
    }

    pub fn into_elem(self) -> Result<Elem, HRefError> {
        let nodes: Option<SmallVec<[usize; 16]>> = self.nodes.iter().copied().collect();
        let segments: Option<SmallVec<[EdgeSegment; 4]>> = self.segments.iter().copied().collect();

        match (nodes, segments) {
            (Some(nodes), Some(segments)) => Ok(Elem {
                id: self.id,
                nodes,
                segments,
                edge_boundaries: self.edge_boundaries.iter().copied().collect(),
                attribute: self.attribute,
                h_level: self.h_level,
                basis: self.basis,
                parent: Some(self.parent),
                children: None,
                alive: true,
            }),
            _ => Err(HRefError::UninitializedElem(self.id)),
        }
    }
}
