/// Lagrange interpolation on lines and quadrilaterals
pub mod lagrange;
/// Legendre polynomials and associated Legendre functions
pub mod legendre;
/// Lagrange interpolation on triangles
pub mod triangle;

use crate::domain::mesh::space::V2D;
use crate::integration::{glq, QuadratureError, Topology};
use lagrange::{Lagrange1D, QuadLagrange};
use triangle::TriLagrange;

use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

/// Maximum polynomial order for quadrilateral elements
pub const MAX_POLYNOMIAL_ORDER: u8 = 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BasisError {
    #[error("Shape functions of order {order} are not available for a {topology}!")]
    UnsupportedOrder { topology: Topology, order: u8 },
    #[error("Bad argument to Legendre function evaluation: x = {x} (must lie in [-1, 1])")]
    LegendreArgument { x: f64 },
    #[error("Bad degree/order for an associated Legendre function: l = {l}, m = {m}")]
    LegendreDegree { l: usize, m: usize },
    #[error("Failed to compute nodal positions: {0}")]
    NodePositions(#[from] QuadratureError),
}

/// Distribution of an element's nodes along each edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeSpacing {
    Equispaced,
    /// Gauss-Lobatto-Legendre points (used by p-refineable elements)
    GaussLobatto,
}

impl NodeSpacing {
    /// `n` node coordinates along `[-1, 1]` (endpoints included)
    pub fn nodes_1d(&self, n: usize) -> Result<Vec<f64>, BasisError> {
        Ok(match (self, n) {
            (_, 0) => Vec::new(),
            (_, 1) => vec![0.0],
            (Self::Equispaced, _) => (0..n)
                .map(|i| -1.0 + 2.0 * i as f64 / (n - 1) as f64)
                .collect(),
            (Self::GaussLobatto, _) => glq::gauss_lobatto_points(n)?.0,
        })
    }
}

/// Shape function strategy. Evaluates interpolation functions associated with an element's nodes
/// (and their derivatives) at a point in the element's local coordinates.
///
/// Second derivatives are ordered as: `[d²/ds0², d²/ds1², d²/ds0ds1]`
pub trait ShapeFn: Send + Sync + Debug {
    fn topology(&self) -> Topology;

    fn order(&self) -> u8;

    fn spacing(&self) -> NodeSpacing;

    fn n_nodes(&self) -> usize;

    /// Number of nodes along each edge
    fn nnode_1d(&self) -> usize;

    fn shape(&self, s: [f64; 2], psi: &mut [f64]);

    fn dshape_local(&self, s: [f64; 2], psi: &mut [f64], dpsids: &mut [V2D]);

    fn d2shape_local(&self, s: [f64; 2], psi: &mut [f64], dpsids: &mut [V2D], d2psids: &mut [[f64; 3]]);

    /// Local coordinates of the n'th node
    fn local_coordinate_of_node(&self, n: usize) -> [f64; 2];

    /// Local node indices along a local edge, ordered by increasing edge parameter
    fn edge_nodes(&self, edge: usize) -> SmallVec<[usize; 8]>;

    /// Number of edges of the reference element
    fn n_edges(&self) -> usize {
        match self.topology() {
            Topology::Triangle => 3,
            _ => 4,
        }
    }

    /// Coordinates of the nodes along an edge in the edge's parameter `[-1, 1]`
    fn nodes_1d(&self) -> &[f64];

    /// Local coordinates of the point at parameter `t` in `[-1, 1]` along a local edge
    fn edge_to_local(&self, edge: usize, t: f64) -> [f64; 2];

    /// Outward direction of a local edge in local coordinates (not normalized)
    fn edge_outward_local(&self, edge: usize) -> [f64; 2];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BasisKey {
    topology: Topology,
    order: u8,
    spacing: NodeSpacing,
}

/// Cache of shared shape function objects keyed by topology, order and node spacing
#[derive(Debug, Default)]
pub struct BasisLibrary {
    bases: RwLock<HashMap<BasisKey, Arc<dyn ShapeFn>>>,
}

impl BasisLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        topology: Topology,
        order: u8,
        spacing: NodeSpacing,
    ) -> Result<Arc<dyn ShapeFn>, BasisError> {
        let key = BasisKey {
            topology,
            order,
            spacing,
        };

        if let Some(basis) = self
            .bases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(basis.clone());
        }

        let basis: Arc<dyn ShapeFn> = match topology {
            Topology::Quad => Arc::new(QuadLagrange::new(order, spacing)?),
            Topology::Triangle => Arc::new(TriLagrange::new(order)?),
            _ => return Err(BasisError::UnsupportedOrder { topology, order }),
        };

        Ok(self
            .bases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(basis)
            .clone())
    }

    /// 1D Lagrange basis matching the edge node distribution of a 2D shape function
    pub fn edge_basis(basis: &dyn ShapeFn) -> Lagrange1D {
        Lagrange1D::new(basis.nodes_1d().to_vec())
    }
}
