use super::{BasisError, NodeSpacing, ShapeFn, MAX_POLYNOMIAL_ORDER};
use crate::domain::mesh::space::V2D;
use crate::integration::Topology;

use smallvec::SmallVec;

/// 1D Lagrange interpolation polynomials over a set of distinct nodes in `[-1, 1]`
#[derive(Debug, Clone)]
pub struct Lagrange1D {
    nodes: Vec<f64>,
    // 1 / Π_{m != k} (x_k - x_m)
    inv_denominators: Vec<f64>,
}

impl Lagrange1D {
    pub fn new(nodes: Vec<f64>) -> Self {
        let inv_denominators = nodes
            .iter()
            .enumerate()
            .map(|(k, x_k)| {
                1.0 / nodes
                    .iter()
                    .enumerate()
                    .filter(|(m, _)| *m != k)
                    .map(|(_, x_m)| x_k - x_m)
                    .product::<f64>()
            })
            .collect();

        Self {
            nodes,
            inv_denominators,
        }
    }

    pub fn n(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    // Π_{r not in skip} (x - x_r)
    fn partial_product(&self, x: f64, skip: &[usize]) -> f64 {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(r, _)| !skip.contains(r))
            .map(|(_, x_r)| x - x_r)
            .product()
    }

    pub fn values(&self, x: f64, psi: &mut [f64]) {
        for k in 0..self.n() {
            psi[k] = self.partial_product(x, &[k]) * self.inv_denominators[k];
        }
    }

    pub fn derivatives(&self, x: f64, psi: &mut [f64], dpsi: &mut [f64]) {
        self.values(x, psi);
        for k in 0..self.n() {
            let mut d = 0.0;
            for m in (0..self.n()).filter(|m| *m != k) {
                d += self.partial_product(x, &[k, m]);
            }
            dpsi[k] = d * self.inv_denominators[k];
        }
    }

    pub fn second_derivatives(&self, x: f64, psi: &mut [f64], dpsi: &mut [f64], d2psi: &mut [f64]) {
        self.derivatives(x, psi, dpsi);
        for k in 0..self.n() {
            let mut d2 = 0.0;
            for m in (0..self.n()).filter(|m| *m != k) {
                for q in (0..self.n()).filter(|q| *q != k && *q != m) {
                    d2 += self.partial_product(x, &[k, m, q]);
                }
            }
            d2psi[k] = d2 * self.inv_denominators[k];
        }
    }
}

/// Tensor product Lagrange shape functions on the reference quadrilateral `[-1, 1]^2`
///
/// ```text
///   s1
///   ^
///   2 ----- 3         Nodes are numbered with the first local coordinate varying fastest:
///   |       |         node (i, j) has index j * n + i.
///   |       |
///   0 ----- 1 > s0    Edges: 0 - South (s1 = -1), 1 - North (s1 = 1), 2 - West (s0 = -1), 3 - East (s0 = 1)
/// ```
#[derive(Debug, Clone)]
pub struct QuadLagrange {
    order: u8,
    spacing: NodeSpacing,
    line: Lagrange1D,
}

impl QuadLagrange {
    pub fn new(order: u8, spacing: NodeSpacing) -> Result<Self, BasisError> {
        if order == 0 || order > MAX_POLYNOMIAL_ORDER {
            return Err(BasisError::UnsupportedOrder {
                topology: Topology::Quad,
                order,
            });
        }

        Ok(Self {
            order,
            spacing,
            line: Lagrange1D::new(spacing.nodes_1d(order as usize + 1)?),
        })
    }

    fn n1d(&self) -> usize {
        self.line.n()
    }
}

impl ShapeFn for QuadLagrange {
    fn topology(&self) -> Topology {
        Topology::Quad
    }

    fn order(&self) -> u8 {
        self.order
    }

    fn spacing(&self) -> NodeSpacing {
        self.spacing
    }

    fn n_nodes(&self) -> usize {
        self.n1d() * self.n1d()
    }

    fn nnode_1d(&self) -> usize {
        self.n1d()
    }

    fn shape(&self, s: [f64; 2], psi: &mut [f64]) {
        let n = self.n1d();
        let mut p0 = vec![0.0; n];
        let mut p1 = vec![0.0; n];
        self.line.values(s[0], &mut p0);
        self.line.values(s[1], &mut p1);

        for j in 0..n {
            for i in 0..n {
                psi[j * n + i] = p0[i] * p1[j];
            }
        }
    }

    fn dshape_local(&self, s: [f64; 2], psi: &mut [f64], dpsids: &mut [V2D]) {
        let n = self.n1d();
        let (mut p0, mut p1) = (vec![0.0; n], vec![0.0; n]);
        let (mut dp0, mut dp1) = (vec![0.0; n], vec![0.0; n]);
        self.line.derivatives(s[0], &mut p0, &mut dp0);
        self.line.derivatives(s[1], &mut p1, &mut dp1);

        for j in 0..n {
            for i in 0..n {
                psi[j * n + i] = p0[i] * p1[j];
                dpsids[j * n + i] = V2D::from([dp0[i] * p1[j], p0[i] * dp1[j]]);
            }
        }
    }

    fn d2shape_local(
        &self,
        s: [f64; 2],
        psi: &mut [f64],
        dpsids: &mut [V2D],
        d2psids: &mut [[f64; 3]],
    ) {
        let n = self.n1d();
        let (mut p0, mut p1) = (vec![0.0; n], vec![0.0; n]);
        let (mut dp0, mut dp1) = (vec![0.0; n], vec![0.0; n]);
        let (mut d2p0, mut d2p1) = (vec![0.0; n], vec![0.0; n]);
        self.line
            .second_derivatives(s[0], &mut p0, &mut dp0, &mut d2p0);
        self.line
            .second_derivatives(s[1], &mut p1, &mut dp1, &mut d2p1);

        for j in 0..n {
            for i in 0..n {
                let l = j * n + i;
                psi[l] = p0[i] * p1[j];
                dpsids[l] = V2D::from([dp0[i] * p1[j], p0[i] * dp1[j]]);
                d2psids[l] = [d2p0[i] * p1[j], p0[i] * d2p1[j], dp0[i] * dp1[j]];
            }
        }
    }

    fn local_coordinate_of_node(&self, node: usize) -> [f64; 2] {
        let n = self.n1d();
        [self.line.nodes[node % n], self.line.nodes[node / n]]
    }

    fn edge_nodes(&self, edge: usize) -> SmallVec<[usize; 8]> {
        let n = self.n1d();
        match edge {
            0 => (0..n).collect(),
            1 => (0..n).map(|i| (n - 1) * n + i).collect(),
            2 => (0..n).map(|j| j * n).collect(),
            3 => (0..n).map(|j| j * n + n - 1).collect(),
            _ => SmallVec::new(),
        }
    }

    fn nodes_1d(&self) -> &[f64] {
        self.line.nodes()
    }

    fn edge_to_local(&self, edge: usize, t: f64) -> [f64; 2] {
        match edge {
            0 => [t, -1.0],
            1 => [t, 1.0],
            2 => [-1.0, t],
            _ => [1.0, t],
        }
    }

    fn edge_outward_local(&self, edge: usize) -> [f64; 2] {
        match edge {
            0 => [0.0, -1.0],
            1 => [0.0, 1.0],
            2 => [-1.0, 0.0],
            _ => [1.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn line_interpolates_polynomials() {
        let line = Lagrange1D::new(NodeSpacing::GaussLobatto.nodes_1d(4).unwrap());
        let f = |x: f64| 2.0 * x.powi(3) - x + 0.5;
        let df = |x: f64| 6.0 * x.powi(2) - 1.0;
        let d2f = |x: f64| 12.0 * x;

        let mut psi = vec![0.0; 4];
        let mut dpsi = vec![0.0; 4];
        let mut d2psi = vec![0.0; 4];
        for x in [-0.9, -0.3, 0.0, 0.45, 1.0] {
            line.second_derivatives(x, &mut psi, &mut dpsi, &mut d2psi);

            let nodal: Vec<f64> = line.nodes().iter().map(|xn| f(*xn)).collect();
            let interp = |w: &[f64]| w.iter().zip(nodal.iter()).map(|(a, b)| a * b).sum::<f64>();

            assert_abs_diff_eq!(interp(&psi), f(x), epsilon = 1e-12);
            assert_abs_diff_eq!(interp(&dpsi), df(x), epsilon = 1e-11);
            assert_abs_diff_eq!(interp(&d2psi), d2f(x), epsilon = 1e-10);
        }
    }

    #[test]
    fn node_layout() {
        let q2 = QuadLagrange::new(2, NodeSpacing::Equispaced).unwrap();
        assert_eq!(q2.n_nodes(), 9);
        assert_eq!(q2.local_coordinate_of_node(0), [-1.0, -1.0]);
        assert_eq!(q2.local_coordinate_of_node(2), [1.0, -1.0]);
        assert_eq!(q2.local_coordinate_of_node(4), [0.0, 0.0]);
        assert_eq!(q2.local_coordinate_of_node(6), [-1.0, 1.0]);
        assert_eq!(q2.edge_nodes(3).to_vec(), vec![2, 5, 8]);
        assert_eq!(q2.edge_nodes(1).to_vec(), vec![6, 7, 8]);
    }

    #[test]
    fn order_out_of_range() {
        assert!(QuadLagrange::new(0, NodeSpacing::Equispaced).is_err());
        assert!(QuadLagrange::new(MAX_POLYNOMIAL_ORDER + 1, NodeSpacing::GaussLobatto).is_err());
    }
}
