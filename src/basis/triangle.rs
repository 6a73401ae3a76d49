use super::{BasisError, NodeSpacing, ShapeFn};
use crate::domain::mesh::space::V2D;
use crate::integration::Topology;

use smallvec::{smallvec, SmallVec};

// derivatives of the barycentric coordinates (L0, L1, L2) = (1 - s0 - s1, s0, s1)
const DL: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];

const VERTICES: [[f64; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];

/// Shape function associated with a single node, expressed in barycentric coordinates
#[derive(Debug, Clone, Copy)]
enum TriNodeFn {
    Vertex(usize),
    /// quadratic mid-edge node between two vertices
    Mid(usize, usize),
    /// cubic edge node nearest the first vertex
    Edge(usize, usize),
    Centroid,
}

/// Lagrange shape functions of order 1, 2 or 3 on the reference triangle
///
/// ```text
///   s1
///   ^
///   2
///   | \          Vertices come first, followed by edge nodes (edge 0: 0->1, edge 1: 1->2, edge 2: 2->0)
///   |   \        in order of increasing edge parameter, and finally the centroid for cubic elements.
///   0 --- 1 > s0
/// ```
#[derive(Debug, Clone)]
pub struct TriLagrange {
    order: u8,
    node_fns: Vec<TriNodeFn>,
    node_coords: Vec<[f64; 2]>,
    nodes_1d: Vec<f64>,
}

impl TriLagrange {
    pub fn new(order: u8) -> Result<Self, BasisError> {
        let node_fns: Vec<TriNodeFn> = match order {
            1 => (0..3).map(TriNodeFn::Vertex).collect(),
            2 => vec![
                TriNodeFn::Vertex(0),
                TriNodeFn::Vertex(1),
                TriNodeFn::Vertex(2),
                TriNodeFn::Mid(0, 1),
                TriNodeFn::Mid(1, 2),
                TriNodeFn::Mid(2, 0),
            ],
            3 => vec![
                TriNodeFn::Vertex(0),
                TriNodeFn::Vertex(1),
                TriNodeFn::Vertex(2),
                TriNodeFn::Edge(0, 1),
                TriNodeFn::Edge(1, 0),
                TriNodeFn::Edge(1, 2),
                TriNodeFn::Edge(2, 1),
                TriNodeFn::Edge(2, 0),
                TriNodeFn::Edge(0, 2),
                TriNodeFn::Centroid,
            ],
            _ => {
                return Err(BasisError::UnsupportedOrder {
                    topology: Topology::Triangle,
                    order,
                })
            }
        };

        let node_coords = node_fns
            .iter()
            .map(|nf| {
                let bary = match *nf {
                    TriNodeFn::Vertex(i) => unit(i, 1.0, i, 0.0),
                    TriNodeFn::Mid(i, j) => unit(i, 0.5, j, 0.5),
                    TriNodeFn::Edge(i, j) => unit(i, 2.0 / 3.0, j, 1.0 / 3.0),
                    TriNodeFn::Centroid => [1.0 / 3.0; 3],
                };
                [bary[1], bary[2]]
            })
            .collect();

        Ok(Self {
            order,
            node_fns,
            node_coords,
            nodes_1d: NodeSpacing::Equispaced.nodes_1d(order as usize + 1)?,
        })
    }

    // value, gradient and hessian of one node's function with respect to (L0, L1, L2)
    fn eval_barycentric(nf: TriNodeFn, order: u8, l: [f64; 3]) -> (f64, [f64; 3], [[f64; 3]; 3]) {
        let mut g = [0.0; 3];
        let mut h = [[0.0; 3]; 3];

        let value = match nf {
            TriNodeFn::Vertex(i) => {
                let li = l[i];
                match order {
                    1 => {
                        g[i] = 1.0;
                        li
                    }
                    2 => {
                        g[i] = 4.0 * li - 1.0;
                        h[i][i] = 4.0;
                        li * (2.0 * li - 1.0)
                    }
                    _ => {
                        g[i] = 0.5 * (27.0 * li * li - 18.0 * li + 2.0);
                        h[i][i] = 27.0 * li - 9.0;
                        0.5 * li * (3.0 * li - 1.0) * (3.0 * li - 2.0)
                    }
                }
            }
            TriNodeFn::Mid(i, j) => {
                g[i] = 4.0 * l[j];
                g[j] = 4.0 * l[i];
                h[i][j] = 4.0;
                h[j][i] = 4.0;
                4.0 * l[i] * l[j]
            }
            TriNodeFn::Edge(i, j) => {
                let (li, lj) = (l[i], l[j]);
                g[i] = 4.5 * (6.0 * li * lj - lj);
                g[j] = 4.5 * (3.0 * li * li - li);
                h[i][i] = 27.0 * lj;
                h[i][j] = 4.5 * (6.0 * li - 1.0);
                h[j][i] = h[i][j];
                4.5 * li * lj * (3.0 * li - 1.0)
            }
            TriNodeFn::Centroid => {
                g = [27.0 * l[1] * l[2], 27.0 * l[0] * l[2], 27.0 * l[0] * l[1]];
                h[0][1] = 27.0 * l[2];
                h[1][0] = h[0][1];
                h[0][2] = 27.0 * l[1];
                h[2][0] = h[0][2];
                h[1][2] = 27.0 * l[0];
                h[2][1] = h[1][2];
                27.0 * l[0] * l[1] * l[2]
            }
        };

        (value, g, h)
    }
}

fn unit(i: usize, a: f64, j: usize, b: f64) -> [f64; 3] {
    let mut bary = [0.0; 3];
    bary[i] = a;
    if j != i {
        bary[j] = b;
    }
    bary
}

fn barycentric(s: [f64; 2]) -> [f64; 3] {
    [1.0 - s[0] - s[1], s[0], s[1]]
}

impl ShapeFn for TriLagrange {
    fn topology(&self) -> Topology {
        Topology::Triangle
    }

    fn order(&self) -> u8 {
        self.order
    }

    fn spacing(&self) -> NodeSpacing {
        NodeSpacing::Equispaced
    }

    fn n_nodes(&self) -> usize {
        self.node_fns.len()
    }

    fn nnode_1d(&self) -> usize {
        self.order as usize + 1
    }

    fn shape(&self, s: [f64; 2], psi: &mut [f64]) {
        let l = barycentric(s);
        for (p, nf) in psi.iter_mut().zip(self.node_fns.iter()) {
            *p = Self::eval_barycentric(*nf, self.order, l).0;
        }
    }

    fn dshape_local(&self, s: [f64; 2], psi: &mut [f64], dpsids: &mut [V2D]) {
        let l = barycentric(s);
        for (n, nf) in self.node_fns.iter().enumerate() {
            let (value, g, _) = Self::eval_barycentric(*nf, self.order, l);
            psi[n] = value;

            let mut d = V2D::zero();
            for (gi, dli) in g.iter().zip(DL.iter()) {
                d += V2D::from(*dli) * *gi;
            }
            dpsids[n] = d;
        }
    }

    fn d2shape_local(
        &self,
        s: [f64; 2],
        psi: &mut [f64],
        dpsids: &mut [V2D],
        d2psids: &mut [[f64; 3]],
    ) {
        let l = barycentric(s);
        for (n, nf) in self.node_fns.iter().enumerate() {
            let (value, g, h) = Self::eval_barycentric(*nf, self.order, l);
            psi[n] = value;

            let mut d = V2D::zero();
            for (gi, dli) in g.iter().zip(DL.iter()) {
                d += V2D::from(*dli) * *gi;
            }
            dpsids[n] = d;

            let mut d2 = [0.0; 3];
            for i in 0..3 {
                for j in 0..3 {
                    d2[0] += h[i][j] * DL[i][0] * DL[j][0];
                    d2[1] += h[i][j] * DL[i][1] * DL[j][1];
                    d2[2] += h[i][j] * DL[i][0] * DL[j][1];
                }
            }
            d2psids[n] = d2;
        }
    }

    fn local_coordinate_of_node(&self, node: usize) -> [f64; 2] {
        self.node_coords[node]
    }

    fn edge_nodes(&self, edge: usize) -> SmallVec<[usize; 8]> {
        let [a, b] = [edge % 3, (edge + 1) % 3];
        match self.order {
            1 => smallvec![a, b],
            2 => smallvec![a, 3 + edge, b],
            _ => smallvec![a, 3 + 2 * edge, 4 + 2 * edge, b],
        }
    }

    fn nodes_1d(&self) -> &[f64] {
        &self.nodes_1d
    }

    fn edge_to_local(&self, edge: usize, t: f64) -> [f64; 2] {
        let start = VERTICES[edge % 3];
        let end = VERTICES[(edge + 1) % 3];
        let lambda = 0.5 * (t + 1.0);
        [
            start[0] + lambda * (end[0] - start[0]),
            start[1] + lambda * (end[1] - start[1]),
        ]
    }

    fn edge_outward_local(&self, edge: usize) -> [f64; 2] {
        match edge % 3 {
            0 => [0.0, -1.0],
            1 => [1.0, 1.0],
            _ => [-1.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reproduces_complete_polynomials() {
        // each order reproduces all polynomials of its total degree
        let polys: [fn(f64, f64) -> f64; 3] = [
            |x, y| 1.0 + 2.0 * x - y,
            |x, y| 0.5 - x * y + 3.0 * y * y - x,
            |x, y| x * x * y - 2.0 * x.powi(3) + y.powi(3) + x * y - 1.0,
        ];

        for order in 1..=3u8 {
            let tri = TriLagrange::new(order).unwrap();
            let f = polys[order as usize - 1];
            let nodal: Vec<f64> = (0..tri.n_nodes())
                .map(|n| {
                    let [x, y] = tri.local_coordinate_of_node(n);
                    f(x, y)
                })
                .collect();

            let mut psi = vec![0.0; tri.n_nodes()];
            for s in [[0.2, 0.3], [0.6, 0.1], [0.05, 0.9]] {
                tri.shape(s, &mut psi);
                let interp: f64 = psi.iter().zip(nodal.iter()).map(|(a, b)| a * b).sum();
                assert_abs_diff_eq!(interp, f(s[0], s[1]), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn node_counts() {
        assert_eq!(TriLagrange::new(1).unwrap().n_nodes(), 3);
        assert_eq!(TriLagrange::new(2).unwrap().n_nodes(), 6);
        assert_eq!(TriLagrange::new(3).unwrap().n_nodes(), 10);
        assert!(TriLagrange::new(4).is_err());
    }
}
