use super::space::{Point, M2D, V2D};
use crate::basis::ShapeFn;

/// Smallest Jacobian determinant accepted for a valid (non-inverted) mapping
pub const MIN_JACOBIAN_DET: f64 = 1e-14;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Elem {elem_id} has a non-positive Jacobian determinant ({det:.3e}) at local coordinates {s:?}; the Elem is degenerate or inverted!")]
    NonPositiveJacobian { elem_id: usize, det: f64, s: [f64; 2] },
    #[error("Elem {0} references the same corner Node more than once!")]
    DegenerateElement(usize),
}

/// Shape functions and their physical derivatives at one point of an `Elem`
#[derive(Debug, Clone)]
pub struct MappedShape {
    pub psi: Vec<f64>,
    pub dpsidx: Vec<V2D>,
    /// Physical location of the point
    pub x: Point,
    /// Jacobian determinant of the local to physical mapping
    pub det: f64,
}

/// Physical location of the local coordinates `s`
pub fn map_to_physical(basis: &dyn ShapeFn, positions: &[Point], s: [f64; 2]) -> Point {
    let mut psi = vec![0.0; basis.n_nodes()];
    basis.shape(s, &mut psi);
    interpolate_point(&psi, positions)
}

/// Jacobian of the mapping at `s`: row `u` holds `d(x, y)/ds0` and row `v` holds `d(x, y)/ds1`
pub fn jacobian(basis: &dyn ShapeFn, positions: &[Point], s: [f64; 2]) -> M2D {
    let n = basis.n_nodes();
    let mut psi = vec![0.0; n];
    let mut dpsids = vec![V2D::zero(); n];
    basis.dshape_local(s, &mut psi, &mut dpsids);
    jacobian_from_derivatives(&dpsids, positions)
}

/// Shape functions, physical derivatives (`J⁻¹ · dpsi/ds`), position and determinant at `s`
pub fn dshape_eulerian(
    basis: &dyn ShapeFn,
    positions: &[Point],
    s: [f64; 2],
    elem_id: usize,
) -> Result<MappedShape, GeometryError> {
    let n = basis.n_nodes();
    let mut psi = vec![0.0; n];
    let mut dpsids = vec![V2D::zero(); n];
    basis.dshape_local(s, &mut psi, &mut dpsids);

    let jac = jacobian_from_derivatives(&dpsids, positions);
    let det = jac.det();
    if det <= MIN_JACOBIAN_DET {
        return Err(GeometryError::NonPositiveJacobian { elem_id, det, s });
    }

    let inv = jac.inverse();
    let dpsidx = dpsids.iter().map(|d| inv * *d).collect();

    Ok(MappedShape {
        x: interpolate_point(&psi, positions),
        psi,
        dpsidx,
        det,
    })
}

/// Length element `|dx/dt|` along a local edge at edge parameter `t`
pub fn edge_length_element(basis: &dyn ShapeFn, positions: &[Point], edge: usize, t: f64) -> f64 {
    let s = basis.edge_to_local(edge, t);
    let jac = jacobian(basis, positions, s);
    let edge_end = basis.edge_to_local(edge, 1.0);
    let edge_start = basis.edge_to_local(edge, -1.0);
    let dsdt = V2D::from([
        0.5 * (edge_end[0] - edge_start[0]),
        0.5 * (edge_end[1] - edge_start[1]),
    ]);
    (jac.transpose() * dsdt).norm()
}

/// Outward unit normal of a local edge at edge parameter `t`
pub fn edge_normal(basis: &dyn ShapeFn, positions: &[Point], edge: usize, t: f64) -> V2D {
    let jac = jacobian(basis, positions, basis.edge_to_local(edge, t));
    // co-vector transform of the local outward direction
    let n = jac.inverse() * V2D::from(basis.edge_outward_local(edge));
    n / n.norm()
}

fn jacobian_from_derivatives(dpsids: &[V2D], positions: &[Point]) -> M2D {
    let mut jac = M2D::zero();
    for (d, p) in dpsids.iter().zip(positions.iter()) {
        jac.u += V2D::from([p.x * d[0], p.y * d[0]]);
        jac.v += V2D::from([p.x * d[1], p.y * d[1]]);
    }
    jac
}

fn interpolate_point(psi: &[f64], positions: &[Point]) -> Point {
    psi.iter()
        .zip(positions.iter())
        .fold(Point::default(), |acc, (w, p)| acc + *p * *w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisLibrary, NodeSpacing};
    use crate::integration::Topology;
    use approx::assert_abs_diff_eq;

    fn affine_quad(basis: &dyn ShapeFn) -> Vec<Point> {
        // x = 2 + 1.5 s0 + 0.25 s1, y = -1 + 0.5 s1
        (0..basis.n_nodes())
            .map(|n| {
                let [s0, s1] = basis.local_coordinate_of_node(n);
                Point::new(2.0 + 1.5 * s0 + 0.25 * s1, -1.0 + 0.5 * s1)
            })
            .collect()
    }

    #[test]
    fn affine_mapping() {
        let library = BasisLibrary::new();
        let basis = library.get(Topology::Quad, 3, NodeSpacing::GaussLobatto).unwrap();
        let positions = affine_quad(basis.as_ref());

        let s = [0.3, -0.4];
        let x = map_to_physical(basis.as_ref(), &positions, s);
        assert_abs_diff_eq!(x.x, 2.0 + 0.45 - 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(x.y, -1.2, epsilon = 1e-12);

        let mapped = dshape_eulerian(basis.as_ref(), &positions, s, 0).unwrap();
        assert_abs_diff_eq!(mapped.det, 0.75, epsilon = 1e-12);

        // the physical gradient of the interpolant of x is (1, 0)
        let grad = positions
            .iter()
            .zip(mapped.dpsidx.iter())
            .fold(V2D::zero(), |acc, (p, d)| acc + *d * p.x);
        assert_abs_diff_eq!(grad[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(grad[1], 0.0, epsilon = 1e-10);

        assert_abs_diff_eq!(
            edge_length_element(basis.as_ref(), &positions, 0, 0.2),
            1.5,
            epsilon = 1e-12
        );
        let normal = edge_normal(basis.as_ref(), &positions, 3, 0.0);
        assert_abs_diff_eq!(normal.dot_with(&V2D::from([0.25, 0.5])), 0.0, epsilon = 1e-12);
        assert!(normal[0] > 0.0);
    }

    #[test]
    fn inverted_elem_is_rejected() {
        let library = BasisLibrary::new();
        let basis = library.get(Topology::Quad, 1, NodeSpacing::Equispaced).unwrap();
        let positions = vec![
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];

        match dshape_eulerian(basis.as_ref(), &positions, [0.0, 0.0], 7) {
            Err(GeometryError::NonPositiveJacobian { elem_id, det, .. }) => {
                assert_eq!(elem_id, 7);
                assert!(det < 0.0);
            }
            other => panic!("expected a NonPositiveJacobian error, found {:?}", other),
        }
    }

    #[test]
    fn triangle_mapping() {
        let library = BasisLibrary::new();
        let basis = library.get(Topology::Triangle, 2, NodeSpacing::Equispaced).unwrap();
        let corners = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(0.0, 1.0)];
        let positions: Vec<Point> = (0..basis.n_nodes())
            .map(|n| {
                let [s0, s1] = basis.local_coordinate_of_node(n);
                corners[0] * (1.0 - s0 - s1) + corners[1] * s0 + corners[2] * s1
            })
            .collect();

        let mapped = dshape_eulerian(basis.as_ref(), &positions, [0.25, 0.25], 0).unwrap();
        assert_abs_diff_eq!(mapped.det, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mapped.x.x, 0.5, epsilon = 1e-12);

        // hypotenuse: length element is half the edge length
        assert_abs_diff_eq!(
            edge_length_element(basis.as_ref(), &positions, 1, 0.0),
            0.5 * 5.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }
}
