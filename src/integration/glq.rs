use super::{QuadratureError, RuleFamily};
use crate::basis::legendre::legendre_recurrence;
use nalgebra::{DMatrix, SymmetricEigen};

/// Iteration cap for the Golub-Welsch eigen-solves
const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// 2D Gauss Legendre Quadrature integral of some function F defined over an m by n rectangular region.
/// ```
/// use hpfem_2d::integration::glq::*;
///
/// // define glq points over `(-1, 1)` in both directions
/// let (u_points, u_weights) = gauss_quadrature_points(10, false).unwrap();
/// let (v_points, v_weights) = gauss_quadrature_points(10, false).unwrap();
///
/// // compute the integral of (u^2 * v^2)
/// let solution = real_gauss_quad(&u_weights, &v_weights, |m, n| {
///    u_points[m].powi(2) * v_points[n].powi(2)
/// });
///
/// assert!((solution - 4.0 / 9.0).abs() < 1e-12);
///
/// ```
pub fn real_gauss_quad<F>(u_weights: &[f64], v_weights: &[f64], integrand: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    let mut solution = 0.0;
    for (m, u_w) in u_weights.iter().enumerate() {
        let mut inner_solution = 0.0;
        for (n, v_w) in v_weights.iter().enumerate() {
            inner_solution += integrand(m, n) * v_w;
        }
        solution += inner_solution * u_w;
    }
    solution
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights
///
/// ```
/// use hpfem_2d::integration::glq::*;
///
/// // generate 10 GLQ points and weights over the range `(-1, 1)`
/// let (points, weights) = gauss_quadrature_points(10, false).unwrap();
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
///
/// // generate 10 GLQ points and weights with points defined on the edges `[-1, 1]`
/// let (points_with_end, weights_with_end) = gauss_quadrature_points(10, true).unwrap();
/// assert_eq!(points_with_end.len(), 12);
/// assert_eq!(weights_with_end.len(), 12);
/// assert!((-1.0 - points_with_end[0]).abs() < 1e-12);
/// assert!((1.0 - points_with_end[11]).abs() < 1e-12);
///
/// ```
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(
    n: usize,
    include_endpoints: bool,
) -> Result<(Vec<f64>, Vec<f64>), QuadratureError> {
    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let (mut points, mut weights) = golub_welsch(&betas, 2.0, RuleFamily::Gauss, n)?;

    if include_endpoints {
        points.insert(0, -1.0);
        points.push(1.0);

        weights.insert(0, 1.0);
        weights.push(1.0)
    }

    Ok((points, weights))
}

/// Get a set of n Gauss-Lobatto-Legendre points (including both endpoints) and their weights
///
/// The interior points are the roots of `P'_{n-1}`, found as the eigenvalues of the Jacobi matrix of the
/// (1,1)-Jacobi polynomials. Weights are `2 / (n (n-1) P_{n-1}(x)^2)`.
///
/// ```
/// use hpfem_2d::integration::glq::*;
///
/// let (points, weights) = gauss_lobatto_points(3).unwrap();
/// assert!((points[1]).abs() < 1e-14);
/// assert!((weights[0] - 1.0 / 3.0).abs() < 1e-14);
/// assert!((weights[1] - 4.0 / 3.0).abs() < 1e-14);
/// ```
pub fn gauss_lobatto_points(n: usize) -> Result<(Vec<f64>, Vec<f64>), QuadratureError> {
    if n < 2 {
        return Err(QuadratureError::UnsupportedRule {
            topology: super::Topology::Line,
            family: RuleFamily::GaussLobatto,
            points: n,
        });
    }

    let num_interior = n - 2;
    let betas: Vec<f64> = (1..num_interior)
        .map(|k| {
            let k = k as f64;
            (k * (k + 2.0) / ((2.0 * k + 1.0) * (2.0 * k + 3.0))).sqrt()
        })
        .collect();

    let mut points = Vec::with_capacity(n);
    points.push(-1.0);
    if num_interior > 0 {
        let (interior, _) = golub_welsch(&betas, 1.0, RuleFamily::GaussLobatto, n)?;
        points.extend(interior);
    }
    points.push(1.0);

    let nf = n as f64;
    let weights = points
        .iter()
        .map(|&x| {
            let (p_nm1, _) = legendre_recurrence(n - 1, x);
            2.0 / (nf * (nf - 1.0) * p_nm1.powi(2))
        })
        .collect();

    Ok((points, weights))
}

// eigenvalues (sorted) and scaled first-component weights of a symmetric tridiagonal matrix with zero diagonal
fn golub_welsch(
    betas: &[f64],
    moment: f64,
    family: RuleFamily,
    points: usize,
) -> Result<(Vec<f64>, Vec<f64>), QuadratureError> {
    let n = betas.len() + 1;
    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::try_new(polymat, f64::EPSILON, MAX_EIGEN_ITERATIONS)
        .ok_or(QuadratureError::NonConvergence { family, points })?;

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * moment),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(xw.drain(0..).unzip())
}

/// Scale a set of Gauss-Legendre-Quadrature Integration points to fall within a specific range
///
/// ```
/// use hpfem_2d::integration::glq::*;
/// // generate 10 GLQ points and weights over the range `[-1, 1]`
/// let (points, weights) = gauss_quadrature_points(10, true).unwrap();
///
/// // scale the points to the range `(-0.75, 0.25)`
/// let (scale, points_scaled) = scale_gauss_quad_points(&points, -0.75, 0.25);
///
/// assert!((-0.75 - points_scaled[0]).abs() < 1e-12);
/// assert!((0.25 - points_scaled[11]).abs() < 1e-12);
/// assert!((0.5 - scale).abs() < 1e-12);
/// ```
pub fn scale_gauss_quad_points(points: &[f64], min: f64, max: f64) -> (f64, Vec<f64>) {
    let scale_factor = (max - min) / 2.0;
    let offset = (max + min) / 2.0;

    (
        scale_factor,
        points
            .iter()
            .map(|x| x * scale_factor + offset)
            .collect::<Vec<f64>>(),
    )
}
