/// Gauss-Legendre and Gauss-Lobatto-Legendre points and weights
pub mod glq;
/// Symmetric quadrature tables for triangles and tetrahedra
pub mod simplex;

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Largest number of Gauss points (per direction) the registry will construct
pub const MAX_GAUSS_POINTS: usize = 64;

/// Reference-element shapes for which integration rules exist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topology {
    /// `[-1, 1]`
    Line,
    /// `[-1, 1]^2`
    Quad,
    /// `[-1, 1]^3`
    Hex,
    /// `{s0, s1 >= 0, s0 + s1 <= 1}`
    Triangle,
    /// `{s0, s1, s2 >= 0, s0 + s1 + s2 <= 1}`
    Tet,
}

impl Topology {
    pub fn dim(&self) -> usize {
        match self {
            Self::Line => 1,
            Self::Quad | Self::Triangle => 2,
            Self::Hex | Self::Tet => 3,
        }
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self, Self::Triangle | Self::Tet)
    }

    /// Measure of the reference element
    pub fn reference_volume(&self) -> f64 {
        match self {
            Self::Line => 2.0,
            Self::Quad => 4.0,
            Self::Hex => 8.0,
            Self::Triangle => 0.5,
            Self::Tet => 1.0 / 6.0,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Line => write!(f, "Line"),
            Self::Quad => write!(f, "Quad"),
            Self::Hex => write!(f, "Hex"),
            Self::Triangle => write!(f, "Triangle"),
            Self::Tet => write!(f, "Tet"),
        }
    }
}

/// The family a [QuadratureRule] was constructed from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleFamily {
    Gauss,
    GaussLobatto,
    Simplex,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QuadratureError {
    #[error("No {family:?} rule with {points} points exists for a {topology}; Cannot construct Quadrature Rule!")]
    UnsupportedRule {
        topology: Topology,
        family: RuleFamily,
        points: usize,
    },
    #[error("No rule integrating degree {order} polynomials exactly is available for a {topology}!")]
    UnsupportedOrder { topology: Topology, order: usize },
    #[error("Eigen-solve for {points} {family:?} points did not converge!")]
    NonConvergence { family: RuleFamily, points: usize },
    #[error("Invalid integration bounds [{lower}, {upper}]; Cannot rescale Quadrature Rule!")]
    InvalidBounds { lower: f64, upper: f64 },
}

/// An immutable table of integration points and weights over a reference element.
///
/// Integrates polynomials up to (total) degree [QuadratureRule::degree] exactly.
#[derive(Debug, Clone)]
pub struct QuadratureRule {
    topology: Topology,
    family: RuleFamily,
    dim: usize,
    knots: Vec<f64>,
    weights: Vec<f64>,
    degree: usize,
}

impl QuadratureRule {
    pub(crate) fn new(
        topology: Topology,
        family: RuleFamily,
        knots: Vec<f64>,
        weights: Vec<f64>,
        degree: usize,
    ) -> Self {
        debug_assert_eq!(knots.len(), weights.len() * topology.dim());
        Self {
            topology,
            family,
            dim: topology.dim(),
            knots,
            weights,
            degree,
        }
    }

    /// Tensor product of a 1D rule over a Line, Quad or Hex. The first coordinate varies fastest.
    fn tensor_product(
        topology: Topology,
        family: RuleFamily,
        points: &[f64],
        weights: &[f64],
        degree: usize,
    ) -> Self {
        let dim = topology.dim();
        let n = points.len();
        let total = n.pow(dim as u32);

        let mut knots = Vec::with_capacity(total * dim);
        let mut tp_weights = Vec::with_capacity(total);

        for flat in 0..total {
            let mut w = 1.0;
            let mut rem = flat;
            for _ in 0..dim {
                let i = rem % n;
                rem /= n;
                knots.push(points[i]);
                w *= weights[i];
            }
            tp_weights.push(w);
        }

        Self::new(topology, family, knots, tp_weights, degree)
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn family(&self) -> RuleFamily {
        self.family
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Highest polynomial degree which is integrated exactly
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn nweight(&self) -> usize {
        self.weights.len()
    }

    pub fn knot(&self, i: usize) -> &[f64] {
        &self.knots[i * self.dim..(i + 1) * self.dim]
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    /// Iterate over (coordinates, weight) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], f64)> + '_ {
        self.knots
            .chunks(self.dim)
            .zip(self.weights.iter().copied())
    }

    /// Integrate a function of the local coordinates over the reference element
    pub fn integrate<F>(&self, f: F) -> f64
    where
        F: Fn(&[f64]) -> f64,
    {
        self.iter().map(|(s, w)| f(s) * w).sum()
    }

    /// Map this (tensor product) rule from `[-1, 1]^d` onto `[lower, upper]^d`.
    ///
    /// Knots are moved with the affine map `0.5 * (k * (upper - lower) + lower + upper)`, and weights are scaled by its Jacobian.
    pub fn rescaled(&self, lower: f64, upper: f64) -> Result<Self, QuadratureError> {
        if self.topology.is_simplex() {
            return Err(QuadratureError::UnsupportedRule {
                topology: self.topology,
                family: self.family,
                points: self.nweight(),
            });
        }
        if !(upper > lower) || !lower.is_finite() || !upper.is_finite() {
            return Err(QuadratureError::InvalidBounds { lower, upper });
        }

        let range = upper - lower;
        let weight_scale = (0.5 * range).powi(self.dim as i32);

        Ok(Self {
            topology: self.topology,
            family: self.family,
            dim: self.dim,
            knots: self
                .knots
                .iter()
                .map(|k| 0.5 * (k * range + lower + upper))
                .collect(),
            weights: self.weights.iter().map(|w| w * weight_scale).collect(),
            degree: self.degree,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct RuleKey {
    topology: Topology,
    family: RuleFamily,
    points: usize,
}

/// Thread-safe cache of [QuadratureRule]s keyed by topology, family and number of points
#[derive(Debug, Default)]
pub struct QuadratureRegistry {
    rules: RwLock<HashMap<RuleKey, Arc<QuadratureRule>>>,
}

impl QuadratureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cheapest rule which integrates polynomials of degree `order` exactly over `topology`
    pub fn rule(
        &self,
        topology: Topology,
        order: usize,
    ) -> Result<Arc<QuadratureRule>, QuadratureError> {
        match topology {
            Topology::Line | Topology::Quad | Topology::Hex => {
                let n = std::cmp::max(1, (order + 2) / 2);
                if n > MAX_GAUSS_POINTS {
                    return Err(QuadratureError::UnsupportedOrder { topology, order });
                }
                self.gauss(topology, n)
            }
            Topology::Triangle | Topology::Tet => {
                let points = simplex::points_for_degree(topology, order)
                    .ok_or(QuadratureError::UnsupportedOrder { topology, order })?;
                self.simplex(topology, points)
            }
        }
    }

    /// Tensor product Gauss-Legendre rule with `n` points in each direction
    pub fn gauss(
        &self,
        topology: Topology,
        n: usize,
    ) -> Result<Arc<QuadratureRule>, QuadratureError> {
        let key = RuleKey {
            topology,
            family: RuleFamily::Gauss,
            points: n,
        };
        if topology.is_simplex() || n == 0 || n > MAX_GAUSS_POINTS {
            return Err(QuadratureError::UnsupportedRule {
                topology,
                family: key.family,
                points: n,
            });
        }

        self.get_or_build(key, || {
            let (points, weights) = glq::gauss_quadrature_points(n, false)?;
            Ok(QuadratureRule::tensor_product(
                topology,
                RuleFamily::Gauss,
                &points,
                &weights,
                2 * n - 1,
            ))
        })
    }

    /// Tensor product Gauss-Lobatto-Legendre rule with `n` points (endpoints included) in each direction
    pub fn gauss_lobatto(
        &self,
        topology: Topology,
        n: usize,
    ) -> Result<Arc<QuadratureRule>, QuadratureError> {
        let key = RuleKey {
            topology,
            family: RuleFamily::GaussLobatto,
            points: n,
        };
        if topology.is_simplex() || n < 2 || n > MAX_GAUSS_POINTS {
            return Err(QuadratureError::UnsupportedRule {
                topology,
                family: key.family,
                points: n,
            });
        }

        self.get_or_build(key, || {
            let (points, weights) = glq::gauss_lobatto_points(n)?;
            Ok(QuadratureRule::tensor_product(
                topology,
                RuleFamily::GaussLobatto,
                &points,
                &weights,
                2 * n - 3,
            ))
        })
    }

    /// One of the tabulated triangle or tetrahedron rules, by its number of points
    pub fn simplex(
        &self,
        topology: Topology,
        points: usize,
    ) -> Result<Arc<QuadratureRule>, QuadratureError> {
        let key = RuleKey {
            topology,
            family: RuleFamily::Simplex,
            points,
        };
        self.get_or_build(key, || simplex::simplex_rule(topology, points))
    }

    fn get_or_build<F>(&self, key: RuleKey, build: F) -> Result<Arc<QuadratureRule>, QuadratureError>
    where
        F: FnOnce() -> Result<QuadratureRule, QuadratureError>,
    {
        if let Some(rule) = self
            .rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(rule.clone());
        }

        let rule = Arc::new(build()?);
        debug!(
            "constructed {:?} rule for {} with {} points (exact to degree {})",
            key.family,
            key.topology,
            rule.nweight(),
            rule.degree()
        );

        Ok(self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(rule)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // exact integral of x^a y^b z^c over [-1, 1]^d
    fn box_monomial(exps: &[usize]) -> f64 {
        exps.iter()
            .map(|&e| if e % 2 == 1 { 0.0 } else { 2.0 / (e as f64 + 1.0) })
            .product()
    }

    fn monomial(s: &[f64], exps: &[usize]) -> f64 {
        s.iter().zip(exps).map(|(x, &e)| x.powi(e as i32)).product()
    }

    #[test]
    fn tensor_rules_are_exact() {
        let registry = QuadratureRegistry::new();

        for n in 1..=6 {
            let quad = registry.gauss(Topology::Quad, n).unwrap();
            assert_eq!(quad.nweight(), n * n);
            for a in 0..=quad.degree() {
                for b in 0..=(quad.degree() - a) {
                    let approx = quad.integrate(|s| monomial(s, &[a, b]));
                    assert_abs_diff_eq!(approx, box_monomial(&[a, b]), epsilon = 1e-12);
                }
            }
        }

        let hex = registry.gauss(Topology::Hex, 3).unwrap();
        assert_eq!(hex.nweight(), 27);
        for exps in [[0, 0, 0], [2, 2, 0], [4, 0, 1], [2, 2, 2], [5, 0, 0], [0, 4, 0]] {
            let approx = hex.integrate(|s| monomial(s, &exps));
            assert_abs_diff_eq!(approx, box_monomial(&exps), epsilon = 1e-12);
        }
    }

    #[test]
    fn gauss_lobatto_rules_are_exact() {
        let registry = QuadratureRegistry::new();

        for n in 2..=8 {
            let line = registry.gauss_lobatto(Topology::Line, n).unwrap();
            assert_abs_diff_eq!(line.knot(0)[0], -1.0, epsilon = 1e-14);
            assert_abs_diff_eq!(line.knot(n - 1)[0], 1.0, epsilon = 1e-14);

            for e in 0..=line.degree() {
                let approx = line.integrate(|s| s[0].powi(e as i32));
                assert_abs_diff_eq!(approx, box_monomial(&[e]), epsilon = 1e-12);
            }
        }

        let quad = registry.gauss_lobatto(Topology::Quad, 4).unwrap();
        assert_eq!(quad.degree(), 5);
        assert_abs_diff_eq!(
            quad.integrate(|s| s[0].powi(4) * s[1].powi(2)),
            box_monomial(&[4, 2]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn rule_selection_by_order() {
        let registry = QuadratureRegistry::new();

        assert_eq!(registry.rule(Topology::Quad, 3).unwrap().nweight(), 4);
        assert_eq!(registry.rule(Topology::Quad, 4).unwrap().nweight(), 9);
        assert_eq!(registry.rule(Topology::Line, 0).unwrap().nweight(), 1);
        assert_eq!(registry.rule(Topology::Triangle, 2).unwrap().nweight(), 3);
        assert_eq!(registry.rule(Topology::Triangle, 4).unwrap().nweight(), 7);
        assert_eq!(registry.rule(Topology::Triangle, 6).unwrap().nweight(), 13);
        assert_eq!(registry.rule(Topology::Tet, 3).unwrap().nweight(), 11);

        assert!(matches!(
            registry.rule(Topology::Triangle, 9),
            Err(QuadratureError::UnsupportedOrder { .. })
        ));
        assert!(registry.gauss(Topology::Triangle, 3).is_err());
        assert!(registry.gauss_lobatto(Topology::Quad, 1).is_err());
    }

    #[test]
    fn rules_are_cached() {
        let registry = QuadratureRegistry::new();
        let a = registry.gauss(Topology::Quad, 3).unwrap();
        let b = registry.gauss(Topology::Quad, 3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn rescaled_rule() {
        let registry = QuadratureRegistry::new();
        let line = registry.gauss(Topology::Line, 4).unwrap();
        let scaled = line.rescaled(0.5, 2.0).unwrap();

        // integral of x^3 over [0.5, 2.0]
        let approx = scaled.integrate(|s| s[0].powi(3));
        assert_abs_diff_eq!(approx, (2.0_f64.powi(4) - 0.5_f64.powi(4)) / 4.0, epsilon = 1e-12);

        let quad = registry.gauss(Topology::Quad, 2).unwrap();
        let scaled_quad = quad.rescaled(0.0, 1.0).unwrap();
        assert_abs_diff_eq!(scaled_quad.integrate(|s| s[0] * s[1]), 0.25, epsilon = 1e-14);

        assert!(line.rescaled(1.0, 1.0).is_err());
        assert!(registry
            .simplex(Topology::Triangle, 3)
            .unwrap()
            .rescaled(0.0, 1.0)
            .is_err());
    }
}
