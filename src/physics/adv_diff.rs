use super::{eval_scalar, Physics, PhysicsError, ScalarFn, VectorFn};
use crate::assembly::{FluxPoint, IntegrationPoint, LocalSystem};
use crate::config::SimParams;
use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::space::V2D;

use std::sync::Arc;

/// Robin condition `du/dn = beta - alpha u` on a boundary
#[derive(Clone)]
pub struct RobinCondition {
    pub boundary: usize,
    /// defaults to 0
    pub alpha: Option<ScalarFn>,
    /// defaults to 0
    pub beta: Option<ScalarFn>,
}

/// Steady advection-diffusion: `Pe w·∇u - ∇²u = f`
///
/// The residual of test function `ψ` is `∫ (∇u·∇ψ + (Pe w·∇u - f) ψ) r dA - ∮ (β - α u) ψ r ds`, where
/// `r = x` for axisymmetric problems and `r = 1` otherwise. Poisson's equation is the case `Pe = 0`.
#[derive(Clone)]
pub struct AdvectionDiffusion {
    params: Arc<SimParams>,
    source: Option<ScalarFn>,
    wind: Option<VectorFn>,
    robin: Vec<RobinCondition>,
    robin_boundaries: Vec<usize>,
}

impl AdvectionDiffusion {
    pub fn new(params: Arc<SimParams>) -> Self {
        Self {
            params,
            source: None,
            wind: None,
            robin: Vec::new(),
            robin_boundaries: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: ScalarFn) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_wind(mut self, wind: VectorFn) -> Self {
        self.wind = Some(wind);
        self
    }

    pub fn with_robin(mut self, condition: RobinCondition) -> Self {
        self.robin_boundaries.push(condition.boundary);
        self.robin.push(condition);
        self
    }

    fn radius(&self, x: f64) -> f64 {
        if self.params.axisymmetric {
            x
        } else {
            1.0
        }
    }
}

impl Physics for AdvectionDiffusion {
    fn num_fields(&self) -> usize {
        1
    }

    fn fill_in_bulk(
        &self,
        _elem: &Elem,
        ip: &IntegrationPoint,
        local: &mut LocalSystem,
    ) -> Result<(), PhysicsError> {
        let w = ip.w * self.radius(ip.x.x);
        let f = eval_scalar(&self.source, &ip.x, 0.0);
        let pe_wind = self.wind.as_ref().map_or(V2D::zero(), |wind| wind(&ip.x)) * self.params.peclet;

        let advection = pe_wind.dot_with(&ip.dudx[0]);
        for (l, (psi_l, dpsi_l)) in ip.psi.iter().zip(ip.dpsidx.iter()).enumerate() {
            local.add_residual(
                l,
                0,
                (ip.dudx[0].dot_with(dpsi_l) + (advection - f) * psi_l) * w,
            );

            if local.wants_jacobian() {
                for (k, dpsi_k) in ip.dpsidx.iter().enumerate() {
                    local.add_jacobian(
                        (l, 0),
                        (k, 0),
                        (dpsi_k.dot_with(dpsi_l) + pe_wind.dot_with(dpsi_k) * psi_l) * w,
                    );
                }
            }
        }
        Ok(())
    }

    fn flux_boundaries(&self) -> &[usize] {
        &self.robin_boundaries
    }

    fn fill_in_flux(
        &self,
        _elem: &Elem,
        fp: &FluxPoint,
        local: &mut LocalSystem,
    ) -> Result<(), PhysicsError> {
        let w = fp.w * self.radius(fp.x.x);
        for condition in self.robin.iter().filter(|c| c.boundary == fp.boundary) {
            let alpha = eval_scalar(&condition.alpha, &fp.x, 0.0);
            let beta = eval_scalar(&condition.beta, &fp.x, 0.0);

            for (l, psi_l) in fp.psi.iter().enumerate() {
                local.add_residual(l, 0, -(beta - alpha * fp.u[0]) * psi_l * w);

                if local.wants_jacobian() {
                    for (k, psi_k) in fp.psi.iter().enumerate() {
                        local.add_jacobian((l, 0), (k, 0), alpha * psi_k * psi_l * w);
                    }
                }
            }
        }
        Ok(())
    }
}
