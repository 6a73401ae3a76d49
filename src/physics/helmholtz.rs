use super::{eval_scalar, Physics, PhysicsError, ScalarFn};
use crate::assembly::{IntegrationPoint, LocalSystem};
use crate::config::SimParams;
use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::space::Point;

use num_complex::Complex64;
use std::sync::Arc;

/// A complex function of position
pub type ComplexFn = Arc<dyn Fn(&Point) -> Complex64 + Send + Sync>;

/// Helmholtz equation for a single Fourier mode `n` of a field which varies as `exp(i n θ)`
///
/// Field 0 holds the real part of `u` and field 1 the imaginary part. The Mesh lives in the (r, z) half
/// plane with `r = x`, and the residual is `∫ (∇u·∇ψ - κ u ψ - f ψ) r dA` with the complex wavenumber
/// `κ = ω²/c² - α² - n²/r² + i 2ωα/c`. Integration points with `r < 0` (or `r = 0` for `n ≠ 0`) are
/// rejected.
#[derive(Clone)]
pub struct FourierHelmholtz {
    params: Arc<SimParams>,
    /// defaults to 1
    sound_speed: Option<ScalarFn>,
    /// defaults to 0
    absorption: Option<ScalarFn>,
    source: Option<ComplexFn>,
}

impl FourierHelmholtz {
    pub fn new(params: Arc<SimParams>) -> Self {
        Self {
            params,
            sound_speed: None,
            absorption: None,
            source: None,
        }
    }

    pub fn with_sound_speed(mut self, c: ScalarFn) -> Self {
        self.sound_speed = Some(c);
        self
    }

    pub fn with_absorption(mut self, alpha: ScalarFn) -> Self {
        self.absorption = Some(alpha);
        self
    }

    pub fn with_source(mut self, source: ComplexFn) -> Self {
        self.source = Some(source);
        self
    }

    /// Complex wavenumber squared at a point
    pub fn kappa(&self, x: &Point) -> Result<Complex64, PhysicsError> {
        let omega = self.params.omega;
        let c = eval_scalar(&self.sound_speed, x, 1.0);
        let alpha = eval_scalar(&self.absorption, x, 0.0);

        let mut re = (omega / c).powi(2) - alpha * alpha;
        let n = self.params.fourier_wavenumber;
        if n != 0 {
            if x.x <= 0.0 {
                return Err(PhysicsError::InvalidRadius { r: x.x, n });
            }
            re -= f64::from(n).powi(2) / (x.x * x.x);
        }
        Ok(Complex64::new(re, 2.0 * omega * alpha / c))
    }
}

impl Physics for FourierHelmholtz {
    fn num_fields(&self) -> usize {
        2
    }

    fn fill_in_bulk(
        &self,
        _elem: &Elem,
        ip: &IntegrationPoint,
        local: &mut LocalSystem,
    ) -> Result<(), PhysicsError> {
        let r = ip.x.x;
        if r < 0.0 {
            return Err(PhysicsError::InvalidRadius {
                r,
                n: self.params.fourier_wavenumber,
            });
        }
        let w = ip.w * r;
        let kappa = self.kappa(&ip.x)?;
        let f = self.source.as_ref().map_or(Complex64::default(), |f| f(&ip.x));
        let u = Complex64::new(ip.u[0], ip.u[1]);

        for (l, (psi_l, dpsi_l)) in ip.psi.iter().zip(ip.dpsidx.iter()).enumerate() {
            let grad = Complex64::new(ip.dudx[0].dot_with(dpsi_l), ip.dudx[1].dot_with(dpsi_l));
            let r = (grad - (kappa * u + f) * *psi_l) * w;
            local.add_residual(l, 0, r.re);
            local.add_residual(l, 1, r.im);

            if local.wants_jacobian() {
                for (k, (psi_k, dpsi_k)) in ip.psi.iter().zip(ip.dpsidx.iter()).enumerate() {
                    let a = (dpsi_k.dot_with(dpsi_l) - kappa * (psi_k * psi_l)) * w;
                    local.add_jacobian((l, 0), (k, 0), a.re);
                    local.add_jacobian((l, 1), (k, 0), a.im);
                    local.add_jacobian((l, 0), (k, 1), -a.im);
                    local.add_jacobian((l, 1), (k, 1), a.re);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{finite_difference_jacobian, Assembler, AssemblyMode};
    use crate::basis::NodeSpacing;
    use crate::domain::mesh::Mesh;
    use crate::domain::Domain;
    use crate::error::FemError;
    use approx::assert_abs_diff_eq;

    #[test]
    fn wavenumber() {
        let params = Arc::new(SimParams {
            omega: 2.0,
            fourier_wavenumber: 1,
            ..Default::default()
        });
        let physics = FourierHelmholtz::new(params)
            .with_sound_speed(Arc::new(|_: &Point| 2.0))
            .with_absorption(Arc::new(|_: &Point| 0.5));

        // 1 - 0.25 - 1/4 + i 2*2*0.5/2
        let kappa = physics.kappa(&Point::new(2.0, 0.0)).unwrap();
        assert_abs_diff_eq!(kappa.re, 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(kappa.im, 1.0, epsilon = 1e-14);

        // the n² term is computed in floating point, so large modes are fine
        let params = Arc::new(SimParams {
            fourier_wavenumber: 50_000,
            ..Default::default()
        });
        let kappa = FourierHelmholtz::new(params).kappa(&Point::new(1.0, 0.0)).unwrap();
        assert_abs_diff_eq!(kappa.re, 1.0 - 2.5e9, epsilon = 1e-3);

        assert_eq!(
            physics.kappa(&Point::new(0.0, 1.0)),
            Err(PhysicsError::InvalidRadius { r: 0.0, n: 1 })
        );
    }

    #[test]
    fn helmholtz_jacobian() {
        let mesh = Mesh::from_file("./test_input/two_elems.json", 2, NodeSpacing::GaussLobatto).unwrap();
        let mut domain = Domain::new(mesh, 2).unwrap();
        domain.refine(&[1]).unwrap();
        domain.pin_boundary(1, 0, None).unwrap();
        domain.pin_boundary(1, 1, Some(Arc::new(|p: &Point| p.y))).unwrap();
        assert!(domain.hanging().num_hanging() > 0);

        for node in domain.mesh.nodes.iter_mut() {
            let (x, y) = (node.coords.x, node.coords.y);
            if !node.is_pinned(0) {
                node.values[0] = x.sin() + y;
            }
            if !node.is_pinned(1) {
                node.values[1] = x * y - 0.5;
            }
        }
        domain.sync_hanging_values();

        let params = Arc::new(SimParams {
            omega: 3.0,
            fourier_wavenumber: 2,
            ..Default::default()
        });
        let physics = FourierHelmholtz::new(params)
            .with_sound_speed(Arc::new(|p: &Point| 1.0 + 0.5 * p.y))
            .with_absorption(Arc::new(|p: &Point| 0.1 * p.x))
            .with_source(Arc::new(|p: &Point| Complex64::new(p.x, -p.y)));

        let system = Assembler::new(&domain, &physics)
            .assemble(AssemblyMode::ResidualAndJacobian)
            .unwrap();
        let jacobian = system.jacobian.as_ref().unwrap();
        let fd = finite_difference_jacobian(&domain, &physics, 1e-6).unwrap();

        assert_eq!(jacobian.dimension, fd.dimension);
        for r in 0..fd.dimension {
            for c in 0..fd.dimension {
                assert_abs_diff_eq!(jacobian.get([r, c]), fd.get([r, c]), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn negative_radius() {
        let mesh = Mesh::from_json_str(
            r#"{
                "Nodes": [[-1.0, 0.0], [0.0, 0.0], [-1.0, 1.0], [0.0, 1.0]],
                "Elements": [{ "node_ids": [0, 1, 2, 3], "attribute": 1.0 }]
            }"#,
            2,
            NodeSpacing::GaussLobatto,
        )
        .unwrap();
        let domain = Domain::new(mesh, 2).unwrap();
        let params = Arc::new(SimParams {
            omega: 1.0,
            fourier_wavenumber: 1,
            ..Default::default()
        });
        let physics = FourierHelmholtz::new(params);

        match Assembler::new(&domain, &physics).assemble(AssemblyMode::Residual) {
            Err(FemError::Element { elem_id, source, .. }) => {
                assert_eq!(elem_id, 0);
                assert!(matches!(
                    *source,
                    FemError::Physics(PhysicsError::InvalidRadius { n: 1, .. })
                ));
            }
            other => panic!("expected an Elem error, got {:?}", other.map(|s| s.dimension())),
        }
    }
}
