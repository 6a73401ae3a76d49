/// Advection-Diffusion (and Poisson) equations
pub mod adv_diff;
/// Fourier-decomposed Helmholtz equation
pub mod helmholtz;

use crate::assembly::{FluxPoint, IntegrationPoint, LocalSystem};
use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::space::{Point, V2D};

use std::sync::Arc;

/// A scalar function of position
pub type ScalarFn = Arc<dyn Fn(&Point) -> f64 + Send + Sync>;
/// A vector function of position
pub type VectorFn = Arc<dyn Fn(&Point) -> V2D + Send + Sync>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("Invalid radius {r} for Fourier mode {n}; the Mesh must lie in r >= 0 (r > 0 unless n = 0)")]
    InvalidRadius { r: f64, n: i32 },
}

/// Weak form of a system of PDEs, evaluated one integration point at a time
///
/// Implementors add their contributions into a [LocalSystem]. The Jacobian should only be computed when
/// [LocalSystem::wants_jacobian] is true. An error stops the assembly and is reported with the Elem's id.
pub trait Physics: Send + Sync {
    /// Number of fields (unknowns per Node)
    fn num_fields(&self) -> usize;

    /// Add the contributions of an integration point in the interior of an Elem
    fn fill_in_bulk(
        &self,
        elem: &Elem,
        ip: &IntegrationPoint,
        local: &mut LocalSystem,
    ) -> Result<(), PhysicsError>;

    /// Boundaries on which [Physics::fill_in_flux] is called
    fn flux_boundaries(&self) -> &[usize] {
        &[]
    }

    /// Add the contributions of an integration point on a boundary edge of an Elem
    fn fill_in_flux(
        &self,
        _elem: &Elem,
        _fp: &FluxPoint,
        _local: &mut LocalSystem,
    ) -> Result<(), PhysicsError> {
        Ok(())
    }
}

pub(crate) fn eval_scalar(f: &Option<ScalarFn>, x: &Point, default: f64) -> f64 {
    f.as_ref().map_or(default, |f| f(x))
}
