use crate::basis::BasisError;
use crate::config::ConfigError;
use crate::domain::dof::NumberingError;
use crate::domain::hanging::ConstraintError;
use crate::domain::mesh::h_refinement::HRefError;
use crate::domain::mesh::mapping::GeometryError;
use crate::domain::mesh::p_refinement::PRefError;
use crate::domain::mesh::MeshError;
use crate::integration::QuadratureError;
use crate::linalg::SolveError;
use crate::physics::PhysicsError;

/// Any error produced while building, refining, assembling or solving a problem
#[derive(thiserror::Error, Debug)]
pub enum FemError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error(transparent)]
    Quadrature(#[from] QuadratureError),
    #[error(transparent)]
    Basis(#[from] BasisError),
    #[error(transparent)]
    HRefinement(#[from] HRefError),
    #[error(transparent)]
    PRefinement(#[from] PRefError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to {operation} on Elem {elem_id}: {source}")]
    Element {
        elem_id: usize,
        operation: &'static str,
        #[source]
        source: Box<FemError>,
    },
}

impl FemError {
    /// Attach the identity of the Elem and the operation which failed
    pub fn in_elem(self, elem_id: usize, operation: &'static str) -> Self {
        Self::Element {
            elem_id,
            operation,
            source: Box::new(self),
        }
    }
}
