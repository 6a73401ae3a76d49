//! Two dimensional hp-adaptive finite element toolkit
//!
//! A [Mesh] of quadrilateral and triangular [Elem]s carries nodal Lagrange shape functions of arbitrary
//! order. Elems can be h-refined (split into four) or p-refined (change of polynomial order) independently
//! of their neighbors; the resulting hanging nodes are constrained to the Nodes of the coarser side.
//! A [Domain] ties the Mesh to its constraints and degree-of-freedom numbering, and an [Assembler] builds
//! the global residual and Jacobian of any [Physics] implementation over it.

/// Residual and Jacobian assembly
pub mod assembly;
/// Nodal Lagrange shape functions
pub mod basis;
/// Simulation parameters loaded from JSON
pub mod config;
/// Mesh, constraints and degrees of freedom
pub mod domain;
/// Crate-wide error type
pub mod error;
/// Quadrature rules
pub mod integration;
/// Sparse matrices and solvers
pub mod linalg;
/// Weak forms
pub mod physics;

pub use assembly::{Assembler, AssemblyMode};
pub use basis::{NodeSpacing, ShapeFn};
pub use config::SimParams;
pub use domain::hanging::HangingStrategy;
pub use domain::mesh::elem::Elem;
pub use domain::mesh::space::{Point, M2D, V2D};
pub use domain::mesh::Mesh;
pub use domain::Domain;
pub use error::FemError;
pub use integration::{QuadratureRegistry, Topology};
pub use linalg::{newton_solve, LinearSolver};
pub use physics::Physics;
