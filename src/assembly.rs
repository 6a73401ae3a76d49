use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::mapping;
use crate::domain::mesh::space::{Point, V2D};
use crate::domain::Domain;
use crate::error::FemError;
use crate::integration::{QuadratureRegistry, QuadratureRule, Topology};
use crate::linalg::sparse_matrix::SparseMatrix;
use crate::linalg::{Contribution, LinearSystem};
use crate::physics::Physics;

use log::{debug, trace};
use nalgebra::DMatrix;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::sync::Arc;

/// Which global quantities to assemble
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyMode {
    Residual,
    ResidualAndJacobian,
}

/// Residual vector and Jacobian matrix of a single Elem, indexed by local dof `node * num_fields + field`
#[derive(Debug, Clone)]
pub struct LocalSystem {
    num_fields: usize,
    pub residual: Vec<f64>,
    pub jacobian: Option<DMatrix<f64>>,
}

impl LocalSystem {
    pub fn new(num_nodes: usize, num_fields: usize, mode: AssemblyMode) -> Self {
        let n = num_nodes * num_fields;
        Self {
            num_fields,
            residual: vec![0.0; n],
            jacobian: match mode {
                AssemblyMode::Residual => None,
                AssemblyMode::ResidualAndJacobian => Some(DMatrix::zeros(n, n)),
            },
        }
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Local dof index of a field at a local Node
    pub fn dof(&self, local_node: usize, field: usize) -> usize {
        local_node * self.num_fields + field
    }

    pub fn wants_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    pub fn add_residual(&mut self, local_node: usize, field: usize, value: f64) {
        let i = self.dof(local_node, field);
        self.residual[i] += value;
    }

    /// Add `d residual(row) / d u(col)`; ignored when only the residual is assembled
    pub fn add_jacobian(&mut self, row: (usize, usize), col: (usize, usize), value: f64) {
        let (r, c) = (self.dof(row.0, row.1), self.dof(col.0, col.1));
        if let Some(jacobian) = self.jacobian.as_mut() {
            jacobian[(r, c)] += value;
        }
    }
}

/// Everything a physics instance sees at one integration point in the interior of an Elem
#[derive(Debug, Clone, Copy)]
pub struct IntegrationPoint<'a> {
    pub x: Point,
    /// Quadrature weight times the Jacobian determinant
    pub w: f64,
    pub psi: &'a [f64],
    pub dpsidx: &'a [V2D],
    /// Interpolated value of each field
    pub u: &'a [f64],
    /// Interpolated gradient of each field
    pub dudx: &'a [V2D],
}

/// Everything a physics instance sees at one integration point on a boundary edge of an Elem
#[derive(Debug, Clone, Copy)]
pub struct FluxPoint<'a> {
    pub x: Point,
    /// Quadrature weight times the length element `|dx/ds|`
    pub w: f64,
    pub psi: &'a [f64],
    pub u: &'a [f64],
    /// Outward unit normal
    pub normal: V2D,
    pub boundary: usize,
}

/// Computes and scatters the residual (and Jacobian) of every active Elem in a [Domain]
///
/// Contributions of hanging Nodes are redistributed onto their resolved masters; pinned fields
/// contribute to no equations.
pub struct Assembler<'a> {
    domain: &'a Domain,
    physics: &'a dyn Physics,
    registry: Arc<QuadratureRegistry>,
    quadrature_boost: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(domain: &'a Domain, physics: &'a dyn Physics) -> Self {
        Self {
            domain,
            physics,
            registry: Arc::new(QuadratureRegistry::new()),
            quadrature_boost: 0,
        }
    }

    /// Use `boost` more Gauss points per direction than the default on quadrilateral Elems and edges
    pub fn with_quadrature_boost(mut self, boost: usize) -> Self {
        self.quadrature_boost = boost;
        self
    }

    /// Share a rule cache between Assemblers
    pub fn with_registry(mut self, registry: Arc<QuadratureRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn assemble(&self, mode: AssemblyMode) -> Result<LinearSystem, FemError> {
        self.check_fields()?;
        let mut system = self.blank_system(mode);

        for elem in self.domain.mesh.active_elems() {
            system.add(self.elem_contribution(elem, mode)?);
        }

        Ok(system)
    }

    /// Same as `assemble`, except Elems are processed in parallel using the Rayon Global ThreadPool
    pub fn assemble_parallel(&self, mode: AssemblyMode) -> Result<LinearSystem, FemError> {
        self.check_fields()?;
        let mut system = self.blank_system(mode);

        let active: Vec<&Elem> = self.domain.mesh.active_elems().collect();
        system.par_accumulate(
            active
                .par_iter()
                .map(|elem| self.elem_contribution(elem, mode)),
        )?;

        Ok(system)
    }

    fn blank_system(&self, mode: AssemblyMode) -> LinearSystem {
        debug!(
            "assembling {:?} over {} active Elems ({} equations)",
            mode,
            self.domain.mesh.num_active_elems(),
            self.domain.num_equations()
        );
        LinearSystem::new(
            self.domain.num_equations(),
            mode == AssemblyMode::ResidualAndJacobian,
        )
    }

    fn check_fields(&self) -> Result<(), FemError> {
        let expected = self.physics.num_fields();
        if expected != self.domain.num_fields() {
            return Err(crate::config::ConfigError::InvalidValue {
                key: String::from("num_fields"),
                value: format!(
                    "the Domain has {} fields but the physics expects {}",
                    self.domain.num_fields(),
                    expected
                ),
            }
            .into());
        }
        Ok(())
    }

    fn elem_contribution(&self, elem: &Elem, mode: AssemblyMode) -> Result<Contribution, FemError> {
        let local = self.elem_system(elem.id, mode)?;
        Ok(self.scatter(elem, &local))
    }

    fn elem_rule(&self, elem: &Elem) -> Result<Arc<QuadratureRule>, FemError> {
        let order = elem.order() as usize;
        let rule = match elem.topology() {
            Topology::Triangle => self.registry.rule(Topology::Triangle, 2 * order),
            topology => self
                .registry
                .gauss(topology, order + 1 + self.quadrature_boost),
        };
        rule.map_err(|e| FemError::from(e).in_elem(elem.id, "select a quadrature rule"))
    }

    /// Local residual and Jacobian of one Elem
    pub fn elem_system(&self, elem_id: usize, mode: AssemblyMode) -> Result<LocalSystem, FemError> {
        let mesh = &self.domain.mesh;
        let elem = &mesh.elems[elem_id];
        let basis = elem.basis();
        let num_fields = self.domain.num_fields();
        let num_nodes = basis.n_nodes();
        trace!("assembling Elem {} ({} Nodes)", elem_id, num_nodes);

        let positions = mesh.elem_positions(elem_id);
        // effective nodal values, node-major
        let nodal: Vec<f64> = elem
            .nodes
            .iter()
            .flat_map(|node_id| {
                (0..num_fields).map(move |field| self.domain.nodal_value(*node_id, field))
            })
            .collect();

        let mut local = LocalSystem::new(num_nodes, num_fields, mode);
        let mut u = vec![0.0; num_fields];
        let mut dudx = vec![V2D::zero(); num_fields];

        let rule = self.elem_rule(elem)?;
        for (s, weight) in rule.iter() {
            let shape = mapping::dshape_eulerian(basis, &positions, [s[0], s[1]], elem_id)
                .map_err(|e| FemError::from(e).in_elem(elem_id, "map the shape functions"))?;

            for field in 0..num_fields {
                u[field] = 0.0;
                dudx[field] = V2D::zero();
                for (k, (psi, dpsi)) in shape.psi.iter().zip(shape.dpsidx.iter()).enumerate() {
                    let value = nodal[k * num_fields + field];
                    u[field] += value * psi;
                    dudx[field] += *dpsi * value;
                }
            }

            let ip = IntegrationPoint {
                x: shape.x,
                w: weight * shape.det,
                psi: &shape.psi,
                dpsidx: &shape.dpsidx,
                u: &u,
                dudx: &dudx,
            };
            self.physics
                .fill_in_bulk(elem, &ip, &mut local)
                .map_err(|e| FemError::from(e).in_elem(elem_id, "evaluate the weak form"))?;
        }

        let flux_boundaries = self.physics.flux_boundaries();
        if flux_boundaries.is_empty() {
            return Ok(local);
        }

        for (edge, boundary) in elem.edge_boundaries.iter().enumerate() {
            let boundary = match boundary {
                Some(b) if flux_boundaries.contains(b) => *b,
                _ => continue,
            };

            let line_rule = self
                .registry
                .gauss(Topology::Line, elem.order() as usize + 1 + self.quadrature_boost)
                .map_err(|e| FemError::from(e).in_elem(elem_id, "select an edge quadrature rule"))?;

            let mut psi = vec![0.0; num_nodes];
            for (t, weight) in line_rule.iter() {
                let t = t[0];
                let s = basis.edge_to_local(edge, t);
                basis.shape(s, &mut psi);

                let mut x = Point::default();
                for (p, position) in psi.iter().zip(positions.iter()) {
                    x = x + *position * *p;
                }
                for field in 0..num_fields {
                    u[field] = psi
                        .iter()
                        .enumerate()
                        .map(|(k, p)| p * nodal[k * num_fields + field])
                        .sum();
                }

                let fp = FluxPoint {
                    x,
                    w: weight * mapping::edge_length_element(basis, &positions, edge, t),
                    psi: &psi,
                    u: &u,
                    normal: mapping::edge_normal(basis, &positions, edge, t),
                    boundary,
                };
                self.physics
                    .fill_in_flux(elem, &fp, &mut local)
                    .map_err(|e| FemError::from(e).in_elem(elem_id, "evaluate the boundary flux"))?;
            }
        }

        Ok(local)
    }

    // Map each local row and column onto the global equations
    fn scatter(&self, elem: &Elem, local: &LocalSystem) -> Contribution {
        let num_fields = local.num_fields();
        let targets: Vec<SmallVec<[(usize, f64); 8]>> = elem
            .nodes
            .iter()
            .flat_map(|node_id| {
                (0..num_fields).map(move |field| self.domain.dof_targets(*node_id, field))
            })
            .collect();

        let mut contribution = Contribution::default();
        for (i, row_targets) in targets.iter().enumerate() {
            for (eqn, w) in row_targets.iter() {
                contribution.residual.push((*eqn, w * local.residual[i]));
            }
        }

        if let Some(jacobian) = local.jacobian.as_ref() {
            for (i, row_targets) in targets.iter().enumerate() {
                for (j, col_targets) in targets.iter().enumerate() {
                    let value = jacobian[(i, j)];
                    if value == 0.0 {
                        continue;
                    }
                    for (r, w_r) in row_targets.iter() {
                        for (c, w_c) in col_targets.iter() {
                            contribution.jacobian.push(([*r, *c], w_r * w_c * value));
                        }
                    }
                }
            }
        }

        contribution
    }
}

/// Central difference approximation of the global Jacobian, one column per equation
pub fn finite_difference_jacobian(
    domain: &Domain,
    physics: &dyn Physics,
    h: f64,
) -> Result<SparseMatrix, FemError> {
    let n = domain.num_equations();
    let mut jacobian = SparseMatrix::new(n);
    let mut delta = vec![0.0; n];

    for col in 0..n {
        let mut residuals = [Vec::new(), Vec::new()];
        for (side, sign) in [1.0, -1.0].iter().enumerate() {
            let mut perturbed = domain.clone();
            delta[col] = sign * h;
            perturbed.apply_update(&delta);
            residuals[side] = Assembler::new(&perturbed, physics)
                .assemble(AssemblyMode::Residual)?
                .residual;
        }
        delta[col] = 0.0;

        for (row, (plus, minus)) in residuals[0].iter().zip(residuals[1].iter()).enumerate() {
            let value = (plus - minus) / (2.0 * h);
            if value != 0.0 {
                jacobian.insert([row, col], value);
            }
        }
    }

    Ok(jacobian)
}
