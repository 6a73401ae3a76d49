/// Degrees of Freedom
pub mod dof;
/// Structures used to output solution fields over a Domain
pub mod fields;
/// Hanging Node constraints over non-conforming Meshes
pub mod hanging;
/// The internal geometric structure of a Domain
pub mod mesh;

use crate::config::SimParams;
use crate::error::FemError;
use dof::DofMap;
use hanging::{HangingNodes, HangingStrategy, Masters, DEFAULT_MAX_HANGING_DEPTH};
use mesh::p_refinement::PRef;
use mesh::space::Point;
use mesh::Mesh;

use log::info;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::sync::Arc;

/// Prescribed value of a field at a point
pub type ValueFn = Arc<dyn Fn(&Point) -> f64 + Send + Sync>;

/// A Dirichlet condition: a field held fixed on every Node of a boundary
#[derive(Clone)]
pub struct DirichletCondition {
    pub boundary: usize,
    pub field: usize,
    /// `None` keeps the Node's current value
    pub value: Option<ValueFn>,
}

impl fmt::Debug for DirichletCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DirichletCondition")
            .field("boundary", &self.boundary)
            .field("field", &self.field)
            .field("value", &self.value.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// High Level Description of an FEM Domain
///
/// Owns the Mesh along with the state derived from it: hanging Node constraints, Dirichlet pins and the
/// global equation numbering. All refinement goes through the Domain so the derived state is rebuilt
/// after every change to the Mesh.
#[derive(Debug, Clone)]
pub struct Domain {
    pub mesh: Mesh,
    hanging: HangingNodes,
    dofs: DofMap,
    dirichlet: Vec<DirichletCondition>,
    strategy: HangingStrategy,
    max_hanging_depth: usize,
}

impl Domain {
    /// Build a Domain with `num_fields` unknowns per Node and the default constraint settings
    pub fn new(mesh: Mesh, num_fields: usize) -> Result<Self, FemError> {
        Self::with_constraints(mesh, num_fields, HangingStrategy::default(), DEFAULT_MAX_HANGING_DEPTH)
    }

    /// Build a Domain using the constraint settings in `params`
    pub fn with_params(mesh: Mesh, num_fields: usize, params: &SimParams) -> Result<Self, FemError> {
        Self::with_constraints(mesh, num_fields, params.hanging_strategy, params.max_hanging_depth)
    }

    pub fn with_constraints(
        mut mesh: Mesh,
        num_fields: usize,
        strategy: HangingStrategy,
        max_hanging_depth: usize,
    ) -> Result<Self, FemError> {
        mesh.set_num_fields(num_fields);
        let mut domain = Self {
            mesh,
            hanging: HangingNodes::default(),
            dofs: DofMap::default(),
            dirichlet: Vec::new(),
            strategy,
            max_hanging_depth,
        };
        domain.rebuild()?;
        Ok(domain)
    }

    pub fn hanging(&self) -> &HangingNodes {
        &self.hanging
    }

    pub fn dofs(&self) -> &DofMap {
        &self.dofs
    }

    pub fn num_fields(&self) -> usize {
        self.mesh.num_fields()
    }

    pub fn num_equations(&self) -> usize {
        self.dofs.num_equations()
    }

    pub fn strategy(&self) -> HangingStrategy {
        self.strategy
    }

    /// Recompute the hanging Node constraints, re-apply the Dirichlet conditions and renumber the equations
    pub fn rebuild(&mut self) -> Result<(), FemError> {
        self.hanging = HangingNodes::build(&self.mesh, self.strategy, self.max_hanging_depth)?;
        self.apply_dirichlet();
        self.dofs = DofMap::build(&self.mesh, &self.hanging);
        self.dofs.validate(&self.mesh, &self.hanging)?;
        self.sync_hanging_values();

        info!(
            "Rebuilt Domain: {} active Elems; {} hanging Nodes; {} equations",
            self.mesh.num_active_elems(),
            self.hanging.num_hanging(),
            self.dofs.num_equations()
        );
        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Boundary conditions and nodal values
    // ----------------------------------------------------------------------------------------------------

    /// Hold `field` fixed on every Node of `boundary`
    ///
    /// If a value function is given, the pinned Nodes take its value at their location. The condition
    /// is re-applied after each refinement so new Nodes on the boundary are pinned as well.
    pub fn pin_boundary(
        &mut self,
        boundary: usize,
        field: usize,
        value: Option<ValueFn>,
    ) -> Result<(), FemError> {
        self.dirichlet.push(DirichletCondition {
            boundary,
            field,
            value,
        });
        self.rebuild()
    }

    fn apply_dirichlet(&mut self) {
        let num_fields = self.num_fields();
        for condition in self.dirichlet.iter().filter(|c| c.field < num_fields) {
            for node in self
                .mesh
                .nodes
                .iter_mut()
                .filter(|n| !n.is_retired() && n.on_boundary(condition.boundary))
            {
                node.pin(condition.field);
                if let Some(value) = &condition.value {
                    node.values[condition.field] = value(&node.coords);
                }
            }
        }
    }

    /// Add a solution update (indexed by equation number) to the nodal values
    pub fn apply_update(&mut self, delta: &[f64]) {
        for (eqn, dof) in self.dofs.iter() {
            if let Some(d) = delta.get(eqn) {
                self.mesh.nodes[dof.node_id].values[dof.field] += d;
            }
        }
        self.sync_hanging_values();
    }

    /// Overwrite the stored values of the hanging Nodes with the values implied by their masters
    pub fn sync_hanging_values(&mut self) {
        let num_fields = self.num_fields();
        let updates: Vec<(usize, SmallVec<[f64; 2]>)> = self
            .hanging
            .hanging_nodes()
            .map(|node_id| {
                let node = &self.mesh.nodes[node_id];
                let values = (0..num_fields)
                    .map(|field| match node.is_pinned(field) {
                        true => node.values[field],
                        false => self.hanging.resolve_value(&self.mesh, node_id, field),
                    })
                    .collect();
                (node_id, values)
            })
            .collect();

        for (node_id, values) in updates {
            self.mesh.nodes[node_id].values = values;
        }
    }

    /// Value of a field at a Node, resolved through its masters if it is hanging (and not pinned)
    pub fn nodal_value(&self, node_id: usize, field: usize) -> f64 {
        if self.mesh.nodes[node_id].is_pinned(field) {
            self.mesh.nodes[node_id].values[field]
        } else {
            self.hanging.resolve_value(&self.mesh, node_id, field)
        }
    }

    /// The global equations (and weights) that a Node's field contributes to
    ///
    /// Pinned fields contribute nowhere, even if the Node is also hanging. Hanging Nodes contribute to the
    /// equations of their resolved masters.
    pub fn dof_targets(&self, node_id: usize, field: usize) -> Masters {
        if self.mesh.nodes[node_id].is_pinned(field) {
            return Masters::new();
        }
        match self.hanging.resolved_masters(node_id) {
            Some(masters) => masters
                .iter()
                .filter_map(|(master, weight)| {
                    self.dofs.equation(*master, field).map(|eqn| (eqn, *weight))
                })
                .collect(),
            None => match self.dofs.equation(node_id, field) {
                Some(eqn) => smallvec![(eqn, 1.0)],
                None => Masters::new(),
            },
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Refinement
    // ----------------------------------------------------------------------------------------------------

    /// h-refine a list of Elems; returns the ids of the new children
    pub fn refine(&mut self, elem_ids: &[usize]) -> Result<Vec<usize>, FemError> {
        let children = self.mesh.h_refine(elem_ids)?;
        self.rebuild()?;
        Ok(children)
    }

    /// Undo the h-refinement of a list of parent Elems
    pub fn unrefine(&mut self, parent_ids: &[usize]) -> Result<(), FemError> {
        self.mesh.h_unrefine(parent_ids)?;
        self.rebuild()
    }

    /// Set the polynomial order of a list of Elems
    pub fn change_order(&mut self, elem_orders: &[(usize, u8)]) -> Result<(), FemError> {
        self.mesh.change_order(elem_orders)?;
        self.rebuild()
    }

    /// Apply a [PRef] to a list of Elems
    pub fn p_refine(&mut self, elem_ids: &[usize], refinement: PRef) -> Result<(), FemError> {
        self.mesh.p_refine(elem_ids, refinement)?;
        self.rebuild()
    }
}

pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(start: usize) -> Self {
        Self { next_id: start }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::NodeSpacing;
    use approx::assert_abs_diff_eq;

    fn two_elems(order: u8) -> Domain {
        let mesh = Mesh::from_file("./test_input/two_elems.json", order, NodeSpacing::GaussLobatto).unwrap();
        Domain::new(mesh, 1).unwrap()
    }

    #[test]
    fn numbering_after_every_mutation() {
        let mut domain = two_elems(2);
        assert_eq!(domain.num_equations(), 15);

        let children = domain.refine(&[0]).unwrap();
        domain.dofs().validate(&domain.mesh, domain.hanging()).unwrap();
        assert_eq!(domain.hanging().num_hanging(), 2);

        domain.change_order(&[(children[3], 3)]).unwrap();
        domain.dofs().validate(&domain.mesh, domain.hanging()).unwrap();

        domain.change_order(&[(children[3], 2)]).unwrap();
        domain.unrefine(&[0]).unwrap();
        domain.dofs().validate(&domain.mesh, domain.hanging()).unwrap();
        assert_eq!(domain.num_equations(), 15);
        assert_eq!(domain.hanging().num_hanging(), 0);

        // the interior Nodes of the cubic side of the shared edge follow the quadratic side
        domain.p_refine(&[1], PRef::from(1)).unwrap();
        domain.dofs().validate(&domain.mesh, domain.hanging()).unwrap();
        assert_eq!(domain.hanging().num_hanging(), 2);
    }

    #[test]
    fn dirichlet_follows_refinement() {
        let mut domain = two_elems(1);
        domain
            .pin_boundary(1, 0, Some(Arc::new(|p: &Point| 2.0 * p.y)))
            .unwrap();
        assert_eq!(domain.num_equations(), 2);

        domain.refine(&[0]).unwrap();
        let west_mid = domain.mesh.node_at(&Point::new(0.0, 0.25)).unwrap();
        assert!(domain.mesh.nodes[west_mid].is_pinned(0));
        assert_abs_diff_eq!(domain.mesh.nodes[west_mid].values[0], 0.5, epsilon = 1e-14);
        assert!(domain.dof_targets(west_mid, 0).is_empty());
    }

    #[test]
    fn targets_and_updates() {
        let mut domain = two_elems(1);
        domain.refine(&[1]).unwrap();

        let hanging_id = domain.hanging().hanging_nodes().next().unwrap();
        let targets = domain.dof_targets(hanging_id, 0);
        assert_eq!(targets.len(), 2);
        assert_abs_diff_eq!(targets.iter().map(|(_, w)| w).sum::<f64>(), 1.0, epsilon = 1e-14);

        let delta: Vec<f64> = (0..domain.num_equations()).map(|eqn| eqn as f64).collect();
        domain.apply_update(&delta);

        let expected: f64 = targets.iter().map(|(eqn, w)| *eqn as f64 * w).sum();
        assert_abs_diff_eq!(domain.nodal_value(hanging_id, 0), expected, epsilon = 1e-14);
        assert_abs_diff_eq!(domain.mesh.nodes[hanging_id].values[0], expected, epsilon = 1e-14);
    }

    #[test]
    #[should_panic]
    fn refine_triangle() {
        use crate::domain::mesh::triangulation::TriangulateIo;
        let io = TriangulateIo {
            point_list: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            triangle_list: vec![0, 1, 2],
            number_of_corners: 3,
            ..Default::default()
        };
        let mut domain = Domain::new(Mesh::from_triangulation(&io, 1).unwrap(), 1).unwrap();
        domain.refine(&[0]).unwrap();
    }
}
