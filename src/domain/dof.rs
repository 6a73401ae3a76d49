use super::hanging::HangingNodes;
use super::mesh::Mesh;

use log::debug;
use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NumberingError {
    #[error("Equation {0} is assigned to more than one DoF!")]
    Duplicate(usize),
    #[error("Equation {0} is not assigned to any DoF!")]
    Gap(usize),
    #[error("DoF {0} should not carry an equation number!")]
    Unexpected(DoF),
    #[error("DoF {0} is missing an equation number!")]
    Missing(DoF),
}

/// A single degree of freedom: one field at one Node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DoF {
    pub node_id: usize,
    pub field: usize,
}

impl fmt::Display for DoF {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(Node {}, field {})", self.node_id, self.field)
    }
}

/// Dense global equation numbering of the free degrees of freedom
///
/// Only active Nodes which are not hanging receive equation numbers, and only for fields which are not pinned.
#[derive(Debug, Clone, Default)]
pub struct DofMap {
    num_fields: usize,
    // indexed by `node_id * num_fields + field`
    equations: Vec<Option<usize>>,
    dofs: Vec<DoF>,
}

impl DofMap {
    pub fn build(mesh: &Mesh, hanging: &HangingNodes) -> Self {
        let num_fields = mesh.num_fields();
        let mut equations = vec![None; mesh.nodes.len() * num_fields];
        let mut dofs = Vec::new();

        for node in mesh.nodes.iter() {
            if !Self::carries_dofs(node, hanging) {
                continue;
            }
            for field in 0..num_fields {
                if !node.is_pinned(field) {
                    equations[node.id * num_fields + field] = Some(dofs.len());
                    dofs.push(DoF {
                        node_id: node.id,
                        field,
                    });
                }
            }
        }

        debug!("numbered {} equations over {} fields", dofs.len(), num_fields);

        Self {
            num_fields,
            equations,
            dofs,
        }
    }

    fn carries_dofs(node: &super::mesh::node::Node, hanging: &HangingNodes) -> bool {
        node.is_active() && !hanging.is_hanging(node.id)
    }

    pub fn num_equations(&self) -> usize {
        self.dofs.len()
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Equation number of a field at a Node (`None` for pinned, hanging or inactive Nodes)
    pub fn equation(&self, node_id: usize, field: usize) -> Option<usize> {
        if field >= self.num_fields {
            return None;
        }
        self.equations
            .get(node_id * self.num_fields + field)
            .copied()
            .flatten()
    }

    /// The degree of freedom with equation number `eqn`
    pub fn dof(&self, eqn: usize) -> Option<DoF> {
        self.dofs.get(eqn).copied()
    }

    /// Iterate over `(equation, DoF)` pairs in equation order
    pub fn iter(&self) -> impl Iterator<Item = (usize, DoF)> + '_ {
        self.dofs.iter().copied().enumerate()
    }

    /// Check that the numbering is dense and matches the Mesh, pins and hanging Nodes
    pub fn validate(&self, mesh: &Mesh, hanging: &HangingNodes) -> Result<(), NumberingError> {
        let mut seen = vec![false; self.dofs.len()];
        for eqn in self.equations.iter().flatten() {
            match seen.get_mut(*eqn) {
                Some(flag) if *flag => return Err(NumberingError::Duplicate(*eqn)),
                Some(flag) => *flag = true,
                None => return Err(NumberingError::Gap(*eqn)),
            }
        }
        if let Some(eqn) = seen.iter().position(|flag| !flag) {
            return Err(NumberingError::Gap(eqn));
        }

        for node in mesh.nodes.iter() {
            let free = Self::carries_dofs(node, hanging);
            for field in 0..self.num_fields {
                let dof = DoF {
                    node_id: node.id,
                    field,
                };
                match (free && !node.is_pinned(field), self.equation(node.id, field)) {
                    (true, None) => return Err(NumberingError::Missing(dof)),
                    (false, Some(_)) => return Err(NumberingError::Unexpected(dof)),
                    _ => (),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::NodeSpacing;
    use crate::domain::hanging::HangingStrategy;

    #[test]
    fn numbering_skips_pinned_and_hanging() {
        let mut mesh = Mesh::from_file("./test_input/two_elems.json", 1, NodeSpacing::Equispaced).unwrap();
        mesh.h_refine(&[0]).unwrap();
        mesh.nodes[0].pin(0);

        let hanging = HangingNodes::build(&mesh, HangingStrategy::Constrained, 8).unwrap();
        let dofs = DofMap::build(&mesh, &hanging);

        // 11 active Nodes, one hanging and one pinned
        let num_active = mesh.nodes.iter().filter(|n| n.is_active()).count();
        assert_eq!(num_active, 11);
        assert_eq!(dofs.num_equations(), 9);
        assert_eq!(dofs.equation(0, 0), None);
        assert_eq!(dofs.equation(0, 1), None);

        let hanging_id = hanging.hanging_nodes().next().unwrap();
        assert_eq!(dofs.equation(hanging_id, 0), None);

        for (eqn, dof) in dofs.iter() {
            assert_eq!(dofs.equation(dof.node_id, dof.field), Some(eqn));
        }
        assert!(dofs.validate(&mesh, &hanging).is_ok());
    }

    #[test]
    fn stale_numbering_is_invalid() {
        let mut mesh = Mesh::from_file("./test_input/two_elems.json", 2, NodeSpacing::Equispaced).unwrap();
        let hanging = HangingNodes::build(&mesh, HangingStrategy::Constrained, 8).unwrap();
        let dofs = DofMap::build(&mesh, &hanging);
        assert_eq!(dofs.num_equations(), 15);

        mesh.nodes[3].pin(0);
        assert_eq!(
            dofs.validate(&mesh, &hanging),
            Err(NumberingError::Unexpected(DoF { node_id: 3, field: 0 }))
        );
    }
}
