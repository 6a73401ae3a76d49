use super::mesh::Mesh;
use crate::basis::{legendre::legendre_recurrence, lagrange::Lagrange1D, BasisLibrary};
use crate::integration::{glq, QuadratureError};

use log::{debug, warn};
use nalgebra::DMatrix;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Default bound on the length of a chain of hanging masters
pub const DEFAULT_MAX_HANGING_DEPTH: usize = 8;

/// Tolerance on the sum of a hanging Node's weights
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-10;

// segments overlapping by less than this (in edge parameter) are only touching
const OVERLAP_TOLERANCE: f64 = 1e-12;
// weights smaller than this are dropped
const WEIGHT_CUTOFF: f64 = 1e-14;

/// A list of (master Node id, weight) pairs
pub type Masters = SmallVec<[(usize, f64); 8]>;

/// How the weights of hanging Nodes are computed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HangingStrategy {
    /// Pointwise interpolation of the master edge at each hanging Node
    #[default]
    Constrained,
    /// L2 projection of the master edge onto the slave edge (vertices are still pointwise)
    Mortar,
    /// Mortar where the two sides have different polynomial orders, Constrained otherwise
    Auto,
}

impl HangingStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "constrained" => Some(Self::Constrained),
            "mortar" => Some(Self::Mortar),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("Hanging Node {0} has no master Nodes!")]
    NoMasters(usize),
    #[error("The weights of hanging Node {node} sum to {sum} instead of 1!")]
    WeightSum { node: usize, sum: f64 },
    #[error("Resolving the masters of hanging Node {node} exceeded the maximum depth ({max_depth})!")]
    DepthExceeded { node: usize, max_depth: usize },
    #[error("Hanging Node {0} depends on itself through its masters!")]
    Cycle(usize),
    #[error("Mortar projection between slave Elem {slave_elem} and master Elem {master_elem} is singular!")]
    SingularMortarProjection { slave_elem: usize, master_elem: usize },
    #[error("Unable to build mortar projection rule: {0}")]
    Quadrature(#[from] QuadratureError),
}

// one side of a shared edge: (elem id, local edge)
type Side = (usize, usize);

/// Hanging Node constraints over the active Elems of a Mesh
///
/// Each hanging Node has a list of direct masters (Nodes on the coarser or lower order side of a
/// non-conforming edge) and a fully resolved list containing only Nodes which are not hanging.
#[derive(Debug, Clone, Default)]
pub struct HangingNodes {
    direct: BTreeMap<usize, Masters>,
    resolved: BTreeMap<usize, Masters>,
    strategy: HangingStrategy,
    max_depth: usize,
}

impl HangingNodes {
    /// Detect the non-conforming edges of the Mesh and compute the weights of every hanging Node
    pub fn build(
        mesh: &Mesh,
        strategy: HangingStrategy,
        max_depth: usize,
    ) -> Result<Self, ConstraintError> {
        let mut direct: BTreeMap<usize, Masters> = BTreeMap::new();
        let mut num_interfaces = 0;

        for (edge_id, attached) in mesh.edge_attachments() {
            let mut pairs: Vec<(Side, Side)> = Vec::new();
            for (i, a) in attached.iter().enumerate() {
                for b in attached.iter().skip(i + 1) {
                    if let Some(pair) = choose_master(mesh, *a, *b) {
                        pairs.push(pair);
                    }
                }
            }

            // a master side of higher order than any of its slaves is limited to the lowest slave order
            let mut reductions: BTreeMap<Side, u8> = BTreeMap::new();
            for (master, slave) in pairs.iter() {
                let m_order = mesh.elems[master.0].order();
                let s_order = mesh.elems[slave.0].order();
                if s_order < m_order {
                    let order = reductions.entry(*master).or_insert(s_order);
                    *order = (*order).min(s_order);
                }
            }
            for (master, order) in reductions {
                reduce_master_edge(mesh, master, order, &mut direct);
            }

            for (master, slave) in pairs.iter() {
                constrain_edge(mesh, *master, *slave, strategy, &mut direct)?;
                num_interfaces += 1;
            }
            debug!("checked {} Elem sides attached to Edge {}", attached.len(), edge_id);
        }

        let mut hanging = Self {
            direct,
            resolved: BTreeMap::new(),
            strategy,
            max_depth,
        };
        hanging.resolve_all()?;

        debug!(
            "found {} non-conforming interfaces with {} hanging Nodes ({:?})",
            num_interfaces,
            hanging.direct.len(),
            strategy
        );

        Ok(hanging)
    }

    pub fn strategy(&self) -> HangingStrategy {
        self.strategy
    }

    pub fn is_hanging(&self, node_id: usize) -> bool {
        self.direct.contains_key(&node_id)
    }

    pub fn num_hanging(&self) -> usize {
        self.direct.len()
    }

    /// Ids of all hanging Nodes
    pub fn hanging_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.direct.keys().copied()
    }

    /// Direct masters of a hanging Node (empty for Nodes which are not hanging)
    pub fn masters(&self, node_id: usize) -> &[(usize, f64)] {
        self.direct
            .get(&node_id)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    /// Masters of a hanging Node, resolved until none of them are hanging
    pub fn resolved_masters(&self, node_id: usize) -> Option<&[(usize, f64)]> {
        self.resolved.get(&node_id).map(|m| m.as_slice())
    }

    /// Effective value of a field at a Node: the weighted sum of its resolved masters' values if it is hanging
    pub fn resolve_value(&self, mesh: &Mesh, node_id: usize, field: usize) -> f64 {
        match self.resolved.get(&node_id) {
            Some(masters) => masters
                .iter()
                .map(|(m, w)| w * mesh.nodes[*m].values[field])
                .sum(),
            None => mesh.nodes[node_id].values[field],
        }
    }

    fn resolve_all(&mut self) -> Result<(), ConstraintError> {
        for (node_id, masters) in self.direct.iter() {
            if masters.is_empty() {
                return Err(ConstraintError::NoMasters(*node_id));
            }
            check_weight_sum(*node_id, masters)?;
        }

        let mut resolved = BTreeMap::new();
        for node_id in self.direct.keys() {
            let mut accumulated: BTreeMap<usize, f64> = BTreeMap::new();
            let mut path = Vec::new();
            self.resolve_recursive(*node_id, *node_id, 1.0, &mut path, &mut accumulated)?;

            let masters: Masters = accumulated
                .into_iter()
                .filter(|(_, w)| w.abs() > WEIGHT_CUTOFF)
                .collect();
            if masters.is_empty() {
                return Err(ConstraintError::NoMasters(*node_id));
            }
            check_weight_sum(*node_id, &masters)?;
            resolved.insert(*node_id, masters);
        }

        self.resolved = resolved;
        Ok(())
    }

    fn resolve_recursive(
        &self,
        origin: usize,
        node_id: usize,
        scale: f64,
        path: &mut Vec<usize>,
        accumulated: &mut BTreeMap<usize, f64>,
    ) -> Result<(), ConstraintError> {
        match self.direct.get(&node_id) {
            None => {
                *accumulated.entry(node_id).or_insert(0.0) += scale;
            }
            Some(masters) => {
                if path.contains(&node_id) {
                    return Err(ConstraintError::Cycle(node_id));
                }
                if path.len() >= self.max_depth {
                    return Err(ConstraintError::DepthExceeded {
                        node: origin,
                        max_depth: self.max_depth,
                    });
                }

                path.push(node_id);
                for (master, weight) in masters.iter() {
                    self.resolve_recursive(origin, *master, scale * weight, path, accumulated)?;
                }
                path.pop();
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_direct(direct: BTreeMap<usize, Masters>, max_depth: usize) -> Result<Self, ConstraintError> {
        let mut hanging = Self {
            direct,
            resolved: BTreeMap::new(),
            strategy: HangingStrategy::Constrained,
            max_depth,
        };
        hanging.resolve_all()?;
        Ok(hanging)
    }
}

fn check_weight_sum(node_id: usize, masters: &[(usize, f64)]) -> Result<(), ConstraintError> {
    let sum: f64 = masters.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        Err(ConstraintError::WeightSum { node: node_id, sum })
    } else {
        Ok(())
    }
}

// Decide which of two overlapping sides is the master (returns None for conforming or touching sides)
fn choose_master(mesh: &Mesh, a: Side, b: Side) -> Option<(Side, Side)> {
    let elem_a = &mesh.elems[a.0];
    let elem_b = &mesh.elems[b.0];
    let seg_a = elem_a.segments[a.1];
    let seg_b = elem_b.segments[b.1];

    if seg_a.overlap_with(&seg_b) <= OVERLAP_TOLERANCE {
        return None;
    }

    let [a0, a1] = seg_a.bounds();
    let [b0, b1] = seg_b.bounds();
    let a_contains_b = a0 <= b0 + OVERLAP_TOLERANCE && b1 <= a1 + OVERLAP_TOLERANCE;
    let b_contains_a = b0 <= a0 + OVERLAP_TOLERANCE && a1 <= b1 + OVERLAP_TOLERANCE;

    match (a_contains_b, b_contains_a) {
        (true, true) => {
            let nodes_a: BTreeSet<usize> = elem_a.edge_node_ids(a.1).into_iter().collect();
            let nodes_b: BTreeSet<usize> = elem_b.edge_node_ids(b.1).into_iter().collect();
            if nodes_a == nodes_b {
                None
            } else if (elem_a.order(), elem_a.id) < (elem_b.order(), elem_b.id) {
                Some((a, b))
            } else {
                Some((b, a))
            }
        }
        (true, false) => Some((a, b)),
        (false, true) => Some((b, a)),
        (false, false) => {
            warn!(
                "Elems {} and {} partially overlap along Edge {}; no constraint is applied",
                a.0, b.0, seg_a.edge
            );
            None
        }
    }
}

// Constrain the Nodes on the slave side of an edge which are not also master Nodes
fn constrain_edge(
    mesh: &Mesh,
    master: Side,
    slave: Side,
    strategy: HangingStrategy,
    direct: &mut BTreeMap<usize, Masters>,
) -> Result<(), ConstraintError> {
    let m_elem = &mesh.elems[master.0];
    let s_elem = &mesh.elems[slave.0];
    let m_seg = m_elem.segments[master.1];
    let s_seg = s_elem.segments[slave.1];

    let m_nodes = m_elem.edge_node_ids(master.1);
    let s_nodes = s_elem.edge_node_ids(slave.1);
    let m_line = BasisLibrary::edge_basis(m_elem.basis());
    let s_line = BasisLibrary::edge_basis(s_elem.basis());

    // master edge coordinate of a slave edge coordinate
    let to_master = |x: f64| m_seg.local_param(s_seg.edge_param(x));

    let pointwise = |x: f64| -> Masters {
        let mut psi = vec![0.0; m_line.n()];
        m_line.values(to_master(x), &mut psi);
        m_nodes
            .iter()
            .zip(psi)
            .filter(|(_, w)| w.abs() > WEIGHT_CUTOFF)
            .map(|(id, w)| (*id, w))
            .collect()
    };

    let num_interior = s_nodes.len().saturating_sub(2);
    let mut use_mortar = match strategy {
        HangingStrategy::Constrained => false,
        HangingStrategy::Mortar => true,
        HangingStrategy::Auto => m_elem.order() != s_elem.order(),
    } && num_interior > 0;

    if use_mortar && s_nodes[1..s_nodes.len() - 1].iter().any(|id| m_nodes.contains(id)) {
        warn!(
            "slave Elem {} shares interior edge Nodes with master Elem {}; using pointwise constraints",
            s_elem.id, m_elem.id
        );
        use_mortar = false;
    }

    let mortar_weights = if use_mortar {
        Some(mortar_projection(
            &m_line, &s_line, &to_master, master.0, slave.0,
        )?)
    } else {
        None
    };

    for (k, node_id) in s_nodes.iter().enumerate() {
        if m_nodes.contains(node_id) || direct.contains_key(node_id) {
            continue;
        }

        let is_vertex = k == 0 || k == s_nodes.len() - 1;
        let masters = match (&mortar_weights, is_vertex) {
            (Some(weights), false) => m_nodes
                .iter()
                .enumerate()
                .map(|(m, id)| (*id, weights[(k - 1, m)]))
                .filter(|(_, w)| w.abs() > WEIGHT_CUTOFF)
                .collect(),
            _ => pointwise(s_line.nodes()[k]),
        };
        direct.insert(*node_id, masters);
    }

    Ok(())
}

// Constrain the interior Nodes of a master side so that its trace is a polynomial of the given order
//
// The kept Nodes are spread evenly over the edge and always include both vertices.
fn reduce_master_edge(mesh: &Mesh, master: Side, order: u8, direct: &mut BTreeMap<usize, Masters>) {
    let elem = &mesh.elems[master.0];
    let nodes = elem.edge_node_ids(master.1);
    let line = BasisLibrary::edge_basis(elem.basis());

    let p = nodes.len() - 1;
    let q = usize::from(order).max(1);
    if q >= p {
        return;
    }

    let kept: Vec<usize> = (0..=q).map(|j| (j * p + q / 2) / q).collect();
    let reduced = Lagrange1D::new(kept.iter().map(|k| line.nodes()[*k]).collect());
    let mut psi = vec![0.0; reduced.n()];

    let mut num_reduced = 0;
    for (k, node_id) in nodes.iter().enumerate() {
        if kept.contains(&k) || direct.contains_key(node_id) {
            continue;
        }
        reduced.values(line.nodes()[k], &mut psi);
        let masters: Masters = kept
            .iter()
            .zip(psi.iter())
            .filter(|(_, w)| w.abs() > WEIGHT_CUTOFF)
            .map(|(j, w)| (nodes[*j], *w))
            .collect();
        direct.insert(*node_id, masters);
        num_reduced += 1;
    }

    debug!(
        "limited Edge {} of Elem {} to order {} ({} Nodes constrained)",
        master.1, elem.id, q, num_reduced
    );
}

// Weights (interior slave nodes x master nodes) of the L2 projection of the master trace onto the
// slave trace, tested against Legendre polynomials P_0 .. P_{n_interior - 1}
fn mortar_projection(
    m_line: &Lagrange1D,
    s_line: &Lagrange1D,
    to_master: &dyn Fn(f64) -> f64,
    master_elem: usize,
    slave_elem: usize,
) -> Result<DMatrix<f64>, ConstraintError> {
    let n_s = s_line.n();
    let n_m = m_line.n();
    let n_int = n_s - 2;
    let (points, weights) = glq::gauss_quadrature_points(n_s + n_m, false)?;

    let mut a = DMatrix::<f64>::zeros(n_int, n_int);
    let mut b = DMatrix::<f64>::zeros(n_int, n_m);
    let mut vertex_moments = DMatrix::<f64>::zeros(n_int, 2);

    let mut psi_s = vec![0.0; n_s];
    let mut psi_m = vec![0.0; n_m];
    for (xi, w) in points.iter().zip(weights.iter()) {
        s_line.values(*xi, &mut psi_s);
        m_line.values(to_master(*xi), &mut psi_m);

        for k in 0..n_int {
            let p_k = legendre_recurrence(k, *xi).0 * w;
            for i in 0..n_int {
                a[(k, i)] += psi_s[i + 1] * p_k;
            }
            for m in 0..n_m {
                b[(k, m)] += psi_m[m] * p_k;
            }
            vertex_moments[(k, 0)] += psi_s[0] * p_k;
            vertex_moments[(k, 1)] += psi_s[n_s - 1] * p_k;
        }
    }

    // slave vertices are interpolated pointwise from the master
    for (v, x_v) in [(0, -1.0), (1, 1.0)] {
        m_line.values(to_master(x_v), &mut psi_m);
        for k in 0..n_int {
            for m in 0..n_m {
                b[(k, m)] -= vertex_moments[(k, v)] * psi_m[m];
            }
        }
    }

    a.lu().solve(&b).ok_or(ConstraintError::SingularMortarProjection {
        slave_elem,
        master_elem,
    })
}
