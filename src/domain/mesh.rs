/// Lines between two corner Nodes of the quadrilateral Elems
pub mod edge;
/// A Finite Element: an ordered set of Nodes with a shape function strategy
pub mod elem;
/// Structures and Functions to facilitate T-Type h-refinement
pub mod h_refinement;
/// Isoparametric mapping between local and physical coordinates
pub mod mapping;
/// A Point in physical space carrying nodal values
pub mod node;
/// Structures and Functions to facilitate p-refinement
pub mod p_refinement;
/// Structures to describe the 2D physical and local spaces defining a Mesh
pub mod space;
/// Import of triangle meshes from a triangulation exchange structure
pub mod triangulation;

use crate::basis::{BasisError, BasisLibrary, NodeSpacing, ShapeFn};
use crate::integration::Topology;
use edge::{Edge, EdgeSegment};
use elem::Elem;
use h_refinement::HRefError;
use mapping::GeometryError;
use node::Node;
use space::{Point, PointIndex};
use triangulation::TriangulationRegions;

#[cfg(feature = "json_export")]
use json::object;
use json::JsonValue;
use log::info;
use smallvec::{smallvec, SmallVec};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{read_to_string, File};
use std::io::BufWriter;
use std::sync::Arc;

/// Minimum Edge length in physical space. h-Refinements will fail after edges are smaller than this value.
pub const MIN_EDGE_LENGTH: f64 = 3.0518e-5; // 15ish refinement layers with unit sized cells

// local coordinates closer than this to an edge are on it
const ON_EDGE_TOLERANCE: f64 = 1e-12;

/*
    Quad local edge - corner relationships (corners ordered [sw, se, nw, ne])

    edge 0 (S) : [corner_0, corner_1]
    edge 1 (N) : [corner_2, corner_3]
    edge 2 (W) : [corner_0, corner_2]
    edge 3 (E) : [corner_1, corner_3]
*/
const QUAD_EDGE_CORNERS: [[usize; 2]; 4] = [[0, 1], [2, 3], [0, 2], [1, 3]];

#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error("Unable to read Mesh file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse Mesh File as JSON: {0}")]
    Json(#[from] json::Error),
    #[error("Invalid Mesh description: {0}")]
    Parse(String),
    #[error("Invalid triangulation: {0}")]
    InvalidTriangulation(String),
    #[error(transparent)]
    Basis(#[from] BasisError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Information used to Define the geometric structure and refinement state of a Domain.
///
/// The Mesh owns all `Node`s, `Elem`s and `Edge`s in arenas indexed by their ids. Ids are never reused:
/// un-refined `Elem`s and retired `Node`s stay in the arenas.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub elems: Vec<Elem>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Hole and region descriptions carried over from a triangulation
    pub regions: TriangulationRegions,
    num_fields: usize,
    point_index: PointIndex,
    library: Arc<BasisLibrary>,
}

impl Mesh {
    /// Construct a completely empty Mesh
    pub fn blank() -> Self {
        Self {
            elems: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            regions: TriangulationRegions::default(),
            num_fields: 1,
            point_index: PointIndex::new(),
            library: Arc::new(BasisLibrary::new()),
        }
    }

    /// Construct a Mesh of quadrilateral Elems from a JSON file with the following format
    ///
    /// Each Element lists its corner Nodes in the order `[south-west, south-east, north-west, north-east]`.
    /// "Boundaries" is optional; when it is missing, every Edge with only one adjacent Element is on boundary 0.
    ///
    /// ```text
    ///     3               4               5
    /// 0.5 *---------------*---------------*
    ///     |               |               |
    ///     |   region 1    |   region 2    |
    ///     |               |               |
    /// 0.0 *---------------*---------------*
    ///  y  0               1               2
    ///  x 0.0             1.0             2.0
    /// ```
    ///
    /// mesh.json
    /// ```JSON
    /// {
    ///     "Nodes": [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.5], [1.0, 0.5], [2.0, 0.5]],
    ///     "Elements": [
    ///         { "node_ids": [0, 1, 3, 4], "attribute": 1.0 },
    ///         { "node_ids": [1, 2, 4, 5], "attribute": 2.0 }
    ///     ],
    ///     "Boundaries": [
    ///         { "id": 0, "edges": [[0, 1], [1, 2], [3, 4], [4, 5]] },
    ///         { "id": 1, "edges": [[0, 3], [2, 5]] }
    ///     ]
    /// }
    /// ```
    ///
    /// Higher order Elems place their additional Nodes with the bilinear map of the corners.
    pub fn from_file(
        path: impl AsRef<str>,
        order: u8,
        spacing: NodeSpacing,
    ) -> Result<Self, MeshError> {
        let mesh_file_contents = read_to_string(path.as_ref())?;
        Self::from_json_str(&mesh_file_contents, order, spacing)
    }

    /// Construct a Mesh from the contents of a JSON Mesh file (see [Mesh::from_file])
    pub fn from_json_str(contents: &str, order: u8, spacing: NodeSpacing) -> Result<Self, MeshError> {
        let mesh_file_json = json::parse(contents)?;

        let points = parse_node_information(&mesh_file_json)?;
        let elements = parse_element_information(&mesh_file_json, points.len())?;
        let boundary_map = parse_boundary_information(&mesh_file_json, points.len())?;

        let mut mesh = Self::blank();
        let basis = mesh.library.get(Topology::Quad, order, spacing)?;
        let bilinear = mesh
            .library
            .get(Topology::Quad, 1, NodeSpacing::Equispaced)?;

        for (node_id, point) in points.iter().enumerate() {
            if mesh.point_index.find(point).is_some() {
                return Err(MeshError::Parse(String::from(
                    "All Nodes must be at unique locations!",
                )));
            }
            mesh.point_index.insert(*point, node_id);
            mesh.nodes.push(Node::new(node_id, *point, mesh.num_fields));
        }

        // count the Elements adjacent to each pair of corners
        let mut edge_adjacency: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        for (corners, _) in elements.iter() {
            for [a, b] in QUAD_EDGE_CORNERS {
                *edge_adjacency
                    .entry(sorted_pair(corners[a], corners[b]))
                    .or_insert(0) += 1;
            }
        }

        let mut edge_ids: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        for (pair, count) in edge_adjacency {
            if count > 2 {
                return Err(MeshError::Parse(format!(
                    "Edge {:?} is shared by more than two Elements!",
                    pair
                )));
            }
            let boundary = match &boundary_map {
                Some(map) => map.get(&pair).copied(),
                None if count == 1 => Some(0),
                None => None,
            };
            let edge_id = mesh.edges.len();
            let edge_points = [&points[pair[0]], &points[pair[1]]];
            mesh.edges
                .push(Edge::new(edge_id, pair, edge_points, boundary));
            edge_ids.insert(pair, edge_id);
        }

        for (elem_id, (corners, attribute)) in elements.iter().enumerate() {
            let corner_points: Vec<Point> = corners.iter().map(|id| points[*id]).collect();

            let mut segments: SmallVec<[EdgeSegment; 4]> = SmallVec::new();
            let mut edge_boundaries: SmallVec<[Option<usize>; 4]> = SmallVec::new();
            for [a, b] in QUAD_EDGE_CORNERS {
                let pair = sorted_pair(corners[a], corners[b]);
                let edge_id = edge_ids[&pair];
                segments.push(EdgeSegment::full(edge_id, corners[a] != pair[0]));
                edge_boundaries.push(mesh.edges[edge_id].boundary);
            }

            let mut node_ids: SmallVec<[usize; 16]> = SmallVec::with_capacity(basis.n_nodes());
            for local in 0..basis.n_nodes() {
                let s = basis.local_coordinate_of_node(local);
                let point = mapping::map_to_physical(bilinear.as_ref(), &corner_points, s);
                let boundaries = Self::boundaries_at(basis.as_ref(), &edge_boundaries, s);
                let zeros: SmallVec<[f64; 2]> = smallvec![0.0; mesh.num_fields];
                node_ids.push(mesh.find_or_create_node(point, &zeros, &boundaries));
            }

            let mut elem = Elem::new(elem_id, basis.clone(), node_ids, edge_boundaries, *attribute);
            elem.segments = segments;
            mesh.attach_elem(elem);
        }

        mesh.retire_unused_nodes();
        mesh.validate_geometry()?;

        info!(
            "Constructed Mesh with {} Elems (order {}), {} Nodes and {} Edges",
            mesh.elems.len(),
            order,
            mesh.nodes.len(),
            mesh.edges.len()
        );

        Ok(mesh)
    }

    /// Print the mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        self.to_json().write_pretty(&mut w, 4)?;

        Ok(())
    }

    /// Produce a Json Object that describes the Mesh
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "Elems": JsonValue::from(self.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()),
            "Nodes": JsonValue::from(self.nodes.iter().map(|node| node.to_json()).collect::<Vec<_>>()),
            "Edges": JsonValue::from(self.edges.iter().map(|edge| edge.to_json()).collect::<Vec<_>>()),
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // General Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    /// Number of fields stored on each Node
    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub(crate) fn set_num_fields(&mut self, num_fields: usize) {
        self.num_fields = num_fields;
        for node in self.nodes.iter_mut() {
            node.set_num_fields(num_fields);
        }
    }

    /// Shared shape function cache used by this Mesh's Elems
    pub fn library(&self) -> &BasisLibrary {
        self.library.as_ref()
    }

    /// Iterate over the Elems which contribute to the system of equations
    pub fn active_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.elems.iter().filter(|elem| elem.is_active())
    }

    pub fn num_active_elems(&self) -> usize {
        self.active_elems().count()
    }

    /// Physical locations of an Elem's Nodes (in local Node order)
    pub fn elem_positions(&self, elem_id: usize) -> Vec<Point> {
        self.elems[elem_id]
            .nodes
            .iter()
            .map(|node_id| self.nodes[*node_id].coords)
            .collect()
    }

    /// Raw field values on an Elem's Nodes (in local Node order)
    pub fn elem_values(&self, elem_id: usize) -> Vec<SmallVec<[f64; 2]>> {
        self.elems[elem_id]
            .nodes
            .iter()
            .map(|node_id| self.nodes[*node_id].values.clone())
            .collect()
    }

    /// Id of the Node at a location (if any Node which is still in use is there)
    pub fn node_at(&self, point: &Point) -> Option<usize> {
        self.point_index.find(point)
    }

    /// Get a list of an [`Elem`]s descendant's IDs
    pub fn descendant_elems(
        &self,
        elem_id: usize,
        include_starting_elem: bool,
    ) -> Result<Vec<usize>, HRefError> {
        if elem_id >= self.elems.len() {
            Err(HRefError::ElemDoesntExist(elem_id))
        } else {
            let mut descendants = Vec::new();
            self.rec_descendant_elems(elem_id, include_starting_elem, &mut descendants);
            Ok(descendants)
        }
    }

    fn rec_descendant_elems(&self, elem_id: usize, include: bool, desc: &mut Vec<usize>) {
        if include {
            desc.push(elem_id);
        }
        if let Some(child_elem_ids) = self.elems[elem_id].child_ids() {
            for cei in child_elem_ids {
                self.rec_descendant_elems(cei, true, desc);
            }
        }
    }

    /// Get a list of an [`Elem`]s ancestors's IDs
    pub fn ancestor_elems(
        &self,
        elem_id: usize,
        include_starting_elem: bool,
    ) -> Result<Vec<usize>, HRefError> {
        if elem_id >= self.elems.len() {
            Err(HRefError::ElemDoesntExist(elem_id))
        } else {
            let mut ancestors = Vec::new();
            if include_starting_elem {
                ancestors.push(elem_id);
            }
            let mut current = self.elems[elem_id].parent_id();
            while let Some(id) = current {
                ancestors.push(id);
                current = self.elems[id].parent_id();
            }
            Ok(ancestors)
        }
    }

    /// Map from each Edge to the (active Elem, local edge) pairs covering part of it
    pub fn edge_attachments(&self) -> BTreeMap<usize, SmallVec<[(usize, usize); 4]>> {
        let mut attachments: BTreeMap<usize, SmallVec<[(usize, usize); 4]>> = BTreeMap::new();
        for elem in self.active_elems() {
            for (local_edge, segment) in elem.segments.iter().enumerate() {
                attachments
                    .entry(segment.edge)
                    .or_insert_with(SmallVec::new)
                    .push((elem.id, local_edge));
            }
        }
        attachments
    }

    /// Check that every active Elem has distinct corners and a positive Jacobian determinant at its
    /// centroid and corners
    pub fn validate_geometry(&self) -> Result<(), GeometryError> {
        for elem in self.active_elems() {
            self.validate_elem_geometry(elem.id)?;
        }
        Ok(())
    }

    pub fn validate_elem_geometry(&self, elem_id: usize) -> Result<(), GeometryError> {
        let elem = &self.elems[elem_id];
        let corners = elem.corner_node_ids();
        let unique: BTreeSet<usize> = corners.iter().copied().collect();
        if unique.len() != corners.len() {
            return Err(GeometryError::DegenerateElement(elem_id));
        }

        let sample_points: &[[f64; 2]] = match elem.topology() {
            Topology::Triangle => &[
                [1.0 / 3.0, 1.0 / 3.0],
                [0.0, 0.0],
                [1.0, 0.0],
                [0.0, 1.0],
            ],
            _ => &[
                [0.0, 0.0],
                [-1.0, -1.0],
                [1.0, -1.0],
                [-1.0, 1.0],
                [1.0, 1.0],
            ],
        };

        let positions = self.elem_positions(elem_id);
        for s in sample_points {
            mapping::dshape_eulerian(elem.basis(), &positions, *s, elem_id)?;
        }
        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Node and Elem bookkeeping
    // ----------------------------------------------------------------------------------------------------

    /// Position and interpolated field values at local coordinates `s` of an Elem described by its
    /// shape functions, Node positions and Node values
    pub(crate) fn sample(
        basis: &dyn ShapeFn,
        positions: &[Point],
        values: &[SmallVec<[f64; 2]>],
        s: [f64; 2],
    ) -> (Point, SmallVec<[f64; 2]>) {
        let mut psi = vec![0.0; basis.n_nodes()];
        basis.shape(s, &mut psi);

        let num_fields = values.first().map(|v| v.len()).unwrap_or(0);
        let mut point = Point::default();
        let mut sampled: SmallVec<[f64; 2]> = smallvec![0.0; num_fields];
        for ((w, p), v) in psi.iter().zip(positions.iter()).zip(values.iter()) {
            point = point + *p * *w;
            for (s_f, v_f) in sampled.iter_mut().zip(v.iter()) {
                *s_f += w * v_f;
            }
        }
        (point, sampled)
    }

    /// Boundary ids of the local edges passing through local coordinates `s`
    pub(crate) fn boundaries_at(
        basis: &dyn ShapeFn,
        edge_boundaries: &[Option<usize>],
        s: [f64; 2],
    ) -> SmallVec<[usize; 2]> {
        let on_edge = |edge: usize| -> bool {
            let distance = match (basis.topology(), edge) {
                (Topology::Triangle, 0) => s[1],
                (Topology::Triangle, 1) => s[0] + s[1] - 1.0,
                (Topology::Triangle, _) => s[0],
                (_, 0) => s[1] + 1.0,
                (_, 1) => s[1] - 1.0,
                (_, 2) => s[0] + 1.0,
                (_, _) => s[0] - 1.0,
            };
            distance.abs() < ON_EDGE_TOLERANCE
        };

        (0..basis.n_edges())
            .filter_map(|edge| match edge_boundaries.get(edge) {
                Some(Some(boundary)) if on_edge(edge) => Some(*boundary),
                _ => None,
            })
            .collect()
    }

    /// Find the Node at `point` or create a new one there
    ///
    /// An existing Node which is not in use by any active Elem takes `values`; Nodes in use keep their own.
    /// Boundary memberships are merged.
    pub(crate) fn find_or_create_node(
        &mut self,
        point: Point,
        values: &[f64],
        boundaries: &[usize],
    ) -> usize {
        match self.point_index.find(&point) {
            Some(node_id) => {
                let node = &mut self.nodes[node_id];
                if !node.is_active() {
                    node.values = values.iter().copied().collect();
                }
                node.boundaries.extend(boundaries.iter().copied());
                node_id
            }
            None => {
                let node_id = self.nodes.len();
                let mut node = Node::new(node_id, point, self.num_fields);
                for (v, value) in node.values.iter_mut().zip(values.iter()) {
                    *v = *value;
                }
                node.boundaries.extend(boundaries.iter().copied());
                self.point_index.insert(point, node_id);
                self.nodes.push(node);
                node_id
            }
        }
    }

    /// Add an Elem to the Mesh and reference its Nodes
    pub(crate) fn attach_elem(&mut self, elem: Elem) {
        let active = elem.is_active();
        for node_id in elem.nodes.iter() {
            self.nodes[*node_id].add_ref(active);
        }
        self.elems.push(elem);
    }

    /// Remove an Elem from the refinement tree, releasing its Nodes
    pub(crate) fn detach_elem(&mut self, elem_id: usize) {
        let active = self.elems[elem_id].is_active();
        for node_id in self.elems[elem_id].nodes.clone() {
            self.release_node(node_id, active);
        }
        self.elems[elem_id].retire();
    }

    /// Drop one reference to a Node; retired Nodes can no longer be found by location
    pub(crate) fn release_node(&mut self, node_id: usize, active: bool) {
        let node = &mut self.nodes[node_id];
        node.remove_ref(active);
        if node.is_retired() {
            let coords = node.coords;
            self.point_index.remove(&coords, node_id);
        }
    }

    fn retire_unused_nodes(&mut self) {
        for node in self.nodes.iter().filter(|node| node.is_retired()) {
            self.point_index.remove(&node.coords, node.id);
        }
    }
}

fn sorted_pair(a: usize, b: usize) -> [usize; 2] {
    if a < b {
        [a, b]
    } else {
        [b, a]
    }
}

// ----------------------------------------------------------------------------------------------------
// Mesh construction from JSON Utility functions
// ----------------------------------------------------------------------------------------------------

fn parse_element_information(
    mesh_file_json: &JsonValue,
    num_nodes: usize,
) -> Result<Vec<([usize; 4], f64)>, MeshError> {
    if !mesh_file_json["Elements"].is_array() {
        return Err(MeshError::Parse(String::from("Elements must be an Array!")));
    }

    mesh_file_json["Elements"]
        .members()
        .map(|json_element| {
            let node_ids_json = &json_element["node_ids"];
            if !node_ids_json.is_array() || node_ids_json.members().count() != 4 {
                return Err(MeshError::Parse(String::from(
                    "Elements must have an Array of 4 node_ids!",
                )));
            }

            let mut node_ids = [0; 4];
            for (slot, node_id_json) in node_ids.iter_mut().zip(node_ids_json.members()) {
                *slot = node_id_json
                    .as_usize()
                    .filter(|node_id| *node_id < num_nodes)
                    .ok_or_else(|| {
                        MeshError::Parse(String::from(
                            "node_ids must be integers smaller than the total number of nodes!",
                        ))
                    })?;
            }
            if has_duplicates(&node_ids) {
                return Err(MeshError::Parse(String::from(
                    "Element's node_ids should have 4 unique values!",
                )));
            }

            let attribute = if json_element["attribute"].is_null() {
                0.0
            } else {
                json_element["attribute"].as_f64().ok_or_else(|| {
                    MeshError::Parse(String::from("Element attributes must be numerical values!"))
                })?
            };

            Ok((node_ids, attribute))
        })
        .collect()
}

fn parse_node_information(mesh_file_json: &JsonValue) -> Result<Vec<Point>, MeshError> {
    if !mesh_file_json["Nodes"].is_array() {
        return Err(MeshError::Parse(String::from("Nodes must be an Array!")));
    }

    mesh_file_json["Nodes"]
        .members()
        .map(|json_node_point| {
            if !json_node_point.is_array() || json_node_point.members().count() != 2 {
                return Err(MeshError::Parse(String::from(
                    "nodes must be arrays of length 2!",
                )));
            }
            match (json_node_point[0].as_f64(), json_node_point[1].as_f64()) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(MeshError::Parse(String::from(
                    "nodes must be composed of numerical values!",
                ))),
            }
        })
        .collect()
}

fn parse_boundary_information(
    mesh_file_json: &JsonValue,
    num_nodes: usize,
) -> Result<Option<BTreeMap<[usize; 2], usize>>, MeshError> {
    let boundaries_json = &mesh_file_json["Boundaries"];
    if boundaries_json.is_null() {
        return Ok(None);
    }
    if !boundaries_json.is_array() {
        return Err(MeshError::Parse(String::from("Boundaries must be an Array!")));
    }

    let mut boundary_map = BTreeMap::new();
    for boundary_json in boundaries_json.members() {
        let boundary_id = boundary_json["id"].as_usize().ok_or_else(|| {
            MeshError::Parse(String::from("Boundaries must have a non-negative integer id!"))
        })?;

        for edge_json in boundary_json["edges"].members() {
            match (edge_json[0].as_usize(), edge_json[1].as_usize()) {
                (Some(a), Some(b)) if a < num_nodes && b < num_nodes => {
                    boundary_map.insert(sorted_pair(a, b), boundary_id);
                }
                _ => {
                    return Err(MeshError::Parse(format!(
                        "Boundary {} has an invalid edge: {}",
                        boundary_id, edge_json
                    )))
                }
            }
        }
    }

    Ok(Some(boundary_map))
}

fn has_duplicates<T>(values: &[T]) -> bool
where
    T: PartialEq,
{
    for (i, val) in values.iter().enumerate() {
        for val_cmp in values.iter().skip(i + 1) {
            if val == val_cmp {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_from_file() {
        let mesh = Mesh::from_file("./test_input/two_elems.json", 1, NodeSpacing::Equispaced).unwrap();

        assert_eq!(mesh.elems.len(), 2);
        assert_eq!(mesh.nodes.len(), 6);
        assert_eq!(mesh.edges.len(), 7);
        assert_eq!(mesh.elems[1].attribute, 2.0);

        // shared edge is not on a boundary
        let shared = mesh.elems[0].segments[3];
        assert_eq!(shared.edge, mesh.elems[1].segments[2].edge);
        assert_eq!(mesh.edges[shared.edge].boundary, None);
        assert_eq!(mesh.elems[0].edge_boundaries[2], Some(1));
        assert_eq!(mesh.elems[0].edge_boundaries[0], Some(0));

        // corner Node 0 is on both boundaries
        assert_eq!(
            mesh.nodes[0].boundaries.iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(mesh.nodes[1].on_boundary(0));
        assert!(!mesh.nodes[1].on_boundary(1));
    }

    #[test]
    fn higher_order_nodes_are_shared() {
        let mesh = Mesh::from_file("./test_input/grid_2x2.json", 3, NodeSpacing::GaussLobatto).unwrap();

        // (3 * 2 + 1)^2 Nodes on a 2x2 grid of Q3 Elems
        assert_eq!(mesh.nodes.len(), 49);
        assert_eq!(mesh.edges.len(), 12);
        for elem in mesh.elems.iter() {
            assert_eq!(elem.num_nodes(), 16);
        }
        assert_eq!(mesh.elems[0].edge_node_ids(3), mesh.elems[1].edge_node_ids(2));
        assert_eq!(mesh.elems[0].edge_node_ids(1), mesh.elems[2].edge_node_ids(0));

        // Edges without explicit boundaries default to boundary 0
        let boundary_nodes = mesh.nodes.iter().filter(|n| n.on_boundary(0)).count();
        assert_eq!(boundary_nodes, 24);
    }

    #[test]
    fn bad_mesh_descriptions() {
        let duplicate_nodes = r#"{"Nodes": [[0, 0], [1, 0], [0, 1], [0, 0]], "Elements": [{"node_ids": [0, 1, 2, 3]}]}"#;
        assert!(matches!(
            Mesh::from_json_str(duplicate_nodes, 1, NodeSpacing::Equispaced),
            Err(MeshError::Parse(_))
        ));

        let out_of_range = r#"{"Nodes": [[0, 0], [1, 0], [0, 1], [1, 1]], "Elements": [{"node_ids": [0, 1, 2, 4]}]}"#;
        assert!(matches!(
            Mesh::from_json_str(out_of_range, 1, NodeSpacing::Equispaced),
            Err(MeshError::Parse(_))
        ));

        let inverted = r#"{"Nodes": [[0, 0], [1, 0], [0, 1], [1, 1]], "Elements": [{"node_ids": [1, 0, 3, 2]}]}"#;
        assert!(matches!(
            Mesh::from_json_str(inverted, 1, NodeSpacing::Equispaced),
            Err(MeshError::Geometry(GeometryError::NonPositiveJacobian { .. }))
        ));

        assert!(matches!(
            Mesh::from_json_str("{ not json", 1, NodeSpacing::Equispaced),
            Err(MeshError::Json(_))
        ));
    }

    #[test]
    fn tree_traversal() {
        let mut mesh = Mesh::from_file("./test_input/unit_square.json", 1, NodeSpacing::Equispaced).unwrap();
        let children = mesh.h_refine(&[0]).unwrap();
        let grandchildren = mesh.h_refine(&[children[3]]).unwrap();

        assert_eq!(mesh.descendant_elems(0, false).unwrap().len(), 8);
        assert_eq!(mesh.ancestor_elems(grandchildren[0], true).unwrap(), vec![grandchildren[0], children[3], 0]);
        assert_eq!(mesh.ancestor_elems(grandchildren[0], false).unwrap(), vec![children[3], 0]);
        assert!(mesh.descendant_elems(42, true).is_err());

        // the coarse edges are covered by 2 or 3 active Elems
        let attachments = mesh.edge_attachments();
        let south = mesh.elems[0].segments[0].edge;
        assert_eq!(attachments[&south].len(), 2);
        let north = mesh.elems[0].segments[1].edge;
        assert_eq!(attachments[&north].len(), 3);
    }

    #[test]
    #[cfg(feature = "json_export")]
    fn export_mesh() {
        let mut mesh = Mesh::from_file("./test_input/two_elems.json", 2, NodeSpacing::Equispaced).unwrap();
        mesh.h_refine(&[1]).unwrap();
        std::fs::create_dir_all("./test_output").unwrap();
        mesh.export_to_json("./test_output/two_elems_refined.json").unwrap();

        let exported = json::parse(&read_to_string("./test_output/two_elems_refined.json").unwrap()).unwrap();
        assert_eq!(exported["Elems"].members().count(), 6);
        assert_eq!(exported["Nodes"].members().count(), mesh.nodes.len());
    }
}
