use super::elem::Elem;
use super::node::Node;
use super::space::Point;
use super::{mapping, Mesh, MeshError};
use crate::basis::NodeSpacing;
use crate::integration::Topology;

use log::info;
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;

/// The data exchanged with a triangulation backend
///
/// All lists are flat, parallel arrays (e.g. `point_list` holds `x0, y0, x1, y1, ...`).
/// Markers follow the usual convention: `0` means "not on a boundary" and a marker `m > 0` places the
/// point or segment on boundary `m - 1`. Entries of `neighbor_list` are `-1` where there is no neighbor.
#[derive(Debug, Clone, Default)]
pub struct TriangulateIo {
    pub point_list: Vec<f64>,
    pub point_attribute_list: Vec<f64>,
    pub number_of_point_attributes: usize,
    pub point_marker_list: Vec<i32>,
    /// 3 (corners) or 6 (corners followed by midside points) entries per triangle
    pub triangle_list: Vec<usize>,
    pub number_of_corners: usize,
    pub triangle_attribute_list: Vec<f64>,
    pub number_of_triangle_attributes: usize,
    pub neighbor_list: Vec<i64>,
    pub segment_list: Vec<usize>,
    pub segment_marker_list: Vec<i32>,
    pub hole_list: Vec<f64>,
    /// 4 entries per region: x, y, attribute, maximum area
    pub region_list: Vec<f64>,
}

impl TriangulateIo {
    pub fn number_of_points(&self) -> usize {
        self.point_list.len() / 2
    }

    pub fn number_of_triangles(&self) -> usize {
        if self.number_of_corners == 0 {
            0
        } else {
            self.triangle_list.len() / self.number_of_corners
        }
    }

    pub fn point(&self, i: usize) -> Point {
        Point::new(self.point_list[2 * i], self.point_list[2 * i + 1])
    }

    pub fn triangle_corners(&self, t: usize) -> [usize; 3] {
        let start = t * self.number_of_corners;
        [
            self.triangle_list[start],
            self.triangle_list[start + 1],
            self.triangle_list[start + 2],
        ]
    }

    fn validate(&self) -> Result<(), MeshError> {
        let invalid = |msg: String| Err(MeshError::InvalidTriangulation(msg));
        let num_points = self.number_of_points();
        let num_triangles = self.number_of_triangles();

        if self.point_list.len() % 2 != 0 {
            return invalid(String::from("point_list must hold pairs of coordinates"));
        }
        if self.number_of_corners != 3 && self.number_of_corners != 6 {
            return invalid(format!(
                "triangles must have 3 or 6 corners, not {}",
                self.number_of_corners
            ));
        }
        if self.triangle_list.len() % self.number_of_corners != 0 {
            return invalid(String::from("triangle_list length is not a multiple of number_of_corners"));
        }
        if let Some(bad) = self.triangle_list.iter().find(|id| **id >= num_points) {
            return invalid(format!("triangle_list references point {} which does not exist", bad));
        }
        if !self.point_marker_list.is_empty() && self.point_marker_list.len() != num_points {
            return invalid(String::from("point_marker_list must have one entry per point"));
        }
        if self.point_attribute_list.len() != num_points * self.number_of_point_attributes {
            return invalid(String::from("point_attribute_list has the wrong length"));
        }
        if self.triangle_attribute_list.len() != num_triangles * self.number_of_triangle_attributes {
            return invalid(String::from("triangle_attribute_list has the wrong length"));
        }
        if self.segment_list.len() % 2 != 0
            || self.segment_list.iter().any(|id| *id >= num_points)
        {
            return invalid(String::from("segment_list must hold pairs of existing points"));
        }
        if !self.segment_marker_list.is_empty()
            && self.segment_marker_list.len() != self.segment_list.len() / 2
        {
            return invalid(String::from("segment_marker_list must have one entry per segment"));
        }
        if self.hole_list.len() % 2 != 0 || self.region_list.len() % 4 != 0 {
            return invalid(String::from("hole_list or region_list has the wrong length"));
        }

        if !self.neighbor_list.is_empty() {
            if self.neighbor_list.len() != 3 * num_triangles {
                return invalid(String::from("neighbor_list must have three entries per triangle"));
            }
            for t in 0..num_triangles {
                let corners = self.triangle_corners(t);
                for neighbor in self.neighbor_list[3 * t..3 * t + 3].iter() {
                    if *neighbor < 0 {
                        continue;
                    }
                    let neighbor = *neighbor as usize;
                    if neighbor >= num_triangles {
                        return invalid(format!("triangle {} has a neighbor {} which does not exist", t, neighbor));
                    }
                    let other = self.triangle_corners(neighbor);
                    let shared = corners.iter().filter(|c| other.contains(c)).count();
                    if shared != 2 {
                        return invalid(format!(
                            "triangles {} and {} are listed as neighbors but share {} vertices",
                            t, neighbor, shared
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// A region seed point carried over from the triangulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub point: Point,
    pub attribute: f64,
    pub max_area: f64,
}

/// Hole and region descriptions carried over from a triangulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangulationRegions {
    pub holes: Vec<Point>,
    pub regions: Vec<Region>,
}

fn boundary_of_marker(marker: i32) -> Option<usize> {
    if marker > 0 {
        Some(marker as usize - 1)
    } else {
        None
    }
}

impl Mesh {
    /// Build a Mesh of triangular Elems (order 1 to 3) from a triangulation
    ///
    /// Elem attributes come from the first triangle attribute; Edge boundaries come from the segment markers.
    pub fn from_triangulation(io: &TriangulateIo, order: u8) -> Result<Self, MeshError> {
        io.validate()?;

        let mut mesh = Self::blank();
        let basis = mesh
            .library
            .get(Topology::Triangle, order, NodeSpacing::Equispaced)?;
        let linear = mesh
            .library
            .get(Topology::Triangle, 1, NodeSpacing::Equispaced)?;

        for node_id in 0..io.number_of_points() {
            let point = io.point(node_id);
            if mesh.point_index.find(&point).is_some() {
                return Err(MeshError::InvalidTriangulation(format!(
                    "point {} is at the same location as another point",
                    node_id
                )));
            }
            let mut node = Node::new(node_id, point, mesh.num_fields);
            if let Some(boundary) = io
                .point_marker_list
                .get(node_id)
                .and_then(|m| boundary_of_marker(*m))
            {
                node.boundaries.insert(boundary);
            }
            mesh.point_index.insert(point, node_id);
            mesh.nodes.push(node);
        }

        let mut segment_boundaries: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        for (s, pair) in io.segment_list.chunks(2).enumerate() {
            let marker = io.segment_marker_list.get(s).copied().unwrap_or(1);
            if let Some(boundary) = boundary_of_marker(marker) {
                segment_boundaries.insert(super::sorted_pair(pair[0], pair[1]), boundary);
            }
        }

        for t in 0..io.number_of_triangles() {
            let corners = io.triangle_corners(t);
            let corner_points: Vec<Point> = corners.iter().map(|id| io.point(*id)).collect();

            let edge_boundaries: SmallVec<[Option<usize>; 4]> = (0..3)
                .map(|e| {
                    let pair = super::sorted_pair(corners[e], corners[(e + 1) % 3]);
                    segment_boundaries.get(&pair).copied()
                })
                .collect();

            let mut node_ids: SmallVec<[usize; 16]> = SmallVec::with_capacity(basis.n_nodes());
            for local in 0..basis.n_nodes() {
                let s = basis.local_coordinate_of_node(local);
                let point = mapping::map_to_physical(linear.as_ref(), &corner_points, s);
                let boundaries = Self::boundaries_at(basis.as_ref(), &edge_boundaries, s);
                let zeros: SmallVec<[f64; 2]> = smallvec![0.0; mesh.num_fields];
                node_ids.push(mesh.find_or_create_node(point, &zeros, &boundaries));
            }

            let attribute = if io.number_of_triangle_attributes > 0 {
                io.triangle_attribute_list[t * io.number_of_triangle_attributes]
            } else {
                0.0
            };

            mesh.attach_elem(Elem::new(t, basis.clone(), node_ids, edge_boundaries, attribute));
        }

        mesh.regions = TriangulationRegions {
            holes: io
                .hole_list
                .chunks(2)
                .map(|xy| Point::new(xy[0], xy[1]))
                .collect(),
            regions: io
                .region_list
                .chunks(4)
                .map(|r| Region {
                    point: Point::new(r[0], r[1]),
                    attribute: r[2],
                    max_area: r[3],
                })
                .collect(),
        };

        mesh.retire_unused_nodes();
        mesh.validate_geometry()?;

        info!(
            "Constructed Mesh from triangulation with {} Elems (order {}) and {} Nodes",
            mesh.elems.len(),
            order,
            mesh.nodes.len()
        );

        Ok(mesh)
    }
}
