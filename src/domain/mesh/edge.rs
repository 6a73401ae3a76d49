use super::space::Point;
use json::{object, JsonValue};

/// Edges describe a straight line between two corner `Node`s of the quadrilateral `Elem`s
///
/// Edges are registered on import (one per pair of adjacent corners) and by h-refinement
/// (the four interior Edges of a split `Elem`). They are never split: the children of a refined
/// `Elem` cover half of each of their parent's Edges (see [EdgeSegment]).
///
/// The edge parameter `t` runs from 0 at `nodes[0]` to 1 at `nodes[1]`:
/// ```text
///     t = 0                     t = 1
///       *-----------------------*
///    nodes[0]                nodes[1]
/// ```
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: usize,
    pub nodes: [usize; 2],
    pub boundary: Option<usize>,
    pub length: f64,
    /// `Elem` whose h-refinement created this Edge (None for Edges from the imported Mesh)
    pub origin: Option<usize>,
}

impl Edge {
    pub fn new(id: usize, nodes: [usize; 2], points: [&Point; 2], boundary: Option<usize>) -> Self {
        Self {
            id,
            nodes,
            boundary,
            length: points[0].dist(points[1]),
            origin: None,
        }
    }

    pub fn interior(id: usize, nodes: [usize; 2], points: [&Point; 2], origin: usize) -> Self {
        Self {
            origin: Some(origin),
            ..Self::new(id, nodes, points, None)
        }
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "nodes": self.nodes.to_vec(),
            "boundary": self.boundary,
            "length": self.length,
            "origin": self.origin,
        }
    }
}

/// The portion `[t0, t1]` of an `Edge` in the edge registry covered by one local edge of an `Elem`.
///
/// `t0` is the edge parameter at the start of the local edge (local parameter -1) and `t1` is the parameter at its end (local parameter +1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSegment {
    pub edge: usize,
    pub t0: f64,
    pub t1: f64,
}

impl EdgeSegment {
    pub const fn full(edge: usize, reversed: bool) -> Self {
        if reversed {
            Self {
                edge,
                t0: 1.0,
                t1: 0.0,
            }
        } else {
            Self {
                edge,
                t0: 0.0,
                t1: 1.0,
            }
        }
    }

    /// Segment covering the first (`second == false`) or second half of this one
    pub fn half(&self, second: bool) -> Self {
        let mid = 0.5 * (self.t0 + self.t1);
        if second {
            Self {
                edge: self.edge,
                t0: mid,
                t1: self.t1,
            }
        } else {
            Self {
                edge: self.edge,
                t0: self.t0,
                t1: mid,
            }
        }
    }

    pub fn bounds(&self) -> [f64; 2] {
        if self.t0 < self.t1 {
            [self.t0, self.t1]
        } else {
            [self.t1, self.t0]
        }
    }

    pub fn length(&self) -> f64 {
        (self.t1 - self.t0).abs()
    }

    /// Length of the overlap between two segments on the same Edge
    pub fn overlap_with(&self, other: &Self) -> f64 {
        if self.edge != other.edge {
            return 0.0;
        }
        let [a0, a1] = self.bounds();
        let [b0, b1] = other.bounds();
        (a1.min(b1) - a0.max(b0)).max(0.0)
    }

    /// Edge parameter at a local edge parameter in `[-1, 1]`
    pub fn edge_param(&self, local: f64) -> f64 {
        self.t0 + 0.5 * (local + 1.0) * (self.t1 - self.t0)
    }

    /// Local edge parameter in `[-1, 1]` at an edge parameter
    pub fn local_param(&self, t: f64) -> f64 {
        -1.0 + 2.0 * (t - self.t0) / (self.t1 - self.t0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_halves() {
        let seg = EdgeSegment::full(3, true);
        let first = seg.half(false);
        let second = seg.half(true);

        assert_eq!(first.bounds(), [0.5, 1.0]);
        assert_eq!(second.bounds(), [0.0, 0.5]);
        assert_eq!(first.edge_param(-1.0), 1.0);
        assert_eq!(second.edge_param(1.0), 0.0);
        assert_eq!(first.overlap_with(&second), 0.0);
        assert_eq!(seg.overlap_with(&second), 0.5);
        assert_eq!(seg.local_param(0.25), 0.5);
    }

    #[test]
    fn segments_on_different_edges_do_not_overlap() {
        let a = EdgeSegment::full(0, false);
        let b = EdgeSegment::full(1, false);
        assert_eq!(a.overlap_with(&b), 0.0);
    }
}
