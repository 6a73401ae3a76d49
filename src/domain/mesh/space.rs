use json::{object, JsonValue};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, PartialEq)]
/// 2D vector (used for local-coordinate and physical gradients alike)
pub struct V2D {
    inner: [f64; 2],
}

impl V2D {
    pub const fn from([x, y]: [f64; 2]) -> Self {
        Self { inner: [x, y] }
    }

    pub const fn zero() -> Self {
        Self { inner: [0.0; 2] }
    }

    pub fn dot_with(&self, other: &Self) -> f64 {
        self[0] * other[0] + self[1] * other[1]
    }

    pub fn dot(a: Self, b: Self) -> f64 {
        a[0] * b[0] + a[1] * b[1]
    }

    pub fn norm(&self) -> f64 {
        self.dot_with(self).sqrt()
    }
}

impl Default for V2D {
    fn default() -> Self {
        Self::zero()
    }
}

impl Index<usize> for V2D {
    type Output = f64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}

impl IndexMut<usize> for V2D {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.inner[index]
    }
}

impl Add for V2D {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            inner: [self[0] + other[0], self[1] + other[1]],
        }
    }
}

impl AddAssign for V2D {
    fn add_assign(&mut self, other: Self) {
        self.inner[0] += other[0];
        self.inner[1] += other[1];
    }
}

impl Sub for V2D {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            inner: [self[0] - other[0], self[1] - other[1]],
        }
    }
}

impl Neg for V2D {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            inner: [-self[0], -self[1]],
        }
    }
}

impl Div<f64> for V2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            inner: [self[0] / divisor, self[1] / divisor],
        }
    }
}

impl Mul<f64> for V2D {
    type Output = Self;
    fn mul(self, coefficient: f64) -> Self {
        Self {
            inner: [self[0] * coefficient, self[1] * coefficient],
        }
    }
}

/*
    | [u0, u1] |
    | [v0, v1] |
*/

#[derive(Clone, Copy, Debug, PartialEq)]
/// 2 by 2 Matrix. Used to represent the mapping between local and physical space
///
/// As a Jacobian, row `u` holds the derivatives of (x, y) with respect to the first local coordinate,
/// and row `v` holds them with respect to the second.
pub struct M2D {
    pub u: V2D,
    pub v: V2D,
}

impl M2D {
    pub const fn from(r0: [f64; 2], r1: [f64; 2]) -> Self {
        Self {
            u: V2D::from(r0),
            v: V2D::from(r1),
        }
    }

    pub const fn zero() -> Self {
        Self {
            u: V2D::zero(),
            v: V2D::zero(),
        }
    }

    #[inline]
    pub fn det(&self) -> f64 {
        self.u[0] * self.v[1] - self.u[1] * self.v[0]
    }

    /// Inverse of the matrix. The caller is responsible for checking the determinant first.
    pub fn inverse(&self) -> Self {
        Self {
            u: V2D::from([self.v[1], -1.0 * self.u[1]]),
            v: V2D::from([-1.0 * self.v[0], self.u[0]]),
        } / self.det()
    }

    pub fn transpose(&self) -> Self {
        Self {
            u: V2D::from([self.u[0], self.v[0]]),
            v: V2D::from([self.u[1], self.v[1]]),
        }
    }
}

impl Div<f64> for M2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            u: self.u / divisor,
            v: self.v / divisor,
        }
    }
}

impl Mul<M2D> for M2D {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        let ot = other.transpose();
        Self {
            u: V2D::from([self.u.dot_with(&ot.u), self.u.dot_with(&ot.v)]),
            v: V2D::from([self.v.dot_with(&ot.u), self.v.dot_with(&ot.v)]),
        }
    }
}

impl Mul<V2D> for M2D {
    type Output = V2D;
    fn mul(self, v: V2D) -> V2D {
        V2D::from([self.u.dot_with(&v), self.v.dot_with(&v)])
    }
}

impl fmt::Display for M2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "u: [{:.5}, {:.5}]  v: [{:.5}, {:.5}]",
            self.u[0], self.u[1], self.v[0], self.v[1]
        )
    }
}

/// Two Points closer than this are considered to be at the same location
pub const POINT_UNIQUENESS_ACCURACY: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
/// Point in 2D physical Space
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn between(a: &Self, b: &Self) -> Self {
        Self::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    pub const fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }

    pub fn dist(&self, other: &Self) -> f64 {
        let dx = (other.x - self.x).abs();
        let dy = (other.y - self.y).abs();

        (dx.powi(2) + dy.powi(2)).sqrt()
    }

    pub fn coincides_with(&self, other: &Self) -> bool {
        self.dist(other) < POINT_UNIQUENESS_ACCURACY
    }

    pub fn as_v2d(&self) -> V2D {
        V2D::from([self.x, self.y])
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, coefficient: f64) -> Self {
        Self::new(self.x * coefficient, self.y * coefficient)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, divis: f64) -> Self {
        Self::new(self.x / divis, self.y / divis)
    }
}

impl From<Point> for JsonValue {
    fn from(p: Point) -> Self {
        object! {
            "x": p.x,
            "y": p.y,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(x: {:.10}, y: {:.10})", self.x, self.y)
    }
}

/// Spatial hash used to find an existing Node at a given location
///
/// Locations are bucketed on a grid with a cell size of [POINT_UNIQUENESS_ACCURACY]. Lookups search the
/// neighboring cells as well, so two Points which straddle a cell boundary are still matched.
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    cells: HashMap<[i64; 2], SmallVec<[(usize, Point); 2]>>,
}

impl PointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_of(p: &Point) -> [i64; 2] {
        [
            (p.x / POINT_UNIQUENESS_ACCURACY).floor() as i64,
            (p.y / POINT_UNIQUENESS_ACCURACY).floor() as i64,
        ]
    }

    /// Find the id associated with a location (if any)
    pub fn find(&self, p: &Point) -> Option<usize> {
        let [cx, cy] = Self::cell_of(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entries) = self.cells.get(&[cx + dx, cy + dy]) {
                    if let Some((id, _)) = entries.iter().find(|(_, q)| q.coincides_with(p)) {
                        return Some(*id);
                    }
                }
            }
        }
        None
    }

    pub fn insert(&mut self, p: Point, id: usize) {
        self.cells
            .entry(Self::cell_of(&p))
            .or_insert_with(SmallVec::new)
            .push((id, p));
    }

    pub fn remove(&mut self, p: &Point, id: usize) {
        let cell = Self::cell_of(p);
        if let Some(entries) = self.cells.get_mut(&cell) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_inverse() {
        let m = M2D::from([2.0, 1.0], [0.5, 3.0]);
        let id = m * m.inverse();

        assert!((id.u[0] - 1.0).abs() < 1e-14);
        assert!(id.u[1].abs() < 1e-14);
        assert!(id.v[0].abs() < 1e-14);
        assert!((id.v[1] - 1.0).abs() < 1e-14);
        assert!((m.det() - 5.5).abs() < 1e-14);
    }

    #[test]
    fn point_index_lookup() {
        let mut index = PointIndex::new();
        index.insert(Point::new(0.5, 0.25), 3);
        index.insert(Point::new(1.0, 0.0), 7);

        // slightly perturbed location, possibly in a neighboring cell
        assert_eq!(index.find(&Point::new(0.5 + 3e-11, 0.25 - 2e-11)), Some(3));
        assert_eq!(index.find(&Point::new(1.0, 0.0)), Some(7));
        assert_eq!(index.find(&Point::new(0.75, 0.0)), None);

        index.remove(&Point::new(0.5, 0.25), 3);
        assert_eq!(index.find(&Point::new(0.5, 0.25)), None);
        assert_eq!(index.len(), 1);
    }
}
