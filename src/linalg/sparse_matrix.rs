use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use bytes::{BufMut, BytesMut};
use nalgebra::DMatrix;

// PETSc's MAT_FILE_CLASSID
const PETSC_MAT_CLASSID: u32 = 1211216;

/// Wrapper around a BTreeMap to store square (general) matrices in a sparse data structure
///
/// Entries are keyed by `[row, col]`; repeated insertions into the same entry are summed.
#[derive(Clone, Debug, Default)]
pub struct SparseMatrix {
    /// Size of the square matrix
    pub dimension: usize,
    /// Matrix Entries
    entries: BTreeMap<[u32; 2], f64>,
}

impl SparseMatrix {
    pub fn new(dimension: usize) -> Self {
        assert!(
            dimension <= (u32::MAX as usize),
            "Matrix Dimension cannot exceed the size of a u32!"
        );

        Self {
            dimension,
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored (structurally non-zero) entries
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    fn coordinates(&self, [row_idx, col_idx]: [usize; 2]) -> [u32; 2] {
        assert!(
            row_idx < self.dimension,
            "row_idx exceeded matrix dimension; cannot insert value!"
        );
        assert!(
            col_idx < self.dimension,
            "col_idx exceeded matrix dimension; cannot insert value!"
        );
        // the dimension is bounded by u32::MAX at construction
        [row_idx as u32, col_idx as u32]
    }

    /// Add a value into the matrix at `[row, col]`
    pub fn insert(&mut self, rc: [usize; 2], value: f64) {
        let coordinates = self.coordinates(rc);
        *self.entries.entry(coordinates).or_insert(0.0) += value;
    }

    /// Insert a group of entries
    pub fn insert_group(&mut self, mut entry_group: Vec<([usize; 2], f64)>) {
        for (rc, value) in entry_group.drain(0..) {
            self.insert(rc, value);
        }
    }

    /// Value at `[row, col]` (zero if the entry is not stored)
    pub fn get(&self, [row_idx, col_idx]: [usize; 2]) -> f64 {
        if row_idx >= self.dimension || col_idx >= self.dimension {
            return 0.0;
        }
        self.entries
            .get(&[row_idx as u32, col_idx as u32])
            .copied()
            .unwrap_or(0.0)
    }

    // Remove the entries from the matrix, replacing them with an empty BTreeMap.
    fn take_entries(&mut self) -> BTreeMap<[u32; 2], f64> {
        std::mem::take(&mut self.entries)
    }

    /// Consume the entries from another sparse matrix leaving it empty.
    pub fn consume_matrix(&mut self, other: &mut Self) {
        assert!(
            self.dimension == other.dimension,
            "Sparse Matrices have different dimensions; cannot consume matrix!"
        );

        for (coordinates, value) in other.take_entries() {
            *self.entries.entry(coordinates).or_insert(0.0) += value;
        }
    }

    /// Iterate over the stored entries, sorted by row then column
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], f64)> + '_ {
        self.entries
            .iter()
            .map(|(coords, value)| ([coords[0] as usize, coords[1] as usize], *value))
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert!(
            x.len() == self.dimension,
            "Vector length does not match the matrix dimension; cannot multiply!"
        );
        let mut y = vec![0.0; self.dimension];
        for ([r, c], v) in self.iter() {
            y[r] += v * x[c];
        }
        y
    }

    pub fn write_to_petsc_binary_format(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        AIJMatrixBinary::from(self).print_to_petsc_binary_file(path)
    }
}

impl From<&SparseMatrix> for DMatrix<f64> {
    fn from(sm: &SparseMatrix) -> Self {
        let mut dense = DMatrix::zeros(sm.dimension, sm.dimension);
        for ([r, c], v) in sm.iter() {
            dense[(r, c)] = v;
        }
        dense
    }
}

impl From<SparseMatrix> for DMatrix<f64> {
    fn from(sm: SparseMatrix) -> Self {
        Self::from(&sm)
    }
}

impl From<&SparseMatrix> for AIJMatrixBinary {
    fn from(sm: &SparseMatrix) -> Self {
        // number of entries in each row
        let mut row_counts = vec![0; sm.dimension];
        for [r, _] in sm.entries.keys() {
            row_counts[*r as usize] += 1;
        }

        // matrix entries and their associated columns (already sorted by row then column)
        let (j, a) = sm
            .entries
            .iter()
            .map(|([_, c], v)| (*c as i32, *v))
            .unzip();

        AIJMatrixBinary {
            a,
            i: row_counts,
            j,
            dim: sm.dimension,
        }
    }
}

/// PETSc binary AIJ matrix format
pub struct AIJMatrixBinary {
    pub a: Vec<f64>,
    pub i: Vec<i32>, // Number of entries on each row (compute a prefix sum to get canonical form)
    pub j: Vec<i32>,
    pub dim: usize,
}

impl AIJMatrixBinary {
    /// Raw big-endian PETSc binary representation: header, row lengths, column indices then values
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16 + 4 * (self.i.len() + self.j.len()) + 8 * self.a.len());

        // header
        buf.put_u32(PETSC_MAT_CLASSID);
        buf.put_u32(self.dim as u32);
        buf.put_u32(self.dim as u32);
        buf.put_u32(self.a.len() as u32);

        for &rnz in self.i.iter() {
            buf.put_i32(rnz);
        }
        for &j in self.j.iter() {
            buf.put_i32(j);
        }
        for &a in self.a.iter() {
            buf.put_f64(a);
        }

        buf
    }

    pub fn print_to_petsc_binary_file(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.to_bytes().as_ref())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_matrix() -> SparseMatrix {
        let mut sm = SparseMatrix::new(10);

        sm.insert([0, 0], 1.0);
        sm.insert([0, 0], 1.0);
        sm.insert([9, 9], 10.0);
        sm.insert([4, 3], 0.25);
        sm.insert([0, 8], 0.125);
        sm.insert([8, 0], -0.125);
        sm
    }

    #[test]
    fn petsc_binary_format() {
        let sm = example_matrix();
        let sm_bin = AIJMatrixBinary::from(&sm);

        assert_eq!(sm_bin.i, vec![2, 0, 0, 0, 1, 0, 0, 0, 1, 1]);
        assert_eq!(sm_bin.j, vec![0, 8, 3, 0, 9]);

        let bytes = sm_bin.to_bytes();
        assert_eq!(bytes.len(), 16 + 4 * 10 + 4 * 5 + 8 * 5);
        assert_eq!(&bytes[0..4], &1211216_u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &5_u32.to_be_bytes());

        std::fs::create_dir_all("./test_output").unwrap();
        sm.write_to_petsc_binary_format("./test_output/test.bin").unwrap();
    }

    #[test]
    fn value_insertion() {
        let mut sm = example_matrix();
        sm.insert_group(vec![([4, 3], 0.25), ([3, 4], 1.0)]);

        let raw_entries = sm.take_entries();

        assert!((raw_entries.get(&[0, 0]).unwrap() - 2.0).abs() < 1e-15);
        assert!((raw_entries.get(&[9, 9]).unwrap() - 10.0).abs() < 1e-15);
        assert!((raw_entries.get(&[4, 3]).unwrap() - 0.5).abs() < 1e-15);
        assert!((raw_entries.get(&[3, 4]).unwrap() - 1.0).abs() < 1e-15);
        assert!((raw_entries.get(&[0, 8]).unwrap() - 0.125).abs() < 1e-15);
        assert!((raw_entries.get(&[8, 0]).unwrap() + 0.125).abs() < 1e-15);
    }

    #[test]
    fn consume_another_matrix() {
        let mut sm_a = SparseMatrix::new(5);
        let mut sm_b = SparseMatrix::new(5);

        for i in 0..5 {
            sm_a.insert([i, i], (i + 1) as f64);
            sm_b.insert([i, i], (5 - i) as f64);
        }
        sm_a.insert([0, 4], 0.5);
        sm_b.insert([4, 0], -0.5);
        sm_b.insert([0, 4], -0.5);

        sm_a.consume_matrix(&mut sm_b);
        assert_eq!(sm_b.num_entries(), 0);

        for i in 0..5 {
            assert!((sm_a.get([i, i]) - 6.0).abs() < 1e-15);
        }
        assert!(sm_a.get([0, 4]).abs() < 1e-15);
        assert!((sm_a.get([4, 0]) + 0.5).abs() < 1e-15);
        assert_eq!(sm_a.get([1, 3]), 0.0);
    }

    #[test]
    fn dense_conversion_and_product() {
        let sm = example_matrix();
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = sm.mul_vec(&x);

        let dense: DMatrix<f64> = (&sm).into();
        let y_dense = &dense * nalgebra::DVector::from_vec(x);
        for (a, b) in y.iter().zip(y_dense.iter()) {
            assert!((a - b).abs() < 1e-14);
        }
        assert!((y[0] - 1.0).abs() < 1e-15);
        assert!((dense[(8, 0)] + 0.125).abs() < 1e-15);
    }

    #[test]
    #[should_panic]
    fn consume_matrix_of_different_dim() {
        let mut sm_a = SparseMatrix::new(5);
        let mut sm_b = SparseMatrix::new(6);

        sm_a.consume_matrix(&mut sm_b);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_insertion() {
        let mut sm = SparseMatrix::new(10);
        sm.insert([10, 2], 1.0);
    }
}
