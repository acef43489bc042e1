use std::io::{Read, Write};

use rayon::prelude::*;

use crate::error::{Result, TinyLlamaError};

/// Dense 2D matrix of f32 values in row-major order.
///
/// Invariant: `data.len() == rows * cols`. Each matrix exclusively owns its
/// buffer; weight loading replaces the buffer wholesale rather than aliasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a zero-filled matrix with the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from existing row-major data.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![rows, cols],
                actual: vec![data.len()],
            });
        }
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// A single row as a slice. Callers must have validated `row < rows`.
    pub(crate) fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f32> {
        self.check_bounds(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows {
            return Err(TinyLlamaError::OutOfBounds {
                index: row,
                dim: 0,
                size: self.rows,
            });
        }
        if col >= self.cols {
            return Err(TinyLlamaError::OutOfBounds {
                index: col,
                dim: 1,
                size: self.cols,
            });
        }
        Ok(())
    }

    /// Standard matrix multiplication. Requires `self.cols == other.rows`.
    ///
    /// Output rows are computed in parallel; the per-row accumulation order
    /// is fixed, so results are deterministic.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.rows, self.cols],
                actual: vec![other.rows, other.cols],
            });
        }

        let mut out = Matrix::new(self.rows, other.cols);
        let n = self.cols;
        let p = other.cols;
        if p == 0 {
            return Ok(out);
        }

        out.data
            .par_chunks_mut(p)
            .enumerate()
            .for_each(|(i, out_row)| {
                let a_row = &self.data[i * n..(i + 1) * n];
                for (k, &a) in a_row.iter().enumerate() {
                    let b_row = &other.data[k * p..(k + 1) * p];
                    for (o, &b) in out_row.iter_mut().zip(b_row.iter()) {
                        *o += a * b;
                    }
                }
            });

        Ok(out)
    }

    /// Element-wise addition. Requires identical shapes.
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.rows, self.cols],
                actual: vec![other.rows, other.cols],
            });
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Matrix {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::new(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        out
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Reallocate to a new shape. Old content is discarded.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data = vec![0.0; rows * cols];
    }

    /// Serialize as `[rows: u64][cols: u64][rows*cols f32]`, host-endian,
    /// no padding.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.rows as u64).to_ne_bytes())?;
        writer.write_all(&(self.cols as u64).to_ne_bytes())?;
        writer.write_all(bytemuck::cast_slice(&self.data))?;
        Ok(())
    }

    /// Deserialize a matrix written by [`Matrix::write_to`]. Fails with an
    /// I/O error if the stream cannot supply the declared number of bytes.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Matrix> {
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let rows = u64::from_ne_bytes(header) as usize;
        reader.read_exact(&mut header)?;
        let cols = u64::from_ne_bytes(header) as usize;

        let count = rows.checked_mul(cols).ok_or_else(|| {
            TinyLlamaError::FileFormat(format!(
                "matrix dimensions overflow: [{} x {}]",
                rows, cols
            ))
        })?;

        let data = read_f32_payload(reader, count)?;
        Ok(Matrix { data, rows, cols })
    }
}

/// Read exactly `count` host-endian f32 values from the stream.
pub(crate) fn read_f32_payload<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; count * std::mem::size_of::<f32>()];
    reader.read_exact(&mut bytes)?;
    // A Vec<u8> is not guaranteed 4-byte aligned, so decode per element
    // instead of casting the slice.
    let data = bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_shapes() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.rows(), 2);
        assert_eq!(c.cols(), 2);
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn matmul_inner_dim_mismatch() {
        let a = Matrix::new(2, 3);
        let b = Matrix::new(2, 3);
        assert!(matches!(
            a.matmul(&b),
            Err(TinyLlamaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn add_requires_identical_shapes() {
        let a = Matrix::new(2, 3);
        let b = Matrix::new(3, 2);
        assert!(a.add(&b).is_err());

        let c = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let d = Matrix::from_vec(2, 2, vec![10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(c.add(&d).unwrap().as_slice(), &[11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn transpose_roundtrip() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let t = a.transpose();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.get(0, 1).unwrap(), 4.0);
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn out_of_bounds_access() {
        let m = Matrix::new(2, 2);
        assert!(matches!(
            m.get(2, 0),
            Err(TinyLlamaError::OutOfBounds { dim: 0, .. })
        ));
        assert!(matches!(
            m.get(0, 2),
            Err(TinyLlamaError::OutOfBounds { dim: 1, .. })
        ));
    }

    #[test]
    fn resize_discards_content() {
        let mut m = Matrix::from_vec(1, 2, vec![5.0, 6.0]).unwrap();
        m.resize(2, 2);
        assert_eq!(m.as_slice(), &[0.0; 4]);
    }

    #[test]
    fn serialize_roundtrip_exact() {
        let m = Matrix::from_vec(2, 3, vec![1.5, -2.25, 0.0, f32::MIN_POSITIVE, 1e30, -7.0])
            .unwrap();
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        let restored = Matrix::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, m);
    }

    #[test]
    fn deserialize_truncated_stream() {
        let m = Matrix::new(4, 4);
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let err = Matrix::read_from(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TinyLlamaError::Io(_)));
    }
}
