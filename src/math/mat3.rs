// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use core::ops;
use serde::{Deserialize, Serialize};

use super::vec3::Vec3;
use crate::error::{Error, ErrorKind};

/// The `Mat3` struct is a 3×3 matrix of `f64` stored in row-major order.
///
/// It is a plain value type with inline arithmetic; no heap allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    m: [[f64; 3]; 3],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    /// Constructs the identity matrix.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
        }
    }

    /// Constructs a matrix from rows.
    #[must_use]
    pub const fn from_rows(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    /// Constructs a diagonal matrix with `d` on the main diagonal.
    #[must_use]
    pub const fn from_diagonal(d: &Vec3) -> Self {
        Self {
            m: [
                [d.x, 0.0, 0.0],
                [0.0, d.y, 0.0],
                [0.0, 0.0, d.z],
            ],
        }
    }

    /// Element at `row`, `col`.
    ///
    /// Both indices must be in 0..3.
    #[must_use]
    pub const fn at(&self, row: usize, col: usize) -> f64 {
        self.m[row][col]
    }

    /// Multiplies this matrix by a column vector.
    #[must_use]
    pub fn transform(&self, color: &Vec3) -> Vec3 {
        Vec3::from(
            self.m[0][2]
                .mul_add(color.z, self.m[0][0].mul_add(color.x, self.m[0][1] * color.y)),
            self.m[1][2]
                .mul_add(color.z, self.m[1][0].mul_add(color.x, self.m[1][1] * color.y)),
            self.m[2][2]
                .mul_add(color.z, self.m[2][0].mul_add(color.x, self.m[2][1] * color.y)),
        )
    }

    /// Returns the determinant.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        (m[0][0] * m[1][1] * m[2][2]) + (m[0][1] * m[1][2] * m[2][0])
            + (m[0][2] * m[1][0] * m[2][1])
            - (m[0][0] * m[1][2] * m[2][1])
            - (m[0][1] * m[1][0] * m[2][2])
            - (m[0][2] * m[1][1] * m[2][0])
    }

    /// Inverts the matrix via the adjugate.
    ///
    /// # Errors
    /// Returns a `MatrixNotInvertible` error when the determinant is zero.
    pub fn inverted(&self) -> Result<Self, Error> {
        let determinant = self.determinant();
        if determinant == 0.0 {
            return Err(Error::with_message(
                ErrorKind::MatrixNotInvertible,
                "3x3 matrix has zero determinant",
            ));
        }

        let mut cofactors = [[0.0_f64; 3]; 3];
        let mut sign_change = false;
        for row in 0..3 {
            for col in 0..3 {
                let mut minor = [0.0_f64; 4];
                let mut index = 0;
                for (mrow, mrow_vals) in self.m.iter().enumerate() {
                    for (mcol, value) in mrow_vals.iter().enumerate() {
                        if (row != mrow) && (col != mcol) {
                            minor[index] = *value;
                            index += 1;
                        }
                    }
                }
                let mut cofactor = minor[0].mul_add(minor[3], -(minor[1] * minor[2]));
                if sign_change {
                    cofactor = -cofactor;
                }
                sign_change = !sign_change;
                cofactors[row][col] = cofactor;
            }
        }

        // Transpose the cofactor matrix and divide by the determinant.
        let mut output = [[0.0_f64; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                output[row][col] = cofactors[col][row] / determinant;
            }
        }
        Ok(Self { m: output })
    }

    /// Returns a copy with each row scaled so its elements sum to 1.
    ///
    /// Compensates for datasheet values rounded to two decimal places.
    #[must_use]
    pub fn row_normalized(&self) -> Self {
        let mut out = self.m;
        for row in &mut out {
            let sum = row[0] + row[1] + row[2];
            row[0] /= sum;
            row[1] /= sum;
            row[2] /= sum;
        }
        Self { m: out }
    }
}

impl ops::Mul<&Mat3> for &Mat3 {
    type Output = Mat3;

    /// Matrix product `self * other`.
    fn mul(self, other: &Mat3) -> Self::Output {
        let mut out = [[0.0_f64; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                out[row][col] = self.m[row][2].mul_add(
                    other.m[2][col],
                    self.m[row][0]
                        .mul_add(other.m[0][col], self.m[row][1] * other.m[1][col]),
                );
            }
        }
        Mat3 { m: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_identity() {
        let inv = Mat3::identity().inverted().unwrap();
        assert_eq!(inv, Mat3::identity());
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Mat3::from_rows([
            [0.8951, 0.2664, -0.1614],
            [-0.7502, 1.7135, 0.0367],
            [0.0389, -0.0685, 1.0296],
        ]);
        let inv = m.inverted().unwrap();
        let product = &m * &inv;
        for row in 0..3 {
            for col in 0..3 {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert!((product.at(row, col) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_matrix() {
        let m = Mat3::from_rows([
            [1.0, 2.0, 3.0],
            [2.0, 4.0, 6.0],
            [0.0, 1.0, 0.0],
        ]);
        assert!(m.inverted().is_err());
    }

    #[test]
    fn test_transform() {
        let m = Mat3::from_rows([
            [1.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 3.0],
        ]);
        let v = m.transform(&Vec3::from(1.0, 1.0, 1.0));
        assert_eq!(v, Vec3::from(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_row_normalized() {
        let m = Mat3::from_rows([
            [2.0, 1.0, 1.0],
            [0.5, 0.25, 0.25],
            [1.0, 0.0, 0.0],
        ])
        .row_normalized();
        for row in 0..3 {
            let sum = m.at(row, 0) + m.at(row, 1) + m.at(row, 2);
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }
}
