//! In-memory label volumes and their spatial placement.

use std::collections::BTreeSet;

use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::Array3;

use crate::error::{MaskError, Result};

/// Absolute tolerance on affine entries when deciding whether two volumes
/// already share a grid.
pub const GRID_TOLERANCE: f64 = 1e-4;

/// Spatial placement of a volume: voxel size, position and orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// physical voxel size along each voxel axis, in mm
    pub spacing: Vector3<f64>,
    /// world coordinates of the first voxel
    pub origin: Vector3<f64>,
    /// unit direction cosines, one column per voxel axis
    pub direction: Matrix3<f64>,
}

impl Geometry {
    /// Unit spacing at the world origin, axis-aligned.
    pub fn identity() -> Self {
        Self {
            spacing: Vector3::new(1.0, 1.0, 1.0),
            origin: Vector3::zeros(),
            direction: Matrix3::identity(),
        }
    }

    /// Split a voxel-to-world affine into spacing, origin and direction.
    ///
    /// Fails on zero or non-finite column norms: a volume with a degenerate
    /// axis cannot be placed in space.
    pub fn from_affine(affine: &Matrix4<f64>) -> Result<Self> {
        let mut spacing = Vector3::zeros();
        let mut direction = Matrix3::zeros();
        for c in 0..3 {
            let col = Vector3::new(affine[(0, c)], affine[(1, c)], affine[(2, c)]);
            let norm = col.norm();
            if !norm.is_finite() || norm <= f64::EPSILON {
                return Err(MaskError::DegenerateGeometry(format!(
                    "axis {} has zero or non-finite voxel size",
                    c
                )));
            }
            spacing[c] = norm;
            direction.set_column(c, &(col / norm));
        }
        let origin = Vector3::new(affine[(0, 3)], affine[(1, 3)], affine[(2, 3)]);
        Ok(Self {
            spacing,
            origin,
            direction,
        })
    }

    /// Rebuild the voxel-to-world affine.
    pub fn affine(&self) -> Matrix4<f64> {
        let mut affine = Matrix4::identity();
        for c in 0..3 {
            for r in 0..3 {
                affine[(r, c)] = self.direction[(r, c)] * self.spacing[c];
            }
            affine[(c, 3)] = self.origin[c];
        }
        affine
    }

    pub fn approx_eq(&self, other: &Geometry, tol: f64) -> bool {
        let diff = self.affine() - other.affine();
        diff.iter().all(|d| d.abs() <= tol)
    }
}

/// A 3D labeled image: one integer class ID per voxel, `0` is background.
///
/// Axes follow nifti order, so the array is indexed `[x][y][z]`. Operations
/// derive new volumes instead of mutating shared ones; a derived volume
/// copies its reference geometry verbatim.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    pub labels: Array3<u16>,
    pub geometry: Geometry,
}

impl LabelVolume {
    pub fn new(labels: Array3<u16>, geometry: Geometry) -> Self {
        Self { labels, geometry }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.labels.dim()
    }

    /// Distinct non-zero labels. Recomputed on every call: masks evolve
    /// between pipeline stages, so the set is never cached.
    pub fn distinct_labels(&self) -> BTreeSet<u16> {
        self.labels.iter().copied().filter(|&l| l != 0).collect()
    }

    /// Whether `other` lives on the same voxel grid (dimensions and affine).
    pub fn same_grid(&self, other: &LabelVolume) -> bool {
        self.dim() == other.dim() && self.geometry.approx_eq(&other.geometry, GRID_TOLERANCE)
    }
}
