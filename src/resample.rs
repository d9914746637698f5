//! Nearest-neighbor resampling of label volumes onto a reference grid.

use nalgebra::Vector4;
use ndarray::{Array3, Zip};

use crate::error::{MaskError, Result};
use crate::volume::LabelVolume;

/// Resample `source` onto `reference`'s voxel grid.
///
/// Every reference voxel is mapped through the reference affine into world
/// coordinates and back through the source's inverse affine; the nearest
/// source voxel supplies the label, with `0` for anything outside the source
/// extent. Label data must never pass through a continuous kernel (linear or
/// cubic interpolation invents fractional class IDs), so nearest neighbor is
/// the only lookup offered.
///
/// # Arguments
///
/// * `source` - the volume whose labels are looked up.
/// * `reference` - the volume whose grid the output matches.
///
/// # Returns
///
/// A new `LabelVolume` with `reference`'s dimensions and geometry.
pub fn resample_nearest(source: &LabelVolume, reference: &LabelVolume) -> Result<LabelVolume> {
    if source.same_grid(reference) {
        return Ok(LabelVolume::new(
            source.labels.clone(),
            reference.geometry.clone(),
        ));
    }

    let src_inverse = source.geometry.affine().try_inverse().ok_or_else(|| {
        MaskError::DegenerateGeometry("source affine is not invertible".to_string())
    })?;
    // one matrix takes a reference voxel index straight to a continuous
    // source index
    let voxel_to_voxel = src_inverse * reference.geometry.affine();

    let (nx, ny, nz) = source.labels.dim();
    let mut out = Array3::<u16>::zeros(reference.labels.dim());
    Zip::indexed(&mut out).par_for_each(|(i, j, k), value| {
        let pos = voxel_to_voxel * Vector4::new(i as f64, j as f64, k as f64, 1.0);
        let x = pos[0].round();
        let y = pos[1].round();
        let z = pos[2].round();
        if x >= 0.0
            && y >= 0.0
            && z >= 0.0
            && (x as usize) < nx
            && (y as usize) < ny
            && (z as usize) < nz
        {
            *value = source.labels[[x as usize, y as usize, z as usize]];
        }
    });

    Ok(LabelVolume::new(out, reference.geometry.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;
    use nalgebra::{Matrix3, Vector3};
    use ndarray::arr3;

    fn volume(labels: Array3<u16>, geometry: Geometry) -> LabelVolume {
        LabelVolume::new(labels, geometry)
    }

    #[test]
    fn identical_grid_is_a_copy() {
        let labels = arr3(&[[[1, 2], [3, 4]], [[5, 6], [7, 8]]]);
        let source = volume(labels.clone(), Geometry::identity());
        let reference = volume(Array3::zeros((2, 2, 2)), Geometry::identity());
        let resampled = resample_nearest(&source, &reference).unwrap();
        assert_eq!(resampled.labels, labels);
    }

    #[test]
    fn shifted_origin_translates_lookup() {
        // source origin one voxel ahead of the reference along x
        let mut geometry = Geometry::identity();
        geometry.origin = Vector3::new(1.0, 0.0, 0.0);
        let source = volume(arr3(&[[[1]], [[2]], [[3]]]), geometry);
        let reference = volume(Array3::zeros((3, 1, 1)), Geometry::identity());

        let resampled = resample_nearest(&source, &reference).unwrap();
        // reference voxel 1 lands on source voxel 0; voxel 0 is outside
        assert_eq!(resampled.labels, arr3(&[[[0]], [[1]], [[2]]]));
    }

    #[test]
    fn out_of_extent_is_background() {
        let source = volume(arr3(&[[[7]]]), Geometry::identity());
        let reference = volume(Array3::zeros((3, 3, 3)), Geometry::identity());
        let resampled = resample_nearest(&source, &reference).unwrap();
        assert_eq!(resampled.labels[[0, 0, 0]], 7);
        assert_eq!(resampled.labels[[2, 2, 2]], 0);
        assert_eq!(resampled.distinct_labels().len(), 1);
    }

    #[test]
    fn downsampling_never_invents_labels() {
        // half the reference spacing: every lookup must still hit an
        // existing label exactly
        let source = volume(
            arr3(&[[[10, 10], [20, 20]], [[30, 30], [40, 40]]]),
            Geometry::identity(),
        );
        let mut fine = Geometry::identity();
        fine.spacing = Vector3::new(0.5, 0.5, 0.5);
        let reference = volume(Array3::zeros((4, 4, 4)), fine);

        let resampled = resample_nearest(&source, &reference).unwrap();
        for &label in resampled.labels.iter() {
            assert!(matches!(label, 0 | 10 | 20 | 30 | 40));
        }
    }

    #[test]
    fn degenerate_source_geometry_fails() {
        let geometry = Geometry {
            spacing: Vector3::new(0.0, 1.0, 1.0),
            origin: Vector3::zeros(),
            direction: Matrix3::identity(),
        };
        let source = volume(arr3(&[[[1]]]), geometry);
        let reference = volume(Array3::zeros((2, 2, 2)), Geometry::identity());
        let result = resample_nearest(&source, &reference);
        assert!(matches!(result, Err(MaskError::DegenerateGeometry(_))));
    }
}
