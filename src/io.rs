//! NIfTI reading and writing for label and intensity volumes.

use std::path::Path;

use ndarray::{Array3, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use crate::error::{MaskError, Result};
use crate::volume::{Geometry, LabelVolume};

/// Read a 3D label volume, validating that every voxel holds a
/// non-negative integer class ID that fits the label range.
pub fn read_label_volume(path: &Path) -> Result<LabelVolume> {
    let (data, geometry) = read_volume(path)?;
    let mut labels = Array3::<u16>::zeros(data.dim());
    for (out, &value) in labels.iter_mut().zip(data.iter()) {
        let rounded = value.round();
        if !value.is_finite()
            || (value - rounded).abs() > 1e-3
            || rounded < 0.0
            || rounded > f32::from(u16::MAX)
        {
            return Err(MaskError::InvalidLabelValue {
                value,
                path: path.to_path_buf(),
            });
        }
        *out = rounded as u16;
    }
    Ok(LabelVolume::new(labels, geometry))
}

/// Read a 3D intensity volume together with its geometry.
pub fn read_intensity_volume(path: &Path) -> Result<(Array3<f32>, Geometry)> {
    read_volume(path)
}

fn read_volume(path: &Path) -> Result<(Array3<f32>, Geometry)> {
    let obj = ReaderOptions::new().read_file(path)?;
    let geometry = Geometry::from_affine(&obj.header().affine::<f64>())?;
    let data = obj.into_volume().into_ndarray::<f32>()?;
    let ndim = data.ndim();
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| MaskError::NotThreeDimensional(ndim))?;
    debug!(path = %path.display(), dim = ?data.dim(), "read volume");
    Ok((data, geometry))
}

/// Write a label volume as a NIfTI file, carrying its geometry into the
/// header. A `.nii.gz` path produces a gzip-compressed file.
pub fn write_label_volume(path: &Path, volume: &LabelVolume) -> Result<()> {
    let (nx, ny, nz) = volume.dim();
    let mut header = NiftiHeader::default();
    header.dim = [3, nx as u16, ny as u16, nz as u16, 1, 1, 1, 1];
    header.pixdim = [
        1.0,
        volume.geometry.spacing[0] as f32,
        volume.geometry.spacing[1] as f32,
        volume.geometry.spacing[2] as f32,
        1.0,
        1.0,
        1.0,
        1.0,
    ];
    header.set_affine(&volume.geometry.affine());

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&volume.labels)?;
    debug!(path = %path.display(), "wrote volume");
    Ok(())
}
