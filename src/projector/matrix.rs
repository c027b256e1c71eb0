use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    fov::FOV,
    image::{Image, ImageData},
    io::matrix::MatrixElement,
    projdata::{ProjData, ProjDataInfo, Segments},
    subsets::ViewSubset,
};
use super::{ProjectorPair, ProjectionError, SystemMatrixRow,
            back_project, elementwise_add, forward_project};

/// Projector backed by an explicit sparse system matrix: one row of coupled
/// voxels per bin
#[derive(Clone, Debug)]
pub struct MatrixProjector {
    fov: FOV,
    info: Arc<ProjDataInfo>,
    rows: Vec<SystemMatrixRow>,
}

impl MatrixProjector {

    pub fn new(fov: FOV, info: Arc<ProjDataInfo>, rows: Vec<SystemMatrixRow>) -> Result<Self, ProjectionError> {
        let bins = info.num_bins();
        if rows.len() != bins {
            return Err(ProjectionError::WrongNumberOfRows { rows: rows.len(), bins });
        }
        let voxels = fov.n_voxels();
        if let Some(&(voxel, _)) = rows.iter().flat_map(|r| r.iter()).find(|(j, _)| *j >= voxels) {
            return Err(ProjectionError::VoxelOutOfRange { voxel, voxels });
        }
        Ok(Self { fov, info, rows })
    }

    /// Assemble the matrix from unordered `(bin, voxel, weight)` elements
    pub fn from_elements(fov: FOV, info: Arc<ProjDataInfo>, elements: &[MatrixElement]) -> Result<Self, ProjectionError> {
        let bins = info.num_bins();
        let mut rows = vec![SystemMatrixRow::default(); bins];
        for &MatrixElement { bin, voxel, weight } in elements {
            let bin = bin as usize;
            let row = rows.get_mut(bin).ok_or(ProjectionError::BinOutOfRange { bin, bins })?;
            row.push((voxel as usize, weight));
        }
        Self::new(fov, info, rows)
    }

    /// Bin `i` sees voxel `i` only, with weight 1
    pub fn identity(fov: FOV, info: Arc<ProjDataInfo>) -> Result<Self, ProjectionError> {
        let (voxels, bins) = (fov.n_voxels(), info.num_bins());
        if voxels != bins { return Err(ProjectionError::NotSquare { voxels, bins }) }
        let rows = (0..bins).map(|i| SystemMatrixRow(vec![(i, 1.0)])).collect();
        Self::new(fov, info, rows)
    }

    fn check_image(&self, image: &Image) -> Result<(), ProjectionError> {
        if image.fov != self.fov {
            return Err(ProjectionError::IncompatibleImage { expected: self.fov.n, found: image.fov.n });
        }
        Ok(())
    }

    fn check_data(&self, data: &ProjData) -> Result<(), ProjectionError> {
        if **data.info() != *self.info { return Err(ProjectionError::IncompatibleProjData) }
        Ok(())
    }
}

impl ProjectorPair for MatrixProjector {

    fn check_compatibility(&self, fov: &FOV, info: &ProjDataInfo) -> Result<(), ProjectionError> {
        if *fov != self.fov {
            return Err(ProjectionError::IncompatibleImage { expected: self.fov.n, found: fov.n });
        }
        if *info != *self.info { return Err(ProjectionError::IncompatibleProjData) }
        Ok(())
    }

    fn forward_project(&self, out: &mut ProjData, image: &Image, views: &ViewSubset, segments: Segments) -> Result<(), ProjectionError> {
        self.check_image(image)?;
        self.check_data(out)?;
        let indices: Vec<usize> = self.info.selected_indices(views, segments).collect();

        #[cfg(feature = "serial")]
        let iter = indices.iter();
        #[cfg(not(feature = "serial"))]
        let iter = indices.par_iter();

        let projections: Vec<f32> = iter
            .map(|&i| forward_project(&self.rows[i], image))
            .collect();

        let out = out.as_mut_slice();
        for (i, p) in indices.into_iter().zip(projections) {
            out[i] = p;
        }
        Ok(())
    }

    fn back_project(&self, out: &mut Image, bins: &ProjData, views: &ViewSubset, segments: Segments) -> Result<(), ProjectionError> {
        self.check_image(out)?;
        self.check_data(bins)?;
        let indices: Vec<usize> = self.info.selected_indices(views, segments).collect();
        let bins = bins.as_slice();

        let project_one_bin = |mut backprojection: ImageData, &i: &usize| {
            let y = bins[i];
            if y != 0.0 { back_project(&mut backprojection, &self.rows[i], y) }
            backprojection
        };

        // In the serial case, there is a single result ...
        #[cfg(feature = "serial")]
        let backprojection = indices.iter()
            .fold(Image::zeros_buffer(self.fov), project_one_bin);

        // ... in the parallel case, the results of each chunk must be combined.
        // Chunks are summed in order, so the result does not depend on
        // scheduling.
        #[cfg(not(feature = "serial"))]
        let backprojection = {
            let job_size = indices.len().div_ceil(rayon::current_num_threads()).max(1);
            indices
                .par_iter()
                .fold_chunks(job_size, || Image::zeros_buffer(self.fov), project_one_bin)
                .collect::<Vec<_>>()
                .into_iter()
                .fold(Image::zeros_buffer(self.fov), elementwise_add)
        };

        out.data = elementwise_add(std::mem::take(&mut out.data), backprojection);
        Ok(())
    }
}
