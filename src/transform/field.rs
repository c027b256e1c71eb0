use std::path::Path;

use rayon::prelude::*;

use crate::{fov::FOV, image::{Image, ImageData}};
use super::{interpolate::trilinear, SpatialTransformation, TransformError};

/// Dense displacement field: output voxel `i` takes the input value at
/// `voxel_centre(i) + displacement(i)`. Displacements are in mm.
#[derive(Clone, Debug, PartialEq)]
pub struct DeformationField {
    fov: FOV,
    displacement: [ImageData; 3],
}

impl DeformationField {

    pub fn new(fov: FOV, displacement: [ImageData; 3]) -> Result<Self, TransformError> {
        let expected = fov.n_voxels();
        if let Some(component) = displacement.iter().find(|c| c.len() != expected) {
            let found = [component.len(), 1, 1];
            return Err(TransformError::IncompatibleGrid { expected: fov.n, found });
        }
        Ok(Self { fov, displacement })
    }

    pub fn zeros(fov: FOV) -> Self {
        let zeros = Image::zeros_buffer(fov);
        Self { fov, displacement: [zeros.clone(), zeros.clone(), zeros] }
    }

    /// Read the three components from `{stem}_dx.raw`, `{stem}_dy.raw` and
    /// `{stem}_dz.raw`
    pub fn read_raw(fov: FOV, stem: &Path) -> Result<Self, TransformError> {
        let component = |axis: &str| -> Result<ImageData, TransformError> {
            let mut name = stem.as_os_str().to_owned();
            name.push(format!("_d{axis}.raw"));
            Ok(Image::from_raw_file(Path::new(&name), fov)?.data)
        };
        Self::new(fov, [component("x")?, component("y")?, component("z")?])
    }

    pub fn fov(&self) -> &FOV { &self.fov }

    pub fn displacement(&self, voxel: usize) -> [f32; 3] {
        [0, 1, 2].map(|d| self.displacement[d][voxel])
    }
}

impl SpatialTransformation for DeformationField {

    fn warp(&self, image: &Image) -> Result<Image, TransformError> {
        self.check_compatibility(&image.fov)?;
        let fov = self.fov;
        let [sx, sy, sz] = fov.voxel_size_mm();
        let data = (0..fov.n_voxels())
            .into_par_iter()
            .map(|i| {
                let [x, y, z] = crate::index::index1_to_3(i, fov.n).map(|n| n as f32);
                let [dx, dy, dz] = self.displacement(i);
                trilinear(image, [x + dx / sx, y + dy / sy, z + dz / sz])
            })
            .collect();
        Ok(Image::new(fov, data))
    }

    fn check_compatibility(&self, fov: &FOV) -> Result<(), TransformError> {
        if *fov != self.fov {
            return Err(TransformError::IncompatibleGrid { expected: self.fov.n, found: fov.n });
        }
        Ok(())
    }
}
