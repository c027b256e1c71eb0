use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use geometry::Point;
use crate::{fov::FOV, image::Image};
use super::{interpolate::trilinear, SpatialTransformation, TransformError};

/// `x -> matrix * x + translation`, in mm. Warping with this transformation
/// gives each output voxel the input value at the mapped position of its
/// centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransformation {
    pub matrix: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

impl AffineTransformation {

    pub fn new(matrix: Matrix3<f32>, translation: Vector3<f32>) -> Self { Self { matrix, translation } }

    /// Translation by `(x, y, z)` mm. Warping moves image content by the
    /// opposite amount.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::new(Matrix3::identity(), Vector3::new(x, y, z))
    }

    pub fn inverse(&self) -> Result<Self, TransformError> {
        let inverse = self.matrix.try_inverse().ok_or(TransformError::Singular)?;
        Ok(Self::new(inverse, -(inverse * self.translation)))
    }

    pub fn map_point(&self, p: Point) -> Point {
        let [x, y, z] = p.to_mm();
        let q = self.matrix * Vector3::new(x, y, z) + self.translation;
        Point::from_mm(q.x, q.y, q.z)
    }
}

impl SpatialTransformation for AffineTransformation {

    fn warp(&self, image: &Image) -> Result<Image, TransformError> {
        let fov = image.fov;
        let data = (0..fov.n_voxels())
            .into_par_iter()
            .map(|i| trilinear(image, fov.continuous_index(self.map_point(fov.voxel_centre1(i)))))
            .collect();
        Ok(Image::new(fov, data))
    }

    fn check_compatibility(&self, _fov: &FOV) -> Result<(), TransformError> { Ok(()) }

    fn is_identity(&self) -> bool {
        self.matrix == Matrix3::identity() && self.translation == Vector3::zeros()
    }
}
