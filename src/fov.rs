//! The size and granularity of the Field of View (FOV) in which images are
//! reconstructed and warped

use units::{Length, todo::Lengthf32};
use geometry::{Point, Vector};
use crate::index::{BoxDim_u, Index3_u, Index1_u, index1_to_3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FOV {
    pub half_width: Vector,
    pub n: BoxDim_u,
    pub voxel_size: Vector,
}

impl FOV {

    pub fn new(
        full_size: (Length, Length, Length),
        (nx, ny, nz): (usize, usize, usize)
    ) -> Self {
        let (dx, dy, dz) = full_size;
        let half_width = Vector::new(dx/2.0, dy/2.0, dz/2.0);
        let n = [nx, ny, nz];
        let voxel_size = Self::voxel_size(n, half_width);
        Self { half_width, n, voxel_size }
    }

    fn voxel_size(n: BoxDim_u, half_width: Vector) -> Vector {
        let full_width = half_width * 2.0;
        Vector::new(full_width[0] / n[0] as f32,
                    full_width[1] / n[1] as f32,
                    full_width[2] / n[2] as f32,
        )
    }

    /// Total number of voxels in the FOV
    pub fn n_voxels(&self) -> usize { self.n.iter().product() }

    /// Find centre of voxel with given 3D index
    pub fn voxel_centre(&self, i: Index3_u) -> Point {
        let s = self.voxel_size;
        Point::new((i[0] as Lengthf32 + 0.5) * s.x - self.half_width[0],
                   (i[1] as Lengthf32 + 0.5) * s.y - self.half_width[1],
                   (i[2] as Lengthf32 + 0.5) * s.z - self.half_width[2],)
    }

    /// Find centre of voxel with given 1D index
    pub fn voxel_centre1(&self, i: Index1_u) -> Point {
        self.voxel_centre(index1_to_3(i, self.n))
    }

    /// Position of `p` in continuous voxel coordinates: voxel centres lie on
    /// integer coordinates, so `continuous_index(voxel_centre(i)) == i`.
    pub fn continuous_index(&self, p: Point) -> [f32; 3] {
        let p = p.to_mm();
        let h = self.half_width.to_mm();
        let s = self.voxel_size.to_mm();
        [0, 1, 2].map(|d| (p[d] + h[d]) / s[d] - 0.5)
    }

    /// Voxel size in mm, along each axis
    pub fn voxel_size_mm(&self) -> [f32; 3] { self.voxel_size.to_mm() }

    /// Half-widths in mm
    pub fn half_width_mm(&self) -> [f32; 3] { self.half_width.to_mm() }
}
