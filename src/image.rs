use std::path::Path;

use units::todo::Intensityf32;
use crate::fov::FOV;
use crate::index::{index3_to_1, Index1_u, Index3_u};
use crate::io;

pub type ImageData = Vec<Intensityf32>;

/// Dense 3-d volume of intensities over a fixed voxel grid
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub fov: FOV,
    pub data: ImageData,
}

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("could not read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("image file contains {found} voxels, but FOV {n:?} needs {expected}")]
    WrongSize { n: [usize; 3], expected: usize, found: usize },
}

impl Image {

    pub fn new(fov: FOV, data: ImageData) -> Self {
        if data.len() != fov.n_voxels() {
            panic!("Image data does not match dimensions {:?}", fov.n);
        };
        Image { fov, data }
    }

    pub fn zeros(fov: FOV) -> Self { Self::filled(fov, 0.0) }
    pub fn ones (fov: FOV) -> Self { Self::filled(fov, 1.0) }

    pub fn filled(fov: FOV, value: Intensityf32) -> Self {
        Self { data: vec![value; fov.n_voxels()], fov }
    }

    /// A new empty data store with matching size
    pub fn zeros_buffer(fov: FOV) -> ImageData { vec![0.0; fov.n_voxels()] }

    pub fn fill(&mut self, value: Intensityf32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Do `self` and `other` live on the same voxel grid?
    pub fn same_grid(&self, other: &Image) -> bool { self.fov == other.fov }

    /// `self += weight * other`
    pub fn add_scaled(&mut self, other: &Image, weight: f32) {
        debug_assert!(self.same_grid(other));
        for (l, r) in self.data.iter_mut().zip(other.data.iter()) {
            *l += weight * r;
        }
    }

    /// `self -= other`
    pub fn subtract(&mut self, other: &Image) { self.add_scaled(other, -1.0) }

    /// `self += other ⊙ factors`
    pub fn add_product(&mut self, other: &Image, factors: &Image) {
        debug_assert!(self.same_grid(other) && self.same_grid(factors));
        for ((l, a), b) in self.data.iter_mut().zip(other.data.iter()).zip(factors.data.iter()) {
            *l += a * b;
        }
    }

    /// Sum of all voxel values, accumulated in `f64`
    pub fn sum(&self) -> f64 { self.data.iter().map(|&v| v as f64).sum() }

    pub fn from_raw_file(path: &Path, fov: FOV) -> Result<Self, ImageError> {
        let data: ImageData = io::raw::read(path)?;
        let expected = fov.n_voxels();
        if data.len() != expected {
            return Err(ImageError::WrongSize { n: fov.n, expected, found: data.len() });
        }
        Ok(Self { fov, data })
    }

    pub fn write_to_raw_file(&self, path: &Path) -> std::io::Result<()> {
        io::raw::write(self.data.iter().copied(), path)
    }
}

impl core::ops::IndexMut<Index1_u> for Image {
    #[inline]
    fn index_mut(&mut self, i: Index1_u) -> &mut Self::Output { &mut self.data[i] }
}

impl core::ops::Index<Index1_u> for Image {
    type Output = Intensityf32;
    #[inline]
    fn index(&self, i: Index1_u) -> &Self::Output { &self.data[i] }
}

impl core::ops::IndexMut<Index3_u> for Image {
    fn index_mut(&mut self, i3: Index3_u) -> &mut Self::Output {
        let i1 = index3_to_1(i3, self.fov.n);
        &mut self.data[i1]
    }
}

impl core::ops::Index<Index3_u> for Image {
    type Output = Intensityf32;
    fn index(&self, i3: Index3_u) -> &Self::Output {
        let i1 = index3_to_1(i3, self.fov.n);
        &self.data[i1]
    }
}
