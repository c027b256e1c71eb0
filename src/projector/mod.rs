//! Forward and back projection between images and projection data.
//!
//! The engine only talks to projectors through the `ProjectorPair` trait.
//! Two implementations are provided:
//!
//! + `MatrixProjector`, an explicit sparse system matrix
//!
//! + `Replicated`, which spreads the work of any projector over several
//!   emulated devices, each holding its own copy of the image and data

pub mod matrix;
pub mod replicated;

pub use matrix::MatrixProjector;
pub use replicated::Replicated;

/// Abstract interface for forward-backward projection implementations
pub trait ProjectorPair: Send + Sync + std::fmt::Debug {

    /// Can this projector map between images on `fov` and data with `info`?
    fn check_compatibility(&self, fov: &FOV, info: &ProjDataInfo) -> Result<(), ProjectionError>;

    /// Overwrite the bins of `out` that lie in `views` and `segments` with the
    /// projection of `image`. All other bins are left untouched.
    fn forward_project(
        &self,
        out: &mut ProjData,
        image: &Image,
        views: &ViewSubset,
        segments: Segments,
    ) -> Result<(), ProjectionError>;

    /// Add to `out` the back projection of the bins of `bins` that lie in
    /// `views` and `segments`.
    fn back_project(
        &self,
        out: &mut Image,
        bins: &ProjData,
        views: &ViewSubset,
        segments: Segments,
    ) -> Result<(), ProjectionError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectionError {
    #[error("image grid {found:?} does not match projector grid {expected:?}")]
    IncompatibleImage { expected: [usize; 3], found: [usize; 3] },
    #[error("projection data geometry does not match projector geometry")]
    IncompatibleProjData,
    #[error("system matrix has {rows} rows but the data have {bins} bins")]
    WrongNumberOfRows { rows: usize, bins: usize },
    #[error("system matrix element refers to bin {bin}, but there are only {bins} bins")]
    BinOutOfRange { bin: usize, bins: usize },
    #[error("system matrix element refers to voxel {voxel}, but there are only {voxels} voxels")]
    VoxelOutOfRange { voxel: usize, voxels: usize },
    #[error("identity projector needs as many voxels ({voxels}) as bins ({bins})")]
    NotSquare { voxels: usize, bins: usize },
    #[error("need at least one replica")]
    NoReplicas,
    #[error("replica {replica} failed: {source}")]
    Replica { replica: usize, source: Box<ProjectionError> },
}

// ----- Storage of system matrix elements --------------------------------------------------
pub type SystemMatrixElement = (Index1_u, Weightf32);

/// The voxels coupled to one bin, with their weights
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemMatrixRow(pub Vec<SystemMatrixElement>);

impl SystemMatrixRow {
    pub fn iter(&self) -> std::slice::Iter<SystemMatrixElement> { self.0.iter() }
    pub fn push(&mut self, element: SystemMatrixElement) { self.0.push(element) }
}

impl<'a> IntoIterator for &'a SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::iter::Cloned<std::slice::Iter<'a, Self::Item>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().cloned()
    }
}

/// Sum product of the row's weights and the image's activities
#[inline]
pub fn forward_project(system_matrix_row: &SystemMatrixRow, image: &Image) -> f32 {
    system_matrix_row.iter()
        .map(|&(j, w)| w * image[j])
        .sum()
}

/// Spread `projection` over the voxels of the row
#[inline]
pub fn back_project(backprojection: &mut ImageData, system_matrix_row: &SystemMatrixRow, projection: f32) {
    for (j, w) in system_matrix_row {
        backprojection[j] += projection * w;
    }
}

pub fn elementwise_add(mut a: ImageData, b: ImageData) -> ImageData {
    a.iter_mut().zip(b.iter()).for_each(|(l, r)| *l += r);
    a
}

// ----- Imports ------------------------------------------------------------------------------------------
use units::todo::Weightf32;

use crate::{
    fov::FOV,
    image::{Image, ImageData},
    index::Index1_u,
    projdata::{ProjData, ProjDataInfo, Segments},
    subsets::ViewSubset,
};
