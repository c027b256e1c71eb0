//! Spatial transformations which move images between the reference frame and
//! the frame of each gate.
//!
//! Warps are pull-based: every voxel of the output samples the input, with
//! trilinear interpolation, at a mapped position. Whether a `reverse` map
//! really undoes its `forward` partner is the caller's responsibility; it is
//! never checked.

pub mod affine;
pub mod field;
pub mod interpolate;

pub use affine::AffineTransformation;
pub use field::DeformationField;

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::fov::FOV;
use crate::image::{Image, ImageError};
use crate::projdata::gated::gate_file_stem;

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("image grid {found:?} does not match transformation grid {expected:?}")]
    IncompatibleGrid { expected: [usize; 3], found: [usize; 3] },
    #[error("affine matrix is singular")]
    Singular,
    #[error("could not read deformation field: {0}")]
    Read(#[from] ImageError),
}

pub trait SpatialTransformation: Send + Sync + Debug {

    /// Resample `image` through this transformation
    fn warp(&self, image: &Image) -> Result<Image, TransformError>;

    /// Can images on `fov` be warped?
    fn check_compatibility(&self, fov: &FOV) -> Result<(), TransformError>;

    fn is_identity(&self) -> bool { false }
}

/// Leaves images unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl SpatialTransformation for Identity {
    fn warp(&self, image: &Image) -> Result<Image, TransformError> { Ok(image.clone()) }
    fn check_compatibility(&self, _fov: &FOV) -> Result<(), TransformError> { Ok(()) }
    fn is_identity(&self) -> bool { true }
}

/// The maps of one gate: `forward` takes reference-frame images into the
/// gate's frame, `reverse` takes them back.
///
/// `reverse` is assumed to undo `forward`. This is not checked: supplying a
/// consistent pair is up to the caller.
#[derive(Clone, Debug)]
pub struct TransformationPair {
    pub forward: Arc<dyn SpatialTransformation>,
    pub reverse: Arc<dyn SpatialTransformation>,
}

impl TransformationPair {
    pub fn new(forward: Arc<dyn SpatialTransformation>, reverse: Arc<dyn SpatialTransformation>) -> Self {
        Self { forward, reverse }
    }

    pub fn identity() -> Self { Self::new(Arc::new(Identity), Arc::new(Identity)) }
}

/// One `TransformationPair` per gate, in gate order
#[derive(Clone, Debug)]
pub struct GatedSpatialTransformation {
    pairs: Vec<TransformationPair>,
}

impl GatedSpatialTransformation {
    pub fn new(pairs: Vec<TransformationPair>) -> Self { Self { pairs } }

    pub fn identity(num_gates: usize) -> Self {
        Self::new(vec![TransformationPair::identity(); num_gates])
    }

    /// Read forward and reverse deformation fields of gates `1..=num_gates`
    /// from `{prefix}_g{n}_dx.raw` etc.
    pub fn read_deformation_fields(
        fov: FOV,
        forward_prefix: &Path,
        reverse_prefix: &Path,
        num_gates: usize,
    ) -> Result<Self, TransformError> {
        let pairs = (1..=num_gates)
            .map(|n| {
                let forward = DeformationField::read_raw(fov, &gate_file_stem(forward_prefix, n))?;
                let reverse = DeformationField::read_raw(fov, &gate_file_stem(reverse_prefix, n))?;
                Ok(TransformationPair::new(Arc::new(forward), Arc::new(reverse)))
            })
            .collect::<Result<_, TransformError>>()?;
        Ok(Self::new(pairs))
    }

    pub fn num_gates(&self) -> usize { self.pairs.len() }

    pub fn pair(&self, gate: usize) -> &TransformationPair { &self.pairs[gate] }

    pub fn iter(&self) -> impl Iterator<Item = &TransformationPair> { self.pairs.iter() }

    pub fn check_compatibility(&self, fov: &FOV) -> Result<(), TransformError> {
        for pair in &self.pairs {
            pair.forward.check_compatibility(fov)?;
            pair.reverse.check_compatibility(fov)?;
        }
        Ok(())
    }
}
