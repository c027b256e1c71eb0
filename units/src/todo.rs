//! Plain `f32` aliases for quantities which are not (yet) `uom` types.
//!
//! Voxel values, system matrix weights and raw lengths flow through hot loops
//! and raw files as bare floats; the aliases record what they mean.

/// Length in mm
pub type Lengthf32    = f32;
/// Probability that an emission in a voxel is detected in a bin
pub type Weightf32    = f32;
/// Activity per voxel, in arbitrary units
pub type Intensityf32 = f32;
