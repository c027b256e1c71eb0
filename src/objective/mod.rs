//! Poisson log-likelihood of gated, motion-affected projection data, as a
//! function of one image shared by all gates.
//!
//! For every gate `g` with measured counts `y_g`, the expected counts are
//!
//! `ybar_g = n_g * P W_g x + a_g`
//!
//! where `W_g` warps the reference-frame image `x` into the gate's frame, `P`
//! is the projector, `n_g` the normalisation and `a_g` the additive term.
//! Gate contributions are weighted by gate duration and summed, after the
//! reverse warp has brought them back to the reference frame.

mod cache;
mod curvature;
pub mod gate;
pub mod poisson;

pub use poisson::PoissonGatedObjective;

use std::str::FromStr;
use std::sync::Arc;

use crate::{
    gates::TimeGateDefinitions,
    image::Image,
    normalisation::BinNormalisation,
    projdata::{GatedProjData, ProjDataInfo, Segments},
    projector::{ProjectionError, ProjectorPair},
    subsets::{SubsetBalance, SubsetError},
    transform::{GatedSpatialTransformation, TransformError},
};

/// Capabilities of a subset-decomposed gated objective function, as consumed
/// by optimizers
pub trait GatedObjectiveFunction: Send + Sync {

    /// Validate the problem against `target` (the voxel grid of all images
    /// passed in later) and prepare the per-gate operators. Sensitivities
    /// are not computed. A failure is final: the object refuses all further
    /// work.
    fn set_up_before_sensitivity(&mut self, target: &Image) -> Result<(), SetupError>;

    /// `set_up_before_sensitivity` followed by preparation of the
    /// sensitivities, either supplied by the caller or marked for
    /// recomputation
    fn set_up(&mut self, target: &Image) -> Result<(), SetupError>;

    /// A zero image on the grid of the setup target
    fn construct_target(&self) -> Result<Image, ObjectiveError>;

    fn num_subsets(&self) -> usize;

    /// Rebuild the subset partition. Cached sensitivities are discarded.
    /// Returns the number of subsets in use.
    fn set_num_subsets(&mut self, num_subsets: usize) -> Result<usize, SubsetError>;

    /// Overwrite `gradient` with the subset's gradient at `estimate`. The
    /// subset sensitivity is subtracted only when `add_sensitivity` is set;
    /// otherwise the result is the back-projected ratio term alone.
    fn compute_subset_gradient(
        &mut self,
        gradient: &mut Image,
        estimate: &Image,
        subset: usize,
        add_sensitivity: bool,
    ) -> Result<(), ObjectiveError>;

    /// `Σ_g w_g Σ_bins (y log ybar - ybar)` over the bins of the subset.
    /// Bins with `ybar <= 0` contribute nothing.
    fn compute_subset_objective(&self, estimate: &Image, subset: usize) -> Result<f64, ObjectiveError>;

    /// Add the sensitivity of `subset` to `sensitivity`
    fn add_subset_sensitivity(&self, sensitivity: &mut Image, subset: usize) -> Result<(), ObjectiveError>;

    /// Add the action of the subset's Hessian at `estimate` on `input` to
    /// `output`
    fn accumulate_sub_hessian_times_input(
        &self,
        output: &mut Image,
        estimate: &Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError>;

    /// Add `d ⊙ input` to `output`, where `d` is a cached diagonal curvature
    /// approximation of the subset
    fn add_multiplication_with_approximate_sub_hessian(
        &mut self,
        output: &mut Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError>;

    /// Compare the number of bins each subset contributes after the segment
    /// cutoff. Imbalance is reported, never an error.
    fn actual_subsets_are_approximately_balanced(&self) -> Result<SubsetBalance, ObjectiveError>;

    fn subsets_are_approximately_balanced(&self) -> Result<bool, ObjectiveError> {
        Ok(self.actual_subsets_are_approximately_balanced()?.balanced)
    }

    /// Objective summed over all subsets
    fn compute_objective(&self, estimate: &Image) -> Result<f64, ObjectiveError> {
        (0..self.num_subsets())
            .map(|subset| self.compute_subset_objective(estimate, subset))
            .sum()
    }
}

/// Which objective to build
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectiveKind {
    /// Every gate is warped with its own transformation pair
    GatedWithMotion,
    /// Gates share the reference frame: all warps are the identity
    GatedWithoutMotion,
}

impl FromStr for ObjectiveKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gated_with_motion"    => Ok(Self::GatedWithMotion),
            "gated_without_motion" => Ok(Self::GatedWithoutMotion),
            _ => Err(format!("unknown objective `{s}`: use `gated_with_motion` or `gated_without_motion`")),
        }
    }
}

/// Ring-difference cutoff: which segments take part
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SegmentCutoff {
    /// Every segment in the data
    #[default]
    DataMaximum,
    /// Segments `-n ..= n`
    Limit(u32),
}

impl SegmentCutoff {

    /// Translate the integer convention, where -1 means the data's maximum
    pub fn from_sentinel(n: i32) -> Option<Self> {
        match n {
            -1 => Some(Self::DataMaximum),
            n if n >= 0 => Some(Self::Limit(n as u32)),
            _ => None,
        }
    }

    pub fn resolve(self, info: &ProjDataInfo) -> Result<Segments, SetupError> {
        let maximum = info.max_segment();
        let limit = match self {
            Self::DataMaximum => maximum,
            Self::Limit(n) if n <= maximum => n,
            Self::Limit(requested) => return Err(SetupError::SegmentCutoff { requested, maximum }),
        };
        let limit = limit as i32;
        Ok(-limit..=limit)
    }
}

/// Settings which do not depend on data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectiveSettings {
    pub num_subsets: usize,
    pub segment_cutoff: SegmentCutoff,
    /// Exclude the first and last axial positions of segment 0
    pub zero_seg0_end_planes: bool,
    /// When false, sensitivities supplied with `set_sensitivities` are used
    pub recompute_sensitivity: bool,
}

impl Default for ObjectiveSettings {
    fn default() -> Self {
        Self {
            num_subsets: 1,
            segment_cutoff: SegmentCutoff::DataMaximum,
            zero_seg0_end_planes: false,
            recompute_sensitivity: true,
        }
    }
}

/// Everything needed to build an objective function
#[derive(Clone, Debug)]
pub struct ObjectiveParts {
    pub measured: GatedProjData,
    pub gate_definitions: TimeGateDefinitions,
    pub transformations: Option<GatedSpatialTransformation>,
    pub additive: Option<GatedProjData>,
    pub normalisation: Option<Vec<Arc<dyn BinNormalisation>>>,
    pub projector: Arc<dyn ProjectorPair>,
    pub settings: ObjectiveSettings,
}

pub fn make_objective_function(kind: ObjectiveKind, parts: ObjectiveParts) -> Box<dyn GatedObjectiveFunction> {
    Box::new(PoissonGatedObjective::new(kind, parts))
}

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("an earlier setup failed; this objective function can no longer be used")]
    AlreadyFailed,
    #[error("{what} has {found} gates, but the measured data have {expected}")]
    GateCount { what: &'static str, expected: usize, found: usize },
    #[error("gate {gate} of the {what} does not share the geometry of the measured data")]
    Geometry { what: &'static str, gate: usize },
    #[error("segment cutoff {requested} exceeds the maximum segment {maximum} in the data")]
    SegmentCutoff { requested: u32, maximum: u32 },
    #[error("invalid subsets: {0}")]
    Subsets(#[from] SubsetError),
    #[error("projector cannot be used with this problem: {0}")]
    Projector(#[from] ProjectionError),
    #[error("transformation cannot be used with this problem: {0}")]
    Transformation(#[from] TransformError),
    #[error("supplied sensitivities unusable: {0}")]
    Sensitivities(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ObjectiveError {
    #[error("objective function has not been set up")]
    NotSetUp,
    #[error("objective function setup failed")]
    SetupFailed,
    #[error("subset {subset} does not exist: there are {num_subsets} subsets")]
    InvalidSubset { subset: usize, num_subsets: usize },
    #[error("image grid {found:?} does not match the setup target {expected:?}")]
    IncompatibleImage { expected: [usize; 3], found: [usize; 3] },
    #[error("sensitivity recomputation is off and supplied sensitivities are unusable: {0}")]
    Sensitivities(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Transformation(#[from] TransformError),
}
