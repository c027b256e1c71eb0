//! Configuration file parser for gated objective function problems

use std::fs;
use std::str::FromStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, de};

use units::Length;

use crate::{
    fov::FOV,
    gates::{GateDefinitionError, TimeGateDefinitions},
    image::{Image, ImageError},
    io,
    normalisation::{BinNormalisation, ProjDataNormalisation},
    objective::{ObjectiveKind, ObjectiveParts, ObjectiveSettings, SegmentCutoff},
    projdata::{GatedProjData, ProjDataError, ProjDataInfo},
    projector::{MatrixProjector, ProjectionError, ProjectorPair, Replicated},
    transform::{GatedSpatialTransformation, TransformError},
};

fn deserialize_uom_3d<'d, D, T>(deserializer: D) -> Result<(T, T, T), D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let (x, y, z) = <(&str, &str, &str)>::deserialize(deserializer)?;
    tr_tup_res((x.parse(), y.parse(), z.parse()))
        .map_err(de::Error::custom)
}

fn deserialize_kind<'d, D: Deserializer<'d>>(deserializer: D) -> Result<ObjectiveKind, D::Error> {
    <&str>::deserialize(deserializer)?
        .parse()
        .map_err(de::Error::custom)
}

/// Transpose 3-tuple of `Result`
///
/// `Ok` if all elements `Ok`; if any element is an `Err` return the first one.
fn tr_tup_res<O, E>((x,y,z): (Result<O, E>, Result<O, E>, Result<O, E>)) -> Result<(O, O, O), E> {
    Ok((x?, y?, z?))
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// `gated_with_motion` or `gated_without_motion`
    #[serde(deserialize_with = "deserialize_kind")]
    pub objective: ObjectiveKind,

    /// Number of view subsets
    #[serde(default = "default_subsets")]
    pub subsets: usize,

    /// Highest absolute segment number to process; -1 means all segments
    #[serde(default = "default_max_segment")]
    pub max_segment: i32,

    #[serde(default)]
    pub zero_seg0_end_planes: bool,

    #[serde(default = "default_true")]
    pub recompute_sensitivity: bool,

    /// Number of emulated projection devices
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    pub nvoxels: (usize, usize, usize),

    #[serde(deserialize_with = "deserialize_uom_3d")]
    pub fov_size: (Length, Length, Length),

    pub projdata: ProjDataConfig,

    pub files: Files,
}

/// Bin geometry of the projection data
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjDataConfig {
    /// Axial positions per segment, from the most negative segment upwards
    pub axial_positions: Vec<usize>,
    pub views: usize,
    pub tangential: usize,
}

/// Locations of the input data. Gated inputs are given as prefixes: gate `n`
/// is read from `{prefix}_g{n}.raw` (deformation fields from
/// `{prefix}_g{n}_dx.raw` etc.).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Files {
    pub gate_definitions: PathBuf,
    pub measured: PathBuf,
    pub system_matrix: PathBuf,
    pub additive: Option<PathBuf>,
    pub normalisation: Option<PathBuf>,
    pub motion: Option<PathBuf>,
    pub reverse_motion: Option<PathBuf>,
    /// Subset sensitivities `{prefix}_s{n}.raw`, used when
    /// `recompute_sensitivity` is false
    pub sensitivities: Option<PathBuf>,
    /// Image at which to evaluate the objective; uniform if absent
    pub estimate: Option<PathBuf>,
}

fn default_subsets() -> usize { 1 }
fn default_max_segment() -> i32 { -1 }
fn default_true() -> bool { true }
fn default_replicas() -> usize { 1 }

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read config file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    GateDefinitions(#[from] GateDefinitionError),
    #[error(transparent)]
    ProjData(#[from] ProjDataError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Transformation(#[from] TransformError),
    #[error("couldn't read system matrix `{path}`: {source}")]
    SystemMatrix { path: PathBuf, source: binrw::Error },
}

pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.into(), source })?;
    Ok(toml::from_str(&config)?)
}

/// Everything read from the files named in a `Config`
#[derive(Debug)]
pub struct Problem {
    pub kind: ObjectiveKind,
    pub fov: FOV,
    pub parts: ObjectiveParts,
    pub sensitivities: Option<Vec<Image>>,
    pub estimate: Image,
}

impl Config {

    pub fn fov(&self) -> FOV { FOV::new(self.fov_size, self.nvoxels) }

    pub fn settings(&self) -> Result<ObjectiveSettings, ConfigError> {
        let segment_cutoff = SegmentCutoff::from_sentinel(self.max_segment)
            .ok_or_else(|| ConfigError::Invalid(format!("max_segment must be -1 or non-negative, not {}", self.max_segment)))?;
        Ok(ObjectiveSettings {
            num_subsets: self.subsets,
            segment_cutoff,
            zero_seg0_end_planes: self.zero_seg0_end_planes,
            recompute_sensitivity: self.recompute_sensitivity,
        })
    }

    /// Read all input data
    pub fn load_problem(&self) -> Result<Problem, ConfigError> {
        let fov = self.fov();
        let settings = self.settings()?;
        let ProjDataConfig { axial_positions, views, tangential } = self.projdata.clone();
        let info = Arc::new(ProjDataInfo::new(axial_positions, views, tangential)?);
        let files = &self.files;

        let gate_definitions = TimeGateDefinitions::read_gdef_file(&files.gate_definitions)?;
        let n = gate_definitions.num_gates();
        let measured = GatedProjData::read_raw(info.clone(), &files.measured, n)?;
        let additive = files.additive.as_deref()
            .map(|prefix| GatedProjData::read_raw(info.clone(), prefix, n))
            .transpose()?;
        let normalisation = files.normalisation.as_deref()
            .map(|prefix| GatedProjData::read_raw(info.clone(), prefix, n))
            .transpose()?
            .map(|factors| factors.iter()
                 .map(|gate| Arc::new(ProjDataNormalisation::new(Arc::new(gate.clone()))) as Arc<dyn BinNormalisation>)
                 .collect());

        let transformations = match (self.objective, &files.motion, &files.reverse_motion) {
            (ObjectiveKind::GatedWithoutMotion, _, _) => None,
            (ObjectiveKind::GatedWithMotion, Some(forward), Some(reverse)) =>
                Some(GatedSpatialTransformation::read_deformation_fields(fov, forward, reverse, n)?),
            (ObjectiveKind::GatedWithMotion, _, _) => return Err(ConfigError::Invalid(
                "gated_with_motion needs both `files.motion` and `files.reverse_motion`".into())),
        };

        let elements = io::matrix::read(&files.system_matrix)
            .map_err(|source| ConfigError::SystemMatrix { path: files.system_matrix.clone(), source })?;
        let matrix = MatrixProjector::from_elements(fov, info, &elements)?;
        let projector: Arc<dyn ProjectorPair> = match self.replicas {
            1 => Arc::new(matrix),
            n => Arc::new(Replicated::new(matrix, n)?),
        };

        let sensitivities = match (self.recompute_sensitivity, &files.sensitivities) {
            (true, _) => None,
            (false, Some(prefix)) => Some((1..=self.subsets)
                .map(|s| Image::from_raw_file(&subset_file(prefix, s), fov))
                .collect::<Result<Vec<_>, _>>()?),
            (false, None) => return Err(ConfigError::Invalid(
                "recompute_sensitivity = false needs `files.sensitivities`".into())),
        };

        let estimate = match &files.estimate {
            Some(path) => Image::from_raw_file(path, fov)?,
            None       => Image::ones(fov),
        };

        Ok(Problem {
            kind: self.objective,
            fov,
            parts: ObjectiveParts { measured, gate_definitions, transformations, additive, normalisation, projector, settings },
            sensitivities,
            estimate,
        })
    }
}

/// `{prefix}_s{n}.raw`: image belonging to subset `n`, counting from 1
pub fn subset_file(prefix: &Path, n: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_s{n}.raw"));
    name.into()
}
