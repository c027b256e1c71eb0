//! Projection data: a ragged (segment, axial position, view, tangential
//! position) space of bins

pub mod sinogram;
pub mod gated;

pub use sinogram::{Sinogram, SinogramIndices};
pub use gated::GatedProjData;

use std::ops::{Index, IndexMut, RangeInclusive};
use std::path::Path;
use std::sync::Arc;

use itertools::iproduct;
use ndarray::{Array2, ArrayView3, ArrayViewMut3};

use crate::io;
use crate::subsets::ViewSubset;

/// Inclusive range of segment numbers
pub type Segments = RangeInclusive<i32>;

#[derive(thiserror::Error, Debug)]
pub enum ProjDataError {
    #[error("could not read projection data: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid projection data geometry: {0}")]
    Geometry(String),
    #[error("projection data contains {found} bins, but its geometry needs {expected}")]
    WrongSize { expected: usize, found: usize },
    #[error("gate {gate} does not share the bin geometry of gate 0")]
    GateGeometryMismatch { gate: usize },
    #[error("gated projection data needs at least one gate")]
    NoGates,
    #[error("sinogram {indices:?} does not exist in this geometry")]
    NoSuchSinogram { indices: SinogramIndices },
}

/// Address of a single bin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bin {
    pub segment: i32,
    pub axial: usize,
    pub view: usize,
    pub tangential: usize,
}

/// The bin geometry shared by all gates of a dataset.
///
/// Segments are numbered `-max_segment ..= max_segment`; each has its own
/// number of axial positions, but all share the view and tangential
/// dimensions. Bins are stored segment by segment (ascending), then by axial
/// position, view and tangential position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjDataInfo {
    axial_positions: Vec<usize>,
    num_views: usize,
    num_tangential: usize,
    offsets: Vec<usize>,
}

impl ProjDataInfo {

    /// `axial_positions[k]` is the number of axial positions in segment
    /// `k - max_segment`, so its length must be odd.
    pub fn new(axial_positions: Vec<usize>, num_views: usize, num_tangential: usize) -> Result<Self, ProjDataError> {
        let geometry = |msg: &str| Err(ProjDataError::Geometry(msg.into()));
        if axial_positions.len() % 2 != 1 { return geometry("number of segments must be odd") }
        if axial_positions.iter().any(|&n| n == 0) { return geometry("every segment needs at least one axial position") }
        if num_views      == 0 { return geometry("need at least one view") }
        if num_tangential == 0 { return geometry("need at least one tangential position") }
        let sinogram_size = num_views * num_tangential;
        let offsets = axial_positions.iter()
            .scan(0, |offset, &n| {
                let this = *offset;
                *offset += n * sinogram_size;
                Some(this)
            })
            .collect();
        Ok(Self { axial_positions, num_views, num_tangential, offsets })
    }

    pub fn max_segment(&self) -> u32 { ((self.axial_positions.len() - 1) / 2) as u32 }

    /// All segments present in the data
    pub fn segments(&self) -> Segments {
        let m = self.max_segment() as i32;
        -m..=m
    }

    pub fn has_segment(&self, segment: i32) -> bool { segment.unsigned_abs() <= self.max_segment() }

    pub fn num_views     (&self) -> usize { self.num_views      }
    pub fn num_tangential(&self) -> usize { self.num_tangential }

    fn segment_position(&self, segment: i32) -> usize { (segment + self.max_segment() as i32) as usize }

    pub fn num_axial_positions(&self, segment: i32) -> usize {
        self.axial_positions[self.segment_position(segment)]
    }

    pub fn segment_size(&self, segment: i32) -> usize {
        self.num_axial_positions(segment) * self.num_views * self.num_tangential
    }

    pub fn num_bins(&self) -> usize {
        self.axial_positions.iter().sum::<usize>() * self.num_views * self.num_tangential
    }

    /// Position of the first bin of `segment` in flat storage
    pub fn segment_offset(&self, segment: i32) -> usize { self.offsets[self.segment_position(segment)] }

    pub fn bin_index(&self, Bin { segment, axial, view, tangential }: Bin) -> usize {
        self.segment_offset(segment) + (axial * self.num_views + view) * self.num_tangential + tangential
    }

    pub fn bin_from_index(&self, index: usize) -> Bin {
        let position = self.offsets.partition_point(|&o| o <= index) - 1;
        let segment = position as i32 - self.max_segment() as i32;
        let within = index - self.offsets[position];
        let tangential = within % self.num_tangential;
        let sinogram_position = within / self.num_tangential;
        let view  = sinogram_position % self.num_views;
        let axial = sinogram_position / self.num_views;
        Bin { segment, axial, view, tangential }
    }

    /// Flat indices of all bins in the given views and segments
    pub fn selected_indices<'a>(&'a self, views: &'a ViewSubset, segments: Segments) -> impl Iterator<Item = usize> + 'a {
        segments.flat_map(move |segment| {
            iproduct!(0..self.num_axial_positions(segment), views.iter())
                .flat_map(move |(axial, view)| {
                    let start = self.bin_index(Bin { segment, axial, view, tangential: 0 });
                    start..start + self.num_tangential
                })
        })
    }

    /// Is `bin` in the first or last axial position of segment 0?
    pub fn is_seg0_end_plane(&self, bin: Bin) -> bool {
        bin.segment == 0 && (bin.axial == 0 || bin.axial + 1 == self.num_axial_positions(0))
    }
}

/// Dense storage of one dataset, e.g. the measured counts of one gate
#[derive(Clone, Debug, PartialEq)]
pub struct ProjData {
    info: Arc<ProjDataInfo>,
    data: Vec<f32>,
}

impl ProjData {

    pub fn zeros(info: Arc<ProjDataInfo>) -> Self { Self::filled(info, 0.0) }

    pub fn filled(info: Arc<ProjDataInfo>, value: f32) -> Self {
        let data = vec![value; info.num_bins()];
        Self { info, data }
    }

    pub fn from_vec(info: Arc<ProjDataInfo>, data: Vec<f32>) -> Result<Self, ProjDataError> {
        let expected = info.num_bins();
        if data.len() != expected {
            return Err(ProjDataError::WrongSize { expected, found: data.len() });
        }
        Ok(Self { info, data })
    }

    pub fn info(&self) -> &Arc<ProjDataInfo> { &self.info }

    pub fn as_slice    (&    self) -> &    [f32] { &    self.data }
    pub fn as_mut_slice(&mut self) -> &mut [f32] { &mut self.data }

    pub fn fill(&mut self, value: f32) { self.data.iter_mut().for_each(|v| *v = value) }

    pub fn has_same_geometry(&self, other: &ProjData) -> bool { self.info == other.info }

    /// (axial, view, tangential) view of one segment
    pub fn segment(&self, segment: i32) -> Option<ArrayView3<f32>> {
        if !self.info.has_segment(segment) { return None }
        let (start, shape) = self.segment_layout(segment);
        ArrayView3::from_shape(shape, &self.data[start..start + self.info.segment_size(segment)]).ok()
    }

    pub fn segment_mut(&mut self, segment: i32) -> Option<ArrayViewMut3<f32>> {
        if !self.info.has_segment(segment) { return None }
        let (start, shape) = self.segment_layout(segment);
        let size = self.info.segment_size(segment);
        ArrayViewMut3::from_shape(shape, &mut self.data[start..start + size]).ok()
    }

    fn segment_layout(&self, segment: i32) -> (usize, (usize, usize, usize)) {
        let info = &self.info;
        (info.segment_offset(segment),
         (info.num_axial_positions(segment), info.num_views, info.num_tangential))
    }

    pub fn sinogram(&self, indices: SinogramIndices) -> Option<Sinogram> {
        let SinogramIndices { segment, axial } = indices;
        let segment_data = self.segment(segment)?;
        if axial >= segment_data.dim().0 { return None }
        let data: Array2<f32> = segment_data.index_axis(ndarray::Axis(0), axial).to_owned();
        Some(Sinogram::new(indices, data))
    }

    pub fn set_sinogram(&mut self, sinogram: &Sinogram) -> Result<(), ProjDataError> {
        let indices = sinogram.indices();
        let no_such = || ProjDataError::NoSuchSinogram { indices };
        let mut segment_data = self.segment_mut(indices.segment).ok_or_else(no_such)?;
        if indices.axial >= segment_data.dim().0 { return Err(no_such()) }
        let mut target = segment_data.index_axis_mut(ndarray::Axis(0), indices.axial);
        if target.dim() != sinogram.data().dim() { return Err(no_such()) }
        target.assign(sinogram.data());
        Ok(())
    }

    /// Copy the values at `indices` from `other`, which must share this geometry
    pub fn copy_bins_from(&mut self, other: &ProjData, indices: impl Iterator<Item = usize>) {
        debug_assert!(self.has_same_geometry(other));
        for i in indices { self.data[i] = other.data[i] }
    }

    pub fn sum(&self) -> f64 { self.data.iter().map(|&v| v as f64).sum() }

    pub fn read_raw(info: Arc<ProjDataInfo>, path: &Path) -> Result<Self, ProjDataError> {
        let data = io::raw::read(path)?;
        Self::from_vec(info, data)
    }

    pub fn write_raw(&self, path: &Path) -> std::io::Result<()> {
        io::raw::write(self.data.iter().copied(), path)
    }
}

impl Index<Bin> for ProjData {
    type Output = f32;
    fn index(&self, bin: Bin) -> &Self::Output { &self.data[self.info.bin_index(bin)] }
}

impl IndexMut<Bin> for ProjData {
    fn index_mut(&mut self, bin: Bin) -> &mut Self::Output {
        let i = self.info.bin_index(bin);
        &mut self.data[i]
    }
}
