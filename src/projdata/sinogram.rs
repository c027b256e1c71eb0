use ndarray::Array2;

/// The one canonical address of a sinogram: a (segment, axial position) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinogramIndices {
    pub segment: i32,
    pub axial: usize,
}

/// Adapter for the legacy `(axial, segment)` argument order
impl From<(usize, i32)> for SinogramIndices {
    fn from((axial, segment): (usize, i32)) -> Self { Self { segment, axial } }
}

/// All (view, tangential) bins at one axial position of one segment
#[derive(Clone, Debug, PartialEq)]
pub struct Sinogram {
    indices: SinogramIndices,
    data: Array2<f32>,
}

impl Sinogram {
    pub fn new(indices: SinogramIndices, data: Array2<f32>) -> Self { Self { indices, data } }

    pub fn indices(&self) -> SinogramIndices { self.indices }
    pub fn segment(&self) -> i32 { self.indices.segment }
    pub fn axial  (&self) -> usize { self.indices.axial }

    pub fn num_views     (&self) -> usize { self.data.dim().0 }
    pub fn num_tangential(&self) -> usize { self.data.dim().1 }

    pub fn data    (&    self) -> &    Array2<f32> { &    self.data }
    pub fn data_mut(&mut self) -> &mut Array2<f32> { &mut self.data }
}
