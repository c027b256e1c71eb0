//! Per-bin multiplicative correction factors (detector efficiency and
//! attenuation) of one gate

use std::fmt::Debug;
use std::sync::Arc;

use crate::projdata::{ProjData, ProjDataInfo};

pub trait BinNormalisation: Send + Sync + Debug {

    /// Can these factors be applied to data with geometry `info`?
    fn is_compatible(&self, info: &ProjDataInfo) -> bool;

    /// Multiply the bins of `data` at `indices` by their factors
    fn apply(&self, data: &mut ProjData, indices: &[usize]);

    /// Are all factors 1?
    fn is_trivial(&self) -> bool { false }
}

/// All factors are 1
#[derive(Clone, Copy, Debug, Default)]
pub struct TrivialNormalisation;

impl BinNormalisation for TrivialNormalisation {
    fn is_compatible(&self, _info: &ProjDataInfo) -> bool { true }
    fn apply(&self, _data: &mut ProjData, _indices: &[usize]) {}
    fn is_trivial(&self) -> bool { true }
}

/// Factors stored as projection data
#[derive(Clone, Debug)]
pub struct ProjDataNormalisation {
    factors: Arc<ProjData>,
}

impl ProjDataNormalisation {
    pub fn new(factors: Arc<ProjData>) -> Self { Self { factors } }
    pub fn factors(&self) -> &ProjData { &self.factors }
}

impl BinNormalisation for ProjDataNormalisation {

    fn is_compatible(&self, info: &ProjDataInfo) -> bool { **self.factors.info() == *info }

    fn apply(&self, data: &mut ProjData, indices: &[usize]) {
        let factors = self.factors.as_slice();
        let data = data.as_mut_slice();
        for &i in indices { data[i] *= factors[i] }
    }
}
