//! Partition of projection views into ordered subsets

use crate::projdata::{ProjDataInfo, Segments};
use crate::utils::group_digits;

/// The views of one subset, in increasing order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubset {
    views: Vec<usize>,
}

impl ViewSubset {
    pub fn new(views: Vec<usize>) -> Self { Self { views } }

    /// Every view of a dataset with `num_views` views
    pub fn all(num_views: usize) -> Self { Self::new((0..num_views).collect()) }

    pub fn views(&self) -> &[usize] { &self.views }
    pub fn len(&self) -> usize { self.views.len() }
    pub fn is_empty(&self) -> bool { self.views.is_empty() }
    pub fn contains(&self, view: usize) -> bool { self.views.binary_search(&view).is_ok() }

    pub fn iter(&self) -> impl Iterator<Item = usize> + Clone + '_ { self.views.iter().copied() }

    /// Deal the views out round-robin into `n` parts. Some parts are empty
    /// when `n` exceeds the number of views.
    pub fn split(&self, n: usize) -> Vec<ViewSubset> {
        (0..n)
            .map(|part| Self::new(self.views.iter().copied().skip(part).step_by(n).collect()))
            .collect()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubsetError {
    #[error("the number of subsets must be at least 1")]
    Zero,
    #[error("cannot split {views} views into {subsets} subsets")]
    TooMany { subsets: usize, views: usize },
}

/// View `v` belongs to subset `v mod num_subsets`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubsetPartition {
    subsets: Vec<ViewSubset>,
}

/// Outcome of the balance check: unbalanced subsets are reported, not fatal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubsetBalance {
    pub balanced: bool,
    pub warning: Option<String>,
}

impl SubsetPartition {

    pub fn new(num_views: usize, num_subsets: usize) -> Result<Self, SubsetError> {
        if num_subsets == 0 { return Err(SubsetError::Zero) }
        if num_subsets > num_views {
            return Err(SubsetError::TooMany { subsets: num_subsets, views: num_views });
        }
        Ok(Self { subsets: ViewSubset::all(num_views).split(num_subsets) })
    }

    pub fn num_subsets(&self) -> usize { self.subsets.len() }

    pub fn subset(&self, i: usize) -> &ViewSubset { &self.subsets[i] }

    pub fn iter(&self) -> impl Iterator<Item = &ViewSubset> { self.subsets.iter() }

    /// Number of bins that each subset contributes within `segments`
    pub fn bins_per_subset(&self, info: &ProjDataInfo, segments: Segments) -> Vec<usize> {
        let bins_per_view: usize = segments
            .map(|s| info.num_axial_positions(s) * info.num_tangential())
            .sum();
        self.subsets.iter().map(|s| s.len() * bins_per_view).collect()
    }

    pub fn balance(&self, info: &ProjDataInfo, segments: Segments) -> SubsetBalance {
        let counts = self.bins_per_subset(info, segments);
        let reference = counts[0];
        match counts.iter().position(|&c| c != reference) {
            None => SubsetBalance { balanced: true, warning: None },
            Some(odd) => {
                let warning = format!(
                    "{} subsets are not balanced: subset 0 has {} bins, subset {odd} has {}. \
                     Choose a number of subsets which divides the {} views.",
                    self.num_subsets(),
                    group_digits(reference),
                    group_digits(counts[odd]),
                    info.num_views(),
                );
                tracing::warn!("{warning}");
                SubsetBalance { balanced: false, warning: Some(warning) }
            }
        }
    }
}
