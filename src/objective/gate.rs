//! The linear model of one gate: warp, projection, normalisation and
//! additive term, restricted to one subset of views

use crate::{
    image::Image,
    normalisation::BinNormalisation,
    numerics::{divide, SMALL_NUM},
    projdata::{ProjData, Segments},
    projector::ProjectorPair,
    subsets::ViewSubset,
    transform::TransformationPair,
};
use super::ObjectiveError;

/// Borrowed view of everything the engine needs to know about one gate
#[derive(Clone, Debug)]
pub struct GateModel<'a> {
    pub measured: &'a ProjData,
    pub additive: Option<&'a ProjData>,
    pub normalisation: &'a dyn BinNormalisation,
    pub projector: &'a dyn ProjectorPair,
    pub transformation: &'a TransformationPair,
    /// Gate duration in seconds
    pub weight: f32,
    pub segments: Segments,
    pub zero_seg0_end_planes: bool,
}

type Result<T> = std::result::Result<T, ObjectiveError>;

impl<'a> GateModel<'a> {

    /// Flat indices of the bins taking part in `views`
    pub fn indices(&self, views: &ViewSubset) -> Vec<usize> {
        let info = self.measured.info();
        let indices = info.selected_indices(views, self.segments.clone());
        if self.zero_seg0_end_planes {
            indices.filter(|&i| !info.is_seg0_end_plane(info.bin_from_index(i))).collect()
        } else {
            indices.collect()
        }
    }

    /// `n * P W image`, plus the additive term if requested, at `indices`.
    /// Other bins are zero.
    pub fn forward_project(&self, image: &Image, views: &ViewSubset, indices: &[usize], with_additive: bool) -> Result<ProjData> {
        let warped;
        let image = if self.transformation.forward.is_identity() { image } else {
            warped = self.transformation.forward.warp(image)?;
            &warped
        };
        let mut projected = ProjData::zeros(self.measured.info().clone());
        self.projector.forward_project(&mut projected, image, views, self.segments.clone())?;
        let mut out = ProjData::zeros(self.measured.info().clone());
        out.copy_bins_from(&projected, indices.iter().copied());
        self.normalisation.apply(&mut out, indices);
        if with_additive {
            if let Some(additive) = self.additive {
                let (out, a) = (out.as_mut_slice(), additive.as_slice());
                for &i in indices { out[i] += a[i] }
            }
        }
        Ok(out)
    }

    /// `W' Pᵀ n bins`: adjoint of the forward model without the additive
    /// term. Bins outside `indices` are ignored.
    pub fn back_project(&self, bins: &ProjData, views: &ViewSubset, indices: &[usize], template: &Image) -> Result<Image> {
        let mut weighted = ProjData::zeros(self.measured.info().clone());
        weighted.copy_bins_from(bins, indices.iter().copied());
        self.normalisation.apply(&mut weighted, indices);
        let mut backprojection = Image::zeros(template.fov);
        self.projector.back_project(&mut backprojection, &weighted, views, self.segments.clone())?;
        if self.transformation.reverse.is_identity() { return Ok(backprojection) }
        Ok(self.transformation.reverse.warp(&backprojection)?)
    }

    /// Back projection of `y / ybar`, with 0/0 = 0
    pub fn gradient_term(&self, estimate: &Image, views: &ViewSubset) -> Result<Image> {
        let indices = self.indices(views);
        let expected = self.forward_project(estimate, views, &indices, true)?;
        let ratio = self.measured_over(&expected, &indices);
        self.back_project(&ratio, views, &indices, estimate)
    }

    /// `Σ (y log ybar - ybar)` over bins with `ybar > 0`
    pub fn log_likelihood(&self, estimate: &Image, views: &ViewSubset) -> Result<f64> {
        let indices = self.indices(views);
        let expected = self.forward_project(estimate, views, &indices, true)?;
        let (y, ybar) = (self.measured.as_slice(), expected.as_slice());
        Ok(indices.iter()
           .map(|&i| (y[i] as f64, ybar[i] as f64))
           .filter(|&(_, ybar)| ybar > 0.0)
           .map(|(y, ybar)| y * ybar.ln() - ybar)
           .sum())
    }

    /// Back projection of ones
    pub fn sensitivity_term(&self, views: &ViewSubset, template: &Image) -> Result<Image> {
        let indices = self.indices(views);
        let ones = ProjData::filled(self.measured.info().clone(), 1.0);
        self.back_project(&ones, views, &indices, template)
    }

    /// Back projection of `-y Pv / ybar²`, where `Pv` is the forward
    /// projection of `input` without additive term. Zero where `ybar <= 0`.
    pub fn hessian_term(&self, estimate: &Image, input: &Image, views: &ViewSubset) -> Result<Image> {
        let indices = self.indices(views);
        let expected  = self.forward_project(estimate, views, &indices, true )?;
        let direction = self.forward_project(input   , views, &indices, false)?;
        let mut term = ProjData::zeros(self.measured.info().clone());
        {
            let (y, ybar, pv) = (self.measured.as_slice(), expected.as_slice(), direction.as_slice());
            let out = term.as_mut_slice();
            for &i in &indices {
                if ybar[i] > 0.0 { out[i] = -y[i] * pv[i] / (ybar[i] * ybar[i]) }
            }
        }
        self.back_project(&term, views, &indices, estimate)
    }

    /// Diagonal curvature: back projection of `-y / (A 1)` with 0/0 = 0,
    /// where `A 1` is the forward projection of a uniform image without
    /// additive term
    pub fn curvature_term(&self, template: &Image, views: &ViewSubset) -> Result<Image> {
        let indices = self.indices(views);
        let ones = Image::ones(template.fov);
        let projected_ones = self.forward_project(&ones, views, &indices, false)?;
        let mut ratio = self.measured_over(&projected_ones, &indices);
        for &i in &indices { ratio.as_mut_slice()[i] *= -1.0 }
        self.back_project(&ratio, views, &indices, template)
    }

    /// `y / denominator` at `indices` with 0/0 = 0; zero elsewhere
    fn measured_over(&self, denominator: &ProjData, indices: &[usize]) -> ProjData {
        let (y, d) = (self.measured.as_slice(), denominator.as_slice());
        let mut numerator:   Vec<f32> = indices.iter().map(|&i| y[i]).collect();
        let denominator: Vec<f32> = indices.iter().map(|&i| d[i]).collect();
        divide(&mut numerator, &denominator, SMALL_NUM);
        let mut ratio = ProjData::zeros(self.measured.info().clone());
        let out = ratio.as_mut_slice();
        for (&i, r) in indices.iter().zip(numerator) { out[i] = r }
        ratio
    }
}
