//! Second-order information: the exact Hessian action and a cached diagonal
//! approximation of the curvature

use crate::image::Image;
use super::{ObjectiveError, PoissonGatedObjective};

impl PoissonGatedObjective {

    /// `output += Σ_g w_g W'_g Pᵀ n_g (-y P_g v / ybar²)`
    pub(super) fn accumulate_hessian(
        &self,
        output: &mut Image,
        estimate: &Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError> {
        self.check_image(output)?;
        self.check_image(estimate)?;
        self.check_image(input)?;
        let sum = self.sum_over_gates(subset, |gate, views| gate.hessian_term(estimate, input, views))?;
        output.add_scaled(&sum, 1.0);
        Ok(())
    }

    /// `output += d ⊙ input`. `d` depends only on the data and the model, so it
    /// is computed once per subset and kept until the next change.
    pub(super) fn add_diagonal_curvature(
        &mut self,
        output: &mut Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError> {
        self.check_image(output)?;
        self.check_image(input)?;
        let key = self.cache_key();
        if !self.curvature.contains(key, subset) {
            let template = self.construct_template()?;
            tracing::info!(subset, "computing diagonal curvature");
            let diagonal = self.sum_over_gates(subset, |gate, views| gate.curvature_term(&template, views))?;
            self.curvature.insert(key, subset, diagonal);
        }
        let diagonal = self.curvature.get(key, subset).ok_or(ObjectiveError::NotSetUp)?;
        output.add_product(input, diagonal);
        Ok(())
    }

    fn construct_template(&self) -> Result<Image, ObjectiveError> {
        Ok(Image::zeros(self.prepared()?.fov))
    }

    /// Whether the diagonal curvature of `subset` is currently cached
    pub fn has_cached_curvature(&self, subset: usize) -> bool {
        self.curvature.contains(self.cache_key(), subset)
    }
}
