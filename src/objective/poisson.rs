use std::sync::Arc;

#[cfg(not(feature = "serial"))]
use rayon::prelude::*;

use crate::{
    fov::FOV,
    gates::TimeGateDefinitions,
    image::Image,
    normalisation::{BinNormalisation, ProjDataNormalisation, TrivialNormalisation},
    projdata::{GatedProjData, Segments},
    projector::ProjectorPair,
    subsets::{SubsetBalance, SubsetError, SubsetPartition, ViewSubset},
    transform::GatedSpatialTransformation,
};
use super::{
    cache::{CacheKey, SubsetCache},
    gate::GateModel,
    GatedObjectiveFunction, ObjectiveError, ObjectiveKind, ObjectiveParts,
    ObjectiveSettings, SegmentCutoff, SetupError,
};

/// What setup established about the problem
#[derive(Clone, Debug, PartialEq)]
pub(super) struct Prepared {
    pub fov: FOV,
    pub segments: Segments,
    pub partition: SubsetPartition,
}

#[derive(Clone, Debug)]
pub(super) enum Status {
    NotSetUp,
    Ready(Prepared),
    Failed,
}

/// Poisson log-likelihood with a linear model for the mean, over gated
/// projection data with per-gate motion
#[derive(Debug)]
pub struct PoissonGatedObjective {
    kind: ObjectiveKind,
    measured: GatedProjData,
    gate_definitions: TimeGateDefinitions,
    transformations: GatedSpatialTransformation,
    additive: Option<GatedProjData>,
    normalisation: Option<Vec<Arc<dyn BinNormalisation>>>,
    projector: Arc<dyn ProjectorPair>,
    settings: ObjectiveSettings,
    supplied_sensitivities: Option<Vec<Image>>,
    status: Status,
    revision: u64,
    sensitivity: SubsetCache,
    pub(super) curvature: SubsetCache,
}

impl PoissonGatedObjective {

    /// Without motion, or when no transformations are given, every gate uses
    /// identity warps
    pub fn new(kind: ObjectiveKind, parts: ObjectiveParts) -> Self {
        let ObjectiveParts { measured, gate_definitions, transformations, additive, normalisation, projector, settings } = parts;
        let num_gates = measured.num_gates();
        let transformations = match (kind, transformations) {
            (ObjectiveKind::GatedWithMotion, Some(t)) => t,
            _ => GatedSpatialTransformation::identity(num_gates),
        };
        Self {
            kind, measured, gate_definitions, transformations, additive, normalisation, projector, settings,
            supplied_sensitivities: None,
            status: Status::NotSetUp,
            revision: 0,
            sensitivity: SubsetCache::Uninitialized,
            curvature: SubsetCache::Uninitialized,
        }
    }

    // ----- Accessors ------------------------------------------------------------------
    pub fn kind(&self) -> ObjectiveKind { self.kind }
    pub fn measured_data(&self) -> &GatedProjData { &self.measured }
    pub fn additive_data(&self) -> Option<&GatedProjData> { self.additive.as_ref() }
    pub fn time_gate_definitions(&self) -> &TimeGateDefinitions { &self.gate_definitions }
    pub fn transformations(&self) -> &GatedSpatialTransformation { &self.transformations }
    pub fn projector(&self) -> &Arc<dyn ProjectorPair> { &self.projector }
    pub fn settings(&self) -> &ObjectiveSettings { &self.settings }
    pub fn max_segment_to_process(&self) -> SegmentCutoff { self.settings.segment_cutoff }
    pub fn zero_seg0_end_planes(&self) -> bool { self.settings.zero_seg0_end_planes }
    pub fn is_set_up(&self) -> bool { matches!(self.status, Status::Ready(_)) }

    /// Segments taking part, once set up
    pub fn segments(&self) -> Option<Segments> {
        match &self.status {
            Status::Ready(p) => Some(p.segments.clone()),
            _ => None,
        }
    }

    // ----- Setters: all of them require a new setup ---------------------------------------
    pub fn set_measured_data(&mut self, measured: GatedProjData) {
        self.measured = measured;
        self.changed_data();
    }

    pub fn set_additive_data(&mut self, additive: Option<GatedProjData>) {
        self.additive = additive;
        self.changed_data();
    }

    pub fn set_normalisation(&mut self, normalisation: Option<Vec<Arc<dyn BinNormalisation>>>) {
        self.normalisation = normalisation;
        self.changed_data();
    }

    /// One `ProjDataNormalisation` per gate
    pub fn set_normalisation_gated_proj_data(&mut self, factors: GatedProjData) {
        let normalisation = (0..factors.num_gates())
            .map(|g| Arc::new(ProjDataNormalisation::new(Arc::new(factors.gate(g).clone()))) as Arc<dyn BinNormalisation>)
            .collect();
        self.set_normalisation(Some(normalisation));
    }

    pub fn set_transformations(&mut self, transformations: GatedSpatialTransformation) {
        self.transformations = transformations;
        self.changed_data();
    }

    pub fn set_time_gate_definitions(&mut self, gate_definitions: TimeGateDefinitions) {
        self.gate_definitions = gate_definitions;
        self.changed_data();
    }

    pub fn set_projector(&mut self, projector: Arc<dyn ProjectorPair>) {
        self.projector = projector;
        self.changed_data();
    }

    pub fn set_max_segment_to_process(&mut self, cutoff: SegmentCutoff) {
        self.settings.segment_cutoff = cutoff;
        self.changed_data();
    }

    pub fn set_zero_seg0_end_planes(&mut self, zero: bool) {
        self.settings.zero_seg0_end_planes = zero;
        self.changed_data();
    }

    pub fn set_recompute_sensitivity(&mut self, recompute: bool) {
        self.settings.recompute_sensitivity = recompute;
        self.invalidate_caches();
    }

    /// Sensitivities to use instead of computing them, one per subset. Only
    /// used when recomputation is switched off, in which case they replace
    /// any sensitivities in use at the next request.
    pub fn set_sensitivities(&mut self, sensitivities: Vec<Image>) {
        self.supplied_sensitivities = Some(sensitivities);
        self.invalidate_caches();
    }

    fn changed_data(&mut self) {
        if !matches!(self.status, Status::Failed) { self.status = Status::NotSetUp }
        self.invalidate_caches();
    }

    fn invalidate_caches(&mut self) {
        self.revision += 1;
        self.sensitivity.invalidate();
        self.curvature.invalidate();
    }

    pub(super) fn cache_key(&self) -> CacheKey {
        CacheKey { num_subsets: self.settings.num_subsets, revision: self.revision }
    }

    // ----- Setup -----------------------------------------------------------------------
    fn validate(&self, target: &Image) -> Result<Prepared, SetupError> {
        let expected = self.measured.num_gates();
        let count = |what, found| {
            if found == expected { Ok(()) }
            else { Err(SetupError::GateCount { what, expected, found }) }
        };
        count("time gate definition", self.gate_definitions.num_gates())?;
        count("spatial transformation", self.transformations.num_gates())?;
        if let Some(additive) = &self.additive {
            count("additive data", additive.num_gates())?;
            if !additive.has_same_geometry(&self.measured) {
                return Err(SetupError::Geometry { what: "additive data", gate: 0 });
            }
        }
        let info = self.measured.info();
        if let Some(normalisation) = &self.normalisation {
            count("normalisation", normalisation.len())?;
            if let Some(gate) = normalisation.iter().position(|n| !n.is_compatible(info)) {
                return Err(SetupError::Geometry { what: "normalisation", gate });
            }
        }
        let segments = self.settings.segment_cutoff.resolve(info)?;
        self.projector.check_compatibility(&target.fov, info)?;
        self.transformations.check_compatibility(&target.fov)?;
        let partition = SubsetPartition::new(info.num_views(), self.settings.num_subsets)?;
        Ok(Prepared { fov: target.fov, segments, partition })
    }

    // ----- Sensitivities ---------------------------------------------------------------
    /// The sensitivity of `subset`. If not cached, it is computed now or,
    /// with recomputation switched off, taken from the supplied images.
    pub fn subset_sensitivity(&mut self, subset: usize) -> Result<&Image, ObjectiveError> {
        let key = self.cache_key();
        if !self.sensitivity.contains(key, subset) {
            let fov = self.prepared()?.fov;
            self.check_subset(subset)?;
            if self.settings.recompute_sensitivity {
                tracing::info!(subset, "computing sensitivity");
                let mut sensitivity = Image::zeros(fov);
                self.add_subset_sensitivity(&mut sensitivity, subset)?;
                self.sensitivity.insert(key, subset, sensitivity);
            } else {
                self.install_supplied_sensitivities(fov).map_err(ObjectiveError::Sensitivities)?;
            }
        }
        self.sensitivity.get(key, subset).ok_or(ObjectiveError::NotSetUp)
    }

    /// Whether the sensitivity of `subset` is currently cached
    pub fn has_cached_sensitivity(&self, subset: usize) -> bool {
        self.sensitivity.contains(self.cache_key(), subset)
    }

    /// Compute and cache the sensitivities of all subsets
    pub fn precompute_sensitivities(&mut self) -> Result<(), ObjectiveError> {
        for subset in 0..self.settings.num_subsets {
            self.subset_sensitivity(subset)?;
        }
        Ok(())
    }

    fn install_supplied_sensitivities(&mut self, fov: FOV) -> Result<(), String> {
        let key = self.cache_key();
        let supplied = self.supplied_sensitivities.as_ref()
            .ok_or("recomputation is off, but no sensitivities were supplied")?;
        if supplied.len() != key.num_subsets {
            return Err(format!("{} sensitivities supplied for {} subsets", supplied.len(), key.num_subsets));
        }
        if let Some(subset) = supplied.iter().position(|s| s.fov != fov) {
            return Err(format!("sensitivity {subset} is not on the target grid"));
        }
        tracing::info!(subsets = key.num_subsets, "using supplied sensitivities");
        let supplied = supplied.clone();
        self.sensitivity.install(key, supplied);
        Ok(())
    }

    // ----- Engine internals ------------------------------------------------------------
    pub(super) fn prepared(&self) -> Result<&Prepared, ObjectiveError> {
        match &self.status {
            Status::Ready(p) => Ok(p),
            Status::NotSetUp => Err(ObjectiveError::NotSetUp),
            Status::Failed   => Err(ObjectiveError::SetupFailed),
        }
    }

    pub(super) fn check_subset(&self, subset: usize) -> Result<&ViewSubset, ObjectiveError> {
        let partition = &self.prepared()?.partition;
        let num_subsets = partition.num_subsets();
        if subset >= num_subsets { return Err(ObjectiveError::InvalidSubset { subset, num_subsets }) }
        Ok(partition.subset(subset))
    }

    pub(super) fn check_image(&self, image: &Image) -> Result<(), ObjectiveError> {
        let expected = self.prepared()?.fov;
        if image.fov != expected {
            return Err(ObjectiveError::IncompatibleImage { expected: expected.n, found: image.fov.n });
        }
        Ok(())
    }

    /// The operators of every gate, in gate order
    fn gate_models(&self) -> Result<Vec<GateModel<'_>>, ObjectiveError> {
        let prepared = self.prepared()?;
        Ok((0..self.measured.num_gates())
            .map(|g| GateModel {
                measured: self.measured.gate(g),
                additive: self.additive.as_ref().map(|a| a.gate(g)),
                normalisation: match &self.normalisation {
                    Some(n) => n[g].as_ref(),
                    None => &TrivialNormalisation,
                },
                projector: self.projector.as_ref(),
                transformation: self.transformations.pair(g),
                weight: self.gate_definitions.weight(g),
                segments: prepared.segments.clone(),
                zero_seg0_end_planes: self.settings.zero_seg0_end_planes,
            })
            .collect())
    }

    /// Evaluate `term` for every gate of `subset` and return the sum of the
    /// results, weighted by gate duration. Gates run in parallel, but are
    /// summed in gate order.
    pub(super) fn sum_over_gates<F>(&self, subset: usize, term: F) -> Result<Image, ObjectiveError>
    where
        F: Fn(&GateModel, &ViewSubset) -> Result<Image, ObjectiveError> + Sync + Send,
    {
        let views = self.check_subset(subset)?;
        let gates = self.gate_models()?;
        let evaluate = |(g, gate): (usize, &GateModel)| {
            tracing::debug!(gate = g, subset, "gate term");
            term(gate, views)
        };

        #[cfg(feature = "serial")]
        let terms: Vec<_> = gates.iter().enumerate().map(evaluate).collect();
        #[cfg(not(feature = "serial"))]
        let terms: Vec<_> = gates.par_iter().enumerate().map(evaluate).collect();

        let mut sum = Image::zeros(self.prepared()?.fov);
        for (gate, term) in gates.iter().zip(terms) {
            sum.add_scaled(&term?, gate.weight);
        }
        Ok(sum)
    }
}

impl GatedObjectiveFunction for PoissonGatedObjective {

    fn set_up_before_sensitivity(&mut self, target: &Image) -> Result<(), SetupError> {
        if matches!(self.status, Status::Failed) { return Err(SetupError::AlreadyFailed) }
        match self.validate(target) {
            Ok(prepared) => {
                let balance = prepared.partition.balance(self.measured.info(), prepared.segments.clone());
                tracing::debug!(balanced = balance.balanced, gates = self.measured.num_gates(), "set up");
                // Setters invalidate on change; a repeated setup only does so
                // when the target grid differs
                let unchanged = matches!(&self.status, Status::Ready(p) if *p == prepared);
                self.status = Status::Ready(prepared);
                if !unchanged { self.invalidate_caches() }
                Ok(())
            }
            Err(e) => {
                tracing::error!("setup failed: {e}");
                self.status = Status::Failed;
                Err(e)
            }
        }
    }

    fn set_up(&mut self, target: &Image) -> Result<(), SetupError> {
        self.set_up_before_sensitivity(target)?;
        if self.settings.recompute_sensitivity { return Ok(()) }
        let fov = target.fov;
        self.install_supplied_sensitivities(fov).map_err(|e| {
            self.status = Status::Failed;
            SetupError::Sensitivities(e)
        })
    }

    fn construct_target(&self) -> Result<Image, ObjectiveError> {
        Ok(Image::zeros(self.prepared()?.fov))
    }

    fn num_subsets(&self) -> usize { self.settings.num_subsets }

    fn set_num_subsets(&mut self, num_subsets: usize) -> Result<usize, SubsetError> {
        let partition = SubsetPartition::new(self.measured.info().num_views(), num_subsets)?;
        self.settings.num_subsets = num_subsets;
        if let Status::Ready(prepared) = &mut self.status { prepared.partition = partition }
        self.invalidate_caches();
        Ok(num_subsets)
    }

    fn compute_subset_gradient(
        &mut self,
        gradient: &mut Image,
        estimate: &Image,
        subset: usize,
        add_sensitivity: bool,
    ) -> Result<(), ObjectiveError> {
        self.check_image(estimate)?;
        self.check_image(gradient)?;
        let mut result = self.sum_over_gates(subset, |gate, views| gate.gradient_term(estimate, views))?;
        if add_sensitivity {
            result.subtract(self.subset_sensitivity(subset)?);
        }
        gradient.data = result.data;
        Ok(())
    }

    fn compute_subset_objective(&self, estimate: &Image, subset: usize) -> Result<f64, ObjectiveError> {
        self.check_image(estimate)?;
        let views = self.check_subset(subset)?;
        let gates = self.gate_models()?;

        #[cfg(feature = "serial")]
        let terms: Vec<_> = gates.iter().map(|gate| gate.log_likelihood(estimate, views)).collect();
        #[cfg(not(feature = "serial"))]
        let terms: Vec<_> = gates.par_iter().map(|gate| gate.log_likelihood(estimate, views)).collect();

        gates.iter().zip(terms)
            .map(|(gate, term)| term.map(|t| gate.weight as f64 * t))
            .sum()
    }

    fn add_subset_sensitivity(&self, sensitivity: &mut Image, subset: usize) -> Result<(), ObjectiveError> {
        self.check_image(sensitivity)?;
        let template = Image::zeros(sensitivity.fov);
        let sum = self.sum_over_gates(subset, |gate, views| gate.sensitivity_term(views, &template))?;
        sensitivity.add_scaled(&sum, 1.0);
        Ok(())
    }

    fn accumulate_sub_hessian_times_input(
        &self,
        output: &mut Image,
        estimate: &Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError> {
        self.accumulate_hessian(output, estimate, input, subset)
    }

    fn add_multiplication_with_approximate_sub_hessian(
        &mut self,
        output: &mut Image,
        input: &Image,
        subset: usize,
    ) -> Result<(), ObjectiveError> {
        self.add_diagonal_curvature(output, input, subset)
    }

    fn actual_subsets_are_approximately_balanced(&self) -> Result<SubsetBalance, ObjectiveError> {
        let prepared = self.prepared()?;
        Ok(prepared.partition.balance(self.measured.info(), prepared.segments.clone()))
    }
}
