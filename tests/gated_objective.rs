use std::error::Error;
use std::sync::Arc;

use float_eq::assert_float_eq;
#[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
use rstest::rstest;
use units::{mm, s};

use gatedpet::{
    fov::FOV,
    gates::TimeGateDefinitions,
    image::Image,
    io::matrix::MatrixElement,
    numerics::{divide, SMALL_NUM},
    objective::{ObjectiveError, ObjectiveParts, ObjectiveSettings, SegmentCutoff, SetupError},
    projdata::{GatedProjData, ProjData, ProjDataInfo},
    projector::{MatrixProjector, ProjectorPair, Replicated},
    subsets::ViewSubset,
    transform::{AffineTransformation, DeformationField, GatedSpatialTransformation, TransformationPair},
    make_objective_function, GatedObjectiveFunction, ObjectiveKind, PoissonGatedObjective,
};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

// ----- A single voxel seen by a single bin ---------------------------------------------------
fn one_voxel() -> FOV { FOV::new((mm(1.0), mm(1.0), mm(1.0)), (1, 1, 1)) }
fn one_bin() -> Arc<ProjDataInfo> { Arc::new(ProjDataInfo::new(vec![1], 1, 1).unwrap()) }

fn gated(info: &Arc<ProjDataInfo>, gates: &[&[f32]]) -> Result<GatedProjData> {
    let gates = gates.iter()
        .map(|data| ProjData::from_vec(info.clone(), data.to_vec()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(GatedProjData::new(gates)?)
}

/// Two gates of 1 s and 2 s, measuring 4 and 9 counts in the only bin
fn two_gate_parts() -> Result<ObjectiveParts> {
    let info = one_bin();
    Ok(ObjectiveParts {
        measured: gated(&info, &[&[4.0], &[9.0]])?,
        gate_definitions: TimeGateDefinitions::from_durations([s(1.0), s(2.0)])?,
        transformations: None,
        additive: Some(gated(&info, &[&[0.0], &[0.0]])?),
        normalisation: None,
        projector: Arc::new(MatrixProjector::identity(one_voxel(), info)?),
        settings: ObjectiveSettings::default(),
    })
}

#[test]
fn two_gate_scenario() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithMotion, two_gate_parts()?);
    let estimate = Image::filled(one_voxel(), 2.0);
    objective.set_up(&estimate)?;

    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, false)?;
    assert_float_eq!(gradient.data[0], 11.0, rmax <= 1e-6);

    let mut sensitivity = objective.construct_target()?;
    objective.add_subset_sensitivity(&mut sensitivity, 0)?;
    assert_float_eq!(sensitivity.data[0], 3.0, rmax <= 1e-6);

    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert_float_eq!(gradient.data[0], 8.0, rmax <= 1e-6);

    // 1 (4 ln 2 - 2) + 2 (9 ln 2 - 2)
    let expected = 22.0 * 2_f64.ln() - 6.0;
    assert_float_eq!(objective.compute_subset_objective(&estimate, 0)?, expected, rmax <= 1e-6);
    Ok(())
}

#[test]
fn two_gate_hessian_and_curvature() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, two_gate_parts()?);
    let estimate = Image::filled(one_voxel(), 2.0);
    objective.set_up(&estimate)?;
    let input = Image::ones(one_voxel());

    // -(1 * 4/4 + 2 * 9/4), added to what is already there
    let mut output = Image::filled(one_voxel(), 1.0);
    objective.accumulate_sub_hessian_times_input(&mut output, &estimate, &input, 0)?;
    assert_float_eq!(output.data[0], 1.0 - 5.5, rmax <= 1e-6);

    // -(1 * 4/1 + 2 * 9/1)
    let mut output = objective.construct_target()?;
    assert!(!objective.has_cached_curvature(0));
    objective.add_multiplication_with_approximate_sub_hessian(&mut output, &input, 0)?;
    assert!(objective.has_cached_curvature(0));
    assert_float_eq!(output.data[0], -22.0, rmax <= 1e-6);
    objective.add_multiplication_with_approximate_sub_hessian(&mut output, &Image::filled(one_voxel(), 0.5), 0)?;
    assert_float_eq!(output.data[0], -33.0, rmax <= 1e-6);
    Ok(())
}

#[test]
fn supplied_sensitivities_replace_computation() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, two_gate_parts()?);
    let estimate = Image::filled(one_voxel(), 2.0);
    objective.set_recompute_sensitivity(false);
    objective.set_sensitivities(vec![Image::filled(one_voxel(), 7.0)]);
    objective.set_up(&estimate)?;
    assert!(objective.has_cached_sensitivity(0));

    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert_float_eq!(gradient.data[0], 4.0, rmax <= 1e-6);
    Ok(())
}

#[test]
fn supplied_sensitivities_follow_later_changes() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, two_gate_parts()?);
    let estimate = Image::filled(one_voxel(), 2.0);
    objective.set_recompute_sensitivity(false);
    objective.set_sensitivities(vec![Image::filled(one_voxel(), 7.0)]);
    objective.set_up(&estimate)?;
    let mut gradient = objective.construct_target()?;

    // 11 - 9
    objective.set_sensitivities(vec![Image::filled(one_voxel(), 9.0)]);
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert_float_eq!(gradient.data[0], 2.0, rmax <= 1e-6);

    // 11 - 3
    objective.set_recompute_sensitivity(true);
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert_float_eq!(gradient.data[0], 8.0, rmax <= 1e-6);

    objective.set_recompute_sensitivity(false);
    objective.set_sensitivities(vec![]);
    let result = objective.compute_subset_gradient(&mut gradient, &estimate, 0, true);
    assert!(matches!(result, Err(ObjectiveError::Sensitivities(_))));
    Ok(())
}

#[test]
fn missing_supplied_sensitivities_fail_setup() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, two_gate_parts()?);
    objective.set_recompute_sensitivity(false);
    let result = objective.set_up(&Image::ones(one_voxel()));
    assert!(matches!(result, Err(SetupError::Sensitivities(_))));
    Ok(())
}

#[test]
fn zero_over_zero_contributes_nothing() -> Result<()> {
    // Bin 1 sees no voxel, has no additive term and measures nothing
    let fov = FOV::new((mm(2.0), mm(1.0), mm(1.0)), (2, 1, 1));
    let info = Arc::new(ProjDataInfo::new(vec![1], 2, 1)?);
    let elements = [MatrixElement { bin: 0, voxel: 0, weight: 1.0 }];
    let parts = ObjectiveParts {
        measured: gated(&info, &[&[4.0, 0.0]])?,
        gate_definitions: TimeGateDefinitions::from_durations([s(1.0)])?,
        transformations: None,
        additive: None,
        normalisation: None,
        projector: Arc::new(MatrixProjector::from_elements(fov, info, &elements)?),
        settings: ObjectiveSettings::default(),
    };
    let mut objective = make_objective_function(ObjectiveKind::GatedWithoutMotion, parts);
    let estimate = Image::ones(fov);
    objective.set_up(&estimate)?;

    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert!(gradient.data.iter().all(|g| g.is_finite()));
    assert_eq!(gradient.data, vec![3.0, 0.0]);

    let value = objective.compute_objective(&estimate)?;
    assert_float_eq!(value, 4.0 * 1_f64.ln() - 1.0, abs <= 1e-9);
    Ok(())
}

// ----- Several voxels, views and gates -------------------------------------------------------
fn fov () -> FOV { FOV::new((mm(3.0), mm(2.0), mm(1.0)), (3, 2, 1)) }
fn info() -> Arc<ProjDataInfo> { Arc::new(ProjDataInfo::new(vec![1], 4, 2).unwrap()) }

// Every bin sees two voxels, with weights depending on the bin
fn matrix() -> MatrixProjector {
    let elements: Vec<MatrixElement> = (0..8_u32)
        .flat_map(|bin| [
            MatrixElement { bin, voxel:  bin      % 6, weight: 1.0 + bin as f32 / 10.0 },
            MatrixElement { bin, voxel: (bin * 5 + 1) % 6, weight: 0.5 },
        ])
        .collect();
    MatrixProjector::from_elements(fov(), info(), &elements).unwrap()
}

fn measured(gate: usize) -> Vec<f32> {
    (0..8).map(|bin| ((bin * 3 + gate * 5) % 7) as f32).collect()
}

fn parts(num_gates: usize, projector: Arc<dyn ProjectorPair>) -> Result<ObjectiveParts> {
    let info = info();
    let measured = (0..num_gates).map(measured).collect::<Vec<_>>();
    let measured = measured.iter().map(|m| m.as_slice()).collect::<Vec<_>>();
    let additive = vec![0.25_f32; 8];
    let additive = vec![additive.as_slice(); num_gates];
    Ok(ObjectiveParts {
        measured: gated(&info, &measured)?,
        gate_definitions: TimeGateDefinitions::from_durations((0..num_gates).map(|g| s(1.0 + g as f32)))?,
        transformations: None,
        additive: Some(gated(&info, &additive)?),
        normalisation: None,
        projector,
        settings: ObjectiveSettings::default(),
    })
}

fn estimate() -> Image { Image::new(fov(), vec![1.0, 2.0, 0.5, 3.0, 0.0, 1.5]) }

fn set_up(num_gates: usize, num_subsets: usize) -> Result<PoissonGatedObjective> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts(num_gates, Arc::new(matrix()))?);
    objective.set_num_subsets(num_subsets)?;
    objective.set_up(&estimate())?;
    Ok(objective)
}

#[test]
fn single_gate_matches_ungated_gradient() -> Result<()> {
    let objective = {
        let mut parts = parts(1, Arc::new(matrix()))?;
        parts.transformations = Some(GatedSpatialTransformation::identity(1));
        let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithMotion, parts);
        objective.set_up(&estimate())?;
        objective
    };
    let mut objective = objective;
    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate(), 0, true)?;

    // Ungated: Pᵀ (y / (P x + a)) - Pᵀ 1
    let (projector, views) = (matrix(), ViewSubset::all(4));
    let mut expected_counts = ProjData::zeros(info());
    projector.forward_project(&mut expected_counts, &estimate(), &views, 0..=0)?;
    let denominator: Vec<f32> = expected_counts.as_slice().iter().map(|p| p + 0.25).collect();
    let mut ratio = measured(0);
    divide(&mut ratio, &denominator, SMALL_NUM);
    let ratio = ProjData::from_vec(info(), ratio)?;
    let mut expected = Image::zeros(fov());
    projector.back_project(&mut expected, &ratio, &views, 0..=0)?;
    let mut sensitivity = Image::zeros(fov());
    projector.back_project(&mut sensitivity, &ProjData::filled(info(), 1.0), &views, 0..=0)?;
    expected.subtract(&sensitivity);

    assert_float_eq!(gradient.data, expected.data, abs_all <= 1e-5);
    Ok(())
}

#[rstest]
#[case(2)]
#[case(4)]
fn subset_objectives_sum_to_full_objective(#[case] num_subsets: usize) -> Result<()> {
    let full = set_up(3, 1)?.compute_objective(&estimate())?;
    let objective = set_up(3, num_subsets)?;
    let parts = (0..num_subsets)
        .map(|subset| objective.compute_subset_objective(&estimate(), subset))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    assert_float_eq!(parts.iter().sum::<f64>(), full, abs <= 1e-6);
    Ok(())
}

#[test]
fn subset_gradients_sum_to_full_gradient() -> Result<()> {
    let mut full = set_up(2, 1)?;
    let mut expected = full.construct_target()?;
    full.compute_subset_gradient(&mut expected, &estimate(), 0, true)?;

    let mut objective = set_up(2, 2)?;
    let mut sum = objective.construct_target()?;
    for subset in 0..2 {
        let mut gradient = objective.construct_target()?;
        objective.compute_subset_gradient(&mut gradient, &estimate(), subset, true)?;
        sum.add_scaled(&gradient, 1.0);
    }
    assert_float_eq!(sum.data, expected.data, abs_all <= 1e-4);
    Ok(())
}

#[test]
fn sensitivity_is_deterministic() -> Result<()> {
    let objective = set_up(3, 2)?;
    let mut first  = objective.construct_target()?;
    let mut second = objective.construct_target()?;
    objective.add_subset_sensitivity(&mut first , 1)?;
    objective.add_subset_sensitivity(&mut second, 1)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn changing_subsets_invalidates_cached_sensitivity() -> Result<()> {
    let mut objective = set_up(2, 2)?;
    let before = objective.subset_sensitivity(0)?.clone();
    assert!(objective.has_cached_sensitivity(0));

    assert_eq!(objective.set_num_subsets(4)?, 4);
    assert!(!objective.has_cached_sensitivity(0));
    let after = objective.subset_sensitivity(0)?.clone();
    let mut direct = objective.construct_target()?;
    objective.add_subset_sensitivity(&mut direct, 0)?;
    assert_eq!(after, direct);
    assert_ne!(after, before);
    Ok(())
}

#[test]
fn supplied_sensitivities_must_match_subset_count() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts(1, Arc::new(matrix()))?);
    objective.set_recompute_sensitivity(false);
    objective.set_sensitivities(vec![Image::ones(fov())]);
    objective.set_up(&estimate())?;
    assert_eq!(objective.subset_sensitivity(0)?, &Image::ones(fov()));

    objective.set_num_subsets(2)?;
    assert!(matches!(objective.subset_sensitivity(0), Err(ObjectiveError::Sensitivities(_))));
    objective.set_sensitivities(vec![Image::ones(fov()), Image::filled(fov(), 2.0)]);
    assert_eq!(objective.subset_sensitivity(1)?, &Image::filled(fov(), 2.0));
    Ok(())
}

#[test]
fn repeated_setup_keeps_cached_sensitivity() -> Result<()> {
    let mut objective = set_up(2, 2)?;
    let before = objective.subset_sensitivity(1)?.clone();
    objective.set_up(&estimate())?;
    assert!(objective.has_cached_sensitivity(1));
    assert_eq!(objective.subset_sensitivity(1)?, &before);
    Ok(())
}

#[test]
fn changing_normalisation_invalidates_cached_sensitivity() -> Result<()> {
    let mut objective = set_up(2, 1)?;
    let before = objective.subset_sensitivity(0)?.clone();

    objective.set_normalisation_gated_proj_data(GatedProjData::filled(info(), 2, 2.0)?);
    assert!(!objective.has_cached_sensitivity(0));
    assert!(matches!(objective.subset_sensitivity(0), Err(ObjectiveError::NotSetUp)));
    objective.set_up(&estimate())?;
    let after = objective.subset_sensitivity(0)?;
    assert_float_eq!(after.data, before.data.iter().map(|v| 2.0 * v).collect::<Vec<_>>(), rmax_all <= 1e-6);
    Ok(())
}

#[test]
fn gate_count_mismatch_fails_setup_for_good() -> Result<()> {
    let mut parts = parts(3, Arc::new(matrix()))?;
    parts.transformations = Some(GatedSpatialTransformation::identity(2));
    let mut objective = make_objective_function(ObjectiveKind::GatedWithMotion, parts);

    let result = objective.set_up_before_sensitivity(&estimate());
    assert!(matches!(result, Err(SetupError::GateCount { expected: 3, found: 2, .. })));
    assert!(matches!(objective.compute_subset_objective(&estimate(), 0), Err(ObjectiveError::SetupFailed)));
    assert!(matches!(objective.set_up(&estimate()), Err(SetupError::AlreadyFailed)));
    Ok(())
}

#[test]
fn transformations_are_ignored_without_motion() -> Result<()> {
    let mut parts = parts(3, Arc::new(matrix()))?;
    parts.transformations = Some(GatedSpatialTransformation::identity(2));
    let mut objective = make_objective_function(ObjectiveKind::GatedWithoutMotion, parts);
    objective.set_up(&estimate())?;
    Ok(())
}

#[test]
fn gate_definition_count_mismatch_fails_setup() -> Result<()> {
    let mut parts = parts(3, Arc::new(matrix()))?;
    parts.gate_definitions = TimeGateDefinitions::from_durations([s(1.0), s(1.0)])?;
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts);
    let result = objective.set_up(&estimate());
    assert!(matches!(result, Err(SetupError::GateCount { what: "time gate definition", .. })));
    Ok(())
}

// Segments -1, 0, +1 with one bin each; voxel i is seen by bin i only
#[rstest]
#[case(SegmentCutoff::Limit(0),    0..=0, [0.0, 3.0, 0.0], [0.0, 1.0, 0.0], -1.0)]
#[case(SegmentCutoff::DataMaximum, -1..=1, [3.0, 3.0, 3.0], [1.0, 1.0, 1.0], -3.0)]
fn segment_cutoff_drops_oblique_segments(
    #[case] cutoff: SegmentCutoff,
    #[case] segments: std::ops::RangeInclusive<i32>,
    #[case] expected_gradient: [f32; 3],
    #[case] expected_sensitivity: [f32; 3],
    #[case] expected_objective: f64,
) -> Result<()> {
    let fov = FOV::new((mm(3.0), mm(1.0), mm(1.0)), (3, 1, 1));
    let info = Arc::new(ProjDataInfo::new(vec![1, 1, 1], 1, 1)?);
    let parts = ObjectiveParts {
        measured: gated(&info, &[&[4.0, 4.0, 4.0]])?,
        gate_definitions: TimeGateDefinitions::from_durations([s(1.0)])?,
        transformations: None,
        additive: None,
        normalisation: None,
        projector: Arc::new(MatrixProjector::identity(fov, info)?),
        settings: ObjectiveSettings { segment_cutoff: cutoff, ..ObjectiveSettings::default() },
    };
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts);
    let estimate = Image::ones(fov);
    objective.set_up(&estimate)?;
    assert_eq!(objective.segments(), Some(segments));

    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, true)?;
    assert_float_eq!(gradient.data, expected_gradient.to_vec(), abs_all <= 1e-6);
    assert_float_eq!(objective.subset_sensitivity(0)?.data, expected_sensitivity.to_vec(), abs_all <= 1e-6);
    // 4 ln 1 - 1 per processed bin
    assert_float_eq!(objective.compute_subset_objective(&estimate, 0)?, expected_objective, abs <= 1e-9);
    Ok(())
}

#[test]
fn segment_cutoff_beyond_data_fails_setup() -> Result<()> {
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts(1, Arc::new(matrix()))?);
    objective.set_max_segment_to_process(SegmentCutoff::Limit(1));
    let result = objective.set_up(&estimate());
    assert!(matches!(result, Err(SetupError::SegmentCutoff { requested: 1, maximum: 0 })));
    Ok(())
}

#[test]
fn operations_need_setup() -> Result<()> {
    let objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithoutMotion, parts(1, Arc::new(matrix()))?);
    assert!(matches!(objective.compute_subset_objective(&estimate(), 0), Err(ObjectiveError::NotSetUp)));
    assert!(matches!(objective.construct_target(), Err(ObjectiveError::NotSetUp)));
    Ok(())
}

#[test]
fn invalid_subset_and_image_are_rejected() -> Result<()> {
    let objective = set_up(1, 2)?;
    assert!(matches!(objective.compute_subset_objective(&estimate(), 2),
                     Err(ObjectiveError::InvalidSubset { subset: 2, num_subsets: 2 })));
    let wrong = Image::ones(one_voxel());
    assert!(matches!(objective.compute_subset_objective(&wrong, 0),
                     Err(ObjectiveError::IncompatibleImage { .. })));
    Ok(())
}

#[rstest]
#[case(2, true )]
#[case(3, false)]
#[case(4, true )]
fn subset_balance(#[case] num_subsets: usize, #[case] balanced: bool) -> Result<()> {
    let objective = set_up(1, num_subsets)?;
    let balance = objective.actual_subsets_are_approximately_balanced()?;
    assert_eq!(balance.balanced, balanced);
    assert_eq!(balance.warning.is_some(), !balanced);
    assert_eq!(objective.subsets_are_approximately_balanced()?, balanced);
    Ok(())
}

#[rstest]
#[case(2)]
#[case(3)]
fn replicated_projector_gives_same_gradient(#[case] replicas: usize) -> Result<()> {
    let mut single = set_up(2, 2)?;
    let mut multi = PoissonGatedObjective::new(
        ObjectiveKind::GatedWithoutMotion,
        parts(2, Arc::new(Replicated::new(matrix(), replicas)?))?,
    );
    multi.set_num_subsets(2)?;
    multi.set_up(&estimate())?;

    let mut expected = single.construct_target()?;
    let mut actual   =  multi.construct_target()?;
    single.compute_subset_gradient(&mut expected, &estimate(), 1, true)?;
    multi .compute_subset_gradient(&mut actual  , &estimate(), 1, true)?;
    assert_float_eq!(actual.data, expected.data, abs_all <= 1e-5);
    Ok(())
}

#[test]
fn motion_path_with_null_fields_matches_motion_free() -> Result<()> {
    let field = Arc::new(DeformationField::zeros(fov()));
    let pair = TransformationPair::new(field.clone(), field);
    let mut parts = parts(2, Arc::new(matrix()))?;
    parts.transformations = Some(GatedSpatialTransformation::new(vec![pair.clone(), pair]));
    let mut moving = PoissonGatedObjective::new(ObjectiveKind::GatedWithMotion, parts);
    moving.set_up(&estimate())?;
    let mut still = set_up(2, 1)?;

    let mut expected = still.construct_target()?;
    let mut actual   = moving.construct_target()?;
    still .compute_subset_gradient(&mut expected, &estimate(), 0, true)?;
    moving.compute_subset_gradient(&mut actual  , &estimate(), 0, true)?;
    assert_float_eq!(actual.data, expected.data, abs_all <= 1e-5);
    Ok(())
}

#[test]
fn motion_fields_on_another_grid_fail_setup() -> Result<()> {
    let field = Arc::new(DeformationField::zeros(one_voxel()));
    let pair = TransformationPair::new(field.clone(), field);
    let mut parts = parts(1, Arc::new(matrix()))?;
    parts.transformations = Some(GatedSpatialTransformation::new(vec![pair]));
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithMotion, parts);
    assert!(matches!(objective.set_up(&estimate()), Err(SetupError::Transformation(_))));
    Ok(())
}

/// Activity in voxel 0 only; the gate's frame is shifted by one voxel in x,
/// so the identity projector sees it in voxel 1
fn translated_gate() -> Result<(PoissonGatedObjective, Image)> {
    let fov = FOV::new((mm(3.0), mm(1.0), mm(1.0)), (3, 1, 1));
    let info = Arc::new(ProjDataInfo::new(vec![1], 3, 1)?);
    let forward = AffineTransformation::from_translation(-1.0, 0.0, 0.0);
    let reverse = forward.inverse()?;
    let pair = TransformationPair::new(Arc::new(forward), Arc::new(reverse));
    let parts = ObjectiveParts {
        measured: gated(&info, &[&[0.0, 2.0, 0.0]])?,
        gate_definitions: TimeGateDefinitions::from_durations([s(1.0)])?,
        transformations: Some(GatedSpatialTransformation::new(vec![pair])),
        additive: Some(gated(&info, &[&[1.0, 1.0, 1.0]])?),
        normalisation: None,
        projector: Arc::new(MatrixProjector::identity(fov, info)?),
        settings: ObjectiveSettings::default(),
    };
    let mut objective = PoissonGatedObjective::new(ObjectiveKind::GatedWithMotion, parts);
    let estimate = Image::new(fov, vec![1.0, 0.0, 0.0]);
    objective.set_up(&estimate)?;
    Ok((objective, estimate))
}

#[test]
fn translated_gate_sees_shifted_activity() -> Result<()> {
    let (mut objective, estimate) = translated_gate()?;
    // ybar = [1, 2, 1]; y/ybar = [0, 1, 0]; back in the reference frame the
    // ratio lands on voxel 0
    let mut gradient = objective.construct_target()?;
    objective.compute_subset_gradient(&mut gradient, &estimate, 0, false)?;
    assert_float_eq!(gradient.data, vec![1.0, 0.0, 0.0], abs_all <= 1e-5);
    Ok(())
}

#[test]
fn translated_gate_hessian_and_curvature() -> Result<()> {
    let (mut objective, estimate) = translated_gate()?;
    let fov = estimate.fov;

    // W v = [0, 1, 0]; -y Pv / ybar² = [0, -0.5, 0], pulled back onto voxel 0
    let mut output = objective.construct_target()?;
    let input = Image::new(fov, vec![1.0, 0.0, 0.0]);
    objective.accumulate_sub_hessian_times_input(&mut output, &estimate, &input, 0)?;
    assert_float_eq!(output.data, vec![-0.5, 0.0, 0.0], abs_all <= 1e-5);

    // A 1 = [0, 1, 1]; -y / A 1 = [0, -2, 0] with 0/0 = 0, pulled back onto voxel 0
    let mut output = objective.construct_target()?;
    objective.add_multiplication_with_approximate_sub_hessian(&mut output, &Image::ones(fov), 0)?;
    assert_float_eq!(output.data, vec![-2.0, 0.0, 0.0], abs_all <= 1e-5);
    Ok(())
}
