//! End-to-end tests of the exploration sequence against the stub workbench.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use riverguard_core::config::{RiverguardConfig, UnrecognizedPolicy};
use riverguard_core::evaluator::{EvaluatorError, ScenarioSource};
use riverguard_core::exploration::{ExplorationError, run_exploration};
use riverguard_core::reference::ReferenceError;
use riverguard_core::stub::StubWorkbench;
use riverguard_types::{LoadedModel, ParameterShape, ParameterValue, Uncertainty};

fn small_config() -> RiverguardConfig {
    RiverguardConfig::parse(
        "exploration:\n  scenarios: 5\n  policies: 2\n  nfe: 20\n",
    )
    .unwrap()
}

#[test]
fn default_run_follows_the_fixed_sequence() {
    let config = RiverguardConfig::default();
    let mut workbench = StubWorkbench::dike_network();

    let report = run_exploration(&config, &mut workbench).unwrap();

    let calls = workbench.calls();
    assert_eq!(calls.formulations.len(), 1);
    assert_eq!(calls.formulations.first().map(|f| f.index()), Some(3));
    assert_eq!(calls.opened, 2);
    assert_eq!(calls.shutdowns, 2);
    assert_eq!(calls.experiments.len(), 1);
    assert_eq!(calls.optimizations.len(), 1);

    let experiments = calls.experiments.first().unwrap();
    assert_eq!(experiments.scenarios, ScenarioSource::Sampled(50));
    assert_eq!(experiments.policies, 4);

    assert_eq!(experiments.run_count(), config.exploration.experiment_count());
    assert_eq!(report.experiment_count, 200);
    assert_eq!(report.planning_steps, 3);
    assert_eq!(report.formulation.index(), 3);
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn optimizer_receives_derived_epsilons_and_reference() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network();

    let report = run_exploration(&config, &mut workbench).unwrap();

    // Ten runs: objective k reports run * k, so ranges are 9, 18, 27 and
    // the info outcome is constant.
    assert_eq!(report.epsilons.as_slice(), [1.8, 3.6, 5.4, 1e-5]);

    let calls = workbench.calls();
    let optimization = calls.optimizations.first().unwrap();
    assert_eq!(optimization.nfe, 20);
    assert_eq!(optimization.search_over.as_str(), "levers");
    assert_eq!(optimization.epsilons, report.epsilons);
    assert_eq!(optimization.reference, report.reference);
}

#[test]
fn reference_pins_every_declared_uncertainty() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network();

    let report = run_exploration(&config, &mut workbench).unwrap();
    let reference = &report.reference;

    assert_eq!(reference.name(), "reference");
    assert_eq!(reference.len(), workbench.loaded().model.uncertainties.len());
    assert_eq!(
        reference.get("A.0_ID flood wave shape"),
        Some(&ParameterValue::Real(66.0))
    );
    assert_eq!(reference.get("A.1_Bmax"), Some(&ParameterValue::Real(190.0)));
    assert_eq!(reference.get("A.1_pfail"), Some(&ParameterValue::Real(0.5)));
    assert_eq!(reference.get("A.1_Brate"), Some(&ParameterValue::Real(1.0)));
    assert_eq!(
        reference.get("discount rate 0"),
        Some(&ParameterValue::Real(1.5))
    );
}

#[test]
fn optimization_result_is_reported() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network();

    let report = run_exploration(&config, &mut workbench).unwrap();

    assert_eq!(report.optimization.results.len(), 1);
    assert_eq!(
        report.optimization.convergence.last().map(|p| p.nfe),
        Some(20)
    );
}

fn model_with_unrecognized_uncertainty() -> LoadedModel {
    let mut loaded = StubWorkbench::dike_network().loaded().clone();
    loaded
        .model
        .uncertainties
        .push(Uncertainty::new(
            "A.1_mystery",
            ParameterShape::Unrecognized {
                kind: "ordinal".to_owned(),
            },
        ));
    loaded
}

#[test]
fn unrecognized_uncertainty_stops_before_any_evaluation() {
    let config = small_config();
    let mut workbench = StubWorkbench::new(model_with_unrecognized_uncertainty());

    let err = run_exploration(&config, &mut workbench).unwrap_err();

    assert!(matches!(
        err,
        ExplorationError::Reference {
            source: ReferenceError::UnrecognizedUncertaintyVariant { ref name, ref kind }
        } if name == "A.1_mystery" && kind == "ordinal"
    ));
    assert_eq!(workbench.calls().opened, 0);
}

#[test]
fn unrecognized_uncertainty_is_skipped_when_configured() {
    let mut config = small_config();
    config.reference.on_unrecognized = UnrecognizedPolicy::Skip;
    let mut workbench = StubWorkbench::new(model_with_unrecognized_uncertainty());

    let report = run_exploration(&config, &mut workbench).unwrap();

    assert!(report.reference.get("A.1_mystery").is_none());
    assert_eq!(report.reference.len(), 5);
}

#[test]
fn evaluator_failure_aborts_the_run() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network().failing_open();

    let err = run_exploration(&config, &mut workbench).unwrap_err();

    assert!(matches!(err, ExplorationError::Evaluator { .. }));
    assert!(workbench.calls().optimizations.is_empty());
}

#[test]
fn failed_experiment_batch_still_shuts_its_evaluator_down() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network().failing_experiments();

    let err = run_exploration(&config, &mut workbench).unwrap_err();

    assert!(matches!(
        err,
        ExplorationError::Evaluator {
            source: EvaluatorError::Evaluation { .. }
        }
    ));
    let calls = workbench.calls();
    assert_eq!(calls.opened, 1);
    assert_eq!(calls.shutdowns, calls.opened);
    assert_eq!(calls.experiments.len(), 1);
    assert!(calls.optimizations.is_empty());
}

#[test]
fn failed_optimization_still_shuts_its_evaluator_down() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network().failing_optimization();

    let err = run_exploration(&config, &mut workbench).unwrap_err();

    assert!(matches!(
        err,
        ExplorationError::Evaluator {
            source: EvaluatorError::Optimization { .. }
        }
    ));
    let calls = workbench.calls();
    assert_eq!(calls.opened, 2);
    assert_eq!(calls.shutdowns, calls.opened);
    assert_eq!(calls.optimizations.len(), 1);
}

#[test]
fn short_outcome_series_abort_before_optimization() {
    let config = small_config();
    let mut workbench = StubWorkbench::dike_network().truncating_outcomes();

    let err = run_exploration(&config, &mut workbench).unwrap_err();

    assert!(matches!(
        err,
        ExplorationError::ShapeMismatch {
            expected: 10,
            actual: 9,
            ..
        }
    ));
    let calls = workbench.calls();
    assert_eq!(calls.shutdowns, 1);
    assert!(calls.optimizations.is_empty());
}
