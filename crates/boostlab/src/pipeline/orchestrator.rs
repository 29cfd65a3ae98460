//! Phase-by-phase training run.
//!
//! ```text
//! loading_data → preprocessing → splitting → tuning → finalizing → evaluating → completed
//!                                   (any non-terminal phase) → failed
//! ```
//!
//! Each phase is announced to the status sink before its work starts. Store
//! and model-sink failures are logged and the run continues; any other error
//! moves the run to `failed`, is recorded with the phase it happened in, and
//! is returned to the caller.

use ndarray::{Array1, Array2, Axis};

use crate::config::{PipelineSettings, TrainRequest, default_params};
use crate::error::TrainingError;
use crate::evaluation::evaluate;
use crate::model::{BoosterParams, GBDTModel};
use crate::preprocess::{TrainTestSplit, prepare, shuffled_split, stratified_split};
use crate::training::{CvParams, GridSearch, ParamGrid, ParamSet, SearchSpace, TuningOutcome, TuningProgress};

use super::collaborators::{Collaborators, LogLevel, StoreResult};
use super::results::{DatasetInfo, PreprocessingInfo, TrainingResult, TuningInfo};
use super::status::{PhaseTracker, RunStatus};

// =============================================================================
// Run context
// =============================================================================

/// Per-run state: the phase tracker plus the collaborators it reports to.
struct RunContext<'r, 'c> {
    run_id: &'r str,
    collab: &'r Collaborators<'c>,
    tracker: PhaseTracker,
}

impl<'r, 'c> RunContext<'r, 'c> {
    fn new(run_id: &'r str, collab: &'r Collaborators<'c>) -> Self {
        Self {
            run_id,
            collab,
            tracker: PhaseTracker::new(),
        }
    }

    fn enter(&mut self, status: RunStatus) -> Result<(), TrainingError> {
        self.tracker.advance(status).map_err(TrainingError::failure)?;
        tracing::info!(run_id = self.run_id, phase = %status, "phase started");
        let reported = self.collab.status.set_status(self.run_id, status);
        self.tolerate("set_status", reported);
        Ok(())
    }

    fn log(&self, message: &str, level: LogLevel) {
        self.collab.progress.log_progress(self.run_id, message, level);
    }

    /// Log a persistence failure without failing the run.
    fn tolerate<T>(&self, operation: &str, result: StoreResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(run_id = self.run_id, operation, error = %e, "persistence failed");
                self.log(&format!("Warning: {operation} failed: {e}"), LogLevel::Warning);
                None
            }
        }
    }

    fn fail(&mut self, error: &TrainingError) {
        let phase = self.tracker.active_phase().unwrap_or(RunStatus::LoadingData);
        if let Err(e) = self.tracker.advance(RunStatus::Failed) {
            tracing::error!(run_id = self.run_id, error = %e, "cannot mark run as failed");
            return;
        }
        tracing::error!(
            run_id = self.run_id,
            phase = %phase,
            kind = error.kind(),
            error = %error,
            "run failed"
        );
        let reported = self.collab.status.set_status(self.run_id, RunStatus::Failed);
        self.tolerate("set_status", reported);
        let recorded = self.collab.store.mark_failed(self.run_id, &error.to_string(), phase);
        self.tolerate("mark_failed", recorded);
        self.log(&format!("Training failed during {phase}: {error}"), LogLevel::Error);
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs training requests end to end.
#[derive(Debug, Clone, Default)]
pub struct TrainingOrchestrator {
    settings: PipelineSettings,
}

/// The candidates a run will cross-validate.
struct SearchPlan {
    method: &'static str,
    grid: ParamGrid,
    space: SearchSpace,
    max_rounds: u32,
}

impl TrainingOrchestrator {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one run.
    ///
    /// # Errors
    ///
    /// The first error of any phase. By then the run has been marked
    /// `failed` with that phase.
    pub fn run(
        &self,
        run_id: &str,
        request: &TrainRequest,
        collab: &Collaborators<'_>,
    ) -> Result<TrainingResult, TrainingError> {
        let mut ctx = RunContext::new(run_id, collab);
        let outcome = self.execute(&mut ctx, request);
        if let Err(e) = &outcome {
            ctx.fail(e);
        }
        outcome
    }

    fn execute(&self, ctx: &mut RunContext<'_, '_>, request: &TrainRequest) -> Result<TrainingResult, TrainingError> {
        // Loading
        ctx.enter(RunStatus::LoadingData)?;
        request.validate()?;
        let plan = self.search_plan(request)?;
        let dataset = ctx.collab.source.read(&request.dataset)?;
        ctx.log(
            &format!(
                "Loaded dataset with {} rows and {} columns",
                dataset.n_rows(),
                dataset.n_columns()
            ),
            LogLevel::Info,
        );

        // Preprocessing
        ctx.enter(RunStatus::Preprocessing)?;
        let prepared = prepare(
            &dataset,
            &request.feature_columns,
            &request.target_column,
            self.settings.imputation,
        )?;
        let dataset_info = DatasetInfo::describe(
            &dataset,
            &request.target_column,
            &prepared.column_types,
            request.objective,
        );
        let saved = ctx.collab.store.save_dataset_info(ctx.run_id, &dataset_info);
        ctx.tolerate("save_dataset_info", saved);
        let feature_names = prepared.transform.feature_names();
        let preprocessing_info = PreprocessingInfo {
            column_types: prepared.column_types.clone(),
            transform: prepared.transform.clone(),
            target_encoding: prepared.target_encoding.clone(),
            feature_names: feature_names.clone(),
            pipeline: prepared.transform.pipeline_definition(),
        };
        let saved = ctx.collab.store.save_preprocessing_info(ctx.run_id, &preprocessing_info);
        ctx.tolerate("save_preprocessing_info", saved);
        ctx.log(
            &format!(
                "Preprocessed {} numeric and {} categorical feature(s)",
                prepared.column_types.numeric.len(),
                prepared.column_types.categorical.len()
            ),
            LogLevel::Info,
        );

        // Splitting
        ctx.enter(RunStatus::Splitting)?;
        let split = self.split(request, &prepared.targets.to_vec())?;
        let (x_train, y_train) = take_rows(&prepared.features, &prepared.targets, &split.train);
        let (x_test, y_test) = take_rows(&prepared.features, &prepared.targets, &split.test);
        ctx.log(
            &format!("Split into {} training and {} test rows", split.train.len(), split.test.len()),
            LogLevel::Info,
        );

        // Tuning
        ctx.enter(RunStatus::Tuning)?;
        let base = request.base_params(&self.settings);
        let cv = CvParams {
            n_folds: request.cv_folds,
            max_rounds: plan.max_rounds,
            early_stopping_rounds: request.early_stopping_rounds,
            seed: request.seed,
            stratified: request.objective.is_classification(),
            parallelism: self.settings.parallelism,
        };
        ctx.log(
            &format!(
                "Cross-validating {} candidate(s) with {}-fold CV",
                plan.space.n_candidates(),
                request.cv_folds
            ),
            LogLevel::Info,
        );
        let tuning = {
            let ctx_ref = &*ctx;
            GridSearch::new(&base, &plan.space, cv)
                .progress_every(self.settings.progress_every)
                .run(x_train.view(), y_train.view(), |p: TuningProgress| {
                    ctx_ref.log(
                        &format!(
                            "Evaluated {}/{} candidates ({:.0}%), best score {:.4}",
                            p.evaluated,
                            p.total,
                            p.fraction() * 100.0,
                            p.best_score
                        ),
                        LogLevel::Info,
                    );
                })?
        };
        let tuning_info = TuningInfo::from_outcome(
            plan.method,
            plan.grid,
            request.cv_folds,
            request.early_stopping_rounds,
            plan.max_rounds,
            &tuning,
        );
        let saved = ctx.collab.store.save_tuning_info(ctx.run_id, &tuning_info);
        ctx.tolerate("save_tuning_info", saved);
        ctx.log(
            &format!(
                "Best {}: {:.4} (+/- {:.4}) with {} rounds, params {}",
                tuning.metric, tuning.best_score, tuning.best_score_std, tuning.best_rounds, tuning.best_params
            ),
            LogLevel::Info,
        );

        // Finalizing
        ctx.enter(RunStatus::Finalizing)?;
        let (model, final_params) = fit_final(&base, &tuning, x_train.view(), y_train.view())?;
        let model = model.with_feature_names(feature_names.clone());
        ctx.log(
            &format!("Trained final model with {} rounds", model.n_trees()),
            LogLevel::Info,
        );

        // Evaluating
        ctx.enter(RunStatus::Evaluating)?;
        let evaluation = evaluate(
            &model,
            x_test.view(),
            y_test.view(),
            &feature_names,
            self.settings.lift_bins,
        )?;
        ctx.log(
            &format!("Held-out {}: {:.4}", evaluation.metric, evaluation.score),
            LogLevel::Info,
        );
        let written = ctx.collab.models.write_model(ctx.run_id, &model);
        let model_path = ctx.tolerate("write_model", written);

        let result = TrainingResult {
            run_id: ctx.run_id.to_string(),
            model_name: request.model_name.clone(),
            objective: request.objective,
            best_params: tuning.best_params.clone(),
            final_params,
            n_rounds: tuning.best_rounds,
            cv_score: tuning.best_score,
            cv_score_std: tuning.best_score_std,
            n_train: split.train.len(),
            n_test: split.test.len(),
            evaluation,
            model,
            model_path,
            transform: prepared.transform,
            target_encoding: prepared.target_encoding,
        };
        let saved = ctx.collab.store.save_result(ctx.run_id, &result);
        ctx.tolerate("save_result", saved);

        ctx.enter(RunStatus::Completed)?;
        ctx.log("Training completed", LogLevel::Info);
        Ok(result)
    }

    /// Validate the grid up front, before any data is read.
    ///
    /// A supplied grid is validated even when tuning is off.
    fn search_plan(&self, request: &TrainRequest) -> Result<SearchPlan, TrainingError> {
        let requested = request.param_grid.as_ref().map(ParamGrid::validate).transpose()?;
        if request.tune_parameters {
            let (grid, space) = match (request.param_grid.clone(), requested) {
                (Some(grid), Some(space)) => (grid, space),
                _ => {
                    let grid = ParamGrid::default_grid();
                    let space = grid.validate()?;
                    (grid, space)
                }
            };
            Ok(SearchPlan {
                method: "grid_search",
                grid,
                space,
                max_rounds: self.settings.max_rounds,
            })
        } else {
            let grid = single_point_grid(&default_params());
            let space = grid.validate()?;
            Ok(SearchPlan {
                method: "defaults",
                grid,
                space,
                max_rounds: self.settings.default_rounds,
            })
        }
    }

    fn split(&self, request: &TrainRequest, targets: &[f32]) -> Result<TrainTestSplit, TrainingError> {
        if request.objective.is_classification() {
            stratified_split(targets, request.test_size, request.seed)
        } else {
            shuffled_split(targets.len(), request.test_size, request.seed)
        }
    }
}

/// A grid whose only candidate is `params`.
fn single_point_grid(params: &ParamSet) -> ParamGrid {
    params
        .iter()
        .fold(ParamGrid::new(), |grid, (name, value)| grid.with_values(name, [value.clone()]))
}

fn take_rows(features: &Array2<f32>, targets: &Array1<f32>, rows: &[usize]) -> (Array2<f32>, Array1<f32>) {
    (features.select(Axis(0), rows), targets.select(Axis(0), rows))
}

fn fit_final(
    base: &ParamSet,
    tuning: &TuningOutcome,
    features: ndarray::ArrayView2<f32>,
    targets: ndarray::ArrayView1<f32>,
) -> Result<(GBDTModel, ParamSet), TrainingError> {
    let final_params = base.merged_with(&tuning.best_params);
    let params = BoosterParams::from_param_set(&final_params)?;
    let model = GBDTModel::fit(features, targets, &params, tuning.best_rounds.max(1))?;
    Ok((model, final_params))
}
