//! Orchestrator: runs one generation through its stages.
//!
//! ```text
//! start -> ingredients -> meals -> { grocery || prep } -> done
//!   \________________________\___________\_____________-> failed
//! ```
//!
//! Each stage waits for its dependency to complete and validate. Grocery
//! and prep only read the finished week, so they run concurrently. Any
//! stage failure aborts the run and nothing partial is returned.
//!
//! Cache writes outlive the run that issued them. They are spawned on the
//! orchestrator's background tracker; call [`Orchestrator::drain`] before
//! shutting the runtime down.

pub mod fixture;
pub mod mode;
pub mod progress;

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

pub use mode::{RunStrategy, TEST_MODE_ENV, TestMode};
pub use progress::{NoProgress, Phase, ProgressEvent, ProgressLog, ProgressSink, RunStage};

use crate::client::GenerationClient;
use crate::config::ModelConfig;
use crate::error::GenerationError;
use crate::model::meal::replicate_day;
use crate::model::{
    CoreIngredients, DayPlan, GeneratedPlan, GenerationOptions, PrepSchedule, UserProfile,
};
use crate::nutrition::NutritionCache;
use crate::stages::meals::{DaySpan, MealRequest};
use crate::stages::{grocery, ingredients, meals, prep};

/// Runs generation pipelines. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    client: GenerationClient,
    cache: Arc<dyn NutritionCache>,
    models: ModelConfig,
    strategy: RunStrategy,
    background: TaskTracker,
}

impl Orchestrator {
    /// The mode is resolved into a strategy here, once; the client gets the
    /// matching model policy.
    pub fn new(
        client: GenerationClient,
        cache: Arc<dyn NutritionCache>,
        models: ModelConfig,
        mode: TestMode,
    ) -> Self {
        let strategy = mode.strategy(&models);
        let client = client.with_policy(strategy.policy());
        Self {
            client,
            cache,
            models,
            strategy,
            background: TaskTracker::new(),
        }
    }

    /// Share `background` with other writers (such as an audit sink) so one
    /// [`drain`](Self::drain) waits for all of them.
    pub fn with_background(mut self, background: TaskTracker) -> Self {
        self.background = background;
        self
    }

    pub fn background(&self) -> &TaskTracker {
        &self.background
    }

    /// Close the tracker and wait for every background write to finish.
    /// Meant for shutdown.
    pub async fn drain(&self) {
        self.background.close();
        if !self.background.is_empty() {
            debug!(pending = self.background.len(), "waiting for background writes");
        }
        self.background.wait().await;
    }

    /// A copy whose oracle calls are audited under `caller`.
    pub fn for_caller(&self, caller: impl Into<String>) -> Self {
        let mut orchestrator = self.clone();
        orchestrator.client = self.client.with_caller(caller);
        orchestrator
    }

    pub fn strategy(&self) -> &RunStrategy {
        &self.strategy
    }

    /// Run a full generation.
    pub async fn run_generation(
        &self,
        profile: &UserProfile,
        options: &GenerationOptions,
        progress: &dyn ProgressSink,
    ) -> Result<GeneratedPlan, GenerationError> {
        let span = match &self.strategy {
            RunStrategy::Fixture => {
                let plan = fixture::sample_plan()?;
                progress.emit(ProgressEvent::completed(RunStage::Done, "Loaded sample plan"));
                info!(caller = %self.client.caller(), "returned fixture plan");
                return Ok(plan);
            }
            RunStrategy::Live { span, .. } => *span,
        };

        progress.emit(ProgressEvent::started(RunStage::Start, "Starting meal plan generation"));
        match self.run_live(profile, options, span, progress).await {
            Ok(plan) => {
                progress.emit(ProgressEvent::completed(RunStage::Done, "Meal plan ready"));
                info!(
                    caller = %self.client.caller(),
                    title = %plan.title,
                    days = plan.days.len(),
                    grocery_items = plan.grocery_list.len(),
                    "generation finished"
                );
                Ok(plan)
            }
            Err(e) => {
                progress.emit(ProgressEvent::completed(
                    RunStage::Failed,
                    e.failure_reason().user_message(),
                ));
                error!(caller = %self.client.caller(), kind = e.kind(), error = %e, "generation failed");
                Err(e)
            }
        }
    }

    async fn run_live(
        &self,
        profile: &UserProfile,
        options: &GenerationOptions,
        span: DaySpan,
        progress: &dyn ProgressSink,
    ) -> Result<GeneratedPlan, GenerationError> {
        profile.validate().map_err(GenerationError::InvalidProfile)?;

        progress.emit(ProgressEvent::started(RunStage::Ingredients, "Choosing core ingredients"));
        let core = ingredients::select(
            &self.client,
            self.cache.as_ref(),
            &self.models.planning,
            profile,
            options,
        )
        .await?;
        progress.emit(ProgressEvent::completed(
            RunStage::Ingredients,
            format!("Chose {} core ingredients", core.len()),
        ));

        progress.emit(ProgressEvent::started(RunStage::Meals, "Writing meals"));
        let request = MealRequest {
            profile,
            core: &core,
            options,
            span,
        };
        let synthesis = meals::synthesize(
            &self.client,
            Arc::clone(&self.cache),
            &self.background,
            &self.models.planning,
            &request,
        )
        .await?;
        let days = match span {
            DaySpan::Week => synthesis.days,
            DaySpan::SingleDay => synthesis
                .days
                .first()
                .map(replicate_day)
                .ok_or_else(|| GenerationError::contract("single-day synthesis produced no day"))?,
        };
        progress.emit(ProgressEvent::completed(
            RunStage::Meals,
            format!("Wrote {} meals", synthesis.meals.len()),
        ));

        progress.emit(ProgressEvent::started(RunStage::Grocery, "Building grocery list"));
        progress.emit(ProgressEvent::started(RunStage::Prep, "Planning meal prep"));
        let grocery_branch = async {
            let items = grocery::consolidate(
                &self.client,
                self.cache.as_ref(),
                &self.models.utility,
                &core,
                &days,
                profile,
            )
            .await?;
            progress.emit(ProgressEvent::completed(
                RunStage::Grocery,
                format!("Listed {} grocery items", items.len()),
            ));
            Ok::<_, GenerationError>(items)
        };
        let prep_branch = async {
            let schedule = prep::schedule(
                &self.client,
                self.cache.as_ref(),
                &self.models.utility,
                &days,
                &core,
                profile,
            )
            .await?;
            progress.emit(ProgressEvent::completed(
                RunStage::Prep,
                format!("Planned {} prep sessions", schedule.sessions.len()),
            ));
            Ok::<_, GenerationError>(schedule)
        };
        let (grocery_list, prep_schedule) = tokio::try_join!(grocery_branch, prep_branch)?;

        Ok(GeneratedPlan {
            title: synthesis.title,
            days,
            grocery_list,
            core_ingredients: core,
            prep_schedule,
        })
    }

    /// Run prep scheduling alone over an existing week.
    pub async fn regenerate_prep(
        &self,
        days: &[DayPlan],
        core: &CoreIngredients,
        profile: &UserProfile,
    ) -> Result<PrepSchedule, GenerationError> {
        if self.strategy == RunStrategy::Fixture {
            return fixture::sample_prep_schedule();
        }
        prep::schedule(
            &self.client,
            self.cache.as_ref(),
            &self.models.utility,
            days,
            core,
            profile,
        )
        .await
    }
}
