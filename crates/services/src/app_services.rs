use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::answer_service::AnswerService;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::leaderboard_service::LeaderboardService;
use crate::maintenance_service::MaintenanceService;
use crate::profile_service::ProfileService;
use crate::question_service::QuestionService;
use crate::rating_service::RatingService;
use crate::selection_service::SelectionService;

/// Assembles the engine services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: EngineConfig,
    questions: Arc<QuestionService>,
    selection: Arc<SelectionService>,
    answers: Arc<AnswerService>,
    ratings: Arc<RatingService>,
    leaderboard: Arc<LeaderboardService>,
    profiles: Arc<ProfileService>,
    maintenance: Arc<MaintenanceService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: EngineConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, config))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, config: EngineConfig) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, config)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, config: EngineConfig) -> Self {
        let questions = Arc::new(QuestionService::new(clock, Arc::clone(&storage.questions)));
        let selection = Arc::new(SelectionService::new(
            Arc::clone(&storage.questions),
            Arc::clone(&storage.answers),
            config.selection_policy,
        )
        .with_batch_size(config.batch_size));
        let answers = Arc::new(AnswerService::new(
            clock,
            Arc::clone(&storage.answers),
            &config,
        ));
        let ratings = Arc::new(RatingService::new(
            Arc::clone(&storage.ratings),
            config.rating_attempts,
        ));
        let leaderboard = Arc::new(LeaderboardService::new(Arc::clone(&storage.profiles)));
        let profiles = Arc::new(ProfileService::new(clock, Arc::clone(&storage.profiles)));
        let maintenance = Arc::new(MaintenanceService::new(Arc::clone(&storage.maintenance)));

        Self {
            config,
            questions,
            selection,
            answers,
            ratings,
            leaderboard,
            profiles,
            maintenance,
        }
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn selection(&self) -> Arc<SelectionService> {
        Arc::clone(&self.selection)
    }

    #[must_use]
    pub fn answers(&self) -> Arc<AnswerService> {
        Arc::clone(&self.answers)
    }

    #[must_use]
    pub fn ratings(&self) -> Arc<RatingService> {
        Arc::clone(&self.ratings)
    }

    #[must_use]
    pub fn leaderboard(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboard)
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn maintenance(&self) -> Arc<MaintenanceService> {
        Arc::clone(&self.maintenance)
    }
}
