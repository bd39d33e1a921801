#![forbid(unsafe_code)]

pub mod answer_service;
pub mod app_services;
pub mod config;
pub mod error;
pub mod extraction;
pub mod leaderboard_service;
pub mod maintenance_service;
pub mod profile_service;
pub mod question_service;
pub mod rating_service;
pub mod selection_service;

pub use quiz_core::Clock;

pub use answer_service::AnswerService;
pub use app_services::AppServices;
pub use config::EngineConfig;
pub use error::{
    AnswerServiceError, AppServicesError, ExtractionError, LeaderboardError, MaintenanceError,
    ProfileServiceError, QuestionServiceError, RatingServiceError, SelectionError,
};
pub use extraction::{ExtractionConfig, OpenAiExtractor, QuestionExtractor};
pub use leaderboard_service::{LeaderboardService, Subscription};
pub use maintenance_service::MaintenanceService;
pub use profile_service::ProfileService;
pub use question_service::QuestionService;
pub use rating_service::RatingService;
pub use selection_service::SelectionService;
