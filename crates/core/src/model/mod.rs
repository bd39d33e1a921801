mod answer;
mod ids;
mod leaderboard;
mod profile;
mod question;
mod rating;

pub use ids::{AnswerId, ParseIdError, QuestionId, UserId};

pub use answer::AnswerRecord;
pub use leaderboard::{ANONYMOUS_NAME, LeaderboardEntry, rank};
pub use profile::{ProfileError, UserProfile};
pub use question::{
    HIDDEN_MAX_AVERAGE, HIDDEN_MIN_RATINGS, MIN_OPTIONS, NewQuestion, Question, QuestionDraft,
    QuestionError, is_hidden,
};
pub use rating::{Rating, RatingError, RatingSummary, UNRATED_AVERAGE, average_rating};
