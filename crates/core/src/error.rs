use thiserror::Error;

use crate::model::{ParseIdError, ProfileError, QuestionError, RatingError};

/// Any domain validation failure, for callers that do not care which kind.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
