use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{UserId, UserProfile};
use storage::repository::{ProfileRepository, StorageError};

use crate::Clock;
use crate::error::ProfileServiceError;

/// Learner profiles, created on first sign-in.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    #[must_use]
    pub fn new(clock: Clock, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { clock, profiles }
    }

    /// Return the learner's profile, creating it with zero counters on first
    /// sign-in. An existing profile is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` if a new profile would have a
    /// blank display name, or `ProfileServiceError::Storage` on store failures.
    pub async fn ensure_profile(
        &self,
        uid: &UserId,
        display_name: &str,
        email: &str,
    ) -> Result<UserProfile, ProfileServiceError> {
        if let Some(existing) = self.profiles.get_profile(uid).await? {
            return Ok(existing);
        }

        let profile = UserProfile::new(uid.clone(), display_name, email, self.clock.now())?;
        if self.profiles.insert_profile(&profile).await? {
            tracing::info!(user = %uid, "profile created");
            return Ok(profile);
        }

        // Lost a race with a concurrent sign-in; the stored profile wins.
        self.profiles
            .get_profile(uid)
            .await?
            .ok_or(ProfileServiceError::Storage(StorageError::NotFound))
    }

    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` if the read fails.
    pub async fn get_profile(
        &self,
        uid: &UserId,
    ) -> Result<Option<UserProfile>, ProfileServiceError> {
        Ok(self.profiles.get_profile(uid).await?)
    }

    /// Display names for the given uids. Unknown uids are left out.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` if profiles cannot be read.
    pub async fn display_names(
        &self,
        uids: &[UserId],
    ) -> Result<HashMap<UserId, String>, ProfileServiceError> {
        let mut names = HashMap::with_capacity(uids.len());
        for uid in uids {
            if names.contains_key(uid) {
                continue;
            }
            if let Some(profile) = self.profiles.get_profile(uid).await? {
                names.insert(uid.clone(), profile.display_name().to_string());
            }
        }
        Ok(names)
    }
}
