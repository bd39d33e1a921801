use crate::model::ids::UserId;
use crate::model::profile::UserProfile;

/// Name shown for learners who never set a display name.
pub const ANONYMOUS_NAME: &str = "???";

/// Derived per-user participation row. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub uid: UserId,
    pub display_name: String,
    pub total_answered: u32,
}

/// Rank profiles by answered count.
///
/// Users who never answered are left out. Equal counts are ordered by uid so
/// rows do not jump around between refreshes.
#[must_use]
pub fn rank<'a>(profiles: impl IntoIterator<Item = &'a UserProfile>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = profiles
        .into_iter()
        .filter(|p| p.total_answered() > 0)
        .map(|p| LeaderboardEntry {
            uid: p.uid().clone(),
            display_name: if p.display_name().trim().is_empty() {
                ANONYMOUS_NAME.to_string()
            } else {
                p.display_name().to_string()
            },
            total_answered: p.total_answered(),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_answered
            .cmp(&a.total_answered)
            .then_with(|| a.uid.cmp(&b.uid))
    });
    entries
}
