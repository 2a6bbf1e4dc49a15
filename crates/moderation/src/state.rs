//! Moderation state projection.
//!
//! Every caller that needs "what is this user's current state" goes through
//! [`state_of`]; nothing else counts log rows on its own.

use database::{moderation, Database};

/// A (chat, user) pair's state, derived from the moderation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationState {
    /// Total warn records.
    pub warn_count: i64,
    /// Whether a ban record exists.
    pub banned: bool,
    /// Expiry of the newest unexpired mute, if one is active.
    pub mute_expires: Option<String>,
    /// Whether an unexpired ignore record exists.
    pub ignored: bool,
}

/// The escalation ladder position: Clean -> Warned(n) -> Banned.
///
/// Strictly monotonic at this layer; only an administrative override can
/// move a user back down, by removing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationLevel {
    Clean,
    Warned(i64),
    Banned,
}

impl ModerationState {
    /// Position on the warn/ban ladder. Mutes and ignores do not move it.
    pub fn level(&self) -> EscalationLevel {
        if self.banned {
            EscalationLevel::Banned
        } else if self.warn_count > 0 {
            EscalationLevel::Warned(self.warn_count)
        } else {
            EscalationLevel::Clean
        }
    }

    /// Whether any restriction currently applies.
    pub fn is_restricted(&self) -> bool {
        self.banned || self.ignored || self.mute_expires.is_some()
    }
}

/// Project the current moderation state for (chat, user) from the log.
pub async fn state_of(db: &Database, chat_id: i64, user_id: i64) -> database::Result<ModerationState> {
    let warn_count = moderation::warn_count(db.pool(), chat_id, user_id).await?;
    let banned = moderation::has_ban(db.pool(), chat_id, user_id).await?;
    let mute = moderation::active_mute(db.pool(), chat_id, user_id).await?;
    let ignored = moderation::has_ignore(db.pool(), chat_id, user_id).await?;

    Ok(ModerationState {
        warn_count,
        banned,
        mute_expires: mute.and_then(|record| record.expires),
        ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ladder() {
        let mut state = ModerationState {
            warn_count: 0,
            banned: false,
            mute_expires: None,
            ignored: false,
        };
        assert_eq!(state.level(), EscalationLevel::Clean);
        assert!(!state.is_restricted());

        state.warn_count = 2;
        assert_eq!(state.level(), EscalationLevel::Warned(2));
        assert!(!state.is_restricted());

        state.banned = true;
        assert_eq!(state.level(), EscalationLevel::Banned);
        assert!(state.is_restricted());
    }

    #[test]
    fn test_mute_is_restriction_not_escalation() {
        let state = ModerationState {
            warn_count: 0,
            banned: false,
            mute_expires: Some("2030-01-01 00:00:00".to_string()),
            ignored: false,
        };
        assert_eq!(state.level(), EscalationLevel::Clean);
        assert!(state.is_restricted());
    }
}
