//! Per-message enforcement checks and the warn escalation path.

use std::env;
use std::time::Duration;

use chat_core::{ChatPermissions, ChatTransport};
use chrono::Utc;
use database::models::{MessageType, ModerationKind};
use database::{activity, chat_history, moderation, settings, user, Database};
use tracing::{debug, info, warn};

use crate::error::EnforcementError;
use crate::state::state_of;

/// Why a mute was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteReason {
    /// A run of sticker/gif messages.
    Flood,
    /// The same text repeated back to back.
    Spam,
}

impl MuteReason {
    /// The reason string recorded on the moderation log.
    pub fn as_str(self) -> &'static str {
        match self {
            MuteReason::Flood => "flood",
            MuteReason::Spam => "spam",
        }
    }
}

/// Outcome of evaluating one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No check matched.
    Clean,
    /// The user is already muted, ignored or banned; no check ran.
    AlreadyRestricted,
    /// A mute was recorded. `enforced` is false when the external
    /// restriction call failed; the record stands either way.
    Muted { reason: MuteReason, enforced: bool },
    /// A warn was recorded without reaching the ban threshold.
    Warned { count: i64 },
    /// The warn threshold was reached and a ban was recorded.
    Banned { enforced: bool },
}

/// Outcome of the administrative warn path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnOutcome {
    /// Warn count for (chat, user) after this warn.
    pub warn_count: i64,
    /// Whether this warn crossed the threshold and appended a ban.
    pub banned: bool,
    /// Whether the external ban call succeeded (meaningful only if `banned`).
    pub ban_enforced: bool,
}

/// Enforcement tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run length of sticker/gif messages that counts as flooding.
    pub flood_run: usize,
    /// Run length of identical texts that counts as spamming.
    pub spam_run: usize,
    /// Mute duration for flooding.
    pub flood_mute: Duration,
    /// Mute duration for spamming.
    pub spam_mute: Duration,
    /// Warn count at which a ban is appended.
    pub warns_before_ban: i64,
    /// Terms the profanity check matches (lowercase substrings).
    /// Empty by default; deployment provides the list.
    pub profanity_terms: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flood_run: 5,
            spam_run: 3,
            flood_mute: Duration::from_secs(5 * 60),
            spam_mute: Duration::from_secs(10 * 60),
            warns_before_ban: 3,
            profanity_terms: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load engine tunables from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_usize("WARDEN_FLOOD_RUN") {
            config.flood_run = value;
        }
        if let Some(value) = env_usize("WARDEN_SPAM_RUN") {
            config.spam_run = value;
        }
        if let Some(secs) = env_u64("WARDEN_FLOOD_MUTE_SECS") {
            config.flood_mute = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("WARDEN_SPAM_MUTE_SECS") {
            config.spam_mute = Duration::from_secs(secs);
        }
        if let Some(value) = env_u64("WARDEN_WARNS_BEFORE_BAN") {
            config.warns_before_ban = value as i64;
        }
        if let Ok(terms) = env::var("WARDEN_PROFANITY_TERMS") {
            config.profanity_terms = terms
                .split(',')
                .map(|term| term.trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect();
        }

        config
    }
}

/// The enforcement engine.
///
/// Evaluates message events against the logged history in fixed priority
/// order (flood, spam, profanity), short-circuiting on the first match, and
/// carries the administrative warn path with its escalation to ban.
pub struct EnforcementEngine<T: ChatTransport> {
    db: Database,
    transport: T,
    config: EngineConfig,
}

impl<T: ChatTransport> EnforcementEngine<T> {
    /// Create an engine over the shared database handle and a transport.
    pub fn new(db: Database, transport: T, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// Get the engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record an inbound message and run the enforcement checks.
    ///
    /// The message is logged (user row ensured, history appended, activity
    /// counted) before any check runs, so the checks always see the current
    /// message as the newest log entry.
    pub async fn evaluate_and_act(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
        message_type: MessageType,
    ) -> Result<Verdict, EnforcementError> {
        user::ensure_user(self.db.pool(), user_id).await?;
        chat_history::append_message(self.db.pool(), chat_id, user_id, text, message_type).await?;
        activity::record_message(self.db.pool(), user_id, chat_id).await?;

        let state = state_of(&self.db, chat_id, user_id).await?;
        if state.is_restricted() {
            debug!(chat_id, user_id, "skipping checks: user already restricted");
            return Ok(Verdict::AlreadyRestricted);
        }

        let chat_settings = settings::get_settings(self.db.pool(), chat_id).await?;

        if chat_settings.anti_flood {
            if self.is_flooding(chat_id, user_id).await? {
                let enforced = self
                    .mute(chat_id, user_id, MuteReason::Flood, self.config.flood_mute)
                    .await?;
                return Ok(Verdict::Muted {
                    reason: MuteReason::Flood,
                    enforced,
                });
            }

            if self.is_spamming(chat_id, user_id, text).await? {
                let enforced = self
                    .mute(chat_id, user_id, MuteReason::Spam, self.config.spam_mute)
                    .await?;
                return Ok(Verdict::Muted {
                    reason: MuteReason::Spam,
                    enforced,
                });
            }
        }

        if chat_settings.anti_profanity && self.contains_profanity(text) {
            let outcome = self.issue_warn(chat_id, user_id, "profanity", None).await?;
            return Ok(if outcome.banned {
                Verdict::Banned {
                    enforced: outcome.ban_enforced,
                }
            } else {
                Verdict::Warned {
                    count: outcome.warn_count,
                }
            });
        }

        Ok(Verdict::Clean)
    }

    /// Append a warn record and escalate to ban at the threshold.
    ///
    /// The administrative entry point: command handlers call this directly,
    /// and the profanity check routes through it. When the warn count
    /// reaches the threshold and no ban record exists yet, a ban record is
    /// appended in the same operation and the external ban call is made.
    pub async fn issue_warn(
        &self,
        chat_id: i64,
        user_id: i64,
        reason: &str,
        admin_id: Option<i64>,
    ) -> Result<WarnOutcome, EnforcementError> {
        moderation::append_record(
            self.db.pool(),
            chat_id,
            user_id,
            ModerationKind::Warn,
            None,
            reason,
            admin_id,
        )
        .await?;

        let warn_count = moderation::warn_count(self.db.pool(), chat_id, user_id).await?;
        info!(chat_id, user_id, warn_count, reason, "warn recorded");

        if warn_count < self.config.warns_before_ban
            || moderation::has_ban(self.db.pool(), chat_id, user_id).await?
        {
            return Ok(WarnOutcome {
                warn_count,
                banned: false,
                ban_enforced: false,
            });
        }

        // Threshold reached: the ban record rides along with the 3rd warn.
        moderation::append_record(
            self.db.pool(),
            chat_id,
            user_id,
            ModerationKind::Ban,
            None,
            "warn limit reached",
            admin_id,
        )
        .await?;

        let ban_enforced = match self.transport.ban_member(chat_id, user_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id, user_id, "ban call failed: {e}");
                false
            }
        };
        info!(chat_id, user_id, ban_enforced, "warn limit reached, ban recorded");

        Ok(WarnOutcome {
            warn_count,
            banned: true,
            ban_enforced,
        })
    }

    /// Append an ignore record: the engine stops reacting to this user.
    pub async fn issue_ignore(
        &self,
        chat_id: i64,
        user_id: i64,
        reason: &str,
        admin_id: Option<i64>,
    ) -> Result<(), EnforcementError> {
        moderation::append_record(
            self.db.pool(),
            chat_id,
            user_id,
            ModerationKind::Ignore,
            None,
            reason,
            admin_id,
        )
        .await?;
        info!(chat_id, user_id, "ignore recorded");
        Ok(())
    }

    /// Administrative override: remove mute and ignore records for a user.
    ///
    /// Warn and ban records are never removed here; the warn/ban ladder has
    /// no downward transition at this layer.
    pub async fn lift_restrictions(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<u64, EnforcementError> {
        let mut removed =
            moderation::delete_records(self.db.pool(), chat_id, user_id, ModerationKind::Mute)
                .await?;
        removed +=
            moderation::delete_records(self.db.pool(), chat_id, user_id, ModerationKind::Ignore)
                .await?;
        info!(chat_id, user_id, removed, "restrictions lifted");
        Ok(removed)
    }

    async fn is_flooding(&self, chat_id: i64, user_id: i64) -> Result<bool, EnforcementError> {
        let run = self.config.flood_run;
        let types =
            chat_history::recent_types(self.db.pool(), chat_id, user_id, run as i64).await?;
        Ok(types.len() == run && types.iter().all(|t| t.is_flood_media()))
    }

    async fn is_spamming(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
    ) -> Result<bool, EnforcementError> {
        // Media messages carry empty text; a run of those is flooding, not
        // spamming.
        if text.trim().is_empty() {
            return Ok(false);
        }
        let run = self.config.spam_run;
        let texts =
            chat_history::recent_texts(self.db.pool(), chat_id, user_id, run as i64).await?;
        Ok(texts.len() == run && texts.iter().all(|t| t == text))
    }

    fn contains_profanity(&self, text: &str) -> bool {
        if self.config.profanity_terms.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.config
            .profanity_terms
            .iter()
            .any(|term| lowered.contains(term.as_str()))
    }

    /// Record a mute and make the external restriction call.
    ///
    /// The record goes in first; a failed call leaves the log authoritative
    /// and reports `enforced = false`.
    async fn mute(
        &self,
        chat_id: i64,
        user_id: i64,
        reason: MuteReason,
        duration: Duration,
    ) -> Result<bool, EnforcementError> {
        moderation::append_record(
            self.db.pool(),
            chat_id,
            user_id,
            ModerationKind::Mute,
            Some(duration),
            reason.as_str(),
            None,
        )
        .await?;

        let until = Utc::now() + chrono::Duration::seconds(duration.as_secs() as i64);
        let enforced = match self
            .transport
            .restrict_member(chat_id, user_id, ChatPermissions::muted(), until)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id, user_id, "restriction call failed: {e}");
                false
            }
        };
        info!(
            chat_id,
            user_id,
            reason = reason.as_str(),
            enforced,
            "mute recorded"
        );

        Ok(enforced)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok()?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{RecordingTransport, TransportCall};
    use database::models::ChatSettings;

    const CHAT: i64 = -100500;
    const USER: i64 = 42;

    async fn test_engine() -> (EnforcementEngine<RecordingTransport>, RecordingTransport) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let transport = RecordingTransport::new();
        let engine = EnforcementEngine::new(db, transport.clone(), EngineConfig::default());
        (engine, transport)
    }

    async fn mute_count(engine: &EnforcementEngine<RecordingTransport>) -> i64 {
        moderation::count_of_kind(engine.db.pool(), CHAT, USER, ModerationKind::Mute)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_messages_pass() {
        let (engine, transport) = test_engine().await;

        for text in ["hi", "how is everyone", "ok"] {
            let verdict = engine
                .evaluate_and_act(CHAT, USER, text, MessageType::Text)
                .await
                .unwrap();
            assert_eq!(verdict, Verdict::Clean);
        }
        assert_eq!(transport.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_flood_five_stickers_one_mute() {
        let (engine, transport) = test_engine().await;

        // Four media messages: below the run length, no action
        for _ in 0..4 {
            let verdict = engine
                .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
                .await
                .unwrap();
            assert_eq!(verdict, Verdict::Clean);
        }
        assert_eq!(mute_count(&engine).await, 0);

        // The fifth completes the run
        let verdict = engine
            .evaluate_and_act(CHAT, USER, "", MessageType::Gif)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Muted {
                reason: MuteReason::Flood,
                enforced: true
            }
        );
        assert_eq!(mute_count(&engine).await, 1);
        assert_eq!(
            transport.calls().await,
            vec![TransportCall::Restrict {
                chat: CHAT,
                user: USER
            }]
        );
    }

    #[tokio::test]
    async fn test_flood_run_broken_by_text() {
        let (engine, _) = test_engine().await;

        for _ in 0..4 {
            engine
                .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
                .await
                .unwrap();
        }
        engine
            .evaluate_and_act(CHAT, USER, "a text", MessageType::Text)
            .await
            .unwrap();
        let verdict = engine
            .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::Clean);
        assert_eq!(mute_count(&engine).await, 0);
    }

    #[tokio::test]
    async fn test_spam_three_identical_one_mute() {
        let (engine, _) = test_engine().await;

        assert_eq!(
            engine
                .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
                .await
                .unwrap(),
            Verdict::Clean
        );
        assert_eq!(
            engine
                .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
                .await
                .unwrap(),
            Verdict::Clean
        );
        let verdict = engine
            .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Muted {
                reason: MuteReason::Spam,
                enforced: true
            }
        );
        assert_eq!(mute_count(&engine).await, 1);
    }

    #[tokio::test]
    async fn test_muted_user_short_circuits() {
        let (engine, transport) = test_engine().await;

        for _ in 0..3 {
            engine
                .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
                .await
                .unwrap();
        }
        assert_eq!(mute_count(&engine).await, 1);

        // Further identical messages inside the mute window do not stack
        let verdict = engine
            .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::AlreadyRestricted);
        assert_eq!(mute_count(&engine).await, 1);
        assert_eq!(transport.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_record_persisted_when_restriction_call_fails() {
        let (engine, transport) = test_engine().await;
        transport.set_fail_restrictions(true);

        for _ in 0..4 {
            engine
                .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
                .await
                .unwrap();
        }
        let verdict = engine
            .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
            .await
            .unwrap();

        // The call failed but the log is authoritative
        assert_eq!(
            verdict,
            Verdict::Muted {
                reason: MuteReason::Flood,
                enforced: false
            }
        );
        assert_eq!(mute_count(&engine).await, 1);
        assert_eq!(transport.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_warn_escalation_to_ban() {
        let (engine, transport) = test_engine().await;

        let first = engine.issue_warn(CHAT, USER, "off topic", Some(1)).await.unwrap();
        assert_eq!(first.warn_count, 1);
        assert!(!first.banned);

        let second = engine.issue_warn(CHAT, USER, "again", Some(1)).await.unwrap();
        assert_eq!(second.warn_count, 2);
        assert!(!second.banned);

        assert!(!moderation::has_ban(engine.db.pool(), CHAT, USER).await.unwrap());

        // The third warn appends exactly one ban record in the same operation
        let third = engine.issue_warn(CHAT, USER, "enough", Some(1)).await.unwrap();
        assert_eq!(third.warn_count, 3);
        assert!(third.banned);
        assert!(third.ban_enforced);

        assert_eq!(
            moderation::count_of_kind(engine.db.pool(), CHAT, USER, ModerationKind::Ban)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            transport.calls().await,
            vec![TransportCall::Ban {
                chat: CHAT,
                user: USER
            }]
        );
    }

    #[tokio::test]
    async fn test_fourth_warn_does_not_ban_again() {
        let (engine, transport) = test_engine().await;

        for _ in 0..4 {
            engine.issue_warn(CHAT, USER, "warned", None).await.unwrap();
        }

        assert_eq!(
            moderation::count_of_kind(engine.db.pool(), CHAT, USER, ModerationKind::Ban)
                .await
                .unwrap(),
            1
        );
        assert_eq!(transport.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_profanity_routes_through_warn_path() {
        let (engine, _) = test_engine().await;
        let db = engine.db.clone();
        settings::upsert_settings(
            db.pool(),
            &ChatSettings {
                chat_id: CHAT,
                anti_profanity: true,
                anti_flood: true,
            },
        )
        .await
        .unwrap();

        let engine = EnforcementEngine::new(
            db,
            RecordingTransport::new(),
            EngineConfig {
                profanity_terms: vec!["scum".to_string()],
                ..EngineConfig::default()
            },
        );

        let verdict = engine
            .evaluate_and_act(CHAT, USER, "you absolute SCUM", MessageType::Text)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Warned { count: 1 });
    }

    #[tokio::test]
    async fn test_anti_flood_toggle_disables_checks() {
        let (engine, _) = test_engine().await;
        settings::upsert_settings(
            engine.db.pool(),
            &ChatSettings {
                chat_id: CHAT,
                anti_profanity: false,
                anti_flood: false,
            },
        )
        .await
        .unwrap();

        for _ in 0..6 {
            let verdict = engine
                .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
                .await
                .unwrap();
            assert_eq!(verdict, Verdict::Clean);
        }
        assert_eq!(mute_count(&engine).await, 0);
    }

    #[tokio::test]
    async fn test_ignored_user_is_not_evaluated() {
        let (engine, transport) = test_engine().await;

        engine.issue_ignore(CHAT, USER, "bot account", Some(1)).await.unwrap();

        // Even a flood-length media run draws no reaction
        for _ in 0..6 {
            let verdict = engine
                .evaluate_and_act(CHAT, USER, "", MessageType::Sticker)
                .await
                .unwrap();
            assert_eq!(verdict, Verdict::AlreadyRestricted);
        }
        assert_eq!(mute_count(&engine).await, 0);
        assert_eq!(transport.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_lift_restrictions_removes_mute_only() {
        let (engine, _) = test_engine().await;

        for _ in 0..3 {
            engine
                .evaluate_and_act(CHAT, USER, "buy now", MessageType::Text)
                .await
                .unwrap();
        }
        engine.issue_warn(CHAT, USER, "warned", None).await.unwrap();

        let removed = engine.lift_restrictions(CHAT, USER).await.unwrap();
        assert_eq!(removed, 1);

        let state = state_of(&engine.db, CHAT, USER).await.unwrap();
        assert!(!state.is_restricted());
        assert_eq!(state.warn_count, 1);
    }
}
