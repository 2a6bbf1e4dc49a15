//! Broadcast task queueing and the dispatch cycle.

use std::env;
use std::future::Future;
use std::time::Duration;

use chat_core::ChatTransport;
use database::models::{AdQueueEntry, AdTask};
use database::{ad_queue, ad_task, chat_history, Database};
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between dispatch cycles.
    pub cycle_interval: Duration,
    /// Maximum sends to one chat, across all tasks, inside the rate window.
    pub per_chat_cap: i64,
    /// Dispatch attempts per task per cycle.
    pub dispatches_per_task: u32,
    /// Trailing window a chat must have been active in to be targeted.
    pub activity_window: Duration,
    /// Trailing window the per-chat cap is computed over.
    pub rate_window: Duration,
    /// Chat that receives task completion notifications, if any.
    pub notify_chat: Option<i64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60 * 60),
            per_chat_cap: 5,
            dispatches_per_task: 1,
            activity_window: Duration::from_secs(7 * 24 * 60 * 60),
            rate_window: Duration::from_secs(60 * 60),
            notify_chat: None,
        }
    }
}

impl SchedulerConfig {
    /// Load scheduler tunables from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("WARDEN_AD_CYCLE_SECS") {
            config.cycle_interval = Duration::from_secs(secs);
        }
        if let Some(cap) = env_u64("WARDEN_AD_CHAT_CAP") {
            config.per_chat_cap = cap as i64;
        }
        if let Some(count) = env_u64("WARDEN_AD_DISPATCHES_PER_TASK") {
            config.dispatches_per_task = count as u32;
        }
        if let Some(days) = env_u64("WARDEN_AD_ACTIVITY_WINDOW_DAYS") {
            config.activity_window = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(secs) = env_u64("WARDEN_AD_RATE_WINDOW_SECS") {
            config.rate_window = Duration::from_secs(secs);
        }
        if let Some(chat) = env_i64("WARDEN_AD_NOTIFY_CHAT") {
            config.notify_chat = Some(chat);
        }

        config
    }
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries dispatched successfully.
    pub dispatched: u64,
    /// Tasks skipped because their drawn chat was at the cap.
    pub rate_limited: u64,
    /// Dispatch attempts that failed and were released for retry.
    pub failed: u64,
    /// Tasks that reached their total this cycle.
    pub completed: u64,
}

/// On-demand progress of one task.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub task: AdTask,
    pub entries: Vec<AdQueueEntry>,
}

/// Outcome of one dispatch attempt for one task.
enum StepOutcome {
    NoPending,
    RateLimited,
    Failed,
    Sent { completed: bool },
}

/// The ad distribution scheduler.
///
/// Tasks are created with an immutable snapshot of recently active chats as
/// their target set. A fixed-interval cycle then walks every active task,
/// draws one pending destination uniformly at random, applies the shared
/// per-chat rate cap, and dispatches through the transport. All progress is
/// persisted in the `sent`/`sent_at` fields, so a restarted process resumes
/// exactly where it stopped.
pub struct AdScheduler<T: ChatTransport> {
    db: Database,
    transport: T,
    config: SchedulerConfig,
}

impl<T: ChatTransport> AdScheduler<T> {
    /// Create a scheduler over the shared database handle and a transport.
    pub fn new(db: Database, transport: T, config: SchedulerConfig) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// Get the scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Create a broadcast task targeting all recently active chats.
    ///
    /// Validates before writing anything: the total must be positive and the
    /// target snapshot must be able to satisfy it. The task row and its
    /// queue entries are created in one transaction.
    pub async fn enqueue_task(
        &self,
        total: i64,
        text: &str,
        image: Option<&str>,
    ) -> Result<i64, SchedulerError> {
        if total <= 0 {
            return Err(SchedulerError::InvalidTotal(total));
        }

        let targets =
            chat_history::active_chats_since(self.db.pool(), self.config.activity_window).await?;
        if targets.is_empty() {
            return Err(SchedulerError::NoEligibleChats);
        }
        if total > targets.len() as i64 {
            return Err(SchedulerError::InsufficientTargets {
                total,
                targets: targets.len(),
            });
        }

        let task_id =
            ad_task::create_task_with_queue(self.db.pool(), total, text, image, &targets).await?;
        info!(task_id, total, targets = targets.len(), "ad task enqueued");

        Ok(task_id)
    }

    /// Run one dispatch cycle over all active tasks.
    ///
    /// Each task gets up to `dispatches_per_task` attempts; a task whose
    /// drawn chat is rate-limited is skipped for the whole cycle with no
    /// entry consumed. One task's failure never affects another's progress.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let tasks = ad_task::active_tasks(self.db.pool()).await?;
        let mut report = CycleReport::default();

        for task in tasks {
            // A crash between the counter increment and the status update
            // leaves a full task still active; finish the transition here.
            if task.sent >= task.total {
                match self.finalize(task.id, task.sent, task.total).await {
                    Ok(()) => report.completed += 1,
                    Err(e) => {
                        error!(task_id = task.id, "finalize failed: {e}");
                        report.failed += 1;
                    }
                }
                continue;
            }

            for _ in 0..self.config.dispatches_per_task {
                match self.step(&task).await {
                    Ok(StepOutcome::Sent { completed }) => {
                        report.dispatched += 1;
                        if completed {
                            report.completed += 1;
                            break;
                        }
                    }
                    Ok(StepOutcome::NoPending) => break,
                    Ok(StepOutcome::RateLimited) => {
                        report.rate_limited += 1;
                        break;
                    }
                    Ok(StepOutcome::Failed) => {
                        report.failed += 1;
                        break;
                    }
                    Err(e) => {
                        // Isolate this task; the rest of the cycle goes on.
                        error!(task_id = task.id, "cycle step failed: {e}");
                        report.failed += 1;
                        break;
                    }
                }
            }
        }

        debug!(?report, "dispatch cycle finished");
        Ok(report)
    }

    /// Cancel an active task. Returns whether the transition applied.
    ///
    /// Pending queue entries of a cancelled task stay unsent forever.
    pub async fn cancel_task(&self, task_id: i64) -> Result<bool, SchedulerError> {
        let cancelled = ad_task::cancel_task(self.db.pool(), task_id).await?;
        if cancelled {
            info!(task_id, "ad task cancelled");
        }
        Ok(cancelled)
    }

    /// Current progress of a task: counters plus per-entry delivery state.
    ///
    /// There is no automatic failure notification, so this is the way to
    /// find out how a task is doing.
    pub async fn task_progress(&self, task_id: i64) -> Result<TaskProgress, SchedulerError> {
        let task = ad_task::get_task(self.db.pool(), task_id).await?;
        let entries = ad_queue::entries_for_task(self.db.pool(), task_id).await?;
        Ok(TaskProgress { task, entries })
    }

    /// Run dispatch cycles until the shutdown future completes.
    ///
    /// The first cycle runs immediately, which is what makes a restart
    /// resume pending work without waiting a full interval. A shutdown that
    /// arrives mid-cycle takes effect once the cycle's current dispatch
    /// attempts have finished; nothing needs rolling back.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            interval_secs = self.config.cycle_interval.as_secs(),
            "ad scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.cycle_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("shutdown signal received, stopping ad scheduler");
                    return;
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("dispatch cycle failed: {e}");
                    }
                }
            }
        }
    }

    /// One dispatch attempt for one task.
    async fn step(&self, task: &AdTask) -> Result<StepOutcome, SchedulerError> {
        // Claim-and-mark is a single conditional update; a claimed entry is
        // invisible to any concurrent cycle until released.
        let Some(chat_id) = ad_queue::claim_random_pending(self.db.pool(), task.id).await? else {
            debug!(task_id = task.id, "no pending queue entries");
            return Ok(StepOutcome::NoPending);
        };

        let recent = ad_queue::recent_sends_for_chat(
            self.db.pool(),
            chat_id,
            self.config.rate_window,
            task.id,
        )
        .await?;
        if recent >= self.config.per_chat_cap {
            ad_queue::release_claim(self.db.pool(), task.id, chat_id, None).await?;
            debug!(task_id = task.id, chat_id, recent, "chat at send cap, task skipped");
            return Ok(StepOutcome::RateLimited);
        }

        let send_result = match task.image.as_deref() {
            Some(image) => {
                self.transport
                    .send_photo(chat_id, image, Some(&task.text))
                    .await
            }
            None => self.transport.send_text(chat_id, &task.text).await,
        };

        if let Err(e) = send_result {
            warn!(task_id = task.id, chat_id, "dispatch failed: {e}");
            ad_queue::release_claim(self.db.pool(), task.id, chat_id, Some(&e.to_string()))
                .await?;
            return Ok(StepOutcome::Failed);
        }

        info!(task_id = task.id, chat_id, "ad dispatched");

        match ad_task::increment_sent(self.db.pool(), task.id).await? {
            Some((sent, total)) if sent >= total => {
                self.finalize(task.id, sent, total).await?;
                Ok(StepOutcome::Sent { completed: true })
            }
            Some(_) => Ok(StepOutcome::Sent { completed: false }),
            None => {
                // Counter already full; the send went out, so the entry
                // stays marked (at-least-once delivery).
                warn!(task_id = task.id, "sent counter already at total");
                Ok(StepOutcome::Sent { completed: false })
            }
        }
    }

    /// Complete a full task and emit the single completion notification.
    async fn finalize(&self, task_id: i64, sent: i64, total: i64) -> Result<(), SchedulerError> {
        // The notification is tied to the state transition, so a finalize
        // retried after a crash cannot notify twice.
        if !ad_task::mark_completed(self.db.pool(), task_id).await? {
            return Ok(());
        }
        info!(task_id, sent, total, "ad task completed");

        if let Some(notify_chat) = self.config.notify_chat {
            let text = format!("Ad task {task_id} completed: delivered to {sent}/{total} chats");
            if let Err(e) = self.transport.send_text(notify_chat, &text).await {
                warn!(task_id, notify_chat, "completion notification failed: {e}");
            }
        }

        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok()?.parse().ok()
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::RecordingTransport;
    use database::models::MessageType;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn seed_chat(db: &Database, chat_id: i64) {
        chat_history::append_message(db.pool(), chat_id, 1, "hi", MessageType::Text)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_rejects_non_positive_total() {
        let db = test_db().await;
        seed_chat(&db, 100).await;
        let scheduler =
            AdScheduler::new(db.clone(), RecordingTransport::new(), SchedulerConfig::default());

        assert!(matches!(
            scheduler.enqueue_task(0, "promo", None).await,
            Err(SchedulerError::InvalidTotal(0))
        ));
        assert!(matches!(
            scheduler.enqueue_task(-3, "promo", None).await,
            Err(SchedulerError::InvalidTotal(-3))
        ));

        // Rejected before any row was written
        assert!(ad_task::active_tasks(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_target_set() {
        let db = test_db().await;
        let scheduler =
            AdScheduler::new(db, RecordingTransport::new(), SchedulerConfig::default());

        assert!(matches!(
            scheduler.enqueue_task(1, "promo", None).await,
            Err(SchedulerError::NoEligibleChats)
        ));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unreachable_total() {
        let db = test_db().await;
        seed_chat(&db, 100).await;
        seed_chat(&db, 200).await;
        let scheduler =
            AdScheduler::new(db, RecordingTransport::new(), SchedulerConfig::default());

        assert!(matches!(
            scheduler.enqueue_task(3, "promo", None).await,
            Err(SchedulerError::InsufficientTargets { total: 3, targets: 2 })
        ));
    }

    #[tokio::test]
    async fn test_enqueue_snapshots_active_chats() {
        let db = test_db().await;
        seed_chat(&db, 100).await;
        seed_chat(&db, 200).await;
        let scheduler = AdScheduler::new(
            db.clone(),
            RecordingTransport::new(),
            SchedulerConfig::default(),
        );

        let task_id = scheduler.enqueue_task(2, "promo", None).await.unwrap();

        let entries = ad_queue::entries_for_task(db.pool(), task_id).await.unwrap();
        let chats: Vec<i64> = entries.iter().map(|e| e.chat_id).collect();
        assert_eq!(chats, vec![100, 200]);

        // Chats becoming active later do not join the snapshot
        seed_chat(&db, 300).await;
        assert_eq!(
            ad_queue::entries_for_task(db.pool(), task_id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let db = test_db().await;
        seed_chat(&db, 100).await;
        let transport = RecordingTransport::new();
        let scheduler =
            AdScheduler::new(db, transport.clone(), SchedulerConfig::default());

        let task_id = scheduler.enqueue_task(1, "promo", None).await.unwrap();
        assert!(scheduler.cancel_task(task_id).await.unwrap());
        assert!(!scheduler.cancel_task(task_id).await.unwrap());

        // Cancelled tasks never dispatch
        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(transport.call_count().await, 0);
    }
}
