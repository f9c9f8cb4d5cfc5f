//! The only code paths allowed to change the pool.

use contracts::{LogEntry, Notice, TriggerConfig};
use rand::Rng;
use thiserror::Error;

use crate::flavor;
use crate::host::TableHost;
use crate::store::{CounterStore, PoolChange};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    #[error("no Misfortune points to spend")]
    InsufficientBalance,
    #[error("user {user_id} is not allowed to {action}")]
    Unauthorized {
        user_id: String,
        action: &'static str,
    },
    #[error("user {0} is not connected")]
    UnknownUser(String),
    #[error("no reset is awaiting confirmation from user {0}")]
    NoPendingReset(String),
    #[error("trigger value must not be negative, got {0}")]
    NegativeTriggerValue(i64),
}

/// Borrowed view of the state a mutation needs. Repeated calls are never
/// deduplicated; each one mutates and logs again.
pub struct MutationAuthority<'a> {
    store: &'a mut CounterStore,
    config: &'a TriggerConfig,
    is_elected_writer: bool,
}

impl<'a> MutationAuthority<'a> {
    pub fn new(
        store: &'a mut CounterStore,
        config: &'a TriggerConfig,
        is_elected_writer: bool,
    ) -> Self {
        Self {
            store,
            config,
            is_elected_writer,
        }
    }

    /// Adds one point. Only the elected writer records it in the log, since
    /// every client observes the same roll.
    pub fn increment(&mut self, actor_label: Option<&str>, roll: Option<i64>) -> PoolChange {
        let current = self.store.read();
        let change = self.store.write(current as i64 + 1);

        if self.is_elected_writer {
            self.store.append_log(LogEntry::earned(
                actor_label.map(str::to_string),
                roll,
                change.current,
            ));
        }

        change
    }

    pub fn decrement<H, R>(
        &mut self,
        host: &mut H,
        rng: &mut R,
        recipient: Option<&str>,
    ) -> Result<PoolChange, AuthorityError>
    where
        H: TableHost + ?Sized,
        R: Rng + ?Sized,
    {
        let current = self.store.read();
        if current == 0 {
            host.notify(Notice::warn(
                "No Misfortune points to spend!",
                recipient.map(str::to_string),
            ));
            return Err(AuthorityError::InsufficientBalance);
        }

        let change = self.store.write(current as i64 - 1);
        self.store.append_log(LogEntry::spent(change.current));

        if self.config.chat_flavor {
            let line = flavor::pick_line(&flavor::SPENT_LINES, rng);
            host.post_chat(flavor::spent_card(
                line,
                change.current,
                flavor::narrative_audience(self.config),
            ));
        }

        host.notify(Notice::info(
            format!("Misfortune spent! {} points remaining.", change.current),
            recipient.map(str::to_string),
        ));

        Ok(change)
    }

    /// Always succeeds. A reset leaves no log entry of its own.
    pub fn reset<H>(&mut self, host: &mut H, recipient: Option<&str>) -> PoolChange
    where
        H: TableHost + ?Sized,
    {
        let change = self.store.write(0);

        host.notify(Notice::info(
            "Misfortune pool has been reset.",
            recipient.map(str::to_string),
        ));

        if self.config.chat_flavor {
            host.post_chat(flavor::reset_card(flavor::narrative_audience(self.config)));
        }

        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Outbox;
    use crate::settings::MemorySettings;
    use contracts::{LogEntryKind, NoticeLevel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store_with(pool: i64) -> CounterStore {
        let mut store = CounterStore::load(Box::new(MemorySettings::new())).expect("load");
        store.write(pool);
        store
    }

    #[test]
    fn increment_logs_only_on_elected_writer() {
        let config = TriggerConfig::default();
        let mut store = store_with(0);

        MutationAuthority::new(&mut store, &config, false).increment(Some("Anna"), Some(88));
        assert_eq!(store.read(), 1);
        assert_eq!(store.log().len(), 0);

        MutationAuthority::new(&mut store, &config, true).increment(Some("Anna"), Some(88));
        assert_eq!(store.read(), 2);
        let entry = store.log().next().expect("earned entry");
        assert_eq!(entry.kind, LogEntryKind::Earned);
        assert_eq!(entry.player.as_deref(), Some("Anna"));
        assert_eq!(entry.roll, Some(88));
        assert_eq!(entry.pool, 2);
    }

    #[test]
    fn decrement_at_zero_is_refused() {
        let config = TriggerConfig::default();
        let mut store = store_with(0);
        let mut outbox = Outbox::new();
        let mut rng = StdRng::seed_from_u64(1);

        let result = MutationAuthority::new(&mut store, &config, true).decrement(
            &mut outbox,
            &mut rng,
            Some("u_gm"),
        );

        assert_eq!(result, Err(AuthorityError::InsufficientBalance));
        assert_eq!(store.read(), 0);
        assert_eq!(store.log().len(), 0);
        assert!(outbox.chat.is_empty());
        assert_eq!(outbox.notices.len(), 1);
        assert_eq!(outbox.notices[0].level, NoticeLevel::Warn);
    }

    #[test]
    fn decrement_logs_spent_and_posts_flavor() {
        let config = TriggerConfig::default();
        let mut store = store_with(1);
        let mut outbox = Outbox::new();
        let mut rng = StdRng::seed_from_u64(1);

        let change = MutationAuthority::new(&mut store, &config, true)
            .decrement(&mut outbox, &mut rng, None)
            .expect("spend succeeds");

        assert_eq!(change.current, 0);
        let entry = store.log().next_back().expect("spent entry");
        assert_eq!(entry.kind, LogEntryKind::Spent);
        assert_eq!(entry.pool, 0);
        assert_eq!(outbox.chat.len(), 1);
        assert_eq!(
            outbox.notices[0].message,
            "Misfortune spent! 0 points remaining."
        );
    }

    #[test]
    fn reset_without_flavor_posts_no_chat() {
        let config = TriggerConfig {
            chat_flavor: false,
            ..TriggerConfig::default()
        };
        let mut store = store_with(3);
        let mut outbox = Outbox::new();

        let change = MutationAuthority::new(&mut store, &config, true).reset(&mut outbox, None);

        assert_eq!(change.previous, 3);
        assert_eq!(store.read(), 0);
        assert_eq!(store.log().len(), 0);
        assert!(outbox.chat.is_empty());
    }
}
