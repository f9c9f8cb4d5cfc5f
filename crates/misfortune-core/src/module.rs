use std::collections::HashSet;

use chrono::Local;
use contracts::{
    ChatAudience, ConnectedUser, DisplayCue, LogEntry, LogEntryKind, LogViewEntry, Notice,
    ReplicationMessage, RollTestEvent, TrackerControl, TrackerRender, TriggerConfig,
    TriggerConfigPatch, UserRole, MODULE_ID,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::authority::{AuthorityError, MutationAuthority};
use crate::chat::{self, ChatCommand};
use crate::detector::{self, Discard};
use crate::flavor;
use crate::host::TableHost;
use crate::presentation::{self, ResetPrompt, TrackerView};
use crate::replication::{self, Relay};
use crate::roster::Roster;
use crate::settings::{SettingsBackend, StoreError};
use crate::store::{CounterStore, PoolChange};

pub const MANUAL_ACTOR_LABEL: &str = "GM (manual)";

/// Where this module instance runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seat {
    /// Inside one user's client. It is the writer only while that user is elected.
    Client { user_id: String },
    /// Inside the table host, acting for whichever user is elected.
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollOutcome {
    Triggered {
        user_id: String,
        user_name: String,
        roll: i64,
        pool: u64,
    },
    Discarded(Discard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied { pool: u64 },
    ConfirmationRequired(ResetPrompt),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDisposition {
    PassThrough,
    Handled(ChatCommand),
    Refused {
        command: ChatCommand,
        reason: AuthorityError,
    },
}

/// All Misfortune state for one client or host: the counter store, cached
/// config, roster, local tracker and outbound ports.
pub struct MisfortuneModule<H> {
    store: CounterStore,
    config: TriggerConfig,
    roster: Roster,
    seat: Seat,
    view: TrackerView,
    pending_resets: HashSet<String>,
    rng: StdRng,
    host: H,
}

impl<H> MisfortuneModule<H>
where
    H: TableHost + Relay,
{
    pub fn load(
        backend: Box<dyn SettingsBackend>,
        seat: Seat,
        host: H,
    ) -> Result<Self, StoreError> {
        let store = CounterStore::load(backend)?;
        let config = store.settings().config()?;
        let view_role = match seat {
            Seat::Host => UserRole::Gamemaster,
            Seat::Client { .. } => UserRole::Player,
        };

        let mut module = Self {
            store,
            config,
            roster: Roster::new(),
            seat,
            view: TrackerView::new(view_role),
            pending_resets: HashSet::new(),
            rng: StdRng::from_entropy(),
            host,
        };
        module.render_tracker();

        info!(
            module = MODULE_ID,
            pool = module.pool(),
            config = %module.config,
            "module ready, the Dark Gods are watching"
        );
        Ok(module)
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn view(&self) -> &TrackerView {
        &self.view
    }

    pub fn pool(&self) -> u64 {
        self.store.read()
    }

    pub fn log(&self) -> Vec<LogEntry> {
        self.store.log().cloned().collect()
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.store.last_persistence_error()
    }

    pub fn is_elected_writer(&self) -> bool {
        match &self.seat {
            Seat::Client { user_id } => self.roster.is_elected_writer(user_id),
            Seat::Host => self.roster.elected_writer().is_some(),
        }
    }

    pub fn elected_writer(&self) -> Option<&ConnectedUser> {
        self.roster.elected_writer()
    }

    /// Returns the elected writer after the change.
    pub fn connect(&mut self, user: ConnectedUser) -> Option<String> {
        let before = self.writer_id();
        info!(user_id = %user.user_id, role = ?user.role, "user connected");
        self.roster.connect(user);
        self.after_roster_change(before)
    }

    pub fn disconnect(&mut self, user_id: &str) -> Option<String> {
        let before = self.writer_id();
        if self.roster.disconnect(user_id).is_some() {
            info!(user_id, "user disconnected");
        }
        self.pending_resets.remove(user_id);
        self.after_roster_change(before)
    }

    pub fn handle_roll(&mut self, event: &RollTestEvent) -> RollOutcome {
        let is_writer = self.is_elected_writer();
        let trigger = match detector::detect(event, &self.roster, &self.config, is_writer) {
            Ok(trigger) => trigger,
            Err(discard) => {
                if discard == Discard::UnresolvedRollValue {
                    warn!(
                        hook = event.kind.hook_name(),
                        test = %event.test,
                        "could not extract roll value from test"
                    );
                } else {
                    debug!(hook = event.kind.hook_name(), ?discard, "roll discarded");
                }
                return RollOutcome::Discarded(discard);
            }
        };

        info!(
            user = %trigger.user.name,
            roll = trigger.roll,
            "misfortune triggered"
        );

        let change = MutationAuthority::new(&mut self.store, &self.config, is_writer)
            .increment(Some(trigger.user.name.as_str()), Some(trigger.roll));

        if self.config.chat_flavor {
            let line = flavor::pick_line(&flavor::EARNED_LINES, &mut self.rng);
            self.host.post_chat(flavor::earned_card(
                line,
                &trigger.user.name,
                trigger.roll,
                change.current,
                flavor::narrative_audience(&self.config),
            ));
        }

        self.commit(change);

        RollOutcome::Triggered {
            user_id: trigger.user.user_id,
            user_name: trigger.user.name,
            roll: trigger.roll,
            pool: change.current,
        }
    }

    pub fn add_misfortune(&mut self, actor_label: Option<&str>, roll: Option<i64>) -> u64 {
        let is_writer = self.is_elected_writer();
        let change = MutationAuthority::new(&mut self.store, &self.config, is_writer)
            .increment(actor_label, roll);
        self.commit(change);
        change.current
    }

    pub fn spend_misfortune(&mut self, issuer: Option<&str>) -> Result<u64, AuthorityError> {
        let is_writer = self.is_elected_writer();
        let change = MutationAuthority::new(&mut self.store, &self.config, is_writer).decrement(
            &mut self.host,
            &mut self.rng,
            issuer,
        )?;
        self.commit(change);
        Ok(change.current)
    }

    pub fn reset_pool(&mut self, issuer: Option<&str>) -> u64 {
        let is_writer = self.is_elected_writer();
        let change = MutationAuthority::new(&mut self.store, &self.config, is_writer)
            .reset(&mut self.host, issuer);
        self.commit(change);
        change.current
    }

    pub fn render_tracker(&mut self) -> Option<&TrackerRender> {
        let pool = self.store.read();
        self.view.render(&self.config, pool)
    }

    pub fn tracker_for(&self, role: UserRole) -> Option<TrackerRender> {
        presentation::render_for(role, &self.config, self.store.read())
    }

    /// The previous view may be gone after a scene change, so draw from scratch.
    pub fn on_scene_change(&mut self) -> Option<&TrackerRender> {
        self.view.teardown();
        self.render_tracker()
    }

    pub fn receive_replication(&mut self, message: &ReplicationMessage) -> Option<DisplayCue> {
        replication::apply_to_view(&mut self.view, message, &self.config)
    }

    pub fn press_control(
        &mut self,
        issuer_id: &str,
        control: TrackerControl,
    ) -> Result<ControlOutcome, AuthorityError> {
        let issuer = self.require_privileged(issuer_id, "use the Misfortune controls")?;

        match control {
            TrackerControl::Spend => {
                let pool = self.spend_misfortune(Some(issuer.user_id.as_str()))?;
                Ok(ControlOutcome::Applied { pool })
            }
            TrackerControl::Add => {
                let pool = self.add_misfortune(Some(MANUAL_ACTOR_LABEL), None);
                self.host.notify(Notice::info(
                    format!("Misfortune manually added. Pool: {pool}"),
                    Some(issuer.user_id),
                ));
                Ok(ControlOutcome::Applied { pool })
            }
            TrackerControl::Reset => {
                self.pending_resets.insert(issuer.user_id);
                Ok(ControlOutcome::ConfirmationRequired(ResetPrompt::default()))
            }
        }
    }

    pub fn confirm_reset(
        &mut self,
        issuer_id: &str,
        confirmed: bool,
    ) -> Result<ControlOutcome, AuthorityError> {
        if !self.pending_resets.remove(issuer_id) {
            return Err(AuthorityError::NoPendingReset(issuer_id.to_string()));
        }

        if !confirmed {
            return Ok(ControlOutcome::Cancelled);
        }

        let issuer = self.require_privileged(issuer_id, "reset the Misfortune pool")?;
        let pool = self.reset_pool(Some(issuer.user_id.as_str()));
        Ok(ControlOutcome::Applied { pool })
    }

    pub fn handle_chat(&mut self, issuer_id: &str, text: &str) -> ChatDisposition {
        let Some(command) = chat::parse(text) else {
            return ChatDisposition::PassThrough;
        };

        let Some(issuer) = self.roster.get(issuer_id).cloned() else {
            return ChatDisposition::Refused {
                command,
                reason: AuthorityError::UnknownUser(issuer_id.to_string()),
            };
        };

        if command.requires_privilege() && !issuer.role.is_privileged() {
            let warning = match command {
                ChatCommand::Spend => "Only the GM can spend Misfortune points!",
                _ => "Only the GM can reset the Misfortune pool!",
            };
            self.host
                .notify(Notice::warn(warning, Some(issuer.user_id.clone())));
            return ChatDisposition::Refused {
                command,
                reason: AuthorityError::Unauthorized {
                    user_id: issuer.user_id,
                    action: if command == ChatCommand::Spend {
                        "spend Misfortune"
                    } else {
                        "reset Misfortune"
                    },
                },
            };
        }

        match command {
            ChatCommand::Status => {
                let audience = if issuer.role.is_privileged() {
                    ChatAudience::Public
                } else {
                    ChatAudience::PrivilegedAndUser {
                        user_id: issuer.user_id.clone(),
                    }
                };
                self.host
                    .post_chat(flavor::status_card(self.store.read(), audience));
            }
            ChatCommand::Spend => {
                if let Err(reason) = self.spend_misfortune(Some(issuer.user_id.as_str())) {
                    return ChatDisposition::Refused { command, reason };
                }
            }
            ChatCommand::Reset => {
                self.reset_pool(Some(issuer.user_id.as_str()));
            }
            ChatCommand::Help => {
                self.host.post_chat(flavor::help_card(&issuer.user_id));
            }
        }

        ChatDisposition::Handled(command)
    }

    pub fn update_config(
        &mut self,
        issuer_id: &str,
        patch: &TriggerConfigPatch,
    ) -> Result<TriggerConfig, AuthorityError> {
        self.require_privileged(issuer_id, "change Misfortune settings")?;
        if let Some(trigger_value) = patch.trigger_value.filter(|value| *value < 0) {
            return Err(AuthorityError::NegativeTriggerValue(trigger_value));
        }

        let show_players_before = self.config.show_players;
        self.config.apply(patch);
        if let Err(err) = self.store.settings_mut().save_config(&self.config) {
            warn!(error = %err, "failed to persist misfortune settings");
        }

        info!(config = %self.config, "misfortune settings changed");
        if self.config.show_players != show_players_before {
            self.render_tracker();
        }

        Ok(self.config.clone())
    }

    /// Newest first.
    pub fn log_view(&self, issuer_id: &str) -> Result<Vec<LogViewEntry>, AuthorityError> {
        self.require_privileged(issuer_id, "view the Misfortune log")?;

        Ok(self
            .store
            .log()
            .rev()
            .map(|entry| LogViewEntry {
                entry: entry.clone(),
                formatted_time: entry
                    .timestamp
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                is_earned: entry.kind == LogEntryKind::Earned,
                is_spent: entry.kind == LogEntryKind::Spent,
            })
            .collect())
    }

    /// Re-read persisted state, discarding the local cache.
    pub fn reload(&mut self) -> Result<u64, StoreError> {
        let pool = self.store.reload()?;
        self.config = self.store.settings().config()?;
        self.render_tracker();
        Ok(pool)
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.flush()?;
        self.store.settings_mut().save_config(&self.config)
    }

    pub fn teardown(mut self) -> Result<H, StoreError> {
        self.flush()?;
        self.view.teardown();
        info!(module = MODULE_ID, "module torn down");
        Ok(self.host)
    }

    fn commit(&mut self, change: PoolChange) {
        self.view.apply(change.current, &self.config);
        self.host
            .publish(ReplicationMessage::update_tracker(change.current));
    }

    fn writer_id(&self) -> Option<String> {
        self.roster
            .elected_writer()
            .map(|writer| writer.user_id.clone())
    }

    fn after_roster_change(&mut self, before: Option<String>) -> Option<String> {
        let after = self.writer_id();
        if after != before {
            info!(previous = ?before, current = ?after, "elected writer changed");
        }

        if let Seat::Client { user_id } = &self.seat {
            let role = self
                .roster
                .get(user_id)
                .map(|user| user.role)
                .unwrap_or(UserRole::Player);
            if role != self.view.viewer_role() {
                self.view.set_viewer_role(role);
                self.render_tracker();
            }
        }

        after
    }

    fn require_privileged(
        &self,
        issuer_id: &str,
        action: &'static str,
    ) -> Result<ConnectedUser, AuthorityError> {
        let issuer = self
            .roster
            .get(issuer_id)
            .ok_or_else(|| AuthorityError::UnknownUser(issuer_id.to_string()))?;

        if !issuer.role.is_privileged() {
            return Err(AuthorityError::Unauthorized {
                user_id: issuer_id.to_string(),
                action,
            });
        }

        Ok(issuer.clone())
    }
}
