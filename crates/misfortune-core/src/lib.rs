//! Misfortune pool for a virtual tabletop: a shared counter that grows when a
//! player rolls the trigger value and that the GM can later spend.
//!
//! Only the elected writer (one privileged client) detects triggers and
//! records log entries. Every mutation is followed by a best-effort broadcast
//! of the new value, which other clients apply to their display only.

pub mod authority;
pub mod chat;
pub mod detector;
pub mod flavor;
pub mod host;
pub mod module;
pub mod presentation;
pub mod replication;
pub mod roster;
pub mod settings;
pub mod store;

pub use authority::{AuthorityError, MutationAuthority};
pub use chat::ChatCommand;
pub use detector::{Discard, RollValue, RollValueSource};
pub use host::{Outbox, TableHost};
pub use module::{ChatDisposition, ControlOutcome, MisfortuneModule, RollOutcome, Seat};
pub use presentation::{ResetPrompt, TrackerView};
pub use replication::Relay;
pub use roster::Roster;
pub use settings::{MemorySettings, SettingKey, SettingsBackend, StoreError, WorldSettings};
pub use store::{CounterStore, PoolChange};
