//! Roll-completion events as delivered by the host's hook dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RollTestKind {
    Test,
    WeaponTest,
    CastTest,
    ChannelTest,
    PrayerTest,
    TraitTest,
    IncomeTest,
}

impl RollTestKind {
    pub const ALL: [RollTestKind; 7] = [
        Self::Test,
        Self::WeaponTest,
        Self::CastTest,
        Self::ChannelTest,
        Self::PrayerTest,
        Self::TraitTest,
        Self::IncomeTest,
    ];

    pub fn hook_name(self) -> &'static str {
        match self {
            Self::Test => "wfrp4e:rollTest",
            Self::WeaponTest => "wfrp4e:rollWeaponTest",
            Self::CastTest => "wfrp4e:rollCastTest",
            Self::ChannelTest => "wfrp4e:rollChannelTest",
            Self::PrayerTest => "wfrp4e:rollPrayerTest",
            Self::TraitTest => "wfrp4e:rollTraitTest",
            Self::IncomeTest => "wfrp4e:rollIncomeTest",
        }
    }

    pub fn from_hook_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.hook_name() == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RollOptions {
    #[serde(default)]
    pub user: Option<String>,
}

/// A finished roll test. `test` is the host's opaque test object; only a few
/// fields of it are ever read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollTestEvent {
    pub kind: RollTestKind,
    pub test: Value,
    #[serde(default)]
    pub options: RollOptions,
}

impl RollTestEvent {
    pub fn new(kind: RollTestKind, test: Value, user: Option<String>) -> Self {
        Self {
            kind,
            test,
            options: RollOptions { user },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_round_trip() {
        for kind in RollTestKind::ALL {
            assert_eq!(RollTestKind::from_hook_name(kind.hook_name()), Some(kind));
        }
        assert_eq!(RollTestKind::from_hook_name("wfrp4e:rollSomething"), None);
    }

    #[test]
    fn options_default_when_missing() {
        let event: RollTestEvent =
            serde_json::from_str(r#"{"kind":"weapon_test","test":{"roll":12}}"#).expect("decode");
        assert_eq!(event.kind, RollTestKind::WeaponTest);
        assert!(event.options.user.is_none());
    }
}
