//! Decides whether a finished roll test earns a Misfortune point.
//!
//! Roll tests arrive in several shapes depending on the test variant, so both
//! the roll value and the acting character are read through ordered lists of
//! field locations. The first location that is present decides.

use contracts::{ConnectedUser, RollTestEvent, TriggerConfig};
use serde_json::Value;

use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollValueSource {
    ResultRoll,
    Roll,
    ResultDice,
}

impl RollValueSource {
    pub const ORDER: [RollValueSource; 3] = [Self::ResultRoll, Self::Roll, Self::ResultDice];

    pub fn pointer(self) -> &'static str {
        match self {
            Self::ResultRoll => "/result/roll",
            Self::Roll => "/roll",
            Self::ResultDice => "/result/dice",
        }
    }
}

const ACTOR_POINTERS: [&str; 3] = ["/actor/id", "/actor/_id", "/actor"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollValue {
    Found { source: RollValueSource, value: i64 },
    NotNumeric { source: RollValueSource },
    Missing,
}

pub fn extract_roll_value(test: &Value) -> RollValue {
    for source in RollValueSource::ORDER {
        let Some(raw) = test.pointer(source.pointer()) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }

        return match as_integer(raw) {
            Some(value) => RollValue::Found { source, value },
            None => RollValue::NotNumeric { source },
        };
    }

    RollValue::Missing
}

fn as_integer(raw: &Value) -> Option<i64> {
    if let Some(value) = raw.as_i64() {
        return Some(value);
    }

    raw.as_f64()
        .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .map(|value| value as i64)
}

pub fn extract_actor_id(test: &Value) -> Option<&str> {
    ACTOR_POINTERS
        .iter()
        .filter_map(|pointer| test.pointer(pointer))
        .find_map(Value::as_str)
}

/// (a) the user named in the event options, (b) a connected non-privileged
/// owner of the acting character.
pub fn resolve_user<'a>(event: &RollTestEvent, roster: &'a Roster) -> Option<&'a ConnectedUser> {
    if let Some(user) = event
        .options
        .user
        .as_deref()
        .and_then(|user_id| roster.get(user_id))
    {
        return Some(user);
    }

    extract_actor_id(&event.test).and_then(|actor_id| roster.find_owner(actor_id))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    NotElectedWriter,
    UnresolvedUser,
    PrivilegedUser { user_id: String },
    UnresolvedRollValue,
    NoMatch { roll: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub user: ConnectedUser,
    pub roll: i64,
}

pub fn detect(
    event: &RollTestEvent,
    roster: &Roster,
    config: &TriggerConfig,
    is_elected_writer: bool,
) -> Result<Trigger, Discard> {
    if !is_elected_writer {
        return Err(Discard::NotElectedWriter);
    }

    let user = resolve_user(event, roster).ok_or(Discard::UnresolvedUser)?;
    if user.role.is_privileged() {
        return Err(Discard::PrivilegedUser {
            user_id: user.user_id.clone(),
        });
    }

    let roll = match extract_roll_value(&event.test) {
        RollValue::Found { value, .. } => value,
        RollValue::NotNumeric { .. } | RollValue::Missing => {
            return Err(Discard::UnresolvedRollValue)
        }
    };

    if roll != config.trigger_value {
        return Err(Discard::NoMatch { roll });
    }

    Ok(Trigger {
        user: user.clone(),
        roll,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RollTestKind, UserRole};
    use serde_json::json;

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.connect(ConnectedUser {
            user_id: "u_gm".to_string(),
            name: "Greta".to_string(),
            role: UserRole::Gamemaster,
            owned_actors: vec!["actor_npc".to_string()],
        });
        roster.connect(ConnectedUser {
            user_id: "u_anna".to_string(),
            name: "Anna".to_string(),
            role: UserRole::Player,
            owned_actors: vec!["actor_anna".to_string()],
        });
        roster
    }

    #[test]
    fn roll_value_fallback_order() {
        assert_eq!(
            extract_roll_value(&json!({ "result": { "roll": 88, "dice": 11 }, "roll": 22 })),
            RollValue::Found {
                source: RollValueSource::ResultRoll,
                value: 88
            }
        );
        assert_eq!(
            extract_roll_value(&json!({ "result": { "dice": 11 }, "roll": 22 })),
            RollValue::Found {
                source: RollValueSource::Roll,
                value: 22
            }
        );
        assert_eq!(
            extract_roll_value(&json!({ "result": { "dice": 11.0 } })),
            RollValue::Found {
                source: RollValueSource::ResultDice,
                value: 11
            }
        );
        assert_eq!(extract_roll_value(&json!({ "result": {} })), RollValue::Missing);
    }

    #[test]
    fn first_present_field_decides_even_if_not_numeric() {
        assert_eq!(
            extract_roll_value(&json!({ "result": { "roll": "88" }, "roll": 88 })),
            RollValue::NotNumeric {
                source: RollValueSource::ResultRoll
            }
        );
        assert_eq!(
            extract_roll_value(&json!({ "result": { "roll": null }, "roll": 88 })),
            RollValue::Found {
                source: RollValueSource::Roll,
                value: 88
            }
        );
    }

    #[test]
    fn explicit_user_wins_over_actor_owner() {
        let roster = roster();
        let event = RollTestEvent::new(
            RollTestKind::Test,
            json!({ "actor": { "id": "actor_npc" } }),
            Some("u_anna".to_string()),
        );
        let user = resolve_user(&event, &roster).expect("resolved");
        assert_eq!(user.name, "Anna");
    }

    #[test]
    fn falls_back_to_actor_owner() {
        let roster = roster();
        let event = RollTestEvent::new(
            RollTestKind::CastTest,
            json!({ "actor": { "id": "actor_anna" }, "result": { "roll": 88 } }),
            Some("u_offline".to_string()),
        );
        let trigger = detect(&event, &roster, &TriggerConfig::default(), true).expect("trigger");
        assert_eq!(trigger.user.user_id, "u_anna");
        assert_eq!(trigger.roll, 88);
    }

    #[test]
    fn privileged_roller_never_triggers() {
        let roster = roster();
        let event = RollTestEvent::new(
            RollTestKind::Test,
            json!({ "result": { "roll": 88 } }),
            Some("u_gm".to_string()),
        );
        assert_eq!(
            detect(&event, &roster, &TriggerConfig::default(), true),
            Err(Discard::PrivilegedUser {
                user_id: "u_gm".to_string()
            })
        );
    }

    #[test]
    fn other_clients_discard_immediately() {
        let roster = roster();
        let event = RollTestEvent::new(
            RollTestKind::Test,
            json!({ "result": { "roll": 88 } }),
            Some("u_anna".to_string()),
        );
        assert_eq!(
            detect(&event, &roster, &TriggerConfig::default(), false),
            Err(Discard::NotElectedWriter)
        );
    }

    #[test]
    fn only_exact_threshold_matches() {
        let roster = roster();
        let config = TriggerConfig {
            trigger_value: 77,
            ..TriggerConfig::default()
        };
        for roll in [76, 78, 88, 177] {
            let event = RollTestEvent::new(
                RollTestKind::Test,
                json!({ "roll": roll }),
                Some("u_anna".to_string()),
            );
            assert_eq!(
                detect(&event, &roster, &config, true),
                Err(Discard::NoMatch { roll })
            );
        }
    }
}
