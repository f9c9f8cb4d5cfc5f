use std::path::{Path, PathBuf};

use contracts::{ConnectedUser, LogEntryKind, RollTestEvent, RollTestKind, UserRole};
use misfortune_api::{open_table, SqliteSettings};
use misfortune_core::{RollOutcome, SettingKey, SettingsBackend};
use serde_json::json;

fn temp_db_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();

    std::env::temp_dir().join(format!("misfortune_table_{name}_{nanos}.sqlite"))
}

fn remove_db(path: &Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
    let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
}

fn user(user_id: &str, name: &str, role: UserRole) -> ConnectedUser {
    ConnectedUser {
        user_id: user_id.to_string(),
        name: name.to_string(),
        role,
        owned_actors: Vec::new(),
    }
}

#[test]
fn pool_and_log_survive_a_restart() {
    let path = temp_db_path("restart");

    {
        let mut table = open_table(&path).expect("table should open");
        table.connect(user("u_gm", "Greta", UserRole::Gamemaster));
        table.connect(user("u_anna", "Anna", UserRole::Player));

        let event = RollTestEvent::new(
            RollTestKind::CastTest,
            json!({ "result": { "roll": 88 } }),
            Some("u_anna".to_string()),
        );
        assert!(matches!(
            table.handle_roll(&event),
            RollOutcome::Triggered { pool: 1, .. }
        ));
        table.add_misfortune(Some("GM (manual)"), None);
        assert_eq!(table.spend_misfortune(Some("u_gm")), Ok(1));
        table.teardown().expect("teardown should flush");
    }

    let table = open_table(&path).expect("table should reopen");
    assert_eq!(table.pool(), 1);
    let kinds: Vec<LogEntryKind> = table.log().iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![LogEntryKind::Earned, LogEntryKind::Earned, LogEntryKind::Spent]
    );
    assert_eq!(table.log()[0].player.as_deref(), Some("Anna"));
    assert_eq!(table.log()[0].roll, Some(88));
    drop(table);

    let settings = SqliteSettings::open(&path).expect("settings should open");
    assert_eq!(settings.get(SettingKey::Pool).expect("read pool"), Some(json!(1)));

    remove_db(&path);
}

#[test]
fn config_changes_are_persisted() {
    let path = temp_db_path("config");

    {
        let mut table = open_table(&path).expect("table should open");
        table.connect(user("u_gm", "Greta", UserRole::Gamemaster));
        table
            .update_config(
                "u_gm",
                &contracts::TriggerConfigPatch {
                    trigger_value: Some(66),
                    show_players: Some(false),
                    chat_flavor: None,
                },
            )
            .expect("gm may change settings");
    }

    let table = open_table(&path).expect("table should reopen");
    assert_eq!(table.config().trigger_value, 66);
    assert!(!table.config().show_players);
    assert!(table.config().chat_flavor);

    remove_db(&path);
}
