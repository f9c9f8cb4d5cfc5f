//! Narrative chat cards.

use contracts::{ChatAudience, ChatCard, ChatCardVariant, TriggerConfig};
use rand::seq::SliceRandom;
use rand::Rng;

pub const EARNED_LINES: [&str; 10] = [
    "The wind changes. Morrslieb glows a little brighter. The Dark Gods take notice...",
    "A crow lands nearby and watches with unnatural intelligence. Misfortune stirs.",
    "The shadows deepen. Somewhere, a bell tolls eight times. Then eight more.",
    "An icy chill passes through the room. The Ruinous Powers savour this moment.",
    "A faint laughter echoes from nowhere. The Great Conspirator adds a thread to his web.",
    "The candles flicker and dim. Something unseen has shifted in the balance of fate.",
    "A black cat crosses your path, twice. The winds of Chaos blow stronger.",
    "The hairs on your neck stand. Something old and malevolent has turned its gaze upon you.",
    "Thunder rumbles in a cloudless sky. The Dark Gods have claimed their due.",
    "For a fleeting moment, every shadow in the room seems to move of its own accord.",
];

pub const SPENT_LINES: [&str; 6] = [
    "The Dark Gods intervene! Fate is rewritten...",
    "Tzeentch cackles as destiny twists upon itself!",
    "The threads of fate are pulled taut and snapped. A new pattern emerges.",
    "Misfortune spent. The enemy is granted a second chance by darker powers.",
    "The winds of Chaos surge! What was done is undone.",
    "A sinister force guides the hand of your foe. The dice fall differently this time.",
];

pub const RESET_LINE: &str = "The balance of fate is restored... for now.";

const SYMBOL: &str = "⛧";

pub fn pick_line<R: Rng + ?Sized>(lines: &[&'static str], rng: &mut R) -> &'static str {
    lines.choose(rng).copied().unwrap_or_default()
}

/// Narrative cards are public only while the tracker is shown to players.
pub fn narrative_audience(config: &TriggerConfig) -> ChatAudience {
    if config.show_players {
        ChatAudience::Public
    } else {
        ChatAudience::Privileged
    }
}

pub fn earned_card(
    line: &str,
    player: &str,
    roll: i64,
    pool: u64,
    audience: ChatAudience,
) -> ChatCard {
    ChatCard {
        variant: ChatCardVariant::Earned,
        speaker_alias: "The Dark Gods".to_string(),
        icon: Some(SYMBOL.to_string()),
        title: Some("Misfortune!".to_string()),
        lines: vec![
            line.to_string(),
            format!("{player} rolled {roll}."),
            format!("The GM now has {pool} Misfortune point(s)."),
        ],
        audience,
    }
}

pub fn spent_card(line: &str, remaining: u64, audience: ChatAudience) -> ChatCard {
    ChatCard {
        variant: ChatCardVariant::Spent,
        speaker_alias: "The Dark Gods".to_string(),
        icon: Some("☠".to_string()),
        title: Some("Misfortune Spent".to_string()),
        lines: vec![
            line.to_string(),
            format!("Remaining Misfortune: {remaining}"),
        ],
        audience,
    }
}

pub fn reset_card(audience: ChatAudience) -> ChatCard {
    ChatCard {
        variant: ChatCardVariant::Reset,
        speaker_alias: "The Winds of Fate".to_string(),
        icon: Some("✦".to_string()),
        title: None,
        lines: vec![RESET_LINE.to_string()],
        audience,
    }
}

pub fn status_card(pool: u64, audience: ChatAudience) -> ChatCard {
    ChatCard {
        variant: ChatCardVariant::Status,
        speaker_alias: "Misfortune".to_string(),
        icon: Some(SYMBOL.to_string()),
        title: None,
        lines: vec![format!("The GM has {pool} Misfortune point(s).")],
        audience,
    }
}

pub fn help_card(user_id: &str) -> ChatCard {
    ChatCard {
        variant: ChatCardVariant::Help,
        speaker_alias: "Misfortune".to_string(),
        icon: None,
        title: Some(format!("{SYMBOL} Misfortune Commands")),
        lines: vec![
            "/misfortune or /mf: show current pool".to_string(),
            "/mf spend: (GM) spend 1 Misfortune point".to_string(),
            "/mf reset: (GM) reset pool to 0".to_string(),
            "/mf help: show this help".to_string(),
        ],
        audience: ChatAudience::User {
            user_id: user_id.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn picks_come_from_the_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert!(EARNED_LINES.contains(&pick_line(&EARNED_LINES, &mut rng)));
            assert!(SPENT_LINES.contains(&pick_line(&SPENT_LINES, &mut rng)));
        }
    }

    #[test]
    fn earned_card_carries_name_roll_and_pool() {
        let card = earned_card(EARNED_LINES[0], "Anna", 88, 1, ChatAudience::Public);
        assert!(card.lines.iter().any(|line| line == "Anna rolled 88."));
        assert!(card.lines.iter().any(|line| line.contains("1 Misfortune")));
    }

    #[test]
    fn hidden_tracker_whispers_narrative() {
        let config = TriggerConfig {
            show_players: false,
            ..TriggerConfig::default()
        };
        assert_eq!(narrative_audience(&config), ChatAudience::Privileged);
    }
}
