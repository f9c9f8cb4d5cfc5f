//! `/misfortune` chat commands.

pub const COMMAND_WORD: &str = "/misfortune";
pub const COMMAND_ALIAS: &str = "/mf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Status,
    Spend,
    Reset,
    Help,
}

impl ChatCommand {
    pub fn requires_privilege(self) -> bool {
        matches!(self, Self::Spend | Self::Reset)
    }
}

/// `None` for anything that should pass through as ordinary chat, including
/// the command word followed by an unknown argument.
pub fn parse(text: &str) -> Option<ChatCommand> {
    let normalized = text.trim().to_lowercase();
    let mut words = normalized.split_whitespace();

    let head = words.next()?;
    if head != COMMAND_WORD && head != COMMAND_ALIAS {
        return None;
    }

    let command = match words.next() {
        None => ChatCommand::Status,
        Some("spend") => ChatCommand::Spend,
        Some("reset") => ChatCommand::Reset,
        Some("help") => ChatCommand::Help,
        Some(_) => return None,
    };

    if words.next().is_some() {
        return None;
    }

    Some(command)
}
