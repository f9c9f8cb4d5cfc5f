//! Connected users and the single-writer election.

use contracts::{ConnectedUser, UserRole};

/// Connected users in connection order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: Vec<ConnectedUser>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user that is already connected keeps its place; its details are refreshed.
    pub fn connect(&mut self, user: ConnectedUser) {
        match self
            .users
            .iter_mut()
            .find(|existing| existing.user_id == user.user_id)
        {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    pub fn disconnect(&mut self, user_id: &str) -> Option<ConnectedUser> {
        let index = self.users.iter().position(|user| user.user_id == user_id)?;
        Some(self.users.remove(index))
    }

    pub fn get(&self, user_id: &str) -> Option<&ConnectedUser> {
        self.users.iter().find(|user| user.user_id == user_id)
    }

    pub fn users(&self) -> &[ConnectedUser] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Earliest-connected gamemaster, else earliest-connected assistant GM.
    pub fn elected_writer(&self) -> Option<&ConnectedUser> {
        self.users
            .iter()
            .find(|user| user.role == UserRole::Gamemaster)
            .or_else(|| {
                self.users
                    .iter()
                    .find(|user| user.role == UserRole::AssistantGm)
            })
    }

    pub fn is_elected_writer(&self, user_id: &str) -> bool {
        self.elected_writer()
            .is_some_and(|writer| writer.user_id == user_id)
    }

    /// First connected non-privileged user owning `actor_id`.
    pub fn find_owner(&self, actor_id: &str) -> Option<&ConnectedUser> {
        self.users.iter().find(|user| {
            !user.role.is_privileged() && user.owned_actors.iter().any(|owned| owned == actor_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: UserRole, actors: &[&str]) -> ConnectedUser {
        ConnectedUser {
            user_id: id.to_string(),
            name: id.to_string(),
            role,
            owned_actors: actors.iter().map(|actor| actor.to_string()).collect(),
        }
    }

    #[test]
    fn no_privileged_user_means_no_writer() {
        let mut roster = Roster::new();
        roster.connect(user("anna", UserRole::Player, &[]));
        roster.connect(user("bob", UserRole::Trusted, &[]));
        assert!(roster.elected_writer().is_none());
    }

    #[test]
    fn gamemaster_outranks_earlier_assistant() {
        let mut roster = Roster::new();
        roster.connect(user("assistant", UserRole::AssistantGm, &[]));
        roster.connect(user("gm_late", UserRole::Gamemaster, &[]));
        roster.connect(user("gm_later", UserRole::Gamemaster, &[]));

        assert!(roster.is_elected_writer("gm_late"));

        roster.disconnect("gm_late");
        assert!(roster.is_elected_writer("gm_later"));

        roster.disconnect("gm_later");
        assert!(roster.is_elected_writer("assistant"));
    }

    #[test]
    fn reconnect_keeps_connection_order() {
        let mut roster = Roster::new();
        roster.connect(user("gm_a", UserRole::Gamemaster, &[]));
        roster.connect(user("gm_b", UserRole::Gamemaster, &[]));
        roster.connect(user("gm_a", UserRole::Gamemaster, &["actor_1"]));

        assert!(roster.is_elected_writer("gm_a"));
        assert_eq!(roster.users().len(), 2);
    }

    #[test]
    fn owner_lookup_skips_privileged_owners() {
        let mut roster = Roster::new();
        roster.connect(user("gm", UserRole::Gamemaster, &["actor_1"]));
        roster.connect(user("anna", UserRole::Player, &["actor_1"]));

        let owner = roster.find_owner("actor_1").expect("player owner");
        assert_eq!(owner.user_id, "anna");
        assert!(roster.find_owner("actor_2").is_none());
    }
}
