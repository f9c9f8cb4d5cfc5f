//! The floating tracker: header, count and, for privileged viewers, controls.

use contracts::{DisplayCue, TrackerControl, TrackerRender, TriggerConfig, UserRole};

use crate::store::cue_between;

pub const TRACKER_SYMBOL: &str = "⛧";
pub const TRACKER_TITLE: &str = "Misfortune";

pub fn visible_to(role: UserRole, config: &TriggerConfig) -> bool {
    role.is_privileged() || config.show_players
}

pub fn render_for(role: UserRole, config: &TriggerConfig, pool: u64) -> Option<TrackerRender> {
    if !visible_to(role, config) {
        return None;
    }

    let controls = if role.is_privileged() {
        TrackerControl::ALL.to_vec()
    } else {
        Vec::new()
    };

    Some(TrackerRender {
        symbol: TRACKER_SYMBOL.to_string(),
        title: TRACKER_TITLE.to_string(),
        count: pool,
        controls,
    })
}

/// One client's tracker. `rendered == None` means nothing is on screen,
/// either because the viewer may not see it or because the view was torn down.
#[derive(Debug, Clone)]
pub struct TrackerView {
    viewer_role: UserRole,
    rendered: Option<TrackerRender>,
    last_cue: Option<DisplayCue>,
}

impl TrackerView {
    pub fn new(viewer_role: UserRole) -> Self {
        Self {
            viewer_role,
            rendered: None,
            last_cue: None,
        }
    }

    pub fn viewer_role(&self) -> UserRole {
        self.viewer_role
    }

    pub fn set_viewer_role(&mut self, role: UserRole) {
        self.viewer_role = role;
    }

    /// Replace whatever is on screen with a fresh render.
    pub fn render(&mut self, config: &TriggerConfig, pool: u64) -> Option<&TrackerRender> {
        self.rendered = render_for(self.viewer_role, config, pool);
        self.last_cue = None;
        self.rendered.as_ref()
    }

    pub fn teardown(&mut self) {
        self.rendered = None;
        self.last_cue = None;
    }

    /// Show `new_value`. A missing view is rendered from scratch without a cue.
    pub fn apply(&mut self, new_value: u64, config: &TriggerConfig) -> Option<DisplayCue> {
        let Some(rendered) = self.rendered.as_mut() else {
            self.render(config, new_value);
            return None;
        };

        let cue = cue_between(rendered.count, new_value);
        rendered.count = new_value;
        self.last_cue = cue;
        cue
    }

    pub fn current(&self) -> Option<&TrackerRender> {
        self.rendered.as_ref()
    }

    pub fn displayed_value(&self) -> Option<u64> {
        self.rendered.as_ref().map(|rendered| rendered.count)
    }

    pub fn last_cue(&self) -> Option<DisplayCue> {
        self.last_cue
    }
}

/// The explicit confirm/cancel gate in front of a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPrompt {
    pub title: String,
    pub content: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl Default for ResetPrompt {
    fn default() -> Self {
        Self {
            title: "Reset Misfortune".to_string(),
            content: "Are you sure you want to reset the Misfortune pool to 0?".to_string(),
            confirm_label: "Reset".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}
