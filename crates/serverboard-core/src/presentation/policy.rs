// ── Render cadence ──
//
// The board is edited in place until enough foreign messages pile up
// below it, then re-posted so it stays visible at the bottom of the
// channel.

use chrono::{DateTime, Utc};

use crate::model::MessageId;

/// What the board knows about its own message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Absent until the next successful send after being cleared.
    pub current_message_id: Option<MessageId>,
    /// Foreign messages posted since the last new render.
    pub messages_since_last_render: u32,
    pub last_render_time: Option<DateTime<Utc>>,
}

impl RenderState {
    pub fn note_foreign_message(&mut self) {
        self.messages_since_last_render = self.messages_since_last_render.saturating_add(1);
    }

    pub fn note_foreign_delete(&mut self) {
        self.messages_since_last_render = self.messages_since_last_render.saturating_sub(1);
    }

    /// Record a freshly posted message.
    pub fn rendered(&mut self, id: MessageId, at: DateTime<Utc>) {
        self.current_message_id = Some(id);
        self.messages_since_last_render = 0;
        self.last_render_time = Some(at);
    }

    pub fn clear(&mut self) {
        self.current_message_id = None;
    }

    pub fn is_own(&self, id: MessageId) -> bool {
        self.current_message_id == Some(id)
    }
}

/// Post anew when nothing is tracked or the board is buried under more
/// than `max_other_messages` foreign messages.
pub fn should_create_new_message(state: &RenderState, max_other_messages: u32) -> bool {
    state.current_message_id.is_none() || state.messages_since_last_render > max_other_messages
}
