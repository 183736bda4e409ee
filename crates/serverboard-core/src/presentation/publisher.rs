// ── Publishing ──
//
// Applies the cadence policy against the chat transport. Every transport
// failure is logged and swallowed: a failed publish never aborts the
// poll cycle, the next cycle simply tries again.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::policy::{RenderState, should_create_new_message};
use super::render::Summary;
use crate::model::MessageId;
use crate::store::PointerStore;
use crate::transport::ChatTransport;

/// What a `publish` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Posted(MessageId),
    Edited(MessageId),
    Failed,
}

/// Post a new summary or edit the tracked one, as the cadence dictates.
pub async fn publish<T: ChatTransport>(
    transport: &T,
    summary: &Summary,
    state: &mut RenderState,
    pointer: Option<&PointerStore>,
    max_other_messages: u32,
) -> PublishOutcome {
    if should_create_new_message(state, max_other_messages) {
        if let Some(old) = state.current_message_id.take() {
            match transport.delete(old).await {
                Ok(()) => debug!(id = %old, "removed old summary"),
                Err(e) => warn!(error = %e, id = %old, "failed to remove old summary"),
            }
        }

        match transport.send(summary).await {
            Ok(id) => {
                state.rendered(id, Utc::now());
                info!(%id, "posted new summary");
                if let Some(pointer) = pointer {
                    if let Err(e) = pointer.store(id) {
                        warn!(error = %e, path = %pointer.path().display(), "failed to persist render pointer");
                    }
                }
                PublishOutcome::Posted(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to post summary");
                PublishOutcome::Failed
            }
        }
    } else {
        let Some(id) = state.current_message_id else {
            return PublishOutcome::Failed;
        };

        match transport.edit(id, summary).await {
            Ok(()) => {
                debug!(%id, "edited summary in place");
                PublishOutcome::Edited(id)
            }
            Err(e) if e.is_not_found() => {
                info!(%id, "tracked summary is gone, will post anew");
                state.clear();
                PublishOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, %id, "failed to edit summary");
                PublishOutcome::Failed
            }
        }
    }
}
