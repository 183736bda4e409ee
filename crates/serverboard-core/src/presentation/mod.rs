pub mod policy;
pub mod publisher;
pub mod render;

pub use policy::{RenderState, should_create_new_message};
pub use publisher::{PublishOutcome, publish};
pub use render::{Summary, SummaryField, render};
