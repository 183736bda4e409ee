pub mod address;
pub mod ids;
pub mod report;

pub use address::{Address, AddressError, WILDCARD_PORT};
pub use ids::{ChannelId, MessageId, UserId};
pub use report::{EndpointReport, Snapshot};
