// Live spread map, periodic ranked emission and subscriber fan-out.
pub mod hub;
pub mod subscribers;
pub mod tasks;

pub use hub::{DistributionHub, Membership, TickOutcome};
pub use subscribers::{BroadcastReport, Subscriber, SubscriberId, SubscriberSet};
