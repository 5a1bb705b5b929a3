pub mod listener;
pub mod manager;
pub mod messages;

pub use manager::{SubscriptionManager, SubscriptionState};
