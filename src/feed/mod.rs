pub mod client;
pub mod odds;
pub mod provider;

pub use client::OddsFeedClient;
pub use provider::OddsFeed;
