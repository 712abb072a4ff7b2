//! Microsoft Graph API client and queries

pub mod calendar;
pub mod client;
pub mod presence;

pub use calendar::fetch_upcoming;
pub use client::GraphClient;
pub use presence::fetch_presence;
