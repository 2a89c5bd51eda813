pub mod backup;
pub mod bot;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod logging;
pub mod roll;
pub mod server;
pub mod store;
