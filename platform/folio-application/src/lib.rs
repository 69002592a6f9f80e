pub mod config;
pub mod envelope;
pub mod health;
pub mod holdings;
pub mod period;
pub mod pnl;
mod shared;
