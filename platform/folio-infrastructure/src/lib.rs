pub mod binance;
pub mod snapshot;
