pub mod holdings;
pub mod pnl;
pub mod pricing;
pub mod symbols;
