pub mod account;
pub mod futures;
pub mod prices;
pub mod trades;
