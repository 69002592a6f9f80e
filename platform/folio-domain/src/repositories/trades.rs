use crate::value_objects::trade::Trade;

pub trait TradeSource {
    /// Trade history for one trading pair. An empty list is a valid answer
    /// (no history, or no permission to read it).
    fn trades_for_symbol(&self, symbol: &str) -> Result<Vec<Trade>, String>;
}
