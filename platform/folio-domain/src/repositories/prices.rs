use std::collections::HashMap;

pub trait PriceSource {
    /// Last traded price per trading-pair symbol.
    fn prices(&self) -> Result<HashMap<String, f64>, String>;
}
