use crate::value_objects::futures::FuturesPosition;

pub trait FuturesSource {
    fn futures_positions(&self) -> Result<Vec<FuturesPosition>, String>;
}
