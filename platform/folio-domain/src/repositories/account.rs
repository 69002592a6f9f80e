use crate::value_objects::balance::AccountBalance;

pub trait AccountSource {
    fn balances(&self) -> Result<Vec<AccountBalance>, String>;
}
