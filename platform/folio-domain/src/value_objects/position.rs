/// Average-cost position for one trading pair, held only while replaying its trades.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub avg_cost: f64,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` units bought for a total of `cost` and re-weights the average cost.
    pub fn apply_buy(&mut self, quantity: f64, cost: f64) {
        let total_qty = self.quantity + quantity;
        self.avg_cost = if total_qty > 0.0 {
            (self.avg_cost * self.quantity + cost) / total_qty
        } else {
            0.0
        };
        self.quantity = total_qty.max(0.0);
    }

    /// Sells at most the held quantity and returns the realized gain of the sold part.
    /// The average cost is left untouched.
    pub fn apply_sell(&mut self, quantity: f64, price: f64) -> f64 {
        let sold = quantity.min(self.quantity);
        if sold <= 0.0 {
            return 0.0;
        }
        self.quantity -= sold;
        if self.quantity < 0.0 {
            self.quantity = 0.0;
        }
        price * sold - self.avg_cost * sold
    }

    pub fn is_flat(&self) -> bool {
        self.quantity <= 0.0
    }
}
