//! Need-state provider consumed by the decision loop

use needs_rl_core::{NeedType, NeedVector};

/// Source of live need values for one agent
pub trait NeedProvider {
    /// Current value of a need in `[0, 100]`
    fn need_value(&self, need: NeedType) -> f64;

    /// Whether the agent is still alive
    fn is_alive(&self) -> bool;

    /// All needs as a vector
    fn snapshot(&self) -> NeedVector {
        NeedType::ALL
            .iter()
            .map(|&need| (need, self.need_value(need)))
            .collect()
    }
}

impl NeedProvider for NeedVector {
    fn need_value(&self, need: NeedType) -> f64 {
        self.value_or(need, 0.0)
    }

    fn is_alive(&self) -> bool {
        self.first_depleted().is_none()
    }

    fn snapshot(&self) -> NeedVector {
        *self
    }
}
