//! Monetary constants and the block reward schedule
//!
//! Amounts are integer base units, 100,000,000 to a coin, so the halving
//! schedule stays exact with no floating-point drift: 50 coins, then 25,
//! then 12.5, and so on down to zero.

/// Number of base units in one coin
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Block reward before any halving (50 coins)
pub const INITIAL_BLOCK_REWARD: u64 = 50 * UNITS_PER_COIN;

/// Blocks between reward halvings
pub const HALVING_INTERVAL: u64 = 210_000;

/// Reward for the block at `index`: the base reward halves every
/// `halving_interval` blocks and floors at zero. Never negative, never
/// re-inflates.
pub fn block_reward(index: u64, base_reward: u64, halving_interval: u64) -> u64 {
    if halving_interval == 0 {
        return base_reward;
    }
    let halvings = index / halving_interval;
    if halvings >= 64 {
        0
    } else {
        base_reward >> halvings
    }
}

/// Render base units as a decimal coin amount.
pub fn format_units(units: u64) -> String {
    format!(
        "{}.{:08}",
        units / UNITS_PER_COIN,
        units % UNITS_PER_COIN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_halving_schedule() {
        let base = INITIAL_BLOCK_REWARD;
        assert_eq!(block_reward(0, base, HALVING_INTERVAL), 50 * UNITS_PER_COIN);
        assert_eq!(
            block_reward(209_999, base, HALVING_INTERVAL),
            50 * UNITS_PER_COIN
        );
        assert_eq!(
            block_reward(210_000, base, HALVING_INTERVAL),
            25 * UNITS_PER_COIN
        );
        // 6.25 coins after three halvings
        assert_eq!(block_reward(630_000, base, HALVING_INTERVAL), 625_000_000);
    }

    #[test]
    fn test_reward_floors_at_zero() {
        let far_future = 64 * HALVING_INTERVAL;
        assert_eq!(block_reward(far_future, INITIAL_BLOCK_REWARD, HALVING_INTERVAL), 0);
        assert_eq!(
            block_reward(far_future * 2, INITIAL_BLOCK_REWARD, HALVING_INTERVAL),
            0
        );
    }

    #[test]
    fn test_reward_is_monotonically_non_increasing() {
        let mut previous = u64::MAX;
        for halving in 0..70u64 {
            let reward = block_reward(halving * HALVING_INTERVAL, INITIAL_BLOCK_REWARD, HALVING_INTERVAL);
            assert!(reward <= previous);
            previous = reward;
        }
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(UNITS_PER_COIN), "1.00000000");
        assert_eq!(format_units(625_000_000), "6.25000000");
        assert_eq!(format_units(1_000), "0.00001000");
    }
}
