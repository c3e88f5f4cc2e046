use crate::config::ChainConfig;
use log::info;

/// Difficulty retargeting over a rolling window of block timestamps.
///
/// Compares the actual average spacing of the most recent blocks against the
/// configured target block time and moves difficulty by at most one unit per
/// retarget event, clamped to the configured bounds. The one-unit cap keeps
/// the schedule from oscillating when block times swing.
pub struct DifficultyRetarget;

impl DifficultyRetarget {
    /// Compute the difficulty for the next block given the timestamps
    /// (milliseconds, chronological order) of the most recent blocks.
    pub fn next_difficulty(
        current_difficulty: u32,
        recent_timestamps: &[i64],
        config: &ChainConfig,
    ) -> u32 {
        if recent_timestamps.len() < 2 {
            return current_difficulty.clamp(config.min_difficulty, config.max_difficulty);
        }

        let first = recent_timestamps[0];
        let last = recent_timestamps[recent_timestamps.len() - 1];
        if last <= first {
            // Clock skew across the window; leave difficulty alone
            return current_difficulty.clamp(config.min_difficulty, config.max_difficulty);
        }

        let intervals = (recent_timestamps.len() - 1) as u64;
        let average_spacing_ms = (last - first) as u64 / intervals;

        let new_difficulty = if average_spacing_ms < config.target_block_time_ms {
            // Blocks arriving faster than target: tighten by one unit
            current_difficulty.saturating_add(1)
        } else if average_spacing_ms > config.target_block_time_ms {
            // Blocks arriving slower than target: relax by one unit
            current_difficulty.saturating_sub(1)
        } else {
            current_difficulty
        };

        let clamped = new_difficulty.clamp(config.min_difficulty, config.max_difficulty);
        if clamped != current_difficulty {
            info!(
                "Difficulty retarget: {current_difficulty} -> {clamped} (avg spacing {average_spacing_ms}ms, target {}ms)",
                config.target_block_time_ms
            );
        }
        clamped
    }
}
