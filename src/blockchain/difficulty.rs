use log::debug;

use super::{BLOCK_GENERATION_INTERVAL_SECS, Block, DIFFICULTY_ADJUSTMENT_INTERVAL};

/// Difficulty the next block on top of `chain` must carry.
///
/// Every `DIFFICULTY_ADJUSTMENT_INTERVAL` blocks the difficulty is retargeted
/// from the time the last window took; otherwise the head's difficulty is kept.
pub fn get_difficulty(chain: &[Block]) -> u32 {
    let Some(latest) = chain.last() else {
        return 0;
    };
    if latest.index != 0 && latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
        adjusted_difficulty(latest, chain)
    } else {
        latest.difficulty
    }
}

fn adjusted_difficulty(latest: &Block, chain: &[Block]) -> u32 {
    let Some(window_start) = chain.len().checked_sub(DIFFICULTY_ADJUSTMENT_INTERVAL as usize)
    else {
        return latest.difficulty;
    };
    let prev_adjustment = &chain[window_start];
    let time_expected = BLOCK_GENERATION_INTERVAL_SECS * DIFFICULTY_ADJUSTMENT_INTERVAL as i64;
    let time_taken = latest.timestamp - prev_adjustment.timestamp;

    let next = if time_taken < time_expected / 2 {
        prev_adjustment.difficulty + 1
    } else if time_taken > time_expected * 2 {
        prev_adjustment.difficulty.saturating_sub(1)
    } else {
        prev_adjustment.difficulty
    };
    debug!(
        "retarget at #{}: took {}s, expected {}s, difficulty {} -> {}",
        latest.index, time_taken, time_expected, prev_adjustment.difficulty, next
    );
    next
}

/// Fork-choice weight: sum of 2^difficulty over all blocks.
pub fn accumulated_difficulty(chain: &[Block]) -> u128 {
    chain
        .iter()
        .map(|b| 1u128.checked_shl(b.difficulty).unwrap_or(u128::MAX))
        .fold(0u128, |acc, w| acc.saturating_add(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::GENESIS_TIMESTAMP;

    /// Genesis plus `count` blocks `spacing` seconds apart, all at `difficulty`.
    /// Only the fields retargeting looks at are filled in.
    fn spaced_chain(count: u64, spacing: i64, difficulty: u32) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        for i in 1..=count {
            let mut b = Block::genesis();
            b.index = i;
            b.timestamp = GENESIS_TIMESTAMP + spacing * i as i64;
            b.difficulty = difficulty;
            chain.push(b);
        }
        chain
    }

    #[test]
    fn fast_window_raises_difficulty() {
        let chain = spaced_chain(20, 15, 3);
        assert_eq!(get_difficulty(&chain), 4);
    }

    #[test]
    fn slow_window_lowers_difficulty() {
        let chain = spaced_chain(20, 120, 3);
        assert_eq!(get_difficulty(&chain), 2);
    }

    #[test]
    fn on_target_window_keeps_difficulty() {
        let chain = spaced_chain(20, 30, 3);
        assert_eq!(get_difficulty(&chain), 3);
    }

    #[test]
    fn between_adjustments_inherits_head() {
        let mut chain = spaced_chain(19, 1, 3);
        chain.last_mut().unwrap().difficulty = 5;
        assert_eq!(get_difficulty(&chain), 5);
        assert_eq!(get_difficulty(&[Block::genesis()]), 0);
    }

    #[test]
    fn never_goes_below_zero() {
        let chain = spaced_chain(20, 500, 0);
        assert_eq!(get_difficulty(&chain), 0);
    }

    #[test]
    fn accumulated_weight_is_exponential() {
        let flat = spaced_chain(2, 30, 0);
        assert_eq!(accumulated_difficulty(&flat), 3);

        let mut steep = spaced_chain(1, 30, 2);
        assert_eq!(accumulated_difficulty(&steep), 5);
        steep[1].difficulty = 200;
        assert_eq!(accumulated_difficulty(&steep), u128::MAX);
    }
}
