//! Pure accrual math, extracted for Kani formal verification.
//!
//! No Solana/Pubkey dependencies. Just arithmetic.
//! Accumulators and debts are 256-bit: one accrual adds at most
//! `u64::MAX * 10^30`, so a single delta always fits and the running sum
//! stays far below the ceiling for any reachable number of accruals.
//! Every narrowing conversion is checked. `None` means the caller must
//! abort the operation.

use ethnum::{I256, U256};

/// Base exponent of the accumulator multiplier (10^12).
pub const PRECISION_EXPONENT: u32 = 12;

/// Accumulator multiplier for pools whose staked and reward assets share decimals.
pub const PRECISION: u128 = 1_000_000_000_000;

/// Largest exponent a derived precision scale may use.
pub const MAX_PRECISION_EXPONENT: u32 = 30;

/// Emission splits are expressed in thousandths (1000 = 100%).
pub const SPLIT_DENOMINATOR: u64 = 1_000;

/// floor(a * b / denom) with a 256-bit intermediate.
///
/// # Returns
/// * `None` - `denom == 0` or the quotient does not fit in u128
pub fn mul_div(a: u128, b: u128, denom: u128) -> Option<u128> {
    if denom == 0 {
        return None;
    }
    let q = U256::from(a)
        .checked_mul(U256::from(b))?
        .checked_div(U256::from(denom))?;
    if q > U256::from(u128::MAX) {
        None
    } else {
        Some(q.as_u128())
    }
}

/// Reward emitted to one pool over `elapsed` time units.
///
/// `elapsed * rate * alloc_weight / total_alloc_weight`, rounded down.
/// A pool with no weight (or a registry with no weight at all) earns nothing.
///
/// # Returns
/// * `None` - weight larger than the total (broken registry) or result above u64
pub fn pool_reward(
    elapsed: u64,
    rate_per_time_unit: u64,
    alloc_weight: u64,
    total_alloc_weight: u64,
) -> Option<u64> {
    if alloc_weight == 0 || total_alloc_weight == 0 {
        return Some(0);
    }
    if alloc_weight > total_alloc_weight {
        return None;
    }
    // u64 * u64 always fits in u128
    let emitted = (elapsed as u128) * (rate_per_time_unit as u128);
    let reward = mul_div(emitted, alloc_weight as u128, total_alloc_weight as u128)?;
    u64::try_from(reward).ok()
}

/// Split a pool reward into (stakers, operator A, operator B).
///
/// Each share is `reward * split / SPLIT_DENOMINATOR`, rounded down.
/// Truncation dust is not returned anywhere; it is simply never minted.
pub fn split_reward(
    reward: u64,
    split_staker: u64,
    split_op_a: u64,
    split_op_b: u64,
) -> Option<(u64, u64, u64)> {
    let share = |split: u64| -> Option<u64> {
        let v = (reward as u128)
            .checked_mul(split as u128)?
            .checked_div(SPLIT_DENOMINATOR as u128)?;
        u64::try_from(v).ok()
    };
    Some((share(split_staker)?, share(split_op_a)?, share(split_op_b)?))
}

/// True when the three splits add up to exactly the denominator.
pub fn splits_balanced(split_staker: u64, split_op_a: u64, split_op_b: u64) -> bool {
    split_staker
        .checked_add(split_op_a)
        .and_then(|s| s.checked_add(split_op_b))
        == Some(SPLIT_DENOMINATOR)
}

/// Accumulator increase for crediting `reward` across `total_staked` shares.
///
/// # Returns
/// * `None` - nothing staked (no share exists to accrue to)
pub fn acc_per_share_delta(reward: u64, precision: u128, total_staked: u64) -> Option<U256> {
    if total_staked == 0 {
        return None;
    }
    // u64 * u128 always fits in 256 bits
    let scaled = U256::from(reward).checked_mul(U256::from(precision))?;
    scaled.checked_div(U256::from(total_staked))
}

/// Entitlement of `amount` shares at accumulator `acc`: `amount * acc / precision`.
///
/// Divides before multiplying so `amount * acc` is never formed:
/// `amount * (acc / p) + amount * (acc % p) / p` is the same floor.
pub fn accumulated_reward(amount: u64, acc: U256, precision: u128) -> Option<U256> {
    if precision == 0 {
        return None;
    }
    let precision = U256::from(precision);
    let amount = U256::from(amount);
    let whole = (acc / precision).checked_mul(amount)?;
    let frac = (acc % precision).checked_mul(amount)? / precision;
    whole.checked_add(frac)
}

/// Debt snapshot for a position of `amount` shares at accumulator `acc`.
pub fn reward_debt(amount: u64, acc: U256, precision: u128) -> Option<I256> {
    let entitled = accumulated_reward(amount, acc, precision)?;
    if entitled > U256::MAX >> 1u32 {
        return None;
    }
    Some(I256::from_le_bytes(entitled.to_le_bytes()))
}

/// Pending reward: live entitlement minus the debt snapshot.
///
/// # Returns
/// * `Some(pending)` - never negative
/// * `None` - debt above entitlement (ledger corruption) or above u64
pub fn pending_reward(amount: u64, acc: U256, precision: u128, debt: I256) -> Option<u64> {
    let entitled = reward_debt(amount, acc, precision)?;
    let pending = entitled.checked_sub(debt)?;
    if pending < I256::ZERO || pending > I256::from(u64::MAX) {
        return None;
    }
    Some(pending.as_u64())
}

/// Accumulator multiplier for a staked asset / reward asset decimal pair.
///
/// `10^(12 + staked_decimals - reward_decimals)`, exponent floored at zero.
/// A reward token with fewer decimals than the staked asset gets a larger
/// multiplier so per-share increments never truncate to zero.
///
/// # Returns
/// * `None` - exponent above `MAX_PRECISION_EXPONENT`
pub fn precision_scale(staked_decimals: u8, reward_decimals: u8) -> Option<u128> {
    let exponent = (PRECISION_EXPONENT as i64) + (staked_decimals as i64) - (reward_decimals as i64);
    let exponent = exponent.max(0) as u32;
    if exponent > MAX_PRECISION_EXPONENT {
        return None;
    }
    10u128.checked_pow(exponent)
}

/// Reward emitted by a secondary stream: `elapsed * rate`.
pub fn stream_reward(elapsed: u64, rate_per_time_unit: u64) -> Option<u64> {
    elapsed.checked_mul(rate_per_time_unit)
}
