//! Kani formal verification for percolator-rewards accrual math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 inputs / u64 intermediates. The production code uses
//! u64 / u128 with a 256-bit intermediate, but the properties checked here
//! (non-negative pending, bounded split, no inflation across holders) do not
//! depend on width. Narrow types keep SAT formulas tractable for CBMC.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_pending_zero_after_rebase

// ═══════════════════════════════════════════════════════════════
// Accrual math (u32/u64 mirror of src/math.rs)
// ═══════════════════════════════════════════════════════════════

/// Splits are in thousandths.
pub const SPLIT_DENOMINATOR: u32 = 1_000;

/// Narrow stand-in for the 10^12 accumulator multiplier.
pub const PRECISION: u64 = 1_000;

/// floor(elapsed * rate * alloc / total); zero when either weight is zero.
pub fn pool_reward(elapsed: u32, rate: u32, alloc: u32, total: u32) -> Option<u32> {
    if alloc == 0 || total == 0 {
        return Some(0);
    }
    if alloc > total {
        return None;
    }
    let emitted = (elapsed as u64).checked_mul(rate as u64)?;
    let r = emitted.checked_mul(alloc as u64)? / (total as u64);
    u32::try_from(r).ok()
}

/// Each share floor(reward * split / 1000).
pub fn split_reward(reward: u32, s: u32, a: u32, b: u32) -> Option<(u32, u32, u32)> {
    let share = |split: u32| -> Option<u32> {
        let v = (reward as u64).checked_mul(split as u64)? / (SPLIT_DENOMINATOR as u64);
        u32::try_from(v).ok()
    };
    Some((share(s)?, share(a)?, share(b)?))
}

/// floor(reward * PRECISION / total_staked); `None` for an empty pool.
pub fn acc_per_share_delta(reward: u32, total_staked: u32) -> Option<u64> {
    if total_staked == 0 {
        return None;
    }
    (reward as u64).checked_mul(PRECISION)?.checked_div(total_staked as u64)
}

/// floor(amount * acc / PRECISION).
pub fn reward_debt(amount: u32, acc: u64) -> Option<u64> {
    (amount as u64).checked_mul(acc).map(|v| v / PRECISION)
}

/// Entitlement minus debt; `None` if the debt is larger.
pub fn pending_reward(amount: u32, acc: u64, debt: u64) -> Option<u64> {
    reward_debt(amount, acc)?.checked_sub(debt)
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Pending is never negative ──

    /// Right after a rebase the pending amount is exactly zero.
    #[kani::proof]
    fn proof_pending_zero_after_rebase() {
        let amount: u32 = kani::any();
        let acc: u64 = kani::any();
        kani::assume(acc < (1 << 24));
        let debt = reward_debt(amount, acc).unwrap();
        assert_eq!(pending_reward(amount, acc, debt), Some(0));
    }

    /// The accumulator only grows, so a debt taken earlier stays covered.
    #[kani::proof]
    fn proof_pending_defined_as_acc_grows() {
        let amount: u32 = kani::any();
        let acc: u64 = kani::any();
        let delta: u64 = kani::any();
        kani::assume(acc < (1 << 20) && delta < (1 << 20));
        let debt = reward_debt(amount, acc).unwrap();
        let later = pending_reward(amount, acc + delta, debt);
        assert!(later.is_some());
    }

    // ── 2. Split bounds ──

    /// Shares never add up to more than the reward.
    #[kani::proof]
    fn proof_split_bounded() {
        let reward: u32 = kani::any();
        let s: u32 = kani::any();
        let a: u32 = kani::any();
        kani::assume(s <= SPLIT_DENOMINATOR && a <= SPLIT_DENOMINATOR - s);
        let b = SPLIT_DENOMINATOR - s - a;
        let (x, y, z) = split_reward(reward, s, a, b).unwrap();
        assert!((x as u64) + (y as u64) + (z as u64) <= reward as u64);
    }

    /// Dust lost to truncation is under one unit per share.
    #[kani::proof]
    fn proof_split_dust_bounded() {
        let reward: u32 = kani::any();
        let s: u32 = kani::any();
        let a: u32 = kani::any();
        kani::assume(reward < 1 << 16);
        kani::assume(s <= SPLIT_DENOMINATOR && a <= SPLIT_DENOMINATOR - s);
        let b = SPLIT_DENOMINATOR - s - a;
        let (x, y, z) = split_reward(reward, s, a, b).unwrap();
        assert!((reward as u64) - ((x as u64) + (y as u64) + (z as u64)) < 3);
    }

    // ── 3. Pool reward bounds ──

    #[kani::proof]
    fn proof_pool_reward_within_emission() {
        let elapsed: u32 = kani::any();
        let rate: u32 = kani::any();
        let alloc: u32 = kani::any();
        let total: u32 = kani::any();
        kani::assume(elapsed < 1 << 10 && rate < 1 << 10);
        kani::assume(total < 1 << 10 && alloc <= total);
        let r = pool_reward(elapsed, rate, alloc, total).unwrap();
        assert!((r as u64) <= (elapsed as u64) * (rate as u64));
    }

    #[kani::proof]
    fn proof_zero_weight_earns_nothing() {
        let elapsed: u32 = kani::any();
        let rate: u32 = kani::any();
        let total: u32 = kani::any();
        assert_eq!(pool_reward(elapsed, rate, 0, total), Some(0));
    }

    #[kani::proof]
    fn proof_weight_above_total_rejected() {
        let alloc: u32 = kani::any();
        let total: u32 = kani::any();
        kani::assume(alloc > total && total > 0);
        assert_eq!(pool_reward(kani::any(), kani::any(), alloc, total), None);
    }

    // ── 4. No inflation across holders ──

    /// Two holders splitting one accrual never receive more than was credited.
    #[kani::proof]
    fn proof_two_holders_no_inflation() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let reward: u32 = kani::any();
        kani::assume(a > 0 && a < 64);
        kani::assume(b > 0 && b < 64);
        kani::assume(reward < 256);

        let delta = acc_per_share_delta(reward, a + b).unwrap();
        let pa = pending_reward(a, delta, 0).unwrap();
        let pb = pending_reward(b, delta, 0).unwrap();
        assert!(pa + pb <= reward as u64);
    }

    /// A larger stake never earns less from the same accumulator.
    #[kani::proof]
    fn proof_pending_monotonic_in_stake() {
        let small: u32 = kani::any();
        let acc: u64 = kani::any();
        kani::assume(small < u32::MAX);
        kani::assume(acc < (1 << 24));
        let ps = pending_reward(small, acc, 0).unwrap();
        let pl = pending_reward(small + 1, acc, 0).unwrap();
        assert!(pl >= ps);
    }

    // ── 5. Arithmetic safety ──

    #[kani::proof]
    fn proof_acc_delta_empty_pool() {
        assert_eq!(acc_per_share_delta(kani::any(), 0), None);
    }

    #[kani::proof]
    fn proof_acc_delta_no_panic() {
        let _ = acc_per_share_delta(kani::any(), kani::any());
    }

    #[kani::proof]
    fn proof_pending_no_panic() {
        let _ = pending_reward(kani::any(), kani::any(), kani::any());
    }
}
