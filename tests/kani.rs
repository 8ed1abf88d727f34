//! Kani formal verification proofs for percolator-rewards accrual math.
//!
//! Proves safety properties on the PURE MATH layer at production widths:
//! 1. Pending reward is never negative after a rebase or as the accumulator grows
//! 2. Split shares never exceed the pool reward
//! 3. Pool reward never exceeds global emission
//! 4. Precision scale stays within its cap
//!
//! Run all:  cargo kani --tests
//! Run one:  cargo kani --harness <name>

#[cfg(kani)]
mod kani_proofs {
    use ethnum::U256;
    use percolator_rewards::math::{
        acc_per_share_delta, pending_reward, pool_reward, precision_scale, reward_debt,
        split_reward, MAX_PRECISION_EXPONENT, PRECISION, SPLIT_DENOMINATOR,
    };

    // ═══════════════════════════════════════════════════════════
    // 1. Pending Non-Negativity
    // ═══════════════════════════════════════════════════════════

    /// PROOF: a freshly rebased position has exactly zero pending.
    #[kani::proof]
    fn proof_rebase_zeroes_pending() {
        let amount: u64 = kani::any();
        let acc: u128 = kani::any();
        kani::assume(acc <= 1u128 << 64);
        let acc = U256::from(acc);

        let debt = match reward_debt(amount, acc, PRECISION) {
            Some(d) => d,
            None => return,
        };
        assert_eq!(pending_reward(amount, acc, PRECISION, debt), Some(0));
    }

    /// PROOF: growth of the accumulator never makes an old debt exceed entitlement.
    #[kani::proof]
    fn proof_pending_nonnegative_as_acc_grows() {
        let amount: u64 = kani::any();
        let acc: u128 = kani::any();
        let delta: u128 = kani::any();
        kani::assume(amount <= 1_000_000_000);
        kani::assume(acc <= 1u128 << 60);
        kani::assume(delta <= 1u128 << 60);

        let acc = U256::from(acc);
        let debt = reward_debt(amount, acc, PRECISION).unwrap();
        let later = pending_reward(amount, acc + U256::from(delta), PRECISION, debt);
        assert!(later.is_some());
    }

    // ═══════════════════════════════════════════════════════════
    // 2. Split Bounds
    // ═══════════════════════════════════════════════════════════

    /// PROOF: staker + operator shares never exceed the reward.
    #[kani::proof]
    fn proof_split_never_exceeds_reward() {
        let reward: u64 = kani::any();
        let s: u64 = kani::any();
        let a: u64 = kani::any();
        kani::assume(s <= SPLIT_DENOMINATOR);
        kani::assume(a <= SPLIT_DENOMINATOR - s);
        let b = SPLIT_DENOMINATOR - s - a;

        let (x, y, z) = split_reward(reward, s, a, b).unwrap();
        assert!((x as u128) + (y as u128) + (z as u128) <= reward as u128);
    }

    // ═══════════════════════════════════════════════════════════
    // 3. Emission Bounds
    // ═══════════════════════════════════════════════════════════

    /// PROOF: one pool never earns more than the global emission.
    #[kani::proof]
    fn proof_pool_reward_within_emission() {
        let elapsed: u64 = kani::any();
        let rate: u64 = kani::any();
        let alloc: u64 = kani::any();
        let total: u64 = kani::any();
        kani::assume(elapsed <= 1 << 20);
        kani::assume(rate <= 1 << 20);
        kani::assume(alloc <= total && total <= 1 << 16);

        let r = pool_reward(elapsed, rate, alloc, total).unwrap();
        assert!((r as u128) <= (elapsed as u128) * (rate as u128));
    }

    /// PROOF: an empty pool has no accumulator increment.
    #[kani::proof]
    fn proof_empty_pool_no_delta() {
        let reward: u64 = kani::any();
        assert_eq!(acc_per_share_delta(reward, PRECISION, 0), None);
    }

    /// PROOF: a nonempty pool always gets an increment, even at the largest scale.
    #[kani::proof]
    fn proof_delta_fits_at_largest_scale() {
        let reward: u64 = kani::any();
        let total: u64 = kani::any();
        kani::assume(total >= 1);
        let precision = 10u128.pow(MAX_PRECISION_EXPONENT);
        assert!(acc_per_share_delta(reward, precision, total).is_some());
    }

    // ═══════════════════════════════════════════════════════════
    // 4. Precision Scale
    // ═══════════════════════════════════════════════════════════

    /// PROOF: any accepted scale is at most 10^MAX_PRECISION_EXPONENT and at least 1.
    #[kani::proof]
    fn proof_precision_scale_bounded() {
        let staked: u8 = kani::any();
        let reward: u8 = kani::any();
        if let Some(scale) = precision_scale(staked, reward) {
            assert!(scale >= 1);
            assert!(scale <= 10u128.pow(MAX_PRECISION_EXPONENT));
        }
    }
}
