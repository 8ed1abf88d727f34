//! Property-based tests (proptest) for accrual math and whole-engine operation
//! sequences. Complements the Kani proofs with production types and wide ranges.

use ethnum::U256;
use percolator_rewards::error::RewardError;
use percolator_rewards::ledger::{AssetLedger, InMemoryLedger};
use percolator_rewards::math::{
    acc_per_share_delta, accumulated_reward, pending_reward, pool_reward, precision_scale, reward_debt,
    split_reward, MAX_PRECISION_EXPONENT, PRECISION,
};
use percolator_rewards::processor::RewardEngine;
use percolator_rewards::state::EngineConfig;
use proptest::prelude::*;
use solana_program::pubkey::Pubkey;

const T0: u64 = 10_000;
const RESERVE: u64 = 1_000_000_000_000;
const USERS: usize = 3;

// ═══════════════════════════════════════════════════════════════
// Helper: one-pool engine with three funded users
// ═══════════════════════════════════════════════════════════════

struct World {
    ledger: InMemoryLedger,
    engine: RewardEngine,
    authority: Pubkey,
    reward: Pubkey,
    staked: Pubkey,
    op_a: Pubkey,
    op_b: Pubkey,
    users: Vec<Pubkey>,
}

fn world(rate: u64, split_staker: u64, staked_decimals: u8) -> World {
    let mut ledger = InMemoryLedger::new();
    let authority = Pubkey::new_unique();
    let reward = Pubkey::new_unique();
    let staked = Pubkey::new_unique();
    ledger.register_asset(&reward, 6);
    ledger.register_asset(&staked, staked_decimals);
    ledger.mint(&reward, &authority, RESERVE).unwrap();

    let op_share = (1_000 - split_staker) / 2;
    let config = EngineConfig {
        admin: Pubkey::new_unique(),
        authority,
        reward_asset: reward,
        rate_per_time_unit: rate,
        start_time: T0,
        split_staker: 1_000 - 2 * op_share,
        split_op_a: op_share,
        split_op_b: op_share,
        op_a: Pubkey::new_unique(),
        op_b: Pubkey::new_unique(),
        max_operator_split: 500,
    };
    let mut engine = RewardEngine::new(&config, &ledger).unwrap();
    engine.add_pool(&mut ledger, &staked, 1, None, T0).unwrap();

    let users: Vec<Pubkey> = (0..USERS).map(|_| Pubkey::new_unique()).collect();
    for user in &users {
        ledger.mint(&staked, user, 1_000_000_000).unwrap();
    }
    World { ledger, engine, authority, reward, staked, op_a: config.op_a, op_b: config.op_b, users }
}

fn op_strategy() -> impl Strategy<Value = Vec<(u8, usize, u64, u64)>> {
    prop::collection::vec((0u8..5, 0usize..USERS, 0u64..10_000, 0u64..50), 1..40)
}

/// Apply one generated step. Errors must be exactly the ones the state predicts.
fn step(w: &mut World, kind: u8, user: Pubkey, amount: u64, now: u64) {
    let staked = w.engine.position_info(0, &user).map(|p| p.staked_amount);
    match kind {
        0 => {
            w.engine.deposit(&mut w.ledger, 0, &user, &user, amount, now).unwrap();
        }
        1 => {
            let result = w.engine.withdraw(&mut w.ledger, 0, &user, amount, &user, now);
            match staked {
                None => assert_eq!(result, Err(RewardError::PositionNotFound)),
                Some(s) if amount > s => assert_eq!(result, Err(RewardError::InsufficientStake)),
                Some(_) => {
                    result.unwrap();
                }
            }
        }
        2 => {
            let result = w.engine.harvest(&mut w.ledger, 0, &user, &user, now);
            assert_eq!(result.is_ok(), staked.is_some());
        }
        3 => {
            let result = w.engine.emergency_withdraw(&mut w.ledger, 0, &user, &user, now);
            assert_eq!(result.is_ok(), staked.is_some());
        }
        _ => {
            w.engine.update_pool(&mut w.ledger, 0, now).unwrap();
        }
    }
}

proptest! {
    // ── Accrual math ──

    #[test]
    fn prop_split_never_exceeds_reward(
        reward in 0u64..u64::MAX,
        staker in 0u64..=1_000,
        a in 0u64..=1_000,
    ) {
        prop_assume!(staker + a <= 1_000);
        let b = 1_000 - staker - a;
        let (s, x, y) = split_reward(reward, staker, a, b).unwrap();
        prop_assert!((s as u128) + (x as u128) + (y as u128) <= reward as u128);
        // Dust is at most one unit per share
        prop_assert!((reward as u128) - ((s as u128) + (x as u128) + (y as u128)) < 3);
    }

    #[test]
    fn prop_pool_reward_bounded_by_emission(
        elapsed in 0u64..1_000_000,
        rate in 0u64..1_000_000_000,
        alloc in 0u64..1_000_000,
        extra in 0u64..1_000_000,
    ) {
        let total = alloc + extra;
        let r = pool_reward(elapsed, rate, alloc, total).unwrap();
        prop_assert!((r as u128) <= (elapsed as u128) * (rate as u128));
    }

    #[test]
    fn prop_pending_zero_after_rebase(
        amount in 0u64..u64::MAX,
        acc in 0u128..(1u128 << 100),
    ) {
        let acc = U256::from(acc);
        if let Some(debt) = reward_debt(amount, acc, PRECISION) {
            prop_assert_eq!(pending_reward(amount, acc, PRECISION, debt), Some(0));
        }
    }

    #[test]
    fn prop_pending_monotonic_in_acc(
        amount in 0u64..1_000_000_000_000,
        acc in 0u128..(1u128 << 80),
        delta in 0u128..(1u128 << 60),
    ) {
        let acc = U256::from(acc);
        let debt = reward_debt(amount, acc, PRECISION).unwrap();
        let before = pending_reward(amount, acc, PRECISION, debt).unwrap();
        let after = pending_reward(amount, acc + U256::from(delta), PRECISION, debt).unwrap();
        prop_assert!(after >= before);
    }

    #[test]
    fn prop_acc_delta_always_fits(
        reward in any::<u64>(),
        exponent in 0u32..=MAX_PRECISION_EXPONENT,
        total in 1u64..u64::MAX,
    ) {
        let delta = acc_per_share_delta(reward, 10u128.pow(exponent), total);
        prop_assert!(delta.is_some());
    }

    #[test]
    fn prop_accumulated_reward_is_exact_floor(
        amount in any::<u64>(),
        hi in 0u128..(1u128 << 120),
        lo in any::<u64>(),
        exponent in 0u32..=MAX_PRECISION_EXPONENT,
    ) {
        let acc = U256::from(hi) * U256::from(lo);
        let precision = 10u128.pow(exponent);
        let expected = acc * U256::from(amount) / U256::from(precision);
        prop_assert_eq!(accumulated_reward(amount, acc, precision), Some(expected));
    }

    #[test]
    fn prop_precision_scale_is_power_of_ten(staked in 0u8..18, reward in 0u8..24) {
        let scale = precision_scale(staked, reward).unwrap();
        let mut s = scale;
        while s % 10 == 0 {
            s /= 10;
        }
        prop_assert_eq!(s, 1);
    }

    // ── Engine sequences ──

    #[test]
    fn prop_random_operations_keep_ledger_consistent(
        rate in 1u64..5_000,
        split_staker in 0u64..=1_000,
        staked_decimals in 0u8..12,
        ops in op_strategy(),
    ) {
        let mut w = world(rate, split_staker, staked_decimals);
        let mut now = T0;
        let mut last_acc = U256::ZERO;

        for &(kind, who, amount, dt) in &ops {
            now += dt;
            let user = w.users[who];
            step(&mut w, kind, user, amount, now);

            let pool = w.engine.pool_info(0).unwrap();
            prop_assert!(pool.accumulator() >= last_acc);
            last_acc = pool.accumulator();

            // Principal custody matches the pool total
            prop_assert_eq!(w.ledger.balance_of(&w.staked, &w.authority), pool.total_staked);
            let position_sum: u64 = w.engine.pool_positions(0).iter().map(|p| p.staked_amount).sum();
            prop_assert_eq!(position_sum, pool.total_staked);

            // Pending is defined (never negative) for every user
            for u in &w.users {
                prop_assert!(w.engine.pending_reward(0, u, now).is_ok());
            }
        }

        // Reward tokens are only moved, never created
        let paid: u64 = w.users.iter().map(|u| w.ledger.balance_of(&w.reward, u)).sum();
        let reserve = w.ledger.balance_of(&w.reward, &w.authority);
        let ops_paid = w.ledger.balance_of(&w.reward, &w.op_a) + w.ledger.balance_of(&w.reward, &w.op_b);
        prop_assert_eq!(paid + reserve + ops_paid, RESERVE);

        // Credited reward is accounted for up to per-step rounding dust
        w.engine.update_pool(&mut w.ledger, 0, now).unwrap();
        let pool = w.engine.pool_info(0).unwrap();
        let owed: u128 = w.users.iter().map(|u| w.engine.pending_reward(0, u, now).unwrap() as u128).sum();
        let accounted = pool.total_harvested + pool.total_forfeited + owed;
        let bound = (ops.len() as u128 + 1) * (USERS as u128 + 1);
        prop_assert!(
            pool.total_credited.abs_diff(accounted) <= bound,
            "credited {} vs accounted {}", pool.total_credited, accounted,
        );
        prop_assert_eq!(pool.total_harvested, paid as u128);
    }
}
