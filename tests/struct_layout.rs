//! Struct layout verification tests.
//!
//! Ensures bytemuck Pod compliance and that record sizes don't accidentally
//! change (would break any persisted state or digest).

use bytemuck::{Pod, Zeroable};
use ethnum::{I256, U256};
use percolator_rewards::state::{
    EmissionPolicy, Pool, Position, RewarderConfig, EMISSION_POLICY_SIZE, POOL_SIZE, POSITION_SIZE,
    REWARDER_CONFIG_SIZE,
};
use solana_program::pubkey::Pubkey;

#[test]
fn test_emission_policy_size_is_256() {
    assert_eq!(EMISSION_POLICY_SIZE, 256);
    assert_eq!(std::mem::size_of::<EmissionPolicy>(), 256);
}

#[test]
fn test_pool_size_is_208() {
    assert_eq!(POOL_SIZE, 208);
    assert_eq!(std::mem::size_of::<Pool>(), 208);
}

#[test]
fn test_position_size_is_128() {
    assert_eq!(POSITION_SIZE, 128);
    assert_eq!(std::mem::size_of::<Position>(), 128);
}

#[test]
fn test_rewarder_config_size_is_128() {
    assert_eq!(REWARDER_CONFIG_SIZE, 128);
    assert_eq!(std::mem::size_of::<RewarderConfig>(), 128);
}

#[test]
fn test_zeroed_records_are_not_initialized() {
    let pool = Pool::zeroed();
    assert_eq!(pool.is_initialized, 0);
    assert_eq!(pool.rewarder_pubkey(), None);
    assert_eq!(pool.accumulator(), U256::ZERO);

    let position = Position::zeroed();
    assert_eq!(position.is_initialized, 0);
    assert_eq!(position.debt(), I256::ZERO);

    assert_eq!(EmissionPolicy::zeroed().is_initialized, 0);
    assert_eq!(RewarderConfig::zeroed().is_initialized, 0);
    assert_eq!(RewarderConfig::zeroed().accumulator(), U256::ZERO);
}

#[test]
fn test_bytemuck_roundtrip_pool() {
    let asset = Pubkey::new_unique();
    let rewarder = Pubkey::new_unique();
    let mut pool = Pool::new(3, &asset, 40, 1_000_000_000_000, 77);
    pool.set_rewarder(Some(&rewarder));
    pool.total_staked = 5_000;
    let wide = U256::from(u128::MAX) * U256::from(7u32);
    pool.acc_reward_per_share = wide.to_le_bytes();

    let bytes: &[u8] = bytemuck::bytes_of(&pool);
    assert_eq!(bytes.len(), POOL_SIZE);

    let recovered: &Pool = bytemuck::from_bytes(bytes);
    assert_eq!(recovered.id, 3);
    assert_eq!(recovered.staked_asset_pubkey(), asset);
    assert_eq!(recovered.rewarder_pubkey(), Some(rewarder));
    assert_eq!(recovered.alloc_weight, 40);
    assert_eq!(recovered.last_accrual_time, 77);
    assert_eq!(recovered.total_staked, 5_000);
    assert_eq!(recovered.accumulator(), wide);
}

#[test]
fn test_bytemuck_roundtrip_position() {
    let user = Pubkey::new_unique();
    let mut position = Position::new(9, &user);
    position.staked_amount = 123;
    position.set_debt(I256::from(-5i32));

    let bytes: &[u8] = bytemuck::bytes_of(&position);
    assert_eq!(bytes.len(), POSITION_SIZE);

    let recovered: &Position = bytemuck::from_bytes(bytes);
    assert_eq!(recovered.is_initialized, 1);
    assert_eq!(recovered.pool_id, 9);
    assert_eq!(recovered.user_pubkey(), user);
    assert_eq!(recovered.staked_amount, 123);
    assert_eq!(recovered.debt(), I256::from(-5i32));
}

#[test]
fn test_pod_zeroable_impls() {
    fn assert_pod<T: Pod + Zeroable>() {}
    assert_pod::<EmissionPolicy>();
    assert_pod::<Pool>();
    assert_pod::<Position>();
    assert_pod::<RewarderConfig>();
}

/// Field offset verification: no hidden padding
#[test]
fn test_pool_field_offsets() {
    let pool = Pool::zeroed();
    let base = &pool as *const _ as usize;

    assert_eq!(&pool.is_initialized as *const _ as usize - base, 0);
    assert_eq!(&pool.has_rewarder as *const _ as usize - base, 1);
    assert_eq!(&pool.id as *const _ as usize - base, 4);
    assert_eq!(&pool.staked_asset as *const _ as usize - base, 8);
    assert_eq!(&pool.rewarder as *const _ as usize - base, 40);
    assert_eq!(&pool.alloc_weight as *const _ as usize - base, 72);
    assert_eq!(&pool.last_accrual_time as *const _ as usize - base, 80);
    assert_eq!(&pool.total_staked as *const _ as usize - base, 88);
    assert_eq!(&pool.acc_reward_per_share as *const _ as usize - base, 96);
    assert_eq!(&pool.precision as *const _ as usize - base, 128);
    assert_eq!(&pool.total_credited as *const _ as usize - base, 144);
    assert_eq!(&pool.total_harvested as *const _ as usize - base, 160);
    assert_eq!(&pool.total_forfeited as *const _ as usize - base, 176);
    assert_eq!(&pool._reserved as *const _ as usize - base, 192);
}

#[test]
fn test_position_field_offsets() {
    let position = Position::zeroed();
    let base = &position as *const _ as usize;

    assert_eq!(&position.pool_id as *const _ as usize - base, 4);
    assert_eq!(&position.user as *const _ as usize - base, 8);
    assert_eq!(&position.staked_amount as *const _ as usize - base, 40);
    assert_eq!(&position.reward_debt as *const _ as usize - base, 48);
    assert_eq!(&position.total_harvested as *const _ as usize - base, 80);
    assert_eq!(&position.last_action_time as *const _ as usize - base, 96);
    assert_eq!(&position._reserved as *const _ as usize - base, 104);
}

#[test]
fn test_rewarder_config_field_offsets() {
    let config = RewarderConfig::zeroed();
    let base = &config as *const _ as usize;

    assert_eq!(&config.rate_per_time_unit as *const _ as usize - base, 32);
    assert_eq!(&config.last_accrual_time as *const _ as usize - base, 40);
    assert_eq!(&config.acc_per_share as *const _ as usize - base, 48);
    assert_eq!(&config.precision_scale as *const _ as usize - base, 80);
    assert_eq!(&config.total_credited as *const _ as usize - base, 96);
    assert_eq!(&config.is_initialized as *const _ as usize - base, 112);
    assert_eq!(&config.reward_decimals as *const _ as usize - base, 113);
    assert_eq!(&config._reserved as *const _ as usize - base, 120);
}

#[test]
fn test_emission_policy_field_offsets() {
    let policy = EmissionPolicy::zeroed();
    let base = &policy as *const _ as usize;

    assert_eq!(&policy.admin as *const _ as usize - base, 8);
    assert_eq!(&policy.authority as *const _ as usize - base, 40);
    assert_eq!(&policy.reward_asset as *const _ as usize - base, 72);
    assert_eq!(&policy.op_a as *const _ as usize - base, 104);
    assert_eq!(&policy.op_b as *const _ as usize - base, 136);
    assert_eq!(&policy.rate_per_time_unit as *const _ as usize - base, 168);
    assert_eq!(&policy.start_time as *const _ as usize - base, 176);
    assert_eq!(&policy.split_staker as *const _ as usize - base, 184);
    assert_eq!(&policy.max_operator_split as *const _ as usize - base, 208);
    assert_eq!(&policy.total_alloc_weight as *const _ as usize - base, 216);
    assert_eq!(&policy._reserved as *const _ as usize - base, 224);
}
