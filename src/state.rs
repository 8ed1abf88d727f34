use bytemuck::{Pod, Zeroable};
use ethnum::{I256, U256};
use solana_program::pubkey::Pubkey;

use crate::error::RewardError;
use crate::math;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Only signer allowed to run privileged instructions through `process`
    pub admin: Pubkey,
    /// Custody account holding staked principal and the reward reserve
    pub authority: Pubkey,
    /// Primary reward asset
    pub reward_asset: Pubkey,
    pub rate_per_time_unit: u64,
    /// Nothing accrues before this time
    pub start_time: u64,
    pub split_staker: u64,
    pub split_op_a: u64,
    pub split_op_b: u64,
    /// Recipient of the operator A share
    pub op_a: Pubkey,
    /// Recipient of the operator B share
    pub op_b: Pubkey,
    /// Ceiling applied to each operator split individually
    pub max_operator_split: u64,
}

/// Global emission policy and registry totals. One per engine.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct EmissionPolicy {
    /// Whether the policy is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Padding for alignment
    pub _padding: [u8; 7],

    /// Privileged signer for the instruction surface
    pub admin: [u8; 32],

    /// Engine custody account in the asset ledger
    pub authority: [u8; 32],

    /// Primary reward asset
    pub reward_asset: [u8; 32],

    /// Operator A recipient
    pub op_a: [u8; 32],

    /// Operator B recipient
    pub op_b: [u8; 32],

    /// Reward emitted per time unit across all pools
    pub rate_per_time_unit: u64,

    /// Nothing accrues before this time
    pub start_time: u64,

    /// Staker share in thousandths
    pub split_staker: u64,

    /// Operator A share in thousandths
    pub split_op_a: u64,

    /// Operator B share in thousandths
    pub split_op_b: u64,

    /// Ceiling for each operator split
    pub max_operator_split: u64,

    /// Sum of every pool's allocation weight, kept in step with weight edits
    pub total_alloc_weight: u64,

    /// Reserved for future use
    pub _reserved: [u8; 32],
}

/// Size of EmissionPolicy in bytes
pub const EMISSION_POLICY_SIZE: usize = core::mem::size_of::<EmissionPolicy>();

/// One registered staked-asset pool.
///
/// `acc_reward_per_share` only ever increases. `precision` is fixed at
/// registration from the staked/reward decimal pair.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Pool {
    /// Whether the pool is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Whether `rewarder` is set (1 = yes)
    pub has_rewarder: u8,

    /// Padding
    pub _padding: [u8; 2],

    /// Dense pool id (index in the registry)
    pub id: u32,

    /// Asset staked into this pool (unique across pools)
    pub staked_asset: [u8; 32],

    /// Attached secondary rewarder id (valid only if has_rewarder == 1)
    pub rewarder: [u8; 32],

    /// Relative claim on total emissions
    pub alloc_weight: u64,

    /// Time of the last accrual
    pub last_accrual_time: u64,

    /// Sum of all positions' staked amounts
    pub total_staked: u64,

    /// Accumulated reward per share, scaled by `precision` (U256, little-endian)
    pub acc_reward_per_share: [u8; 32],

    /// Accumulator multiplier
    pub precision: u128,

    /// Lifetime staker share credited to this pool
    pub total_credited: u128,

    /// Lifetime reward paid out to positions
    pub total_harvested: u128,

    /// Lifetime pending reward dropped by emergency withdrawals
    pub total_forfeited: u128,

    /// Reserved for future use
    pub _reserved: [u8; 16],
}

/// Size of Pool in bytes
pub const POOL_SIZE: usize = core::mem::size_of::<Pool>();

/// Per-(pool, user) staked amount and reward debt snapshot.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// Whether this record is initialized
    pub is_initialized: u8,

    /// Padding
    pub _padding: [u8; 3],

    /// Pool this position belongs to
    pub pool_id: u32,

    /// Position owner
    pub user: [u8; 32],

    /// Amount staked
    pub staked_amount: u64,

    /// `staked_amount * acc_reward_per_share / precision` as of the last touch
    /// (I256, little-endian)
    pub reward_debt: [u8; 32],

    /// Lifetime reward paid to this position
    pub total_harvested: u128,

    /// Time of the last operation on this position
    pub last_action_time: u64,

    /// Reserved for future use
    pub _reserved: [u8; 24],
}

/// Size of Position in bytes
pub const POSITION_SIZE: usize = core::mem::size_of::<Position>();

/// One secondary reward token's accrual state for one pool.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct RewarderConfig {
    /// Secondary reward token
    pub reward_token: [u8; 32],

    /// Reward emitted per time unit
    pub rate_per_time_unit: u64,

    /// Time of the last accrual
    pub last_accrual_time: u64,

    /// Accumulated reward per share, scaled by `precision_scale` (U256, little-endian)
    pub acc_per_share: [u8; 32],

    /// Accumulator multiplier, immutable after registration
    pub precision_scale: u128,

    /// Lifetime reward credited to stakers
    pub total_credited: u128,

    /// Whether this config is initialized
    pub is_initialized: u8,

    /// Reward token decimals (recorded at registration)
    pub reward_decimals: u8,

    /// Padding
    pub _padding: [u8; 6],

    /// Reserved for future use
    pub _reserved: [u8; 8],
}

/// Size of RewarderConfig in bytes
pub const REWARDER_CONFIG_SIZE: usize = core::mem::size_of::<RewarderConfig>();

/// Reward emitted by one pool accrual, already split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accrual {
    pub elapsed: u64,
    pub stakers: u64,
    pub op_a: u64,
    pub op_b: u64,
}

impl EmissionPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut policy = Self::zeroed();
        policy.is_initialized = 1;
        policy.admin = config.admin.to_bytes();
        policy.authority = config.authority.to_bytes();
        policy.reward_asset = config.reward_asset.to_bytes();
        policy.op_a = config.op_a.to_bytes();
        policy.op_b = config.op_b.to_bytes();
        policy.rate_per_time_unit = config.rate_per_time_unit;
        policy.start_time = config.start_time;
        policy.split_staker = config.split_staker;
        policy.split_op_a = config.split_op_a;
        policy.split_op_b = config.split_op_b;
        policy.max_operator_split = config.max_operator_split;
        policy
    }

    pub fn admin_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.admin)
    }

    pub fn authority_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.authority)
    }

    pub fn reward_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.reward_asset)
    }

    pub fn op_a_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.op_a)
    }

    pub fn op_b_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.op_b)
    }

    /// Bounds-check a split triple against this policy's ceiling.
    /// Never clamps: an out-of-bounds edit is rejected.
    pub fn check_splits(
        &self,
        split_staker: u64,
        split_op_a: u64,
        split_op_b: u64,
    ) -> Result<(), RewardError> {
        if split_staker > math::SPLIT_DENOMINATOR
            || split_op_a > self.max_operator_split
            || split_op_b > self.max_operator_split
        {
            return Err(RewardError::SplitCeilingExceeded);
        }
        if !math::splits_balanced(split_staker, split_op_a, split_op_b) {
            return Err(RewardError::InvalidSplit);
        }
        Ok(())
    }
}

impl Pool {
    pub fn new(id: u32, staked_asset: &Pubkey, alloc_weight: u64, precision: u128, start: u64) -> Self {
        let mut pool = Self::zeroed();
        pool.is_initialized = 1;
        pool.id = id;
        pool.staked_asset = staked_asset.to_bytes();
        pool.alloc_weight = alloc_weight;
        pool.precision = precision;
        pool.last_accrual_time = start;
        pool
    }

    pub fn staked_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.staked_asset)
    }

    pub fn accumulator(&self) -> U256 {
        U256::from_le_bytes(self.acc_reward_per_share)
    }

    pub fn rewarder_pubkey(&self) -> Option<Pubkey> {
        (self.has_rewarder == 1).then(|| Pubkey::new_from_array(self.rewarder))
    }

    pub fn set_rewarder(&mut self, rewarder: Option<&Pubkey>) {
        match rewarder {
            Some(id) => {
                self.has_rewarder = 1;
                self.rewarder = id.to_bytes();
            }
            None => {
                self.has_rewarder = 0;
                self.rewarder = [0; 32];
            }
        }
    }

    /// Bring the accumulator up to `now`.
    ///
    /// Returns the split emission for the elapsed interval; the caller moves
    /// the operator shares. An empty pool or a time before the policy start
    /// only advances `last_accrual_time`; nothing is created for that interval.
    pub fn accrue(&mut self, policy: &EmissionPolicy, now: u64) -> Result<Accrual, RewardError> {
        if now < self.last_accrual_time {
            return Err(RewardError::TimeRegression);
        }
        if now == self.last_accrual_time {
            return Ok(Accrual::default());
        }
        if self.total_staked == 0 || now < policy.start_time {
            self.last_accrual_time = now;
            return Ok(Accrual::default());
        }

        // Time before the start threshold never counts
        let from = self.last_accrual_time.max(policy.start_time);
        let elapsed = now - from;
        let reward = math::pool_reward(
            elapsed,
            policy.rate_per_time_unit,
            self.alloc_weight,
            policy.total_alloc_weight,
        )
        .ok_or(RewardError::Overflow)?;
        let (stakers, op_a, op_b) = math::split_reward(
            reward,
            policy.split_staker,
            policy.split_op_a,
            policy.split_op_b,
        )
        .ok_or(RewardError::Overflow)?;

        if stakers > 0 {
            let delta = math::acc_per_share_delta(stakers, self.precision, self.total_staked)
                .ok_or(RewardError::Overflow)?;
            let acc = self.accumulator().checked_add(delta).ok_or(RewardError::Overflow)?;
            let total_credited = self
                .total_credited
                .checked_add(stakers as u128)
                .ok_or(RewardError::Overflow)?;
            self.acc_reward_per_share = acc.to_le_bytes();
            self.total_credited = total_credited;
        }
        self.last_accrual_time = now;

        Ok(Accrual { elapsed, stakers, op_a, op_b })
    }
}

impl Position {
    pub fn new(pool_id: u32, user: &Pubkey) -> Self {
        let mut position = Self::zeroed();
        position.is_initialized = 1;
        position.pool_id = pool_id;
        position.user = user.to_bytes();
        position
    }

    pub fn user_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.user)
    }

    pub fn debt(&self) -> I256 {
        I256::from_le_bytes(self.reward_debt)
    }

    pub fn set_debt(&mut self, debt: I256) {
        self.reward_debt = debt.to_le_bytes();
    }

    /// Pending reward against the pool's current accumulator.
    pub fn pending(&self, pool: &Pool) -> Result<u64, RewardError> {
        math::pending_reward(self.staked_amount, pool.accumulator(), pool.precision, self.debt())
            .ok_or(RewardError::Overflow)
    }

    /// Re-snapshot the debt from the current staked amount.
    pub fn rebase(&mut self, pool: &Pool) -> Result<(), RewardError> {
        let debt = math::reward_debt(self.staked_amount, pool.accumulator(), pool.precision)
            .ok_or(RewardError::Overflow)?;
        self.set_debt(debt);
        Ok(())
    }
}

impl RewarderConfig {
    pub fn new(reward_token: &Pubkey, reward_decimals: u8, precision_scale: u128, rate: u64, now: u64) -> Self {
        let mut config = Self::zeroed();
        config.is_initialized = 1;
        config.reward_token = reward_token.to_bytes();
        config.reward_decimals = reward_decimals;
        config.precision_scale = precision_scale;
        config.rate_per_time_unit = rate;
        config.last_accrual_time = now;
        config
    }

    pub fn reward_token_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.reward_token)
    }

    pub fn accumulator(&self) -> U256 {
        U256::from_le_bytes(self.acc_per_share)
    }

    /// Same lazy accrual as `Pool::accrue`, without start time or split.
    /// Returns the amount credited for the interval.
    pub fn accrue(&mut self, total_staked: u64, now: u64) -> Result<u64, RewardError> {
        if now < self.last_accrual_time {
            return Err(RewardError::TimeRegression);
        }
        if now == self.last_accrual_time {
            return Ok(0);
        }
        if total_staked == 0 {
            self.last_accrual_time = now;
            return Ok(0);
        }

        let elapsed = now - self.last_accrual_time;
        let reward = math::stream_reward(elapsed, self.rate_per_time_unit)
            .ok_or(RewardError::Overflow)?;
        if reward > 0 {
            let delta = math::acc_per_share_delta(reward, self.precision_scale, total_staked)
                .ok_or(RewardError::Overflow)?;
            let acc = self.accumulator().checked_add(delta).ok_or(RewardError::Overflow)?;
            let total_credited = self
                .total_credited
                .checked_add(reward as u128)
                .ok_or(RewardError::Overflow)?;
            self.acc_per_share = acc.to_le_bytes();
            self.total_credited = total_credited;
        }
        self.last_accrual_time = now;
        Ok(reward)
    }

    /// Advance the clock to `now` without crediting the skipped interval.
    pub fn skip_to(&mut self, now: u64) {
        self.last_accrual_time = self.last_accrual_time.max(now);
    }
}
