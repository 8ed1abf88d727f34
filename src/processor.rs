use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use ethnum::I256;
use solana_program::{entrypoint::ProgramResult, msg, pubkey::Pubkey};

use crate::error::RewardError;
use crate::instruction::RewardInstruction;
use crate::ledger::{transact, AssetLedger, TransferJournal};
use crate::math;
use crate::rewarder::{HookContext, Rewarder, RewarderRef};
use crate::state::{Accrual, EmissionPolicy, EngineConfig, Pool, Position};

/// Pool registry, emission policy and positions.
///
/// Every mutating operation stages copies of the records it touches, runs
/// its transfers through a `TransferJournal`, and only writes the copies
/// back once every transfer and the rewarder hook have succeeded.
pub struct RewardEngine {
    policy: EmissionPolicy,
    pools: Vec<Pool>,
    positions: BTreeMap<(u32, Pubkey), Position>,
    staked_assets: BTreeMap<Pubkey, u32>,
    rewarders: BTreeMap<Pubkey, RewarderRef>,
}

/// One position change: stake in, stake out, harvest in between.
struct PositionChange<'a> {
    pool_id: u32,
    owner: &'a Pubkey,
    funder: &'a Pubkey,
    recipient: &'a Pubkey,
    deposit: u64,
    withdraw: u64,
    open_if_missing: bool,
}

/// Move the operator shares of one accrual out of engine custody.
fn pay_operators(
    journal: &mut TransferJournal,
    policy: &EmissionPolicy,
    accrual: &Accrual,
) -> Result<(), RewardError> {
    let reward_asset = policy.reward_asset_pubkey();
    journal.transfer_out(&reward_asset, &policy.op_a_pubkey(), accrual.op_a)?;
    journal.transfer_out(&reward_asset, &policy.op_b_pubkey(), accrual.op_b)?;
    Ok(())
}

/// Operator payout for the emergency path: a refused share is logged and dropped.
fn pay_operators_best_effort(journal: &mut TransferJournal, policy: &EmissionPolicy, accrual: &Accrual, pool_id: u32) {
    let reward_asset = policy.reward_asset_pubkey();
    for (operator, share) in [(policy.op_a_pubkey(), accrual.op_a), (policy.op_b_pubkey(), accrual.op_b)] {
        if journal.transfer_out(&reward_asset, &operator, share).is_err() {
            msg!("Operator share {} to {} dropped on emergency withdraw from pool {}", share, operator, pool_id);
        }
    }
}

impl RewardEngine {
    pub fn new(config: &EngineConfig, ledger: &dyn AssetLedger) -> Result<Self, RewardError> {
        if ledger.decimals(&config.reward_asset).is_none() {
            msg!("Error: reward asset {} unknown to the ledger", config.reward_asset);
            return Err(RewardError::InvalidAsset);
        }
        let policy = EmissionPolicy::from_config(config);
        policy.check_splits(config.split_staker, config.split_op_a, config.split_op_b)?;

        msg!(
            "RewardEngine initialized: reward {}, rate {}, start {}",
            config.reward_asset,
            config.rate_per_time_unit,
            config.start_time
        );
        Ok(Self {
            policy,
            pools: Vec::new(),
            positions: BTreeMap::new(),
            staked_assets: BTreeMap::new(),
            rewarders: BTreeMap::new(),
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════

    pub fn policy(&self) -> &EmissionPolicy {
        &self.policy
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn total_alloc_weight(&self) -> u64 {
        self.policy.total_alloc_weight
    }

    pub fn pool_info(&self, pool_id: u32) -> Result<Pool, RewardError> {
        self.pool(pool_id).copied()
    }

    pub fn pool_id_for(&self, staked_asset: &Pubkey) -> Option<u32> {
        self.staked_assets.get(staked_asset).copied()
    }

    pub fn position_info(&self, pool_id: u32, user: &Pubkey) -> Option<Position> {
        self.positions.get(&(pool_id, *user)).copied()
    }

    /// Every position of one pool, ordered by owner.
    pub fn pool_positions(&self, pool_id: u32) -> Vec<Position> {
        self.positions
            .range((pool_id, Pubkey::default())..)
            .take_while(|((id, _), _)| *id == pool_id)
            .map(|(_, position)| *position)
            .collect()
    }

    /// Primary reward `user` would harvest at `now`. Mutates nothing.
    pub fn pending_reward(&self, pool_id: u32, user: &Pubkey, now: u64) -> Result<u64, RewardError> {
        let mut pool = *self.pool(pool_id)?;
        pool.accrue(&self.policy, now)?;
        match self.positions.get(&(pool_id, *user)) {
            Some(position) => position.pending(&pool),
            None => Ok(0),
        }
    }

    /// Secondary rewards `user` would receive at `now`, per reward token.
    pub fn pending_secondary(
        &self,
        pool_id: u32,
        user: &Pubkey,
        now: u64,
    ) -> Result<Vec<(Pubkey, u64)>, RewardError> {
        let pool = self.pool(pool_id)?;
        let Some(id) = pool.rewarder_pubkey() else {
            return Ok(Vec::new());
        };
        self.lock_rewarder(&id)?.pending_tokens(user, pool.total_staked, now)
    }

    /// blake3 over the raw bytes of the policy, every pool and every position.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(bytemuck::bytes_of(&self.policy));
        for pool in &self.pools {
            hasher.update(bytemuck::bytes_of(pool));
        }
        for position in self.positions.values() {
            hasher.update(bytemuck::bytes_of(position));
        }
        *hasher.finalize().as_bytes()
    }

    fn pool(&self, pool_id: u32) -> Result<&Pool, RewardError> {
        self.pools.get(pool_id as usize).ok_or(RewardError::UnknownPool)
    }

    // ═══════════════════════════════════════════════════════════════
    // Accrual
    // ═══════════════════════════════════════════════════════════════

    /// Accrue one pool and pay its operator shares.
    pub fn update_pool(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        now: u64,
    ) -> Result<Pool, RewardError> {
        let mut pool = *self.pool(pool_id)?;
        let policy = self.policy;
        let accrual = pool.accrue(&policy, now)?;
        transact(ledger, policy.authority_pubkey(), |journal| {
            pay_operators(journal, &policy, &accrual)
        })?;

        self.pools[pool_id as usize] = pool;
        if accrual.elapsed > 0 {
            msg!(
                "Pool {} accrued {} to stakers over {} (operators {} / {})",
                pool_id,
                accrual.stakers,
                accrual.elapsed,
                accrual.op_a,
                accrual.op_b
            );
        }
        Ok(pool)
    }

    /// Accrue every pool. All pools advance or none does.
    pub fn mass_update_pools(&mut self, ledger: &mut dyn AssetLedger, now: u64) -> Result<(), RewardError> {
        let staged = transact(ledger, self.policy.authority_pubkey(), |journal| {
            self.stage_mass_update(journal, now)
        })?;
        self.pools = staged;
        msg!("Mass update of {} pools at {}", self.pools.len(), now);
        Ok(())
    }

    /// Accrued copies of every pool under the current policy.
    fn stage_mass_update(&self, journal: &mut TransferJournal, now: u64) -> Result<Vec<Pool>, RewardError> {
        let mut staged = self.pools.clone();
        for pool in staged.iter_mut() {
            let accrual = pool.accrue(&self.policy, now)?;
            pay_operators(journal, &self.policy, &accrual)?;
        }
        Ok(staged)
    }

    // ═══════════════════════════════════════════════════════════════
    // Registry
    // ═══════════════════════════════════════════════════════════════

    /// Make a rewarder attachable. It must be bound to this engine.
    pub fn register_rewarder(&mut self, rewarder: RewarderRef) -> Result<Pubkey, RewardError> {
        let (id, engine) = {
            let guard = rewarder.lock().map_err(|_| RewardError::RewarderUnavailable)?;
            (guard.id(), guard.engine())
        };
        if engine != self.policy.authority_pubkey() {
            msg!("Error: rewarder {} is bound to engine {}", id, engine);
            return Err(RewardError::InvalidRewarder);
        }
        if self.rewarders.contains_key(&id) {
            return Err(RewardError::InvalidRewarder);
        }
        self.rewarders.insert(id, rewarder);
        msg!("Rewarder {} registered", id);
        Ok(id)
    }

    /// A rewarder may serve a pool only if it is registered and bound to the pool's asset.
    fn check_rewarder(&self, id: &Pubkey, staked_asset: &Pubkey) -> Result<(), RewardError> {
        let rewarder = self.rewarders.get(id).ok_or(RewardError::InvalidRewarder)?;
        let guard = rewarder.lock().map_err(|_| RewardError::RewarderUnavailable)?;
        if guard.staked_asset() != *staked_asset {
            msg!("Error: rewarder {} serves {}, not {}", id, guard.staked_asset(), staked_asset);
            return Err(RewardError::InvalidRewarder);
        }
        Ok(())
    }

    pub fn add_pool(
        &mut self,
        ledger: &mut dyn AssetLedger,
        staked_asset: &Pubkey,
        alloc_weight: u64,
        rewarder: Option<Pubkey>,
        now: u64,
    ) -> Result<u32, RewardError> {
        if self.staked_assets.contains_key(staked_asset) {
            return Err(RewardError::DuplicateStakedAsset);
        }
        if *staked_asset == self.policy.reward_asset_pubkey() {
            return Err(RewardError::InvalidAsset);
        }
        let staked_decimals = ledger.decimals(staked_asset).ok_or(RewardError::InvalidAsset)?;
        let reward_decimals = ledger
            .decimals(&self.policy.reward_asset_pubkey())
            .ok_or(RewardError::InvalidAsset)?;
        let precision = math::precision_scale(staked_decimals, reward_decimals)
            .ok_or(RewardError::InvalidPrecision)?;
        if let Some(id) = rewarder.as_ref() {
            self.check_rewarder(id, staked_asset)?;
        }
        let pool_id = u32::try_from(self.pools.len()).map_err(|_| RewardError::Overflow)?;
        let total_alloc_weight = self
            .policy
            .total_alloc_weight
            .checked_add(alloc_weight)
            .ok_or(RewardError::Overflow)?;

        let mut staged = transact(ledger, self.policy.authority_pubkey(), |journal| {
            let staged = self.stage_mass_update(journal, now)?;
            self.switch_rewarder(None, rewarder, 0, now)?;
            Ok(staged)
        })?;
        let mut pool = Pool::new(pool_id, staked_asset, alloc_weight, precision, now);
        pool.set_rewarder(rewarder.as_ref());
        staged.push(pool);

        self.pools = staged;
        self.policy.total_alloc_weight = total_alloc_weight;
        self.staked_assets.insert(*staked_asset, pool_id);
        msg!(
            "Pool {} added for {} with weight {} (total {})",
            pool_id,
            staked_asset,
            alloc_weight,
            total_alloc_weight
        );
        Ok(pool_id)
    }

    /// Change a pool's weight. The rewarder is replaced only when `overwrite_rewarder`.
    pub fn set_pool(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        alloc_weight: u64,
        rewarder: Option<Pubkey>,
        overwrite_rewarder: bool,
        now: u64,
    ) -> Result<(), RewardError> {
        let current = *self.pool(pool_id)?;
        if overwrite_rewarder {
            if let Some(id) = rewarder.as_ref() {
                self.check_rewarder(id, &current.staked_asset_pubkey())?;
            }
        }
        let total_alloc_weight = self
            .policy
            .total_alloc_weight
            .checked_sub(current.alloc_weight)
            .and_then(|w| w.checked_add(alloc_weight))
            .ok_or(RewardError::Overflow)?;

        let mut staged = transact(ledger, self.policy.authority_pubkey(), |journal| {
            let staged = self.stage_mass_update(journal, now)?;
            if overwrite_rewarder {
                self.switch_rewarder(current.rewarder_pubkey(), rewarder, current.total_staked, now)?;
            }
            Ok(staged)
        })?;
        let pool = &mut staged[pool_id as usize];
        pool.alloc_weight = alloc_weight;
        if overwrite_rewarder {
            pool.set_rewarder(rewarder.as_ref());
        }

        self.pools = staged;
        self.policy.total_alloc_weight = total_alloc_weight;
        msg!("Pool {} weight set to {} (total {})", pool_id, alloc_weight, total_alloc_weight);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Policy
    // ═══════════════════════════════════════════════════════════════

    /// Past intervals settle at the old rate before the new one applies.
    pub fn set_emission_rate(&mut self, ledger: &mut dyn AssetLedger, rate: u64, now: u64) -> Result<(), RewardError> {
        self.mass_update_pools(ledger, now)?;
        self.policy.rate_per_time_unit = rate;
        msg!("Emission rate set to {}", rate);
        Ok(())
    }

    pub fn set_splits(
        &mut self,
        ledger: &mut dyn AssetLedger,
        split_staker: u64,
        split_op_a: u64,
        split_op_b: u64,
        now: u64,
    ) -> Result<(), RewardError> {
        self.policy.check_splits(split_staker, split_op_a, split_op_b)?;
        self.mass_update_pools(ledger, now)?;
        self.policy.split_staker = split_staker;
        self.policy.split_op_a = split_op_a;
        self.policy.split_op_b = split_op_b;
        msg!("Splits set to {} / {} / {}", split_staker, split_op_a, split_op_b);
        Ok(())
    }

    /// Shares accrued so far go to the outgoing operators.
    pub fn set_operators(
        &mut self,
        ledger: &mut dyn AssetLedger,
        op_a: &Pubkey,
        op_b: &Pubkey,
        now: u64,
    ) -> Result<(), RewardError> {
        self.mass_update_pools(ledger, now)?;
        self.policy.op_a = op_a.to_bytes();
        self.policy.op_b = op_b.to_bytes();
        msg!("Operators set to {} / {}", op_a, op_b);
        Ok(())
    }

    pub fn set_rewarder_rate(
        &mut self,
        pool_id: u32,
        reward_token: &Pubkey,
        rate: u64,
        now: u64,
    ) -> Result<(), RewardError> {
        let pool = self.pool(pool_id)?;
        let id = pool.rewarder_pubkey().ok_or(RewardError::InvalidRewarder)?;
        let rewarder = self.rewarders.get(&id).ok_or(RewardError::InvalidRewarder)?;
        let mut guard = rewarder.lock().map_err(|_| RewardError::RewarderUnavailable)?;
        guard.set_reward_rate(reward_token, rate, pool.total_staked, now)
    }

    // ═══════════════════════════════════════════════════════════════
    // Positions
    // ═══════════════════════════════════════════════════════════════

    /// Stake `amount` from `funder` into `to`'s position, paying `to`'s
    /// pending reward first. An amount of zero only harvests.
    pub fn deposit(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        funder: &Pubkey,
        to: &Pubkey,
        amount: u64,
        now: u64,
    ) -> Result<u64, RewardError> {
        let pending = self.apply_change(
            ledger,
            &PositionChange {
                pool_id,
                owner: to,
                funder,
                recipient: to,
                deposit: amount,
                withdraw: 0,
                open_if_missing: true,
            },
            now,
        )?;
        msg!("Deposited {} into pool {} for {}, paid {} pending", amount, pool_id, to, pending);
        Ok(pending)
    }

    pub fn withdraw(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        user: &Pubkey,
        amount: u64,
        to: &Pubkey,
        now: u64,
    ) -> Result<u64, RewardError> {
        let pending = self.apply_change(ledger, &Self::exit(pool_id, user, to, amount), now)?;
        msg!("Withdrew {} from pool {} to {}, paid {} pending", amount, pool_id, to, pending);
        Ok(pending)
    }

    pub fn harvest(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        user: &Pubkey,
        to: &Pubkey,
        now: u64,
    ) -> Result<u64, RewardError> {
        let pending = self.apply_change(ledger, &Self::exit(pool_id, user, to, 0), now)?;
        msg!("Harvested {} from pool {} to {}", pending, pool_id, to);
        Ok(pending)
    }

    pub fn withdraw_and_harvest(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        user: &Pubkey,
        amount: u64,
        to: &Pubkey,
        now: u64,
    ) -> Result<u64, RewardError> {
        let pending = self.apply_change(ledger, &Self::exit(pool_id, user, to, amount), now)?;
        msg!("Withdrew {} and harvested {} from pool {} to {}", amount, pending, pool_id, to);
        Ok(pending)
    }

    /// Return the whole principal and forfeit pending reward. Only a refused
    /// principal transfer fails the exit; every other step is best-effort.
    /// Returns the principal returned.
    pub fn emergency_withdraw(
        &mut self,
        ledger: &mut dyn AssetLedger,
        pool_id: u32,
        user: &Pubkey,
        to: &Pubkey,
        now: u64,
    ) -> Result<u64, RewardError> {
        let mut pool = *self.pool(pool_id)?;
        let key = (pool_id, *user);
        let mut position = *self.positions.get(&key).ok_or(RewardError::PositionNotFound)?;
        let policy = self.policy;

        let total_before = pool.total_staked;
        // The exit never depends on accrual: on failure the pool keeps its
        // previous accumulator and clock. A time regression is a caller bug
        // and is still rejected.
        let mut accrued = pool;
        let accrual = match accrued.accrue(&policy, now) {
            Ok(accrual) => {
                pool = accrued;
                accrual
            }
            Err(RewardError::TimeRegression) => return Err(RewardError::TimeRegression),
            Err(e) => {
                msg!("Accrual failure {:?} skipped on emergency withdraw from pool {}", e, pool_id);
                Accrual::default()
            }
        };
        // Only feeds the forfeit counter, which must not block the exit
        let forfeited = position.pending(&pool).unwrap_or(0);
        let amount = position.staked_amount;

        // total_staked is the sum of every position, so it covers this one
        pool.total_staked = pool.total_staked.saturating_sub(amount);
        pool.total_forfeited = pool.total_forfeited.saturating_add(forfeited as u128);
        position.staked_amount = 0;
        position.set_debt(I256::ZERO);
        position.last_action_time = now;

        let staked_asset = pool.staked_asset_pubkey();
        let ctx = HookContext {
            engine: policy.authority_pubkey(),
            pool_id,
            staked_asset,
            user: *user,
            recipient: *to,
            primary_pending: 0,
            new_staked_amount: 0,
            pool_total_staked: total_before,
            now,
            emergency: true,
        };
        transact(ledger, policy.authority_pubkey(), |journal| {
            pay_operators_best_effort(journal, &policy, &accrual, pool_id);
            journal.transfer_out(&staked_asset, to, amount)?;
            if let Err(e) = self.notify_rewarder(&pool, &ctx, journal.ledger()) {
                msg!("Rewarder failure {:?} ignored on emergency withdraw from pool {}", e, pool_id);
            }
            Ok(())
        })?;

        self.pools[pool_id as usize] = pool;
        self.positions.insert(key, position);
        msg!(
            "Emergency withdrew {} from pool {} to {}, forfeited {}",
            amount,
            pool_id,
            to,
            forfeited
        );
        Ok(amount)
    }

    fn exit<'a>(pool_id: u32, user: &'a Pubkey, to: &'a Pubkey, amount: u64) -> PositionChange<'a> {
        PositionChange {
            pool_id,
            owner: user,
            funder: user,
            recipient: to,
            deposit: 0,
            withdraw: amount,
            open_if_missing: false,
        }
    }

    /// Shared body of deposit, withdraw and harvest. Returns the primary reward paid.
    fn apply_change(
        &mut self,
        ledger: &mut dyn AssetLedger,
        change: &PositionChange,
        now: u64,
    ) -> Result<u64, RewardError> {
        let mut pool = *self.pool(change.pool_id)?;
        let key = (change.pool_id, *change.owner);
        let mut position = match self.positions.get(&key) {
            Some(position) => *position,
            None if change.open_if_missing => Position::new(change.pool_id, change.owner),
            None => return Err(RewardError::PositionNotFound),
        };
        if change.withdraw > position.staked_amount {
            return Err(RewardError::InsufficientStake);
        }
        let policy = self.policy;

        let total_before = pool.total_staked;
        let accrual = pool.accrue(&policy, now)?;
        let pending = position.pending(&pool)?;

        position.staked_amount = position
            .staked_amount
            .checked_add(change.deposit)
            .and_then(|v| v.checked_sub(change.withdraw))
            .ok_or(RewardError::Overflow)?;
        pool.total_staked = pool
            .total_staked
            .checked_add(change.deposit)
            .and_then(|v| v.checked_sub(change.withdraw))
            .ok_or(RewardError::Overflow)?;
        position.rebase(&pool)?;
        position.total_harvested = position
            .total_harvested
            .checked_add(pending as u128)
            .ok_or(RewardError::Overflow)?;
        position.last_action_time = now;
        pool.total_harvested = pool
            .total_harvested
            .checked_add(pending as u128)
            .ok_or(RewardError::Overflow)?;

        let staked_asset = pool.staked_asset_pubkey();
        let ctx = HookContext {
            engine: policy.authority_pubkey(),
            pool_id: change.pool_id,
            staked_asset,
            user: *change.owner,
            recipient: *change.recipient,
            primary_pending: pending,
            new_staked_amount: position.staked_amount,
            pool_total_staked: total_before,
            now,
            emergency: false,
        };
        transact(ledger, policy.authority_pubkey(), |journal| {
            pay_operators(journal, &policy, &accrual)?;
            journal.transfer_in(&staked_asset, change.funder, change.deposit)?;
            journal.transfer_out(&policy.reward_asset_pubkey(), change.recipient, pending)?;
            journal.transfer_out(&staked_asset, change.recipient, change.withdraw)?;
            self.notify_rewarder(&pool, &ctx, journal.ledger())
        })?;

        self.pools[change.pool_id as usize] = pool;
        self.positions.insert(key, position);
        Ok(pending)
    }

    /// Forward a position change to the pool's rewarder, if any.
    fn notify_rewarder(
        &self,
        pool: &Pool,
        ctx: &HookContext,
        ledger: &mut dyn AssetLedger,
    ) -> Result<(), RewardError> {
        let Some(id) = pool.rewarder_pubkey() else {
            return Ok(());
        };
        self.lock_rewarder(&id)?.on_reward(ctx, ledger)
    }

    fn lock_rewarder(&self, id: &Pubkey) -> Result<MutexGuard<'_, dyn Rewarder + Send + 'static>, RewardError> {
        let rewarder = self.rewarders.get(id).ok_or(RewardError::InvalidRewarder)?;
        rewarder.lock().map_err(|_| RewardError::RewarderUnavailable)
    }

    /// Swap the rewarder a pool calls. The outgoing one settles its stakers
    /// up to `now` against `pool_total_staked`; the incoming one starts at `now`.
    fn switch_rewarder(
        &self,
        from: Option<Pubkey>,
        to: Option<Pubkey>,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<(), RewardError> {
        if from == to {
            return Ok(());
        }
        let engine = self.policy.authority_pubkey();
        if let Some(id) = to {
            self.lock_rewarder(&id)?.on_attach(&engine, now)?;
        }
        if let Some(id) = from {
            self.lock_rewarder(&id)?.on_detach(&engine, pool_total_staked, now)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Instruction dispatch
    // ═══════════════════════════════════════════════════════════════

    /// Decode and run one instruction on behalf of `signer`.
    pub fn process(
        &mut self,
        ledger: &mut dyn AssetLedger,
        signer: &Pubkey,
        now: u64,
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RewardInstruction::unpack(instruction_data)?;

        if instruction.is_privileged() && *signer != self.policy.admin_pubkey() {
            msg!("Error: {} is not the engine admin", signer);
            return Err(RewardError::Unauthorized.into());
        }

        match instruction {
            RewardInstruction::UpdatePool { pool_id } => {
                self.update_pool(ledger, pool_id, now)?;
            }
            RewardInstruction::MassUpdatePools => {
                self.mass_update_pools(ledger, now)?;
            }
            RewardInstruction::Deposit { pool_id, amount, to } => {
                self.deposit(ledger, pool_id, signer, &to, amount, now)?;
            }
            RewardInstruction::Withdraw { pool_id, amount, to } => {
                self.withdraw(ledger, pool_id, signer, amount, &to, now)?;
            }
            RewardInstruction::Harvest { pool_id, to } => {
                self.harvest(ledger, pool_id, signer, &to, now)?;
            }
            RewardInstruction::WithdrawAndHarvest { pool_id, amount, to } => {
                self.withdraw_and_harvest(ledger, pool_id, signer, amount, &to, now)?;
            }
            RewardInstruction::EmergencyWithdraw { pool_id, to } => {
                self.emergency_withdraw(ledger, pool_id, signer, &to, now)?;
            }
            RewardInstruction::AddPool { staked_asset, alloc_weight, rewarder } => {
                self.add_pool(ledger, &staked_asset, alloc_weight, rewarder, now)?;
            }
            RewardInstruction::SetPool { pool_id, alloc_weight, rewarder, overwrite_rewarder } => {
                self.set_pool(ledger, pool_id, alloc_weight, rewarder, overwrite_rewarder, now)?;
            }
            RewardInstruction::SetEmissionRate { rate } => {
                self.set_emission_rate(ledger, rate, now)?;
            }
            RewardInstruction::SetSplits { split_staker, split_op_a, split_op_b } => {
                self.set_splits(ledger, split_staker, split_op_a, split_op_b, now)?;
            }
            RewardInstruction::SetOperators { op_a, op_b } => {
                self.set_operators(ledger, &op_a, &op_b, now)?;
            }
            RewardInstruction::SetRewarderRate { pool_id, reward_token, rate } => {
                self.set_rewarder_rate(pool_id, &reward_token, rate, now)?;
            }
        }
        Ok(())
    }
}

/// Engine and ledger behind one lock, for callers on several threads.
pub struct SharedEngine<L: AssetLedger> {
    inner: Mutex<(RewardEngine, L)>,
}

impl<L: AssetLedger> SharedEngine<L> {
    pub fn new(engine: RewardEngine, ledger: L) -> Self {
        Self { inner: Mutex::new((engine, ledger)) }
    }

    pub fn process(&self, signer: &Pubkey, now: u64, instruction_data: &[u8]) -> ProgramResult {
        let mut guard = self.inner.lock().map_err(|_| RewardError::EngineUnavailable)?;
        let (engine, ledger) = &mut *guard;
        engine.process(ledger, signer, now, instruction_data)
    }

    /// Run `f` with exclusive access to the engine and its ledger.
    pub fn with<R>(&self, f: impl FnOnce(&mut RewardEngine, &mut L) -> R) -> Result<R, RewardError> {
        let mut guard = self.inner.lock().map_err(|_| RewardError::EngineUnavailable)?;
        let (engine, ledger) = &mut *guard;
        Ok(f(engine, ledger))
    }

    pub fn into_inner(self) -> Result<(RewardEngine, L), RewardError> {
        self.inner.into_inner().map_err(|_| RewardError::EngineUnavailable)
    }
}
