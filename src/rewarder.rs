//! Secondary rewarder protocol.
//!
//! A rewarder is attached to at most one pool (it is bound to that pool's
//! staked asset) and runs its own accrual over the same staked-amount signal
//! as the primary engine. The engine calls `on_reward` after every position
//! change with the user's new staked amount and the pool's total staked
//! before the change.
//!
//! Reward computation and token custody are decoupled: a rewarder pays
//! `min(pending, balance)` and always rebases, so running out of funded
//! tokens never blocks the primary deposit/withdraw/harvest path.
//!
//! Detaching settles every mirrored stake into an owed balance and forgets
//! the stakes; attaching skips the clock forward. A re-attached rewarder
//! therefore never credits the detached interval and never pays on stakes
//! it last saw before the detach.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ethnum::I256;
use solana_program::{msg, pubkey::Pubkey};

use crate::error::RewardError;
use crate::ledger::{AssetLedger, TransferJournal};
use crate::math;
use crate::state::RewarderConfig;

/// Shared handle through which pools reference their rewarder.
pub type RewarderRef = Arc<Mutex<dyn Rewarder + Send>>;

/// Everything a rewarder learns about one position change.
#[derive(Debug, Clone, Copy)]
pub struct HookContext {
    /// Authority of the calling engine (capability check)
    pub engine: Pubkey,
    pub pool_id: u32,
    pub staked_asset: Pubkey,
    pub user: Pubkey,
    pub recipient: Pubkey,
    /// Primary reward paid by the engine in this operation
    pub primary_pending: u64,
    /// User's staked amount after the operation
    pub new_staked_amount: u64,
    /// Pool total staked before the operation's change
    pub pool_total_staked: u64,
    pub now: u64,
    /// Set by emergency withdraw; payouts become best-effort
    pub emergency: bool,
}

pub trait Rewarder {
    fn id(&self) -> Pubkey;

    /// Authority of the only engine allowed to call `on_reward`.
    fn engine(&self) -> Pubkey;

    /// Staked asset of the pool this rewarder serves.
    fn staked_asset(&self) -> Pubkey;

    fn on_reward(&mut self, ctx: &HookContext, ledger: &mut dyn AssetLedger) -> Result<(), RewardError>;

    /// Pending amount per reward token, without mutating anything.
    fn pending_tokens(
        &self,
        user: &Pubkey,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<Vec<(Pubkey, u64)>, RewardError>;

    /// Accrue up to `now` at the old rate, then switch rates.
    fn set_reward_rate(
        &mut self,
        reward_token: &Pubkey,
        rate: u64,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<(), RewardError>;

    /// The pool stops calling this rewarder. Accrue to `now`, then move every
    /// user's pending into an owed balance paid on their next hook.
    fn on_detach(&mut self, engine: &Pubkey, pool_total_staked: u64, now: u64) -> Result<(), RewardError>;

    /// The pool starts calling this rewarder. Nothing before `now` is credited.
    fn on_attach(&mut self, engine: &Pubkey, now: u64) -> Result<(), RewardError>;
}

/// One reward token's accumulator plus per-user debts.
#[derive(Debug, Clone)]
pub struct RewardStream {
    config: RewarderConfig,
    debts: BTreeMap<Pubkey, I256>,
    /// Pending settled at detach, not yet paid
    owed: BTreeMap<Pubkey, u64>,
}

impl RewardStream {
    /// Precision is derived here once from the token's decimals relative to
    /// the staked asset's and never changes afterwards.
    pub fn new(
        reward_token: &Pubkey,
        staked_decimals: u8,
        rate: u64,
        ledger: &dyn AssetLedger,
        now: u64,
    ) -> Result<Self, RewardError> {
        let reward_decimals = ledger.decimals(reward_token).ok_or(RewardError::InvalidAsset)?;
        let scale = math::precision_scale(staked_decimals, reward_decimals)
            .ok_or(RewardError::InvalidPrecision)?;
        Ok(Self {
            config: RewarderConfig::new(reward_token, reward_decimals, scale, rate, now),
            debts: BTreeMap::new(),
            owed: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &RewarderConfig {
        &self.config
    }

    pub fn reward_token(&self) -> Pubkey {
        self.config.reward_token_pubkey()
    }

    pub fn debt(&self, user: &Pubkey) -> I256 {
        self.debts.get(user).copied().unwrap_or(I256::ZERO)
    }

    pub fn owed(&self, user: &Pubkey) -> u64 {
        self.owed.get(user).copied().unwrap_or(0)
    }

    /// Accrued pending for `amount` shares plus anything owed from a detach.
    fn pending_with_owed(&self, config: &RewarderConfig, user: &Pubkey, amount: u64) -> Result<u64, RewardError> {
        math::pending_reward(amount, config.accumulator(), config.precision_scale, self.debt(user))
            .and_then(|pending| pending.checked_add(self.owed(user)))
            .ok_or(RewardError::Overflow)
    }

    /// Pending for `amount` shares as of `now`, simulating the accrual.
    pub fn pending_at(
        &self,
        user: &Pubkey,
        amount: u64,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<u64, RewardError> {
        let mut config = self.config;
        config.accrue(pool_total_staked, now)?;
        self.pending_with_owed(&config, user, amount)
    }

    pub fn set_rate(&mut self, rate: u64, pool_total_staked: u64, now: u64) -> Result<(), RewardError> {
        self.config.accrue(pool_total_staked, now)?;
        self.config.rate_per_time_unit = rate;
        Ok(())
    }

    /// Compute the settlement without applying it.
    fn stage(&self, ctx: &HookContext, old_amount: u64) -> Result<StagedSettlement, RewardError> {
        let mut config = self.config;
        config.accrue(ctx.pool_total_staked, ctx.now)?;
        let pending = self.pending_with_owed(&config, &ctx.user, old_amount)?;
        let new_debt = math::reward_debt(ctx.new_staked_amount, config.accumulator(), config.precision_scale)
            .ok_or(RewardError::Overflow)?;
        Ok(StagedSettlement { config, pending, new_debt })
    }

    fn apply(&mut self, user: &Pubkey, staged: StagedSettlement) {
        self.config = staged.config;
        self.debts.insert(*user, staged.new_debt);
        self.owed.remove(user);
    }

    /// Accrue to `now` and fold every mirrored stake's pending into `owed`.
    fn stage_detach(
        &self,
        stakes: &BTreeMap<Pubkey, u64>,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<(RewarderConfig, BTreeMap<Pubkey, u64>), RewardError> {
        let mut config = self.config;
        config.accrue(pool_total_staked, now)?;
        let mut owed = self.owed.clone();
        for (user, amount) in stakes {
            let pending = self.pending_with_owed(&config, user, *amount)?;
            if pending > 0 {
                owed.insert(*user, pending);
            }
        }
        Ok((config, owed))
    }
}

#[derive(Debug, Clone, Copy)]
struct StagedSettlement {
    config: RewarderConfig,
    pending: u64,
    new_debt: I256,
}

fn check_engine(caller: &Pubkey, engine: &Pubkey) -> Result<(), RewardError> {
    if caller != engine {
        return Err(RewardError::Unauthorized);
    }
    Ok(())
}

fn check_caller(ctx: &HookContext, engine: &Pubkey, staked_asset: &Pubkey) -> Result<(), RewardError> {
    check_engine(&ctx.engine, engine)?;
    if ctx.staked_asset != *staked_asset {
        return Err(RewardError::InvalidRewarder);
    }
    Ok(())
}

/// Pay `min(pending, balance)`; in the emergency path a refused transfer pays nothing.
fn pay_capped(
    journal: &mut TransferJournal,
    rewarder: &Pubkey,
    token: &Pubkey,
    to: &Pubkey,
    pending: u64,
    emergency: bool,
) -> Result<u64, RewardError> {
    let available = journal.balance_of(token, rewarder);
    let amount = pending.min(available);
    if amount < pending {
        msg!("Rewarder {} underfunded: paying {} of {} pending {}", rewarder, amount, pending, token);
    }
    match journal.transfer_out(token, to, amount) {
        Ok(()) => Ok(amount),
        Err(_) if emergency => {
            msg!("Rewarder {} skipped emergency payout of {} {}", rewarder, amount, token);
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Stage every stream, pay out, then apply. Nothing changes on error.
fn settle_streams(
    id: &Pubkey,
    streams: &mut [RewardStream],
    stakes: &mut BTreeMap<Pubkey, u64>,
    ctx: &HookContext,
    ledger: &mut dyn AssetLedger,
) -> Result<(), RewardError> {
    let old_amount = stakes.get(&ctx.user).copied().unwrap_or(0);
    let staged = streams
        .iter()
        .map(|s| s.stage(ctx, old_amount))
        .collect::<Result<Vec<_>, _>>()?;

    let mut journal = TransferJournal::new(ledger, *id);
    for (stream, settlement) in streams.iter().zip(staged.iter()) {
        if settlement.pending == 0 {
            continue;
        }
        let token = stream.reward_token();
        match pay_capped(&mut journal, id, &token, &ctx.recipient, settlement.pending, ctx.emergency) {
            Ok(paid) => msg!("Rewarder {} paid {} {} to {}", id, paid, token, ctx.recipient),
            Err(e) => {
                journal.rollback();
                return Err(e);
            }
        }
    }

    for (stream, settlement) in streams.iter_mut().zip(staged) {
        stream.apply(&ctx.user, settlement);
    }
    stakes.insert(ctx.user, ctx.new_staked_amount);
    Ok(())
}

/// Settle every stream on paper and forget the mirrored stakes. Nothing
/// changes on error.
fn detach_streams(
    id: &Pubkey,
    streams: &mut [RewardStream],
    stakes: &mut BTreeMap<Pubkey, u64>,
    pool_total_staked: u64,
    now: u64,
) -> Result<(), RewardError> {
    let staged = streams
        .iter()
        .map(|s| s.stage_detach(stakes, pool_total_staked, now))
        .collect::<Result<Vec<_>, _>>()?;
    for (stream, (config, owed)) in streams.iter_mut().zip(staged) {
        stream.config = config;
        stream.owed = owed;
        stream.debts.clear();
    }
    msg!("Rewarder {} detached at {}, {} stakes settled", id, now, stakes.len());
    stakes.clear();
    Ok(())
}

fn attach_streams(id: &Pubkey, streams: &mut [RewardStream], now: u64) {
    for stream in streams.iter_mut() {
        stream.config.skip_to(now);
    }
    msg!("Rewarder {} attached at {}", id, now);
}

/// Rewarder paying a single secondary token.
#[derive(Debug, Clone)]
pub struct SingleTokenRewarder {
    id: Pubkey,
    engine: Pubkey,
    staked_asset: Pubkey,
    stream: RewardStream,
    stakes: BTreeMap<Pubkey, u64>,
}

impl SingleTokenRewarder {
    pub fn new(
        id: Pubkey,
        engine: Pubkey,
        staked_asset: Pubkey,
        reward_token: &Pubkey,
        rate: u64,
        ledger: &dyn AssetLedger,
        now: u64,
    ) -> Result<Self, RewardError> {
        let staked_decimals = ledger.decimals(&staked_asset).ok_or(RewardError::InvalidAsset)?;
        let stream = RewardStream::new(reward_token, staked_decimals, rate, ledger, now)?;
        msg!("SingleTokenRewarder {} created for {} paying {}", id, staked_asset, reward_token);
        Ok(Self { id, engine, staked_asset, stream, stakes: BTreeMap::new() })
    }

    pub fn config(&self) -> &RewarderConfig {
        self.stream.config()
    }

    pub fn staked_amount(&self, user: &Pubkey) -> u64 {
        self.stakes.get(user).copied().unwrap_or(0)
    }
}

impl Rewarder for SingleTokenRewarder {
    fn id(&self) -> Pubkey {
        self.id
    }

    fn engine(&self) -> Pubkey {
        self.engine
    }

    fn staked_asset(&self) -> Pubkey {
        self.staked_asset
    }

    fn on_reward(&mut self, ctx: &HookContext, ledger: &mut dyn AssetLedger) -> Result<(), RewardError> {
        check_caller(ctx, &self.engine, &self.staked_asset)?;
        settle_streams(
            &self.id,
            std::slice::from_mut(&mut self.stream),
            &mut self.stakes,
            ctx,
            ledger,
        )
    }

    fn pending_tokens(
        &self,
        user: &Pubkey,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<Vec<(Pubkey, u64)>, RewardError> {
        let pending = self.stream.pending_at(user, self.staked_amount(user), pool_total_staked, now)?;
        Ok(vec![(self.stream.reward_token(), pending)])
    }

    fn set_reward_rate(
        &mut self,
        reward_token: &Pubkey,
        rate: u64,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<(), RewardError> {
        if self.stream.reward_token() != *reward_token {
            return Err(RewardError::UnknownRewardToken);
        }
        self.stream.set_rate(rate, pool_total_staked, now)?;
        msg!("Rewarder {} rate for {} set to {}", self.id, reward_token, rate);
        Ok(())
    }

    fn on_detach(&mut self, engine: &Pubkey, pool_total_staked: u64, now: u64) -> Result<(), RewardError> {
        check_engine(engine, &self.engine)?;
        detach_streams(
            &self.id,
            std::slice::from_mut(&mut self.stream),
            &mut self.stakes,
            pool_total_staked,
            now,
        )
    }

    fn on_attach(&mut self, engine: &Pubkey, now: u64) -> Result<(), RewardError> {
        check_engine(engine, &self.engine)?;
        attach_streams(&self.id, std::slice::from_mut(&mut self.stream), now);
        Ok(())
    }
}

/// Rewarder paying an ordered list of secondary tokens off one stake signal.
#[derive(Debug, Clone)]
pub struct MultiTokenRewarder {
    id: Pubkey,
    engine: Pubkey,
    staked_asset: Pubkey,
    staked_decimals: u8,
    streams: Vec<RewardStream>,
    stakes: BTreeMap<Pubkey, u64>,
}

impl MultiTokenRewarder {
    pub fn new(
        id: Pubkey,
        engine: Pubkey,
        staked_asset: Pubkey,
        ledger: &dyn AssetLedger,
    ) -> Result<Self, RewardError> {
        let staked_decimals = ledger.decimals(&staked_asset).ok_or(RewardError::InvalidAsset)?;
        msg!("MultiTokenRewarder {} created for {}", id, staked_asset);
        Ok(Self {
            id,
            engine,
            staked_asset,
            staked_decimals,
            streams: Vec::new(),
            stakes: BTreeMap::new(),
        })
    }

    /// Append a reward token. It starts accruing from `now` with a zero
    /// accumulator, so existing stakers earn it from this point on.
    pub fn add_reward_token(
        &mut self,
        reward_token: &Pubkey,
        rate: u64,
        ledger: &dyn AssetLedger,
        now: u64,
    ) -> Result<(), RewardError> {
        if self.streams.iter().any(|s| s.reward_token() == *reward_token) {
            return Err(RewardError::DuplicateRewardToken);
        }
        let stream = RewardStream::new(reward_token, self.staked_decimals, rate, ledger, now)?;
        self.streams.push(stream);
        msg!("Rewarder {} added reward token {} at rate {}", self.id, reward_token, rate);
        Ok(())
    }

    pub fn reward_tokens(&self) -> Vec<Pubkey> {
        self.streams.iter().map(|s| s.reward_token()).collect()
    }

    pub fn config(&self, reward_token: &Pubkey) -> Option<&RewarderConfig> {
        self.streams
            .iter()
            .find(|s| s.reward_token() == *reward_token)
            .map(|s| s.config())
    }

    pub fn staked_amount(&self, user: &Pubkey) -> u64 {
        self.stakes.get(user).copied().unwrap_or(0)
    }
}

impl Rewarder for MultiTokenRewarder {
    fn id(&self) -> Pubkey {
        self.id
    }

    fn engine(&self) -> Pubkey {
        self.engine
    }

    fn staked_asset(&self) -> Pubkey {
        self.staked_asset
    }

    fn on_reward(&mut self, ctx: &HookContext, ledger: &mut dyn AssetLedger) -> Result<(), RewardError> {
        check_caller(ctx, &self.engine, &self.staked_asset)?;
        settle_streams(&self.id, &mut self.streams, &mut self.stakes, ctx, ledger)
    }

    fn pending_tokens(
        &self,
        user: &Pubkey,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<Vec<(Pubkey, u64)>, RewardError> {
        let amount = self.staked_amount(user);
        self.streams
            .iter()
            .map(|s| -> Result<(Pubkey, u64), RewardError> {
                Ok((s.reward_token(), s.pending_at(user, amount, pool_total_staked, now)?))
            })
            .collect()
    }

    fn set_reward_rate(
        &mut self,
        reward_token: &Pubkey,
        rate: u64,
        pool_total_staked: u64,
        now: u64,
    ) -> Result<(), RewardError> {
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.reward_token() == *reward_token)
            .ok_or(RewardError::UnknownRewardToken)?;
        stream.set_rate(rate, pool_total_staked, now)?;
        msg!("Rewarder {} rate for {} set to {}", self.id, reward_token, rate);
        Ok(())
    }

    fn on_detach(&mut self, engine: &Pubkey, pool_total_staked: u64, now: u64) -> Result<(), RewardError> {
        check_engine(engine, &self.engine)?;
        detach_streams(&self.id, &mut self.streams, &mut self.stakes, pool_total_staked, now)
    }

    fn on_attach(&mut self, engine: &Pubkey, now: u64) -> Result<(), RewardError> {
        check_engine(engine, &self.engine)?;
        attach_streams(&self.id, &mut self.streams, now);
        Ok(())
    }
}
