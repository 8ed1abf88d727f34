//! Percolator Rewards: pro-rata staking reward accrual engine
//!
//! Users stake an asset into one of several pools and earn a primary reward
//! asset emitted at a global rate. Emissions are divided across pools by
//! allocation weight and split three ways (stakers / operator A / operator B).
//! A pool may carry a secondary rewarder that pays extra tokens off the same
//! staked-amount signal.
//!
//! Accrual is lazy: each pool keeps an accumulated-reward-per-share value that
//! is brought up to date whenever the pool is touched, and each position keeps
//! a reward-debt snapshot so pending reward is O(1) to compute.
//!
//! Architecture:
//! - `RewardEngine` owns the emission policy, pool registry and positions
//! - Balances live behind the `AssetLedger` trait; the engine only requests transfers
//! - Every operation stages its record changes and journals its transfers,
//!   so a refused transfer or rewarder failure leaves no trace
//! - Rewarders are shared `Arc<Mutex<dyn Rewarder>>` handles bound to one engine
//!
//! Instructions:
//!   0 - UpdatePool:          Accrue one pool
//!   1 - MassUpdatePools:     Accrue every pool
//!   2 - Deposit:             Stake into a position (pays pending first)
//!   3 - Withdraw:            Unstake (pays pending first)
//!   4 - Harvest:             Pay pending reward
//!   5 - WithdrawAndHarvest:  Unstake and pay pending in one rebase
//!   6 - EmergencyWithdraw:   Return principal, forfeit pending
//!   7 - AddPool:             Admin registers a staked asset
//!   8 - SetPool:             Admin edits weight and (optionally) rewarder
//!   9 - SetEmissionRate:     Admin changes the global rate
//!  10 - SetSplits:           Admin changes the three-way split
//!  11 - SetOperators:        Admin replaces the operator recipients
//!  12 - SetRewarderRate:     Admin changes a secondary token's rate

pub mod error;
pub mod instruction;
pub mod ledger;
pub mod math;
pub mod processor;
pub mod rewarder;
pub mod state;
