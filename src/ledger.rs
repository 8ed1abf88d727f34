//! Asset transfer capability.
//!
//! The engine never moves balances itself. It asks an `AssetLedger` to move
//! them on behalf of a custodian (the engine authority, or a rewarder's own
//! account) and checks the boolean result of every call.

use std::collections::{BTreeMap, BTreeSet};

use solana_program::{msg, pubkey::Pubkey};

use crate::error::RewardError;

pub trait AssetLedger {
    /// Move `amount` of `asset` from `from` into `custodian`.
    fn transfer_in(&mut self, asset: &Pubkey, custodian: &Pubkey, from: &Pubkey, amount: u64) -> bool;

    /// Move `amount` of `asset` out of `custodian` to `to`.
    fn transfer_out(&mut self, asset: &Pubkey, custodian: &Pubkey, to: &Pubkey, amount: u64) -> bool;

    fn balance_of(&self, asset: &Pubkey, holder: &Pubkey) -> u64;

    /// Decimals of a transferable asset, `None` if the ledger does not know it.
    fn decimals(&self, asset: &Pubkey) -> Option<u8>;
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy)]
struct Applied {
    direction: Direction,
    asset: Pubkey,
    counterparty: Pubkey,
    amount: u64,
}

/// Records the transfers of one operation so a later failure can undo them.
///
/// Dropping the journal keeps every transfer; `rollback` replays
/// compensating transfers in reverse order.
pub struct TransferJournal<'a> {
    ledger: &'a mut dyn AssetLedger,
    custodian: Pubkey,
    applied: Vec<Applied>,
}

impl<'a> TransferJournal<'a> {
    pub fn new(ledger: &'a mut dyn AssetLedger, custodian: Pubkey) -> Self {
        Self { ledger, custodian, applied: Vec::new() }
    }

    pub fn ledger(&mut self) -> &mut dyn AssetLedger {
        &mut *self.ledger
    }

    pub fn balance_of(&self, asset: &Pubkey, holder: &Pubkey) -> u64 {
        self.ledger.balance_of(asset, holder)
    }

    /// Zero amounts are skipped.
    pub fn transfer_in(&mut self, asset: &Pubkey, from: &Pubkey, amount: u64) -> Result<(), RewardError> {
        if amount == 0 {
            return Ok(());
        }
        if !self.ledger.transfer_in(asset, &self.custodian, from, amount) {
            msg!("Transfer in of {} {} from {} refused", amount, asset, from);
            return Err(RewardError::TransferFailed);
        }
        self.applied.push(Applied { direction: Direction::In, asset: *asset, counterparty: *from, amount });
        Ok(())
    }

    /// Zero amounts are skipped.
    pub fn transfer_out(&mut self, asset: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), RewardError> {
        if amount == 0 {
            return Ok(());
        }
        if !self.ledger.transfer_out(asset, &self.custodian, to, amount) {
            msg!("Transfer out of {} {} to {} refused", amount, asset, to);
            return Err(RewardError::TransferFailed);
        }
        self.applied.push(Applied { direction: Direction::Out, asset: *asset, counterparty: *to, amount });
        Ok(())
    }

    pub fn rollback(self) {
        for t in self.applied.iter().rev() {
            let undone = match t.direction {
                Direction::In => self.ledger.transfer_out(&t.asset, &self.custodian, &t.counterparty, t.amount),
                Direction::Out => self.ledger.transfer_in(&t.asset, &self.custodian, &t.counterparty, t.amount),
            };
            if !undone {
                msg!("Rollback of {} {} with {} refused", t.amount, t.asset, t.counterparty);
            }
        }
    }
}

/// Run `f` against a fresh journal; any error rolls back its transfers.
pub fn transact<T>(
    ledger: &mut dyn AssetLedger,
    custodian: Pubkey,
    f: impl FnOnce(&mut TransferJournal) -> Result<T, RewardError>,
) -> Result<T, RewardError> {
    let mut journal = TransferJournal::new(ledger, custodian);
    match f(&mut journal) {
        Ok(value) => Ok(value),
        Err(e) => {
            journal.rollback();
            Err(e)
        }
    }
}

/// Balance-map ledger with holder freezing for failure injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    assets: BTreeMap<Pubkey, u8>,
    balances: BTreeMap<(Pubkey, Pubkey), u64>,
    frozen: BTreeSet<Pubkey>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_asset(&mut self, asset: &Pubkey, decimals: u8) {
        self.assets.insert(*asset, decimals);
    }

    pub fn mint(&mut self, asset: &Pubkey, holder: &Pubkey, amount: u64) -> Result<(), RewardError> {
        if !self.assets.contains_key(asset) {
            return Err(RewardError::InvalidAsset);
        }
        let balance = self.balances.entry((*asset, *holder)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(RewardError::Overflow)?;
        Ok(())
    }

    /// Every transfer touching a frozen holder fails.
    pub fn freeze(&mut self, holder: &Pubkey) {
        self.frozen.insert(*holder);
    }

    pub fn thaw(&mut self, holder: &Pubkey) {
        self.frozen.remove(holder);
    }

    fn move_balance(&mut self, asset: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> bool {
        if !self.assets.contains_key(asset) || self.frozen.contains(from) || self.frozen.contains(to) {
            return false;
        }
        let from_balance = self.balance_of(asset, from);
        let Some(from_after) = from_balance.checked_sub(amount) else {
            return false;
        };
        if from == to {
            return true;
        }
        let Some(to_after) = self.balance_of(asset, to).checked_add(amount) else {
            return false;
        };
        self.balances.insert((*asset, *from), from_after);
        self.balances.insert((*asset, *to), to_after);
        true
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_in(&mut self, asset: &Pubkey, custodian: &Pubkey, from: &Pubkey, amount: u64) -> bool {
        self.move_balance(asset, from, custodian, amount)
    }

    fn transfer_out(&mut self, asset: &Pubkey, custodian: &Pubkey, to: &Pubkey, amount: u64) -> bool {
        self.move_balance(asset, custodian, to, amount)
    }

    fn balance_of(&self, asset: &Pubkey, holder: &Pubkey) -> u64 {
        self.balances.get(&(*asset, *holder)).copied().unwrap_or(0)
    }

    fn decimals(&self, asset: &Pubkey) -> Option<u8> {
        self.assets.get(asset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryLedger, Pubkey, Pubkey, Pubkey) {
        let mut ledger = InMemoryLedger::new();
        let asset = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        ledger.register_asset(&asset, 9);
        ledger.mint(&asset, &user, 1_000).unwrap();
        (ledger, asset, vault, user)
    }

    #[test]
    fn test_transfer_in_and_out() {
        let (mut ledger, asset, vault, user) = setup();
        assert!(ledger.transfer_in(&asset, &vault, &user, 400));
        assert_eq!(ledger.balance_of(&asset, &vault), 400);
        assert!(ledger.transfer_out(&asset, &vault, &user, 100));
        assert_eq!(ledger.balance_of(&asset, &user), 700);
    }

    #[test]
    fn test_insufficient_balance_refused() {
        let (mut ledger, asset, vault, user) = setup();
        assert!(!ledger.transfer_in(&asset, &vault, &user, 1_001));
        assert_eq!(ledger.balance_of(&asset, &user), 1_000);
    }

    #[test]
    fn test_frozen_holder_refused() {
        let (mut ledger, asset, vault, user) = setup();
        ledger.freeze(&user);
        assert!(!ledger.transfer_in(&asset, &vault, &user, 1));
        ledger.thaw(&user);
        assert!(ledger.transfer_in(&asset, &vault, &user, 1));
    }

    #[test]
    fn test_unknown_asset_refused() {
        let (mut ledger, _, vault, user) = setup();
        let other = Pubkey::new_unique();
        assert!(!ledger.transfer_in(&other, &vault, &user, 0));
        assert_eq!(ledger.decimals(&other), None);
        assert!(ledger.mint(&other, &user, 1).is_err());
    }

    #[test]
    fn test_journal_rollback_restores_balances() {
        let (mut ledger, asset, vault, user) = setup();
        let other = Pubkey::new_unique();
        ledger.mint(&asset, &vault, 50).unwrap();

        let mut journal = TransferJournal::new(&mut ledger, vault);
        journal.transfer_in(&asset, &user, 300).unwrap();
        journal.transfer_out(&asset, &other, 200).unwrap();
        assert_eq!(journal.transfer_out(&asset, &other, 10_000), Err(RewardError::TransferFailed));
        journal.rollback();

        assert_eq!(ledger.balance_of(&asset, &user), 1_000);
        assert_eq!(ledger.balance_of(&asset, &vault), 50);
        assert_eq!(ledger.balance_of(&asset, &other), 0);
    }

    #[test]
    fn test_transact_rolls_back_on_error() {
        let (mut ledger, asset, vault, user) = setup();
        let result: Result<(), RewardError> = transact(&mut ledger, vault, |journal| {
            journal.transfer_in(&asset, &user, 600)?;
            journal.transfer_in(&asset, &user, 600)?;
            Ok(())
        });
        assert_eq!(result, Err(RewardError::TransferFailed));
        assert_eq!(ledger.balance_of(&asset, &user), 1_000);
        assert_eq!(ledger.balance_of(&asset, &vault), 0);
    }

    #[test]
    fn test_journal_skips_zero_amounts() {
        let (mut ledger, asset, vault, user) = setup();
        ledger.freeze(&user);
        let mut journal = TransferJournal::new(&mut ledger, vault);
        // Would fail if issued
        assert!(journal.transfer_in(&asset, &user, 0).is_ok());
    }
}
