//! Player wallet model and the auto-suspension rule.
//!
//! A wallet's balance is only ever changed by the [`Ledger`](crate::ledger::Ledger),
//! which pairs every change with a transaction record.

use crate::error::{Result, SettlementError};
use crate::types::{PlayerId, Uc};
use serde::Serialize;

/// Balance at or below which an account is automatically suspended.
pub const DEFAULT_SUSPENSION_THRESHOLD: Uc = -30;

/// A player's UC wallet.
///
/// # Invariants
///
/// - `balance` equals the signed sum of the player's ledger transactions
/// - `suspended` and `manual_override` are never both `true`
///
/// # Negative Balance
///
/// Debits are not blocked by insufficient funds. A negative balance is a
/// valid state and is what drives auto-suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub player_id: PlayerId,

    /// Current balance. May be negative.
    pub balance: Uc,

    /// Account restricted because the balance crossed the suspension threshold.
    pub suspended: bool,

    /// An admin lifted the suspension by hand. Prevents re-suspension until
    /// the balance recovers above the threshold.
    pub manual_override: bool,
}

/// What the suspension rule decided after a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspensionChange {
    Suspended,
    Lifted,
}

impl Wallet {
    /// Creates a new wallet with a zero balance.
    pub fn new(player_id: PlayerId) -> Self {
        Wallet {
            player_id,
            balance: 0,
            suspended: false,
            manual_override: false,
        }
    }

    /// Returns `true` if the account is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Adds `amount` to the balance. Fails without changing the wallet if
    /// the balance would overflow.
    pub(crate) fn credit(&mut self, amount: Uc) -> Result<Uc> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(SettlementError::InvalidAmount {
                amount,
                reason: "balance would overflow",
            })?;
        Ok(self.balance)
    }

    pub(crate) fn debit(&mut self, amount: Uc) -> Result<Uc> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(SettlementError::InvalidAmount {
                amount,
                reason: "balance would underflow",
            })?;
        Ok(self.balance)
    }

    /// Evaluates the suspension rule against the current balance.
    ///
    /// - `balance <= threshold`, not suspended, no override: suspend.
    /// - `balance > threshold` with a suspension or an override: lift the
    ///   suspension and clear the override.
    pub fn apply_suspension_rule(&mut self, threshold: Uc) -> Option<SuspensionChange> {
        if self.balance <= threshold {
            if !self.suspended && !self.manual_override {
                self.suspended = true;
                return Some(SuspensionChange::Suspended);
            }
        } else if self.suspended || self.manual_override {
            let was_suspended = self.suspended;
            self.suspended = false;
            self.manual_override = false;
            if was_suspended {
                return Some(SuspensionChange::Lifted);
            }
        }
        None
    }

    /// Sets or clears the admin override. Setting it lifts any suspension.
    pub fn set_manual_override(&mut self, enabled: bool) -> Option<SuspensionChange> {
        self.manual_override = enabled;
        if enabled && self.suspended {
            self.suspended = false;
            return Some(SuspensionChange::Lifted);
        }
        None
    }
}
