//! The UC ledger: wallets, the append-only transaction log and auto-suspension.
//!
//! Every balance change goes through [`Ledger::credit`] or [`Ledger::debit`],
//! which update the wallet, append the matching [`Transaction`] and run the
//! suspension rule against the new balance, in that order, within one
//! `&mut self` call. Callers that share a ledger across threads wrap it in a
//! mutex so each call stays one atomic unit.

use crate::error::{Result, SettlementError};
use crate::transaction::{LedgerRecord, Transaction, TxKind};
use crate::types::{PlayerId, Uc};
use crate::wallet::{SuspensionChange, Wallet, DEFAULT_SUSPENSION_THRESHOLD};
use chrono::Utc;
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};

/// Notification emitted when the suspension rule changes an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuspensionEvent {
    pub player_id: PlayerId,
    pub balance: Uc,
    pub change: SuspensionChange,
}

/// Wallets plus the transaction log they are derived from.
pub struct Ledger {
    /// Wallets indexed by player ID. Created lazily, never removed.
    wallets: HashMap<PlayerId, Wallet>,

    /// Append-only log, in creation order.
    transactions: Vec<Transaction>,

    /// Pending suspension notifications, drained by the caller.
    notifications: Vec<SuspensionEvent>,

    suspension_threshold: Uc,
}

impl Ledger {
    /// Creates an empty ledger with the default suspension threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SUSPENSION_THRESHOLD)
    }

    /// Creates an empty ledger that suspends accounts at or below `threshold`.
    pub fn with_threshold(threshold: Uc) -> Self {
        Ledger {
            wallets: HashMap::new(),
            transactions: Vec::new(),
            notifications: Vec::new(),
            suspension_threshold: threshold,
        }
    }

    /// Creates a zero-balance wallet for the player if none exists.
    pub fn ensure_wallet(&mut self, player_id: PlayerId) -> &Wallet {
        self.wallets
            .entry(player_id)
            .or_insert_with(|| Wallet::new(player_id))
    }

    /// Credits `amount` to the player and returns the new balance.
    pub fn credit(&mut self, player_id: PlayerId, amount: Uc, description: &str) -> Result<Uc> {
        self.apply(player_id, TxKind::Credit, amount, description)
    }

    /// Debits `amount` from the player and returns the new balance.
    ///
    /// Insufficient funds do not block a debit; the balance may go negative.
    pub fn debit(&mut self, player_id: PlayerId, amount: Uc, description: &str) -> Result<Uc> {
        self.apply(player_id, TxKind::Debit, amount, description)
    }

    /// Moves `amount` from `payer` to `payee` as one unit.
    ///
    /// Unlike a plain debit, the payer's balance must cover the amount.
    /// Nothing is written if the check fails.
    pub fn transfer(
        &mut self,
        payer: PlayerId,
        payee: PlayerId,
        amount: Uc,
        description: &str,
    ) -> Result<()> {
        validate_amount(amount)?;
        let available = self.balance(payer);
        if available < amount {
            return Err(SettlementError::InsufficientFunds {
                player_id: payer,
                available,
                required: amount,
            });
        }
        if self.balance(payee).checked_add(amount).is_none() {
            return Err(SettlementError::InvalidAmount {
                amount,
                reason: "balance would overflow",
            });
        }

        self.debit(payer, amount, description)?;
        self.credit(payee, amount, description)?;
        Ok(())
    }

    fn apply(
        &mut self,
        player_id: PlayerId,
        kind: TxKind,
        amount: Uc,
        description: &str,
    ) -> Result<Uc> {
        validate_amount(amount)?;

        let wallet = self
            .wallets
            .entry(player_id)
            .or_insert_with(|| Wallet::new(player_id));
        let balance = match kind {
            TxKind::Credit => wallet.credit(amount)?,
            TxKind::Debit => wallet.debit(amount)?,
        };

        self.transactions.push(Transaction {
            id: self.transactions.len() as u64 + 1,
            player_id,
            amount,
            kind,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        debug!(
            "{:?} {} UC for player {} ({}), balance {}",
            kind, amount, player_id, description, balance
        );

        let threshold = self.suspension_threshold;
        let change = self
            .wallets
            .get_mut(&player_id)
            .and_then(|wallet| wallet.apply_suspension_rule(threshold));
        if let Some(change) = change {
            self.notify(player_id, balance, change);
        }
        Ok(balance)
    }

    /// Sets or clears the admin override on a player's account.
    pub fn set_manual_override(&mut self, player_id: PlayerId, enabled: bool) {
        let wallet = self
            .wallets
            .entry(player_id)
            .or_insert_with(|| Wallet::new(player_id));
        let balance = wallet.balance;
        if let Some(change) = wallet.set_manual_override(enabled) {
            self.notify(player_id, balance, change);
        }
    }

    fn notify(&mut self, player_id: PlayerId, balance: Uc, change: SuspensionChange) {
        match change {
            SuspensionChange::Suspended => warn!(
                "Player {} suspended: balance {} at or below {}",
                player_id, balance, self.suspension_threshold
            ),
            SuspensionChange::Lifted => {
                info!("Player {} suspension lifted at balance {}", player_id, balance)
            }
        }
        self.notifications.push(SuspensionEvent {
            player_id,
            balance,
            change,
        });
    }

    /// Returns the player's wallet, if one has been created.
    pub fn wallet(&self, player_id: PlayerId) -> Option<&Wallet> {
        self.wallets.get(&player_id)
    }

    /// Returns the player's balance, zero if no wallet exists yet.
    pub fn balance(&self, player_id: PlayerId) -> Uc {
        self.wallets.get(&player_id).map(|w| w.balance).unwrap_or(0)
    }

    /// Returns the full transaction log in creation order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Returns one player's transactions in creation order.
    pub fn history(&self, player_id: PlayerId) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.player_id == player_id)
            .collect()
    }

    /// Drains pending suspension notifications.
    pub fn take_notifications(&mut self) -> Vec<SuspensionEvent> {
        std::mem::take(&mut self.notifications)
    }

    /// Checks that every wallet balance equals the signed sum of its
    /// transactions.
    pub fn verify_conservation(&self) -> bool {
        // Transaction sums can leave the UC range even when balances do not
        let mut sums: HashMap<PlayerId, i128> = HashMap::new();
        for tx in &self.transactions {
            *sums.entry(tx.player_id).or_insert(0) += i128::from(tx.signed_amount());
        }
        self.wallets
            .values()
            .all(|w| sums.get(&w.player_id).copied().unwrap_or(0) == i128::from(w.balance))
    }

    /// Applies ledger operations from a CSV reader in streaming fashion.
    ///
    /// Invalid records are logged at warn level and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<LedgerRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse() {
                    Some(op) => {
                        if let Err(e) = self.apply(op.player_id, op.kind, op.amount, &op.description)
                        {
                            warn!("Row {}: {}", row_num, e);
                        }
                    }
                    None => warn!("Row {}: Failed to parse ledger record", row_num),
                },
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        Ok(())
    }

    /// Writes final wallet states to CSV, sorted by player ID.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["player", "balance", "suspended"])?;

        let mut wallets: Vec<_> = self.wallets.values().collect();
        wallets.sort_by_key(|w| w.player_id);

        for wallet in wallets {
            csv_writer.write_record([
                wallet.player_id.to_string(),
                wallet.balance.to_string(),
                wallet.suspended.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_amount(amount: Uc) -> Result<()> {
    if amount <= 0 {
        return Err(SettlementError::InvalidAmount {
            amount,
            reason: "ledger amounts must be positive",
        });
    }
    Ok(())
}
