//! Ledger transaction models and the CSV record format for ledger operations.

use crate::types::{PlayerId, Uc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    /// Adds `amount` to the balance.
    Credit,

    /// Subtracts `amount` from the balance.
    Debit,
}

/// An append-only ledger entry. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Monotonically increasing ledger sequence number
    pub id: u64,

    pub player_id: PlayerId,

    /// Positive magnitude; direction comes from `kind`
    pub amount: Uc,

    pub kind: TxKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed effect of this entry on the wallet balance.
    pub fn signed_amount(&self) -> Uc {
        match self.kind {
            TxKind::Credit => self.amount,
            TxKind::Debit => -self.amount,
        }
    }
}

/// Raw ledger operation as read from CSV.
#[derive(Debug, Deserialize)]
pub struct LedgerRecord {
    /// Operation type: credit or debit
    #[serde(rename = "type")]
    pub op_type: String,

    pub player: PlayerId,

    pub amount: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A parsed ledger operation ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOp {
    pub player_id: PlayerId,
    pub kind: TxKind,
    pub amount: Uc,
    pub description: String,
}

impl LedgerRecord {
    /// Parses the raw CSV record into a typed operation.
    ///
    /// Returns `None` for unknown types or a missing/unparseable amount.
    /// Amount sign is checked later by the ledger itself.
    pub fn parse(&self) -> Option<LedgerOp> {
        let kind = match self.op_type.trim().to_lowercase().as_str() {
            "credit" => TxKind::Credit,
            "debit" => TxKind::Debit,
            _ => return None,
        };
        let amount = self.amount.as_ref()?.trim().parse::<Uc>().ok()?;
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("manual adjustment")
            .to_string();

        Some(LedgerOp {
            player_id: self.player,
            kind,
            amount,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(op_type: &str, amount: Option<&str>, description: Option<&str>) -> LedgerRecord {
        LedgerRecord {
            op_type: op_type.to_string(),
            player: 1,
            amount: amount.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_credit() {
        let op = record("credit", Some("50"), Some("referral payout"))
            .parse()
            .unwrap();
        assert_eq!(op.kind, TxKind::Credit);
        assert_eq!(op.amount, 50);
        assert_eq!(op.description, "referral payout");
    }

    #[test]
    fn test_parse_handles_whitespace_and_case() {
        let op = record("  DEBIT ", Some(" 7 "), Some("   ")).parse().unwrap();
        assert_eq!(op.kind, TxKind::Debit);
        assert_eq!(op.amount, 7);
        assert_eq!(op.description, "manual adjustment");
    }

    #[test]
    fn test_parse_rejects_unknown_type_and_bad_amount() {
        assert!(record("deposit", Some("5"), None).parse().is_none());
        assert!(record("credit", None, None).parse().is_none());
        assert!(record("credit", Some("1.5"), None).parse().is_none());
    }

    #[test]
    fn test_signed_amount() {
        let tx = Transaction {
            id: 1,
            player_id: 1,
            amount: 12,
            kind: TxKind::Debit,
            description: "name change fee".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(tx.signed_amount(), -12);
    }
}
