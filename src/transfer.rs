//! Player-to-player transfer requests.
//!
//! A requester asks another player (the approver) to send them UC. Funds
//! only move once the approver confirms.

use crate::error::{Result, SettlementError};
use crate::types::{PlayerId, TransferId, Uc};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub id: TransferId,

    /// Player who receives the UC.
    pub requester: PlayerId,

    /// Player who pays, once they approve.
    pub approver: PlayerId,

    pub amount: Uc,
    pub note: String,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

/// Open and settled transfer requests.
#[derive(Debug, Default)]
pub struct TransferBook {
    requests: HashMap<TransferId, TransferRequest>,
    next_id: TransferId,
}

impl TransferBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new pending request.
    pub fn request(
        &mut self,
        requester: PlayerId,
        approver: PlayerId,
        amount: Uc,
        note: &str,
    ) -> Result<TransferId> {
        if amount <= 0 {
            return Err(SettlementError::InvalidAmount {
                amount,
                reason: "transfer amounts must be positive",
            });
        }
        if requester == approver {
            return Err(SettlementError::SelfTransfer(requester));
        }

        self.next_id += 1;
        let id = self.next_id;
        self.requests.insert(
            id,
            TransferRequest {
                id,
                requester,
                approver,
                amount,
                note: note.to_string(),
                status: TransferStatus::Pending,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    /// Returns the request if `approver` may act on it now.
    ///
    /// A request addressed to someone else is reported as not found.
    pub fn pending_for(&self, id: TransferId, approver: PlayerId) -> Result<&TransferRequest> {
        let request = self
            .requests
            .get(&id)
            .filter(|r| r.approver == approver)
            .ok_or(SettlementError::TransferNotFound(id))?;
        if request.status != TransferStatus::Pending {
            return Err(SettlementError::TransferNotPending(id));
        }
        Ok(request)
    }

    /// Moves a pending request to its final status.
    pub fn settle(
        &mut self,
        id: TransferId,
        approver: PlayerId,
        status: TransferStatus,
    ) -> Result<TransferRequest> {
        self.pending_for(id, approver)?;
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(SettlementError::TransferNotFound(id))?;
        request.status = status;
        Ok(request.clone())
    }

    pub fn get(&self, id: TransferId) -> Option<&TransferRequest> {
        self.requests.get(&id)
    }
}
