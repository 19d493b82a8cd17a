//! Position token ledger.
//!
//! Each token id is a position id. Only the registry mints and burns; holders move
//! tokens with `transfer`. Whoever holds the token controls the position.

use crate::types::{Address, PositionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("owner query for nonexistent token {0}")]
    NonexistentToken(PositionId),

    #[error("token {0} already minted")]
    AlreadyMinted(PositionId),

    #[error("mint to the zero address")]
    MintToZeroAddress,

    #[error("transfer to the zero address")]
    TransferToZeroAddress,

    #[error("{caller} is not the holder of token {id}")]
    NotHolder { id: PositionId, caller: Address },

    #[error("token {0} is locked while its position is filled")]
    Locked(PositionId),
}

/// Whether a filled (matched) position may change hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPolicy {
    #[default]
    Unrestricted,
    LockedWhileFilled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionToken {
    owners: HashMap<PositionId, Address>,
    balances: HashMap<Address, u64>,
    total_minted: u64,
    total_burned: u64,
}

impl PositionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, id: PositionId) -> Result<Address, TokenError> {
        self.owners
            .get(&id)
            .copied()
            .ok_or(TokenError::NonexistentToken(id))
    }

    pub fn exists(&self, id: PositionId) -> bool {
        self.owners.contains_key(&id)
    }

    pub fn balance_of(&self, owner: Address) -> u64 {
        self.balances.get(&owner).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.owners.len() as u64
    }

    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }

    pub fn total_burned(&self) -> u64 {
        self.total_burned
    }

    pub(crate) fn mint(&mut self, to: Address, id: PositionId) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::MintToZeroAddress);
        }
        if self.owners.contains_key(&id) {
            return Err(TokenError::AlreadyMinted(id));
        }
        self.owners.insert(id, to);
        *self.balances.entry(to).or_insert(0) += 1;
        self.total_minted += 1;
        Ok(())
    }

    pub(crate) fn burn(&mut self, id: PositionId) -> Result<Address, TokenError> {
        let owner = self
            .owners
            .remove(&id)
            .ok_or(TokenError::NonexistentToken(id))?;
        self.decrement(owner);
        self.total_burned += 1;
        Ok(owner)
    }

    // `locked` is decided by the registry from the position state and policy
    pub(crate) fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        id: PositionId,
        locked: bool,
    ) -> Result<Address, TokenError> {
        let from = self.owner_of(id)?;
        if from != caller {
            return Err(TokenError::NotHolder { id, caller });
        }
        if to.is_zero() {
            return Err(TokenError::TransferToZeroAddress);
        }
        if locked {
            return Err(TokenError::Locked(id));
        }
        self.decrement(from);
        self.owners.insert(id, to);
        *self.balances.entry(to).or_insert(0) += 1;
        Ok(from)
    }

    fn decrement(&mut self, owner: Address) {
        if let Some(count) = self.balances.get_mut(&owner) {
            *count -= 1;
            if *count == 0 {
                self.balances.remove(&owner);
            }
        }
    }
}
