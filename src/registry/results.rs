// 8.0.2: result types and errors for registry operations.

use crate::interaction::InteractionError;
use crate::position::PositionState;
use crate::settlement::{SettlementError, SettlementPlan};
use crate::token::TokenError;
use crate::types::{Address, Amount, Bps, PositionId};
use crate::vault::VaultError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseResult {
    pub position_id: PositionId,
    pub holder: Address,
    pub plan: SettlementPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Asset {0} is not supported")]
    InvalidAsset(Address),

    #[error("Invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("Insufficient vault balance for {asset}: available {available}, requested {requested}")]
    InsufficientVaultBalance {
        asset: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("Insufficient funds for {account} in {asset}: available {available}, requested {requested}")]
    InsufficientFunds {
        asset: Address,
        account: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("{caller} is not authorized to {action}")]
    Unauthorized { caller: Address, action: &'static str },

    #[error("Position {id} is {state}, cannot {action}")]
    InvalidState {
        id: PositionId,
        state: PositionState,
        action: &'static str,
    },

    #[error("Invalid interaction payload: {0}")]
    InvalidInteractionPayload(InteractionError),

    #[error("Margin {margin_bps} bps outside [0, {max}]")]
    InvalidMargin { margin_bps: u64, max: Bps },

    #[error("Position {0} not found")]
    NotFound(PositionId),

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Token error: {0}")]
    Token(TokenError),

    #[error("Vault error: {0}")]
    Vault(VaultError),
}

impl From<InteractionError> for ProviderError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::MarginOutOfRange { bps, max, .. } => ProviderError::InvalidMargin {
                margin_bps: bps,
                max,
            },
            other => ProviderError::InvalidInteractionPayload(other),
        }
    }
}

impl From<TokenError> for ProviderError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NonexistentToken(id) => ProviderError::NotFound(id),
            TokenError::NotHolder { caller, .. } => ProviderError::Unauthorized {
                caller,
                action: "transfer position token",
            },
            other => ProviderError::Token(other),
        }
    }
}

impl From<VaultError> for ProviderError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::InsufficientBalance {
                asset,
                available,
                requested,
            } => ProviderError::InsufficientVaultBalance {
                asset,
                available,
                requested,
            },
            VaultError::Overflow(_) => ProviderError::ArithmeticOverflow("vault"),
            other => ProviderError::Vault(other),
        }
    }
}

impl From<SettlementError> for ProviderError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::NotFilled { id, state } => ProviderError::InvalidState {
                id,
                state,
                action: "close",
            },
            SettlementError::MissingCounterparty(id) => ProviderError::InvalidState {
                id,
                state: PositionState::Filled,
                action: "close without counterparty",
            },
            SettlementError::MarginOutOfRange { margin, max } => ProviderError::InvalidMargin {
                margin_bps: u64::from(margin.value()),
                max,
            },
            SettlementError::Overflow(_) => ProviderError::ArithmeticOverflow("settlement"),
        }
    }
}
