//! Interaction payload carried by a resting order on the matching protocol.
//!
//! Wire format: 20 bytes counterparty address, then 1 byte margin code. Order builders
//! that ABI-encode the payload as `bytes32` send the same 21 bytes left-aligned in a
//! 32 byte word; that form is accepted too as long as the padding is all zero.

use crate::types::{Address, Bps, ADDRESS_LEN};
use serde::{Deserialize, Serialize};

pub const PAYLOAD_LEN: usize = ADDRESS_LEN + 1;
pub const WORD_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("interaction payload must be 21 or 32 bytes, got {0}")]
    BadLength(usize),

    #[error("non-zero padding in bytes32 interaction payload")]
    DirtyPadding,

    #[error("counterparty is the zero address")]
    ZeroCounterparty,

    #[error("margin code {code} maps to {bps} bps, above maximum {max}")]
    MarginOutOfRange { code: u8, bps: u64, max: Bps },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub counterparty: Address,
    pub margin_code: u8,
}

impl Interaction {
    pub fn new(counterparty: Address, margin_code: u8) -> Self {
        Self {
            counterparty,
            margin_code,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, InteractionError> {
        let body = match payload.len() {
            PAYLOAD_LEN => payload,
            WORD_LEN => {
                let (body, padding) = payload.split_at(PAYLOAD_LEN);
                if padding.iter().any(|b| *b != 0) {
                    return Err(InteractionError::DirtyPadding);
                }
                body
            }
            other => return Err(InteractionError::BadLength(other)),
        };

        let counterparty = Address::from_slice(&body[..ADDRESS_LEN])
            .ok_or(InteractionError::BadLength(payload.len()))?;
        if counterparty.is_zero() {
            return Err(InteractionError::ZeroCounterparty);
        }

        Ok(Self {
            counterparty,
            margin_code: body[ADDRESS_LEN],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.extend_from_slice(self.counterparty.as_bytes());
        out.push(self.margin_code);
        out
    }

    pub fn encode_word(&self) -> [u8; WORD_LEN] {
        let mut word = [0u8; WORD_LEN];
        word[..PAYLOAD_LEN].copy_from_slice(&self.encode());
        word
    }

    // code * step, bounded by max. codes are tiers, not raw bps.
    pub fn margin_bps(&self, step: Bps, max: Bps) -> Result<Bps, InteractionError> {
        let bps = u64::from(self.margin_code) * u64::from(step.value());
        if bps > u64::from(max.value()) {
            return Err(InteractionError::MarginOutOfRange {
                code: self.margin_code,
                bps,
                max,
            });
        }
        // bounded by max, which is a u32
        Ok(Bps::new(bps as u32))
    }
}
