// 9.3 protocol.rs: the boundary with the external limit order protocol.
// the protocol owns order construction, signatures and matching. the provider only sees
// the FillReceiver callback. MockProtocol stands in for the real thing in the simulator
// and tests: swap the assets, call back, and undo the swap if the callback fails.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::interaction::Interaction;
use crate::position::PositionView;
use crate::registry::{ProviderError, Registry};
use crate::types::{Address, Amount, PositionId};

/// What the provider learns about a fill. The maker amount of an order whose maker
/// asset is the position token is the position id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledOrder {
    pub position_id: PositionId,
    pub maker: Address,
    pub taker: Address,
    pub taker_asset: Address,
    pub taking_amount: Amount,
    pub interaction: Vec<u8>,
}

/// The narrow interface the matching protocol calls during its own settlement.
pub trait FillReceiver {
    fn on_order_filled(&mut self, caller: Address, order: &FilledOrder) -> Result<PositionView, ProviderError>;
}

// A resting order offering one position token for `taking_amount` of `taker_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub maker: Address,
    pub position_id: PositionId,
    pub taker_asset: Address,
    pub taking_amount: Amount,
    pub interaction: Vec<u8>,
}

impl RestingOrder {
    pub fn new(maker: Address, position_id: PositionId, taker_asset: Address, taking_amount: Amount) -> Self {
        Self {
            maker,
            position_id,
            taker_asset,
            taking_amount,
            interaction: Vec::new(),
        }
    }

    // bytes32 form, the way order builders ABI-encode it
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = interaction.encode_word().to_vec();
        self
    }

    pub fn with_raw_interaction(mut self, payload: Vec<u8>) -> Self {
        self.interaction = payload;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockProtocol {
    address: Address,
}

impl MockProtocol {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Fill `order` for `taker`: token to the taker, payment to the maker, then the
    /// provider callback. One transaction, so a rejected callback unwinds the swap.
    pub fn fill_order(
        &self,
        registry: &mut Registry,
        order: &RestingOrder,
        taker: Address,
    ) -> Result<PositionView, ProviderError> {
        let caller = self.address;
        registry.atomically(|registry| {
            registry.transfer_position(order.maker, taker, order.position_id)?;
            registry.transfer_asset(taker, order.taker_asset, order.maker, order.taking_amount)?;

            let filled = FilledOrder {
                position_id: order.position_id,
                maker: order.maker,
                taker,
                taker_asset: order.taker_asset,
                taking_amount: order.taking_amount,
                interaction: order.interaction.clone(),
            };
            let view = FillReceiver::on_order_filled(registry, caller, &filled)?;

            info!(
                position = %order.position_id,
                maker = %order.maker,
                taker = %taker,
                taking_amount = %order.taking_amount,
                "order filled"
            );
            Ok(view)
        })
    }
}
