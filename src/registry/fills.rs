//! Fill registration. Only the configured matching protocol gets here, and only from
//! inside its own fill.

use super::core::Registry;
use super::results::ProviderError;
use crate::events::{EventPayload, PositionFilledEvent};
use crate::interaction::{Interaction, InteractionError};
use crate::position::{PositionState, PositionView};
use crate::protocol::{FillReceiver, FilledOrder};
use crate::types::{Address, Bps, PositionId};
use tracing::{info, warn};

impl Registry {
    /// Open -> Filled. Records who the position was matched against and at what margin.
    pub fn register_fill(
        &mut self,
        caller: Address,
        id: PositionId,
        counterparty: Address,
        margin: Bps,
    ) -> Result<PositionView, ProviderError> {
        if caller != self.config.protocol {
            warn!(caller = %caller, position = %id, "fill from unknown caller");
            return Err(ProviderError::Unauthorized {
                caller,
                action: "register fill",
            });
        }

        let max = self.config.max_margin();
        let position = self.positions.get(&id).ok_or(ProviderError::NotFound(id))?;
        if position.state != PositionState::Open {
            return Err(ProviderError::InvalidState {
                id,
                state: position.state,
                action: "register fill",
            });
        }
        if margin > max {
            return Err(ProviderError::InvalidMargin {
                margin_bps: u64::from(margin.value()),
                max,
            });
        }
        if counterparty.is_zero() {
            return Err(ProviderError::InvalidInteractionPayload(
                InteractionError::ZeroCounterparty,
            ));
        }

        let now = self.current_time;
        let view = match self.positions.get_mut(&id) {
            Some(position) => {
                position.mark_filled(counterparty, margin, now);
                position.view()
            }
            None => return Err(ProviderError::NotFound(id)),
        };

        info!(position = %id, counterparty = %counterparty, margin = %margin, "position filled");
        self.emit_event(EventPayload::PositionFilled(PositionFilledEvent {
            position_id: id,
            counterparty,
            margin_bps: margin,
        }));
        Ok(view)
    }
}

impl FillReceiver for Registry {
    // payload is decoded only after the caller is known to be the protocol
    fn on_order_filled(&mut self, caller: Address, order: &FilledOrder) -> Result<PositionView, ProviderError> {
        if caller != self.config.protocol {
            warn!(caller = %caller, position = %order.position_id, "fill callback from unknown caller");
            return Err(ProviderError::Unauthorized {
                caller,
                action: "register fill",
            });
        }

        let interaction = Interaction::decode(&order.interaction)?;
        let margin = interaction.margin_bps(self.config.margin_tier_step(), self.config.max_margin())?;

        self.register_fill(caller, order.position_id, interaction.counterparty, margin)
    }
}
