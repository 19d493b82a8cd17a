// ccmt-core: margin position provider.
// positions are opened against vault liquidity, matched through an external limit order
// protocol, and settled by whoever holds the position token.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, PositionId, Amount, Bps, Timestamp
//   4.x  position.rs: position record and state machine
//   4.5  token.rs: position token ownership ledger
//   7.x  config.rs: construction-time settings, network presets
//   7.5  logging.rs: tracing subscriber setup
//   8.x  registry/: open, fill, close, cancel, shared access
//   9.1  settlement.rs: payout split and the external asset ledger
//   9.2  vault.rs: custody balances and reservations
//   9.3  protocol.rs: fill callback boundary (mock protocol included)
//   9.4  interaction.rs: interaction payload codec
//   11.x events.rs: state transition events for audit

pub mod config;
pub mod events;
pub mod interaction;
pub mod logging;
pub mod position;
pub mod protocol;
pub mod registry;
pub mod settlement;
pub mod token;
pub mod types;
pub mod vault;

// re exports for convenience
pub use config::{ConfigError, Network, ProviderConfig, MAX_MARGIN_BPS};
pub use events::*;
pub use interaction::{Interaction, InteractionError};
pub use logging::LoggingConfig;
pub use position::*;
pub use protocol::{FillReceiver, FilledOrder, MockProtocol, RestingOrder};
pub use registry::{CloseResult, ProviderError, Registry, SharedRegistry};
pub use settlement::{plan_settlement, AssetLedger, Payout, PayoutRole, SettlementPlan};
pub use token::{PositionToken, TokenError, TransferPolicy};
pub use types::*;
pub use vault::{AssetBalance, Vault, VaultError};
