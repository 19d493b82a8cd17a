// 8.0: position registry. owns positions, position tokens and the vault.
// open -> fill (protocol callback) -> close (holder), each one indivisible.
// deterministic with no external I/O.

mod close;
mod core;
mod fills;
mod lifecycle;
mod results;
mod shared;

pub use self::core::Registry;
pub use results::{CloseResult, ProviderError};
pub use shared::SharedRegistry;
