//! Push channel module: typed events, room commands and the event bus.

mod bus;
mod events;
pub mod transport;

pub use bus::*;
pub use events::*;
