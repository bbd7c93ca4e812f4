//! Trait definitions at the edges. Depend only on domain.
//!
//! - [`AccountSource`] - upstream snapshots, prices and discovery
//! - [`SignalStore`] - persistence for participants, history, positions and
//!   opportunities

mod source;
mod store;

pub use source::{AccountSource, DiscoveredParticipant};
pub use store::SignalStore;
