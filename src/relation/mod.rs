//! Relation store subsystem.
//!
//! # Data Flow
//! ```text
//! Local writes:
//!     driver → adapter.rs (set) → RelationStore (own bag) → visible to peer only
//!
//! Remote reads:
//!     hook notification → adapter.rs (get peer bag)
//!     → changed() against the last observed value
//!     → driver reacts only to new information
//!
//! State (state.rs):
//!     one ProtocolState per relation, owned by the driver
//! ```
//!
//! # Design Decisions
//! - Each unit writes only its own bag and reads only its peers' bags; no locking
//! - Writing to a torn-down relation fails with `RelationGone`, never silently
//! - Change tracking is scoped per relation and forgotten on departure
//! - `memory.rs` is a complete in-process store used by tests and the simulator;
//!   it emits one changed hook per write, to every other member

pub mod adapter;
pub mod hook;
pub mod memory;
pub mod state;
pub mod store;

pub use adapter::{change_key, ChangeTracker, RelationAdapter};
pub use hook::{Hook, HookKind};
pub use memory::{MemoryStore, UnitView};
pub use state::ProtocolState;
pub use store::{PeerEndpoint, RelationId, RelationStore, StoreError, UnitId};
