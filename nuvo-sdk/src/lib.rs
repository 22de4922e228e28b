//! SDK for NuVo multi-zone amplifiers
//!
//! Controls a Grand Concerto / Essentia G amplifier over its serial control
//! port (directly or through a serial-over-TCP bridge), keeps per-zone state
//! synchronized with keypad activity, and adds what the hardware does not
//! have: software-emulated speaker groups, party and paging overrides with
//! snapshot/restore, and a subscription surface for state changes and keypad
//! button events.
//!
//! # Architecture
//!
//! ```text
//! NuvoSystem
//! ├── Session        (nuvo-session)  serialized commands + push routing
//! ├── StateStore     (nuvo-state)    confirmed state, change broadcast
//! ├── GroupEngine                    controller → member mirroring
//! ├── OverrideController             party / page / snapshot-restore
//! └── Zone / Source handles          per-target command surface
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nuvo_sdk::{Model, NuvoSystem, Volume, ZoneId};
//!
//! let system = NuvoSystem::connect("/dev/ttyUSB0", Model::GrandConcerto).await?;
//!
//! let kitchen = ZoneId::new(3).unwrap();
//! system.zone(kitchen)?.set_power(true).await?;
//!
//! // React to keypad activity
//! let mut changes = system.changes();
//! while let Ok(change) = changes.recv().await {
//!     println!("{change:?}");
//! }
//! ```

pub mod error;
pub mod group;
pub mod logging;
pub mod party;
pub mod snapshot;
pub mod system;
pub mod zone;

pub use error::{Result, SdkError};
pub use group::{GroupEngine, GroupMembership, GroupRole};
pub use party::{OverrideController, OverrideMode, PageConfig};
pub use snapshot::{Snapshot, SnapshotStore};
pub use system::{ButtonEvent, NuvoSystem, SystemConfig};
pub use zone::{Source, Zone};

// Re-export the vocabulary types callers need
pub use nuvo_protocol::{
    Balance, Bass, Command, Frame, Gain, KeypadButton, Model, SourceId, Treble, Volume, ZoneId,
};
pub use nuvo_session::{Session, SessionConfig, SessionError, SessionEvent};
pub use nuvo_state::{SourceState, StateChange, StateStore, VolumeLimits, ZoneState};
pub use nuvo_transport::{Endpoint, Transport};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::error::{Result, SdkError};
    pub use crate::group::{GroupMembership, GroupRole};
    pub use crate::party::{OverrideMode, PageConfig};
    pub use crate::system::{ButtonEvent, NuvoSystem, SystemConfig};
    pub use nuvo_protocol::{Model, SourceId, Volume, ZoneId};
    pub use nuvo_state::{StateChange, ZoneState};
}
