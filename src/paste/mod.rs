//! Paste Domain
//!
//! - `record`: the stored record and key layout
//! - `policy`: pure expiry/visibility functions
//! - `validate`: create-request validation
//! - `service`: create and read over a store
//!
//! ## Read Path
//!
//! ```text
//! get(id) ──absent──────────────────────────────> not found
//!    │
//!    ├── expired at now? ───────────────────────> not found
//!    │
//!    ├── no max_views ──────────────────────────> visible (remaining: null)
//!    │
//!    └── counter >= max_views? ─────────────────> not found
//!           │
//!           └── INCR; new > max_views? ─────────> not found (increment kept)
//!                  │
//!                  └────────────────────────────> visible (remaining: max - new)
//! ```

pub mod policy;
pub mod record;
pub mod service;
pub mod validate;

pub use record::PasteRecord;
pub use service::{PasteService, PasteView};
pub use validate::{CreatePaste, MAX_CONTENT_BYTES};
