//! Customer/vehicle record model shared by the record store and the HTTP surface.
//! - JSON keys are camelCase so persisted collections stay readable by older builds.
//! - Every field except `id`/`date` is optional; unknown keys are ignored.

pub mod errors;
pub mod photo;
pub mod record;

pub use photo::{PhotoSlot, Photos};
pub use record::{PartialRecord, Record, RecordFields, TextField};
