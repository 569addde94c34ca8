//! Domain model (IDs, email payload, records, outcomes, events, errors).

pub mod email;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod record;

pub use email::{Email, Recipient, RecipientKind};
pub use errors::{DeliveryError, IdentityError, StoreError, ValidationError};
pub use events::WorkerEvent;
pub use ids::{EmailId, WorkerId};
pub use outcome::DeliveryOutcome;
pub use record::{EmailRecord, EmailStatus, Lease};
