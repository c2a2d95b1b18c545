//! Trust anchor validation for the RPKI validator
//!
//! A validation run fetches the trust anchor certificate, checks it against
//! the pinned key, walks the certificate tree below it and evicts cached
//! objects the run did not see. Runs are composed from independent layers:
//!
//! - [`TrustAnchorValidationProcess`]: the run itself
//! - [`TrackedProcess`]: one run per trust anchor at a time
//! - [`LoggedProcess`]: logging and metrics
//!
//! [`ValidationScheduler`] repeats every composed process on its own task.

pub mod bootstrap;
pub mod error;
pub mod logged;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod scheduler;
pub mod state;
pub mod tracked;
pub mod walker;

pub use bootstrap::extract_trust_anchor;
pub use error::{ProcessFailure, ProcessResult};
pub use logged::{LoggedProcess, LoggingHooks};
pub use model::{ValidatedObject, ValidationCheck, ValidationOptions, ValidationResult, ValidationStatus};
pub use pipeline::{compose, ProcessParts};
pub use process::{ProcessHooks, TrustAnchorValidationProcess, ValidationProcess};
pub use scheduler::ValidationScheduler;
pub use state::{RunOutcome, RunResult, StateChange, TrustAnchorState, TrustAnchorStates, TrustAnchorStatus};
pub use tracked::{StateHooks, TrackedProcess};
pub use walker::{TopDownWalker, TrustAnchorOnlyWalker, TrustContext, WalkRequest};
