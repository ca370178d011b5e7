//! Workflows for a named group of droplets: create, destroy, list and
//! inventory, built on a polling convergence tracker.

pub mod config;
pub mod fingerprint;
pub mod inventory;
pub mod poller;
pub mod progress;
pub mod workflow;

pub use config::{DropletTemplate, PollSettings, ShepardConfig};
pub use inventory::Inventory;
pub use poller::{Converged, ConvergencePoller, PollError};
pub use progress::{ProgressReport, TerminalProgress};
pub use workflow::{CreateOutcome, DestroyOutcome, Shepard, WorkflowError};
