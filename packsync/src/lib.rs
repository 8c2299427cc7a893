//! PackSync - planning core of a self-updating content synchronizer
//!
//! Given a remote manifest describing a desired set of files (declared
//! directly or through small descriptor documents) and a persisted record of
//! what was last installed, this library computes the minimal set of
//! additions, updates and deletions needed to converge local state to remote
//! state - without re-downloading anything whose verified identity has not
//! changed, and without silently overwriting prior feature choices.
//!
//! The library plans; it does not apply. Downloading to disk, prompting the
//! user and persisting state are collaborator seams ([`Transport`],
//! [`FlavorSelector`], [`Callbacks`], [`PlanExecutor`]) so embedders keep
//! full control of I/O and lifecycle.

pub mod check;
pub mod error;
pub mod flavor;
pub mod hash;
pub mod manifest;
pub mod metafile;
pub mod plan;
pub mod state;
pub mod transport;
pub mod version;

pub use check::{Callbacks, CheckConfig, SilentCallbacks, UpdateChecker};
pub use error::{Result, UpdateError};
pub use flavor::{FlavorChoice, FlavorGroup, FlavorSelector};
pub use hash::HashFunction;
pub use metafile::Side;
pub use plan::{
    CheckOutcome, DownloadSource, FilePlan, FileState, PlanExecutor, UpdatePlan, VerifyingReader,
};
pub use state::PersistedState;
pub use transport::{HttpTransport, Transport};
pub use version::Version;
