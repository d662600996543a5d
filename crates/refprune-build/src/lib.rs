//! Build-verified reference pruning
//!
//! Removes `Reference` and `ProjectReference` entries from a project file one
//! at a time, keeping each removal only if the project still builds:
//! - [`oracle`] runs the external builder and turns its log into a verdict
//! - [`engine`] drives the trial-removal loop and package synchronization
//! - [`events`] carries progress to an observer and cancellation back in
//!
//! # Example
//!
//! ```no_run
//! use refprune_build::{ProcessOracle, PruneEvent, PruneOptions, Pruner};
//!
//! let oracle = ProcessOracle::new("msbuild");
//! let options = PruneOptions::new("App/App.csproj").with_packages(true);
//! let mut pruner = Pruner::new(options, oracle);
//!
//! let mut log = |event: &PruneEvent| println!("{:?}", event);
//! let summary = pruner.run(&mut log)?;
//! println!("{} references removed", summary.removed.len());
//! # Ok::<(), refprune_build::PruneError>(())
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod oracle;

pub use engine::{PruneOptions, PruneSummary, Pruner, ResolvedReference, RunState};
pub use error::{PruneError, PruneResult};
pub use events::{CancelToken, Decision, NoopObserver, PruneEvent, PruneObserver};
pub use oracle::{BuildOracle, ProcessOracle, Verdict};
