//! # pommerge
//!
//! A git merge driver for Maven `pom.xml` and similar descriptor files.
//!
//! Release branches routinely bump the project version while feature branches
//! carry their own. A plain line merge then conflicts on the version line of
//! every merge. This library reconciles those values around `git merge-file`:
//!
//! - Version lookup in descriptor documents by element path
//! - Encoding-preserving reads and writes driven by the XML declaration
//! - Normalization of the local version before merging, and restoration of
//!   it afterwards on any branch other than the trunk branch
//! - Layered configuration (file, environment, command line)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pommerge::{DriverSettings, GitCli, MergeDriver, RevisionFiles, VersionTag};
//!
//! # fn main() -> pommerge::Result<()> {
//! let files = RevisionFiles::new("pom.base.xml", "pom.xml", "pom.theirs.xml");
//! let tags: Vec<VersionTag> = vec!["project/version".parse().map_err(anyhow::Error::msg)?];
//!
//! let driver = MergeDriver::new(GitCli::new(), GitCli::new(), DriverSettings::default());
//! let report = driver.run(&files, &tags)?;
//! println!("Conflicts left: {}", report.has_conflicts());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod git;
pub mod logging;
pub mod models;
pub mod parsed_property;
pub mod rewrite;

// Re-export commonly used types for convenience
pub use config::Config;
pub use driver::{DriverSettings, MergeDriver, MergeReport, TagReport};
pub use error::{PomMergeError, PomMergeResult};
pub use git::{BranchSource, GitCli, LineMerger, MergeLabels};
pub use models::{Args, RevisionFiles, VersionTag};

/// Core result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
