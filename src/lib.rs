//! Generate a [livegrep] index config for the projects on a GitLab instance
//! and hand it over to `livegrep-fetch-reindex` for cloning and indexing.
//!
//! [livegrep]: https://github.com/livegrep/livegrep

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

pub mod config;
pub mod errors;
pub mod filter;
pub mod gitlab;
pub mod ignorelist;
pub mod index_spec;
pub mod reindex;
pub mod revision;
mod driver;

pub use crate::config::Config;
pub use crate::driver::Driver;
pub use crate::errors::{FailedRequest, InvalidBaseUrl, ReindexFailed};
pub use crate::gitlab::{GitLab, Project, ProjectLister};
pub use crate::index_spec::{IndexSpec, RepoSpec};
