//! The errors encountered in this crate.

use reqwest::StatusCode;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// The GitLab API responded with a non-successful status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request to {} failed with {}", url, status)]
pub struct FailedRequest {
    pub status: StatusCode,
    pub url: String,
}

/// The API base URL can't be used to build endpoint URLs.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "\"{}\" is not a valid API base URL", url)]
pub struct InvalidBaseUrl {
    pub url: String,
}

/// `livegrep-fetch-reindex` (or whatever we delegated to) didn't exit
/// successfully.
#[derive(Debug, Clone, PartialEq, Fail)]
pub struct ReindexFailed {
    pub program: PathBuf,
    /// The exit code, or `None` if the child was killed by a signal.
    pub code: Option<i32>,
}

impl Display for ReindexFailed {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} failed", self.program.display())?;

        match self.code {
            Some(code) => write!(f, " with return code {}", code),
            None => write!(f, " (terminated by a signal)"),
        }
    }
}
