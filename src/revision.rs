use std::path::Path;
use std::process::{Command, Stdio};

/// Checks whether a revision exists in a repository that's already on disk.
pub trait RevisionCheck {
    fn has_revision(&self, repo_dir: &Path, revision: &str) -> bool;
}

/// Asks `git rev-parse --verify` whether the revision resolves. Never touches
/// the network.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GitRevParse;

impl RevisionCheck for GitRevParse {
    fn has_revision(&self, repo_dir: &Path, revision: &str) -> bool {
        let status = Command::new("git")
            .arg("--git-dir")
            .arg(repo_dir)
            .arg("rev-parse")
            .arg("--verify")
            .arg("--quiet")
            .arg(revision)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("Unable to invoke git, {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    macro_rules! require_program {
        ($name:expr) => {{
            let exists = ::std::process::Command::new($name)
                .arg("--help")
                .stdout(::std::process::Stdio::null())
                .stderr(::std::process::Stdio::null())
                .status()
                .is_ok();
            if !exists {
                eprintln!("Couldn't find \"{}\"", $name);
                return;
            }
        }};
    }

    /// Pretends only the listed repositories have the revision.
    #[derive(Debug, Default)]
    pub(crate) struct KnownRevisions(pub HashSet<PathBuf>);

    impl RevisionCheck for KnownRevisions {
        fn has_revision(&self, repo_dir: &Path, _revision: &str) -> bool {
            self.0.contains(repo_dir)
        }
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn missing_clone_has_no_revisions() {
        require_program!("git");
        let temp = tempfile::tempdir().unwrap();

        let got = GitRevParse.has_revision(&temp.path().join("teamA/svc"), "HEAD");

        assert!(!got);
    }

    #[test]
    fn resolve_revisions_in_a_bare_clone() {
        require_program!("git");
        let temp = tempfile::tempdir().unwrap();
        let work = temp.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        git(&work, &["init", "--quiet"]);
        git(&work, &["commit", "--quiet", "--allow-empty", "-m", "initial"]);
        git(&work, &["tag", "v1.0"]);
        let bare = temp.path().join("teamA").join("svc");
        git(
            temp.path(),
            &[
                "clone",
                "--quiet",
                "--mirror",
                work.to_str().unwrap(),
                bare.to_str().unwrap(),
            ],
        );

        assert!(GitRevParse.has_revision(&bare, "HEAD"));
        assert!(GitRevParse.has_revision(&bare, "v1.0"));
        assert!(!GitRevParse.has_revision(&bare, "abc123"));
    }
}
