//! The index config `livegrep-fetch-reindex` reads to know what to clone and
//! index.
//!
//! Field names follow the JSON mapping of livegrep's `config.proto`, and empty
//! fields are left out entirely.

use failure::{Error, ResultExt};
use serde_derive::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::gitlab::Project;
use crate::revision::RevisionCheck;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepoSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoSpec {
    pub path: PathBuf,
    pub name: String,
    pub revisions: Vec<String>,
    pub metadata: Metadata,
    pub clone_options: CloneOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url_pattern: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote: String,
    /// The project's web URL. livegrep calls this `github` regardless of
    /// where the project is hosted.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub github: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CloneOptions {
    #[serde(skip_serializing_if = "is_zero")]
    pub depth: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// The *name* of the environment variable holding the password, never
    /// the password itself.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password_env: String,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

/// Everything (besides the projects) that goes into an `IndexSpec`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions<'a> {
    pub name: &'a str,
    pub dir: &'a Path,
    pub revision: &'a str,
    /// Clone over HTTPS instead of SSH.
    pub prefer_http: bool,
    pub password_env: Option<&'a str>,
    pub depth: i32,
    pub http_user: &'a str,
    pub url_pattern: &'a str,
}

/// Turn a list of (already filtered and sorted) projects into an
/// `IndexSpec`.
///
/// When `verifier` is provided, projects whose local clone can't resolve
/// `revision` are skipped.
pub fn build_index_spec(
    opts: &BuildOptions,
    projects: &[Project],
    verifier: Option<&dyn RevisionCheck>,
) -> IndexSpec {
    let mut repositories = Vec::with_capacity(projects.len());

    for project in projects {
        let path = opts.dir.join(&project.path_with_namespace);

        if let Some(verifier) = verifier {
            if !verifier.has_revision(&path, opts.revision) {
                info!(
                    "Skipping missing revision repo={} rev={}",
                    project.path_with_namespace, opts.revision
                );
                continue;
            }
        }

        repositories.push(repo_spec(opts, project, path));
    }

    IndexSpec {
        name: opts.name.to_string(),
        repositories,
    }
}

fn repo_spec(opts: &BuildOptions, project: &Project, path: PathBuf) -> RepoSpec {
    let remote = if opts.prefer_http {
        &project.http_url_to_repo
    } else {
        &project.ssh_url_to_repo
    };

    RepoSpec {
        path,
        name: project.path_with_namespace.clone(),
        revisions: vec![opts.revision.to_string()],
        metadata: Metadata {
            url_pattern: opts.url_pattern.to_string(),
            remote: remote.clone(),
            github: project.web_url.clone(),
        },
        clone_options: CloneOptions {
            depth: opts.depth,
            username: opts.http_user.to_string(),
            password_env: opts.password_env.unwrap_or_default().to_string(),
        },
    }
}

impl IndexSpec {
    /// Pretty-printed JSON, indented with two spaces.
    pub fn to_json(&self) -> Result<String, Error> {
        let json = serde_json::to_string_pretty(self)
            .context("Unable to serialize the index spec")?;
        Ok(json)
    }
}

/// Write the index spec to disk, creating any missing parent directories.
pub fn write_index_spec<P: AsRef<Path>>(
    spec: &IndexSpec,
    path: P,
) -> Result<(), Error> {
    let path = path.as_ref();
    let json = spec.to_json()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|_| {
                format!("Couldn't create the directory ({})", parent.display())
            })?;
        }
    }

    fs::write(path, json).with_context(|_| {
        format!("Unable to write the index spec to {}", path.display())
    })?;

    debug!(
        "Wrote {} repositories to {}",
        spec.repositories.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::tests::{fork, project};
    use crate::revision::tests::KnownRevisions;

    fn options(dir: &Path) -> BuildOptions {
        BuildOptions {
            name: "livegrep index",
            dir,
            revision: "HEAD",
            prefer_http: false,
            password_env: None,
            depth: 0,
            http_user: "git",
            url_pattern: "https://gitlab.com/{name}/-/blob/{version}/{path}#L{lno}",
        }
    }

    fn sample() -> Vec<Project> {
        vec![project("teamA/legacy"), project("teamA/svc"), project("teamB/app")]
    }

    #[test]
    fn one_repo_spec_per_project() {
        let dir = Path::new("/repos");

        let spec = build_index_spec(&options(dir), &sample(), None);

        assert_eq!(spec.name, "livegrep index");
        assert_eq!(spec.repositories.len(), 3);
        let svc = &spec.repositories[1];
        assert_eq!(svc.path, Path::new("/repos/teamA/svc"));
        assert_eq!(svc.name, "teamA/svc");
        assert_eq!(svc.revisions, vec!["HEAD"]);
        assert_eq!(svc.metadata.github, "https://gitlab.example.com/teamA/svc");
        assert_eq!(svc.clone_options.username, "git");
        assert_eq!(svc.clone_options.password_env, "");
    }

    #[test]
    fn output_keeps_the_sorted_order() {
        let dir = Path::new("/repos");

        let spec = build_index_spec(&options(dir), &sample(), None);

        let names: Vec<_> = spec.repositories.iter().map(|r| &r.name).collect();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn remote_is_ssh_unless_http_is_preferred() {
        let dir = Path::new("/repos");
        let projects = vec![project("teamA/svc"), fork("teamB/app", "teamA/svc")];

        let ssh = build_index_spec(&options(dir), &projects, None);
        let http = build_index_spec(
            &BuildOptions {
                prefer_http: true,
                ..options(dir)
            },
            &projects,
            None,
        );

        for (repo, project) in ssh.repositories.iter().zip(&projects) {
            assert_eq!(repo.metadata.remote, project.ssh_url_to_repo);
        }
        for (repo, project) in http.repositories.iter().zip(&projects) {
            assert_eq!(repo.metadata.remote, project.http_url_to_repo);
        }
    }

    #[test]
    fn skip_projects_missing_the_revision() {
        let dir = Path::new("/repos");
        let mut known = KnownRevisions::default();
        known.0.insert(PathBuf::from("/repos/teamA/legacy"));
        known.0.insert(PathBuf::from("/repos/teamB/app"));

        let spec = build_index_spec(&options(dir), &sample(), Some(&known));

        let names: Vec<_> = spec.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["teamA/legacy", "teamB/app"]);
    }

    #[test]
    fn serialized_spec_uses_livegrep_field_names() {
        let dir = Path::new("/repos");
        let opts = BuildOptions {
            depth: 1,
            password_env: Some("GITLAB_TOKEN"),
            ..options(dir)
        };

        let spec = build_index_spec(&opts, &[project("teamA/svc")], None);
        let json = spec.to_json().unwrap();

        let should_be = r#"{
  "name": "livegrep index",
  "repositories": [
    {
      "path": "/repos/teamA/svc",
      "name": "teamA/svc",
      "revisions": [
        "HEAD"
      ],
      "metadata": {
        "url_pattern": "https://gitlab.com/{name}/-/blob/{version}/{path}#L{lno}",
        "remote": "git@gitlab.example.com:teamA/svc.git",
        "github": "https://gitlab.example.com/teamA/svc"
      },
      "clone_options": {
        "depth": 1,
        "username": "git",
        "password_env": "GITLAB_TOKEN"
      }
    }
  ]
}"#;
        assert_eq!(json, should_be);
    }

    #[test]
    fn zero_depth_and_missing_password_env_are_omitted() {
        let dir = Path::new("/repos");

        let spec = build_index_spec(&options(dir), &[project("teamA/svc")], None);
        let json = spec.to_json().unwrap();

        assert!(!json.contains("depth"));
        assert!(!json.contains("password_env"));
    }

    #[test]
    fn building_twice_gives_identical_output() {
        let dir = Path::new("/repos");
        let opts = options(dir);

        let first = build_index_spec(&opts, &sample(), None).to_json().unwrap();
        let second = build_index_spec(&opts, &sample(), None).to_json().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn password_env_is_written_by_name() {
        let temp = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            password_env: Some("GITLAB_TOKEN"),
            ..options(temp.path())
        };
        let spec = build_index_spec(&opts, &sample(), None);
        let dest = temp.path().join("livegrep.json");

        write_index_spec(&spec, &dest).unwrap();

        let written = fs::read_to_string(&dest).unwrap();
        assert!(written.contains("\"password_env\": \"GITLAB_TOKEN\""));
    }

    #[test]
    fn parent_directories_are_created() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("nested").join("dir").join("livegrep.json");
        let spec = build_index_spec(&options(temp.path()), &sample(), None);

        write_index_spec(&spec, &dest).unwrap();

        assert!(dest.is_file());
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let spec = build_index_spec(&options(temp.path()), &sample(), None);

        let err = write_index_spec(&spec, blocker.join("livegrep.json")).unwrap_err();

        assert!(err.to_string().contains("not-a-dir"));
    }
}
