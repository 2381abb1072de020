use crate::config::GitLabConfig;
use crate::gitlab::Project;
use crate::ignorelist::IgnoreList;

/// Which projects should make it into the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPolicy {
    pub exclude_forks: bool,
    /// Enforced by the listing query rather than by `filter_projects()`, see
    /// `archived_filter()`.
    pub exclude_archived: bool,
    pub ignore: Option<IgnoreList>,
}

impl FilterPolicy {
    pub fn from_config(cfg: &GitLabConfig, ignore: Option<IgnoreList>) -> Self {
        FilterPolicy {
            exclude_forks: !cfg.forks,
            exclude_archived: !cfg.archived,
            ignore,
        }
    }

    /// The `archived` query parameter to send when listing projects.
    ///
    /// Asking GitLab for `archived=true` would return *only* archived
    /// projects, so when they're wanted we just don't filter at all.
    pub fn archived_filter(&self) -> Option<bool> {
        if self.exclude_archived {
            Some(false)
        } else {
            None
        }
    }
}

/// Drop forks and ignored projects, keeping everything else in its original
/// order.
pub fn filter_projects(
    projects: Vec<Project>,
    policy: &FilterPolicy,
) -> Vec<Project> {
    let mut out = Vec::with_capacity(projects.len());

    for project in projects {
        if policy.exclude_forks {
            if let Some(ref parent) = project.forked_from_project {
                info!(
                    "Excluding fork {}, was forked from {}",
                    project.path_with_namespace, parent.path_with_namespace
                );
                continue;
            }
        }

        if let Some(ref ignore) = policy.ignore {
            if ignore.contains(&project.path_with_namespace) {
                trace!("Ignoring {}", project.path_with_namespace);
                continue;
            }
        }

        out.push(project);
    }

    out
}

/// Sort projects by `path_with_namespace` so the generated config is the same
/// from run to run.
pub fn sort_by_path(projects: &mut [Project]) {
    projects.sort_by(|a, b| a.path_with_namespace.cmp(&b.path_with_namespace));
}
