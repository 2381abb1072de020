use failure::{Error, ResultExt};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::filter::{self, FilterPolicy};
use crate::gitlab::{self, GitLab, ProjectLister};
use crate::ignorelist::IgnoreList;
use crate::index_spec::{self, BuildOptions, IndexSpec};
use crate::reindex::{ProcessRunner, ReindexCommand, SystemRunner};
use crate::revision::{GitRevParse, RevisionCheck};

/// Runs the whole pipeline: find projects, filter them, write the index spec
/// and then hand it over to `livegrep-fetch-reindex`.
#[derive(Debug, Clone)]
pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run against the real GitLab API, using `argv0` to find
    /// `livegrep-fetch-reindex`.
    pub fn run(&self, argv0: &Path) -> Result<(), Error> {
        let gitlab = GitLab::with_config(&self.config.gitlab)
            .context("Unable to create the GitLab client")?;

        self.run_with(&gitlab, &GitRevParse, &SystemRunner, argv0)
    }

    pub fn run_with<L, C, R>(
        &self,
        lister: &L,
        checker: &C,
        runner: &R,
        argv0: &Path,
    ) -> Result<(), Error>
    where
        L: ProjectLister + ?Sized,
        C: RevisionCheck,
        R: ProcessRunner + ?Sized,
    {
        let spec_path = self.write_index_spec(lister, checker)?;
        debug!("Index spec written to {}", spec_path.display());

        let cmd = ReindexCommand::from_config(&self.config, argv0);
        cmd.run(runner)?;

        Ok(())
    }

    /// Build the index spec and save it to disk, returning where it was
    /// written.
    pub fn write_index_spec<L, C>(
        &self,
        lister: &L,
        checker: &C,
    ) -> Result<PathBuf, Error>
    where
        L: ProjectLister + ?Sized,
        C: RevisionCheck,
    {
        let spec = self.build_index_spec(lister, checker)?;
        let spec_path = self.config.spec_path();

        index_spec::write_index_spec(&spec, &spec_path)?;

        Ok(spec_path)
    }

    pub fn build_index_spec<L, C>(
        &self,
        lister: &L,
        checker: &C,
    ) -> Result<IndexSpec, Error>
    where
        L: ProjectLister + ?Sized,
        C: RevisionCheck,
    {
        let general = &self.config.general;
        let gl = &self.config.gitlab;

        let ignore = match gl.ignorelist {
            Some(ref path) => Some(IgnoreList::load(path).with_context(|_| {
                format!("loading {}", path.display())
            })?),
            None => None,
        };
        let policy = FilterPolicy::from_config(gl, ignore);

        let found = gitlab::discover(lister, &gl.groups, policy.archived_filter())?;

        let mut projects = filter::filter_projects(found, &policy);
        filter::sort_by_path(&mut projects);
        info!("Indexing {} repositories", projects.len());

        let opts = BuildOptions {
            name: &general.name,
            dir: &general.dir,
            revision: &general.revision,
            prefer_http: gl.http,
            password_env: self.config.password_env(),
            depth: gl.depth,
            http_user: &gl.http_user,
            url_pattern: &general.url_pattern,
        };
        let verifier: Option<&dyn RevisionCheck> = if general.skip_missing {
            Some(checker)
        } else {
            None
        };

        Ok(index_spec::build_index_spec(&opts, &projects, verifier))
    }
}
