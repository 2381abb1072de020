use failure::{Error, ResultExt};
use sec::Secret;
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The environment variable a GitLab token is read from, and the variable
/// `livegrep-fetch-reindex` reads it back from when cloning.
pub const TOKEN_ENV: &str = "GITLAB_TOKEN";

const DEFAULT_API_BASE_URL: &str = "https://gitlab.example.com/api/v4";
const DEFAULT_URL_PATTERN: &str =
    "https://gitlab.com/{name}/-/blob/{version}/{path}#L{lno}";

/// Everything needed for a single reindex run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub general: General,
    pub gitlab: GitLabConfig,
    pub reindex: ReindexConfig,
}

impl Config {
    /// Load a `Config` from a TOML file. `~` and environment variables in the
    /// path are expanded first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        let expanded = shellexpand::full(&*path.to_string_lossy())
            .context("Unable to expand wildcards")?
            .into_owned();

        let contents = fs::read_to_string(&expanded).with_context(|_| {
            format!("Unable to read \"{}\"", expanded)
        })?;

        Config::parse(&contents)
    }

    pub fn parse(src: &str) -> Result<Config, Error> {
        let cfg = toml::from_str(src).context("Invalid config file")?;
        Ok(cfg)
    }

    /// An example config, used by `--example-config`.
    pub fn example() -> Config {
        let mut cfg = Config::default();
        cfg.general.dir = PathBuf::from("/srv/livegrep/repos");
        cfg.gitlab.api_base_url = String::from("https://gitlab.com/api/v4");
        cfg.gitlab.groups = vec![String::from("my-group")];
        cfg.reindex.codesearch = PathBuf::from("/usr/local/bin/codesearch");
        cfg
    }

    pub fn as_toml(&self) -> Result<String, Error> {
        let s = toml::to_string_pretty(self)
            .context("Unable to serialize the config as TOML")?;
        Ok(s)
    }

    /// Where the index itself gets written.
    pub fn index_path(&self) -> PathBuf {
        self.general
            .out
            .clone()
            .unwrap_or_else(|| self.general.dir.join("livegrep.idx"))
    }

    /// Where the generated index spec gets written.
    pub fn spec_path(&self) -> PathBuf {
        self.general
            .spec_path
            .clone()
            .unwrap_or_else(|| self.general.dir.join("livegrep.json"))
    }

    /// The name of the environment variable the clone step should read a
    /// password from, if we have a token at all.
    pub fn password_env(&self) -> Option<&'static str> {
        match self.gitlab.token {
            Some(ref tok) if !tok.reveal_str().is_empty() => Some(TOKEN_ENV),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct General {
    /// The directory repositories are cloned into.
    pub dir: PathBuf,
    /// The name stored in the index file.
    pub name: String,
    /// The git revision to index.
    pub revision: String,
    /// Used by the file viewer to link back to the source on GitLab.
    pub url_pattern: String,
    /// Where to write the index (defaults to `${dir}/livegrep.idx`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<PathBuf>,
    /// Where to write the index spec (defaults to `${dir}/livegrep.json`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<PathBuf>,
    /// Skip repositories where `revision` is missing.
    pub skip_missing: bool,
}

impl Default for General {
    fn default() -> General {
        General {
            dir: PathBuf::from("repos"),
            name: String::from("livegrep index"),
            revision: String::from("HEAD"),
            url_pattern: String::from(DEFAULT_URL_PATTERN),
            out: None,
            spec_path: None,
            skip_missing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitLabConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret<String>>,
    /// Only index projects in these groups. An empty list means every
    /// project the token can see.
    pub groups: Vec<String>,
    /// Index repositories that are forks.
    pub forks: bool,
    /// Index repositories that are archived.
    pub archived: bool,
    /// A file containing repositories to ignore, one per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignorelist: Option<PathBuf>,
    /// Clone over HTTPS instead of SSH.
    pub http: bool,
    /// The username to use when cloning over HTTPS.
    pub http_user: String,
    /// Shallow clone depth, `0` for the full history.
    pub depth: i32,
}

impl Default for GitLabConfig {
    fn default() -> GitLabConfig {
        GitLabConfig {
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            token: None,
            groups: Vec::new(),
            forks: true,
            archived: false,
            ignorelist: None,
            http: false,
            http_user: String::from("git"),
            depth: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReindexConfig {
    /// Path to `livegrep-fetch-reindex`, looked up next to this binary when
    /// not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_reindex: Option<PathBuf>,
    /// Path to the `codesearch` binary.
    pub codesearch: PathBuf,
    /// How many workers `livegrep-fetch-reindex` uses to update repositories.
    pub num_workers: usize,
    /// Whether to `git rev-parse` the revision in generated links.
    pub revparse: bool,
    /// Stop after fetching, without building an index.
    pub no_index: bool,
}

impl Default for ReindexConfig {
    fn default() -> ReindexConfig {
        ReindexConfig {
            fetch_reindex: None,
            codesearch: PathBuf::new(),
            num_workers: 8,
            revparse: true,
            no_index: false,
        }
    }
}
