#[macro_use]
extern crate log;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use livegrep_gitlab_reindex::{Config, Driver, ReindexFailed};
use log::LevelFilter;
use sec::Secret;
use structopt::StructOpt;

fn main() {
    let args = Args::from_args();

    if args.example_config {
        if let Err(e) = generate_example() {
            report(&e);
            process::exit(1);
        }
        return;
    }

    if let Err(e) = run(&args) {
        report(&e);
        process::exit(1);
    }
}

fn generate_example() -> Result<(), Error> {
    let example = Config::example();
    println!("{}", example.as_toml()?);
    Ok(())
}

fn report(e: &Error) {
    if let Some(failed) = e.downcast_ref::<ReindexFailed>() {
        // its output has already been streamed through to ours
        eprintln!("Error: {}", failed);
        return;
    }

    eprintln!("Error: {}", e);

    for cause in e.iter_chain().skip(1) {
        eprintln!("\tCaused By: {}", cause);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;
    let cfg = args.config()?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    let argv0 = env::args_os()
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_PKG_NAME")));

    let driver = Driver::with_config(cfg);
    driver.run(&argv0)?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(
    name = "livegrep-gitlab-reindex",
    about = "Index the projects on a GitLab instance with livegrep."
)]
struct Args {
    #[structopt(short = "c", long = "config", help = "A TOML config file to start from.")]
    config_file: Option<String>,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output, -v for debug and -vv for trace (info is always shown)"
    )]
    verbosity: u64,
    #[structopt(long = "example-config", help = "Generate an example config and immediately exit.")]
    example_config: bool,

    #[structopt(long = "codesearch", parse(from_os_str), help = "Path to the `codesearch` binary")]
    codesearch: Option<PathBuf>,
    #[structopt(
        long = "fetch-reindex",
        parse(from_os_str),
        help = "Path to the `livegrep-fetch-reindex` binary"
    )]
    fetch_reindex: Option<PathBuf>,
    #[structopt(long = "api-base-url", help = "Gitlab API base url")]
    api_base_url: Option<String>,
    #[structopt(
        long = "gitlab-token",
        env = "GITLAB_TOKEN",
        hide_env_values = true,
        help = "Gitlab access token"
    )]
    gitlab_token: Option<String>,
    #[structopt(long = "dir", parse(from_os_str), help = "Directory to store repos")]
    dir: Option<PathBuf>,
    #[structopt(
        long = "ignorelist",
        parse(from_os_str),
        help = "File containing a list of repositories to ignore when indexing"
    )]
    ignorelist: Option<PathBuf>,
    #[structopt(
        long = "out",
        parse(from_os_str),
        help = "Path to write the index [default: ${dir}/livegrep.idx]"
    )]
    out: Option<PathBuf>,
    #[structopt(long = "revision", help = "git revision to index")]
    revision: Option<String>,
    #[structopt(
        long = "url-pattern",
        help = "Used by the local file viewer to link back to the source on GitLab"
    )]
    url_pattern: Option<String>,
    #[structopt(long = "name", help = "The name to be stored in the index file")]
    name: Option<String>,
    #[structopt(
        long = "num-repo-update-workers",
        help = "Number of workers fetch-reindex will use to update repositories"
    )]
    num_repo_update_workers: Option<usize>,
    #[structopt(
        long = "revparse",
        help = "Whether to `git rev-parse` the provided revision in generated links"
    )]
    revparse: Option<Option<bool>>,
    #[structopt(
        long = "forks",
        help = "Whether to index repositories that are forks, and not original repos"
    )]
    forks: Option<Option<bool>>,
    #[structopt(long = "archived", help = "Whether to index repositories that are archived")]
    archived: Option<Option<bool>>,
    #[structopt(long = "http", help = "Clone repositories over HTTPS instead of SSH")]
    http: Option<Option<bool>>,
    #[structopt(long = "http-user", help = "Override the username to use when cloning over https")]
    http_user: Option<String>,
    #[structopt(long = "depth", help = "Clone repositories with --depth=N (0 for everything)")]
    depth: Option<i32>,
    #[structopt(
        long = "skip-missing",
        help = "Skip repositories where the specified revision is missing"
    )]
    skip_missing: Option<Option<bool>>,
    #[structopt(long = "no-index", help = "Skip indexing after writing config and fetching")]
    no_index: Option<Option<bool>>,
    #[structopt(
        long = "group",
        number_of_values = 1,
        help = "A gitlab group to index (may be passed multiple times)"
    )]
    groups: Vec<String>,
}

impl Args {
    /// Start from the config file (if any), then apply whatever was passed on
    /// the command line.
    pub fn config(&self) -> Result<Config, Error> {
        let mut cfg = match self.config_file {
            Some(ref path) => {
                Config::from_file(path).context("Couldn't load the config")?
            }
            None => Config::default(),
        };

        if let Some(ref codesearch) = self.codesearch {
            cfg.reindex.codesearch = codesearch.clone();
        }
        if let Some(ref fetch_reindex) = self.fetch_reindex {
            cfg.reindex.fetch_reindex = Some(fetch_reindex.clone());
        }
        if let Some(ref url) = self.api_base_url {
            cfg.gitlab.api_base_url = url.clone();
        }
        if let Some(ref token) = self.gitlab_token {
            cfg.gitlab.token = Some(Secret::new(token.clone()));
        }
        if let Some(ref dir) = self.dir {
            cfg.general.dir = dir.clone();
        }
        if let Some(ref ignorelist) = self.ignorelist {
            cfg.gitlab.ignorelist = Some(ignorelist.clone());
        }
        if let Some(ref out) = self.out {
            cfg.general.out = Some(out.clone());
        }
        if let Some(ref revision) = self.revision {
            cfg.general.revision = revision.clone();
        }
        if let Some(ref pattern) = self.url_pattern {
            cfg.general.url_pattern = pattern.clone();
        }
        if let Some(ref name) = self.name {
            cfg.general.name = name.clone();
        }
        if let Some(workers) = self.num_repo_update_workers {
            cfg.reindex.num_workers = workers;
        }
        if let Some(revparse) = switch(self.revparse) {
            cfg.reindex.revparse = revparse;
        }
        if let Some(forks) = switch(self.forks) {
            cfg.gitlab.forks = forks;
        }
        if let Some(archived) = switch(self.archived) {
            cfg.gitlab.archived = archived;
        }
        if let Some(http) = switch(self.http) {
            cfg.gitlab.http = http;
        }
        if let Some(ref user) = self.http_user {
            cfg.gitlab.http_user = user.clone();
        }
        if let Some(depth) = self.depth {
            cfg.gitlab.depth = depth;
        }
        if let Some(skip_missing) = switch(self.skip_missing) {
            cfg.general.skip_missing = skip_missing;
        }
        if let Some(no_index) = switch(self.no_index) {
            cfg.reindex.no_index = no_index;
        }
        if !self.groups.is_empty() {
            cfg.gitlab.groups = self.groups.clone();
        }

        Ok(cfg)
    }
}

/// On/off flags can be passed bare (`--http`) or with a value
/// (`--http=false`, `--http false`).
fn switch(flag: Option<Option<bool>>) -> Option<bool> {
    flag.map(|value| value.unwrap_or(true))
}

fn log_level(verbosity: u64) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    builder.filter(Some("livegrep_gitlab_reindex"), log_level(args.verbosity));

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["livegrep-gitlab-reindex"];
        argv.extend(args);
        Args::from_iter_safe(argv).unwrap()
    }

    #[test]
    fn flags_override_the_defaults() {
        let args = parse(&[
            "--dir",
            "/repos",
            "--group",
            "teamA",
            "--group",
            "teamB",
            "--forks",
            "false",
            "--skip-missing",
            "true",
            "--num-repo-update-workers",
            "4",
        ]);

        let cfg = args.config().unwrap();

        assert_eq!(cfg.general.dir, PathBuf::from("/repos"));
        assert_eq!(cfg.gitlab.groups, vec!["teamA", "teamB"]);
        assert!(!cfg.gitlab.forks);
        assert!(cfg.general.skip_missing);
        assert_eq!(cfg.reindex.num_workers, 4);
        assert!(cfg.reindex.revparse);
        assert_eq!(cfg.general.revision, "HEAD");
    }

    #[test]
    fn bare_switches_mean_true() {
        let args = parse(&["--skip-missing", "--http", "--no-index", "--dir", "/repos"]);

        let cfg = args.config().unwrap();

        assert!(cfg.general.skip_missing);
        assert!(cfg.gitlab.http);
        assert!(cfg.reindex.no_index);
        assert_eq!(cfg.general.dir, PathBuf::from("/repos"));
    }

    #[test]
    fn switches_can_be_turned_off_explicitly() {
        let args = parse(&["--revparse=false", "--forks", "false", "--archived"]);

        let cfg = args.config().unwrap();

        assert!(!cfg.reindex.revparse);
        assert!(!cfg.gitlab.forks);
        assert!(cfg.gitlab.archived);
    }

    #[test]
    fn unset_switches_keep_the_defaults() {
        let cfg = parse(&[]).config().unwrap();

        assert!(cfg.reindex.revparse);
        assert!(cfg.gitlab.forks);
        assert!(!cfg.general.skip_missing);
    }

    #[test]
    fn each_verbose_flag_raises_the_level() {
        assert_eq!(log_level(0), LevelFilter::Info);
        assert_eq!(log_level(1), LevelFilter::Debug);
        assert_eq!(log_level(2), LevelFilter::Trace);
        assert_eq!(log_level(5), LevelFilter::Trace);
    }
}
