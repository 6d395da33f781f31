use clap::Parser;
use std::{fmt, path::PathBuf, str::FromStr};

/// Paths of the three revision files git hands to a merge driver:
/// the common ancestor (`%O`), the current branch's version (`%A`, also the
/// output file) and the incoming branch's version (`%B`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFiles {
    pub base: PathBuf,
    pub mine: PathBuf,
    pub theirs: PathBuf,
}

impl RevisionFiles {
    pub fn new(
        base: impl Into<PathBuf>,
        mine: impl Into<PathBuf>,
        theirs: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base: base.into(),
            mine: mine.into(),
            theirs: theirs.into(),
        }
    }
}

/// Slash-separated path of element names locating a version value,
/// e.g. `parent/version` or `frontend.version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag {
    path: String,
}

impl VersionTag {
    /// Element names along the path, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }

    /// Name of the element that holds the value.
    pub fn leaf(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl FromStr for VersionTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim().trim_matches('/');
        if path.is_empty() {
            return Err("version tag must not be empty".to_string());
        }
        if let Some(segment) = path
            .split('/')
            .find(|segment| segment.is_empty() || segment.contains(char::is_whitespace))
        {
            return Err(format!(
                "invalid element name '{}' in version tag '{}'",
                segment, s
            ));
        }
        Ok(Self {
            path: path.to_string(),
        })
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Parser, Clone, Debug)]
#[command(
    name = "pommerge",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Git merge driver that keeps pom.xml version changes from conflicting",
    long_about = "A git merge driver for Maven pom.xml and similar descriptor files.\n\n\
        When both branches changed the version, the local version is aligned with the\n\
        incoming one before running `git merge-file`, so the version line does not\n\
        conflict. On any branch other than the trunk branch the local version is then\n\
        restored in the merged result.\n\n\
        Configuration can be provided via CLI arguments, environment variables (POMMERGE_*),\n\
        or a config file (~/.config/pommerge/config.toml).",
    after_help = "GIT SETUP:\n    \
        # ~/.gitconfig\n    \
        [merge \"pommerge\"]\n        \
        name = A custom merge driver for Maven's pom.xml\n        \
        driver = pommerge %O %A %B project/version\n\n    \
        # .gitattributes\n    \
        pom.xml merge=pommerge"
)]
pub struct Args {
    /// Common ancestor revision of the file (%O)
    #[arg(value_name = "BASE", required_unless_present = "create_config")]
    pub base: Option<PathBuf>,

    /// Current branch's revision, overwritten with the merge result (%A)
    #[arg(value_name = "MINE", required_unless_present = "create_config")]
    pub mine: Option<PathBuf>,

    /// Incoming branch's revision (%B)
    #[arg(value_name = "THEIRS", required_unless_present = "create_config")]
    pub theirs: Option<PathBuf>,

    /// Element paths holding version values, e.g. "parent/version"
    #[arg(
        value_name = "VERSION_TAG",
        required_unless_present = "create_config",
        num_args = 1..
    )]
    pub version_tags: Vec<VersionTag>,

    // Reconciliation
    /// Branch that adopts the incoming version permanently [default: master]
    #[arg(long, help_heading = "Reconciliation")]
    pub trunk_branch: Option<String>,

    /// Element kept in lockstep with the version [default: tag]
    #[arg(long, help_heading = "Reconciliation")]
    pub aux_tag: Option<String>,

    /// Encoding assumed for files without a declaration [default: utf-8]
    #[arg(long, help_heading = "Reconciliation")]
    pub default_encoding: Option<String>,

    /// Comma-separated conflict marker labels for mine, base and theirs [default: mine,base,theirs]
    #[arg(long, help_heading = "Reconciliation")]
    pub merge_labels: Option<String>,

    /// Run git in this directory instead of the current one
    #[arg(short = 'C', long, value_name = "DIR", help_heading = "Reconciliation")]
    pub work_dir: Option<PathBuf>,

    // Logging
    /// Log level: trace, debug, info, warn, error or off [default: info]
    #[arg(long, help_heading = "Logging")]
    pub log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// Log format: text or json [default: text]
    #[arg(long, help_heading = "Logging")]
    pub log_format: Option<String>,

    /// Create a sample configuration file at ~/.config/pommerge/config.toml
    #[arg(long)]
    pub create_config: bool,
}

impl Args {
    /// The three revision paths, present unless `--create-config` was given alone.
    pub fn revision_files(&self) -> Option<RevisionFiles> {
        match (&self.base, &self.mine, &self.theirs) {
            (Some(base), Some(mine), Some(theirs)) => {
                Some(RevisionFiles::new(base, mine, theirs))
            }
            _ => None,
        }
    }
}
