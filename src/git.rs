//! Git invocations used by the merge driver.
//!
//! The driver needs exactly two things from git: a three-way line merge of
//! three files (`git merge-file`) and the name of the checked-out branch
//! (`git rev-parse`). Both sit behind traits so the reconciliation logic can
//! be exercised without a repository.

use std::{
    path::PathBuf,
    process::{Command, Output},
};

use tracing::debug;

use crate::{
    encoding::{DecodedText, TextEncoding},
    error::GitError,
    models::RevisionFiles,
};

/// Labels written next to conflict markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLabels {
    pub mine: String,
    pub base: String,
    pub theirs: String,
}

impl Default for MergeLabels {
    fn default() -> Self {
        Self {
            mine: "mine".to_string(),
            base: "base".to_string(),
            theirs: "theirs".to_string(),
        }
    }
}

/// Result of a three-way line merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    /// Merge tool output decoded with `encoding`.
    pub text: String,
    pub encoding: TextEncoding,
    /// Exit status of the merge tool; 0 is a clean merge, a positive value
    /// counts the conflicts left in the output.
    pub exit_code: i32,
}

impl MergeOutput {
    /// Decode raw merge tool output.
    pub fn from_raw(raw: &[u8], exit_code: i32) -> Self {
        let DecodedText { text, encoding } = DecodedText::from_merge_output(raw);
        Self {
            text,
            encoding,
            exit_code,
        }
    }
}

/// Three-way line merge of the revision files.
pub trait LineMerger {
    /// Merge `files` without touching any of them, returning the result.
    fn merge_files(&self, files: &RevisionFiles, labels: &MergeLabels)
    -> Result<MergeOutput, GitError>;
}

/// Source of the currently checked-out branch name.
pub trait BranchSource {
    fn current_branch(&self) -> Result<String, GitError>;
}

/// Runs the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    work_dir: Option<PathBuf>,
}

impl GitCli {
    /// Run git in the process's working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git in `work_dir`.
    pub fn in_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: Some(work_dir.into()),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        let mut command = Command::new("git");
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        command
            .args(args)
            .output()
            .map_err(|e| GitError::LaunchFailed {
                command: describe(args),
                message: e.to_string(),
            })
    }
}

fn describe(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

impl LineMerger for GitCli {
    fn merge_files(
        &self,
        files: &RevisionFiles,
        labels: &MergeLabels,
    ) -> Result<MergeOutput, GitError> {
        let mine = files.mine.to_string_lossy();
        let base = files.base.to_string_lossy();
        let theirs = files.theirs.to_string_lossy();
        let args = [
            "merge-file",
            "-p",
            "-L",
            labels.mine.as_str(),
            "-L",
            labels.base.as_str(),
            "-L",
            labels.theirs.as_str(),
            &*mine,
            &*base,
            &*theirs,
        ];

        let output = self.run(&args)?;
        let exit_code = output.status.code().ok_or_else(|| GitError::Terminated {
            command: describe(&args),
        })?;
        debug!(exit_code, bytes = output.stdout.len(), "git merge-file finished");

        // A negative status from merge-file (255 here) means it could not merge at all
        if exit_code == 255 {
            return Err(GitError::CommandFailed {
                command: describe(&args),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(MergeOutput::from_raw(&output.stdout, exit_code))
    }
}

impl BranchSource for GitCli {
    fn current_branch(&self) -> Result<String, GitError> {
        let args = ["rev-parse", "--abbrev-ref", "HEAD"];
        let output = self.run(&args)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: describe(&args),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if branch.is_empty() {
            return Err(GitError::UnknownBranch);
        }
        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn git(repo_path: &Path, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(repo_path)
            .args(args)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn setup_test_repo(branch: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        git(&repo_path, &["init", "-q"]);
        git(&repo_path, &["config", "user.name", "Test User"]);
        git(&repo_path, &["config", "user.email", "test@example.com"]);
        git(&repo_path, &["config", "commit.gpgsign", "false"]);
        git(
            &repo_path,
            &["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)],
        );
        fs::write(repo_path.join("README"), "test\n").unwrap();
        git(&repo_path, &["add", "."]);
        git(&repo_path, &["commit", "-q", "-m", "Initial commit"]);

        (temp_dir, repo_path)
    }

    fn write_revisions(dir: &Path, base: &str, mine: &str, theirs: &str) -> RevisionFiles {
        let files = RevisionFiles::new(
            dir.join("base.xml"),
            dir.join("mine.xml"),
            dir.join("theirs.xml"),
        );
        fs::write(&files.base, base).unwrap();
        fs::write(&files.mine, mine).unwrap();
        fs::write(&files.theirs, theirs).unwrap();
        files
    }

    #[test]
    fn test_current_branch() {
        let (_temp_dir, repo_path) = setup_test_repo("feature/x");
        let branch = GitCli::in_dir(&repo_path).current_branch().unwrap();
        assert_eq!(branch, "feature/x");
    }

    #[test]
    fn test_current_branch_outside_repository_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = GitCli::in_dir(temp_dir.path()).current_branch().unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }

    /// # Clean Merge
    ///
    /// Verifies that non-overlapping changes merge cleanly.
    ///
    /// ## Test Scenario
    /// - Mine changes the first line, theirs changes the last line
    ///
    /// ## Expected Outcome
    /// - Exit code is 0, both changes are present
    /// - The mine file on disk is not modified
    #[test]
    fn test_merge_files_clean() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_revisions(
            temp_dir.path(),
            "a\nb\nc\nd\ne\n",
            "A\nb\nc\nd\ne\n",
            "a\nb\nc\nd\nE\n",
        );

        let output = GitCli::in_dir(temp_dir.path())
            .merge_files(&files, &MergeLabels::default())
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.text, "A\nb\nc\nd\nE\n");
        assert_eq!(output.encoding, TextEncoding::UTF_8);
        assert_eq!(fs::read_to_string(&files.mine).unwrap(), "A\nb\nc\nd\ne\n");
    }

    #[test]
    fn test_merge_files_conflict_uses_labels() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_revisions(temp_dir.path(), "a\nb\nc\n", "a\nmine\nc\n", "a\ntheirs\nc\n");

        let output = GitCli::in_dir(temp_dir.path())
            .merge_files(&files, &MergeLabels::default())
            .unwrap();

        assert_eq!(output.exit_code, 1);
        assert!(output.text.contains("<<<<<<< mine"));
        assert!(output.text.contains(">>>>>>> theirs"));
    }

    #[test]
    fn test_merge_output_from_raw_decodes_latin1() {
        let output = MergeOutput::from_raw(b"<name>Caf\xe9</name>\n", 0);
        assert_eq!(output.encoding, TextEncoding::Latin1);
        assert_eq!(output.text, "<name>Café</name>\n");
    }
}
