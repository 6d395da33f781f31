//! Version reconciliation around a three-way line merge.
//!
//! For every version tag the driver walks the same cycle:
//!
//! 1. **Read** the version from base, mine and theirs, and the auxiliary tag
//!    from mine and theirs.
//! 2. **Normalize** mine's version (and tag) to theirs on disk when both sides
//!    changed it, so the version line itself cannot conflict.
//! 3. **Merge** the three files with the line merger.
//! 4. **Revert** the merged version back to mine's on any branch other than
//!    the trunk branch.
//! 5. **Write** the result over mine.
//!
//! The mine file is the state carried from one tag to the next: each cycle
//! reads what the previous one wrote. The last merge's exit code is the
//! driver's result.

use std::{fs, path::Path};

use tracing::{debug, info, instrument};

use crate::{
    document::{read_aux_tag, read_version},
    encoding::{DecodedText, TextEncoding},
    error::{EncodingError, PomMergeError, PomMergeResult},
    git::{BranchSource, LineMerger, MergeLabels},
    models::{RevisionFiles, VersionTag},
    rewrite::{FieldChange, apply_all},
};

/// Settings that shape reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Branch on which the incoming version is kept after merging.
    pub trunk_branch: String,
    /// Element kept in lockstep with the version.
    pub aux_tag: String,
    /// Encoding for files that do not declare one.
    pub default_encoding: TextEncoding,
    pub merge_labels: MergeLabels,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            trunk_branch: "master".to_string(),
            aux_tag: "tag".to_string(),
            default_encoding: TextEncoding::UTF_8,
            merge_labels: MergeLabels::default(),
        }
    }
}

/// Version values found in the three revisions for one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    pub base: Option<String>,
    pub mine: Option<String>,
    pub theirs: Option<String>,
}

impl VersionSet {
    /// Both sides moved the version away from base in different directions,
    /// or theirs moved it while mine kept it: the version line would differ
    /// on both sides of the merge unless mine is aligned first.
    pub fn needs_normalization(&self) -> bool {
        match (&self.base, &self.mine, &self.theirs) {
            (Some(base), Some(mine), Some(theirs)) => mine != theirs && theirs != base,
            _ => false,
        }
    }
}

/// Auxiliary tag values for mine and theirs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxTagPair {
    pub mine: Option<String>,
    pub theirs: Option<String>,
}

impl AuxTagPair {
    /// Both values, when the tag exists on both sides.
    pub fn both(&self) -> Option<(&str, &str)> {
        self.mine.as_deref().zip(self.theirs.as_deref())
    }
}

/// What happened while reconciling one version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    pub tag: VersionTag,
    pub versions: VersionSet,
    pub aux_tags: AuxTagPair,
    pub branch: String,
    /// Mine was rewritten to theirs' version before merging.
    pub normalized: bool,
    /// The merged output had mine's version restored.
    pub reverted: bool,
    pub exit_code: i32,
}

/// Reports for all processed tags, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub tags: Vec<TagReport>,
}

impl MergeReport {
    /// Exit code of the last merge, 0 when no tag was processed.
    pub fn exit_code(&self) -> i32 {
        self.tags.last().map_or(0, |report| report.exit_code)
    }

    pub fn has_conflicts(&self) -> bool {
        self.exit_code() != 0
    }
}

/// Reconciles version fields around a line merge.
pub struct MergeDriver<M, B> {
    merger: M,
    branches: B,
    settings: DriverSettings,
}

impl<M: LineMerger, B: BranchSource> MergeDriver<M, B> {
    pub fn new(merger: M, branches: B, settings: DriverSettings) -> Self {
        Self {
            merger,
            branches,
            settings,
        }
    }

    /// Run the full cycle for each tag in order against the same files.
    pub fn run(&self, files: &RevisionFiles, tags: &[VersionTag]) -> PomMergeResult<MergeReport> {
        info!(
            tags = %tags.iter().map(VersionTag::as_str).collect::<Vec<_>>().join(", "),
            "Version tags that will be processed"
        );

        let mut report = MergeReport::default();
        for tag in tags {
            report.tags.push(self.reconcile(files, tag)?);
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(tag = %tag))]
    fn reconcile(&self, files: &RevisionFiles, tag: &VersionTag) -> PomMergeResult<TagReport> {
        let encoding = self.settings.default_encoding;
        let versions = VersionSet {
            base: read_version(&files.base, tag, encoding),
            mine: read_version(&files.mine, tag, encoding),
            theirs: read_version(&files.theirs, tag, encoding),
        };
        let aux_tags = AuxTagPair {
            mine: read_aux_tag(&files.mine, &self.settings.aux_tag, encoding),
            theirs: read_aux_tag(&files.theirs, &self.settings.aux_tag, encoding),
        };
        debug!(?versions, ?aux_tags, "Versions read");

        let normalized = match self.normalization(tag, &versions, &aux_tags) {
            Some(changes) => {
                self.normalize_mine(&files.mine, &changes)?;
                true
            }
            None => {
                debug!("Skipping normalization");
                false
            }
        };

        let merged = self
            .merger
            .merge_files(files, &self.settings.merge_labels)?;
        debug!(
            exit_code = merged.exit_code,
            encoding = merged.encoding.name(),
            "Merged"
        );

        let branch = self.branches.current_branch()?;
        let (text, reverted) = match self.reversion(tag, &versions, &aux_tags, &branch) {
            Some(changes) => {
                info!(
                    "Merging pom version {} into {}. Keeping version {}",
                    versions.theirs.as_deref().unwrap_or_default(),
                    branch,
                    versions.mine.as_deref().unwrap_or_default()
                );
                (apply_all(&merged.text, &changes), true)
            }
            None => (merged.text, false),
        };

        write_text(&files.mine, &text, merged.encoding)?;
        debug!(reverted, "Written");

        Ok(TagReport {
            tag: tag.clone(),
            versions,
            aux_tags,
            branch,
            normalized,
            reverted,
            exit_code: merged.exit_code,
        })
    }

    /// Changes that align mine with theirs before merging, if any are needed.
    fn normalization(
        &self,
        tag: &VersionTag,
        versions: &VersionSet,
        aux_tags: &AuxTagPair,
    ) -> Option<Vec<FieldChange>> {
        if !versions.needs_normalization() {
            return None;
        }
        let mine = versions.mine.as_deref()?;
        let theirs = versions.theirs.as_deref()?;
        Some(self.lockstep_changes(tag, (mine, theirs), aux_tags.both()))
    }

    /// Changes that restore mine's version in the merged text, if the branch
    /// keeps its own version.
    fn reversion(
        &self,
        tag: &VersionTag,
        versions: &VersionSet,
        aux_tags: &AuxTagPair,
        branch: &str,
    ) -> Option<Vec<FieldChange>> {
        let mine = versions.mine.as_deref()?;
        if branch == self.settings.trunk_branch {
            debug!(branch, "On trunk branch, keeping merged version");
            return None;
        }
        let Some(theirs) = versions.theirs.as_deref() else {
            debug!("No incoming version to revert from");
            return None;
        };
        // inverse of aligning mine to theirs
        let alignment = self.lockstep_changes(tag, (mine, theirs), aux_tags.both());
        Some(alignment.iter().map(FieldChange::inverted).collect())
    }

    /// The version change plus, when both sides have one, the same change
    /// applied to the auxiliary tag.
    fn lockstep_changes(
        &self,
        tag: &VersionTag,
        (version_from, version_to): (&str, &str),
        aux: Option<(&str, &str)>,
    ) -> Vec<FieldChange> {
        let mut changes = vec![FieldChange::new(tag.leaf(), version_from, version_to)];
        if let Some((aux_from, aux_to)) = aux {
            changes.push(FieldChange::new(&self.settings.aux_tag, aux_from, aux_to));
        }
        changes
    }

    fn normalize_mine(&self, path: &Path, changes: &[FieldChange]) -> PomMergeResult<()> {
        let bytes = fs::read(path).map_err(|source| PomMergeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = DecodedText::from_declared(&bytes, self.settings.default_encoding);
        let text = apply_all(&decoded.text, changes);
        write_text(path, &text, decoded.encoding)?;
        debug!(encoding = decoded.encoding.name(), "Normalized");
        Ok(())
    }
}

fn write_text(path: &Path, text: &str, encoding: TextEncoding) -> PomMergeResult<()> {
    let bytes = encoding
        .encode(text)
        .ok_or_else(|| EncodingError::Unmappable {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
        })?;
    fs::write(path, bytes).map_err(|source| PomMergeError::Io {
        path: path.to_path_buf(),
        source,
    })
}
