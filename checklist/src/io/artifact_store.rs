//! Durable checklist artifact storage.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::artifact::ChecklistArtifact;

const ARTIFACT_SCHEMA: &str = include_str!("../../schemas/checklist_artifact.schema.json");

/// Opaque location of a saved artifact (a file path for [`FileRepository`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLocation(String);

impl ArtifactLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for saved checklists. Every save creates a new artifact.
pub trait ChecklistRepository {
    fn save(&self, artifact: &ChecklistArtifact) -> Result<ArtifactLocation>;
    fn load(&self, location: &ArtifactLocation) -> Result<ChecklistArtifact>;
}

impl<T: ChecklistRepository + ?Sized> ChecklistRepository for &T {
    fn save(&self, artifact: &ChecklistArtifact) -> Result<ArtifactLocation> {
        (**self).save(artifact)
    }

    fn load(&self, location: &ArtifactLocation) -> Result<ChecklistArtifact> {
        (**self).load(location)
    }
}

/// Pretty JSON files named `checklist_<UTC timestamp>.json` under one directory.
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saved artifact locations, oldest first.
    pub fn list(&self) -> Result<Vec<ArtifactLocation>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in
            fs::read_dir(&self.dir).with_context(|| format!("read dir {}", self.dir.display()))?
        {
            let path = entry
                .with_context(|| format!("read dir entry in {}", self.dir.display()))?
                .path();
            let is_artifact = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("checklist_") && name.ends_with(".json"));
            if is_artifact {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|path| ArtifactLocation::new(path.display().to_string()))
            .collect())
    }

    /// First unused path for `artifact`; same-instant saves get a numeric suffix.
    fn free_path(&self, artifact: &ChecklistArtifact) -> PathBuf {
        let file_name = artifact.file_name();
        let mut candidate = self.dir.join(&file_name);
        let stem = file_name.trim_end_matches(".json");
        let mut n = 2;
        while candidate.exists() {
            candidate = self.dir.join(format!("{}_{}.json", stem, n));
            n += 1;
        }
        candidate
    }
}

impl ChecklistRepository for FileRepository {
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    fn save(&self, artifact: &ChecklistArtifact) -> Result<ArtifactLocation> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        let mut buf = serde_json::to_string_pretty(artifact).context("serialize artifact")?;
        buf.push('\n');

        let path = self.free_path(artifact);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("write temp artifact {}", tmp_path.display()))?;
        publish_new(&tmp_path, &path)?;

        info!(path = %path.display(), items = artifact.items.len(), "saved checklist artifact");
        Ok(ArtifactLocation::new(path.display().to_string()))
    }

    #[instrument(skip_all, fields(location = %location))]
    fn load(&self, location: &ArtifactLocation) -> Result<ChecklistArtifact> {
        let path = Path::new(location.as_str());
        let contents =
            fs::read_to_string(path).with_context(|| format!("read artifact {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse artifact {}", path.display()))?;
        validate_schema(&value).with_context(|| format!("validate artifact {}", path.display()))?;
        let artifact: ChecklistArtifact = serde_json::from_value(value)
            .with_context(|| format!("deserialize artifact {}", path.display()))?;
        debug!(items = artifact.items.len(), "loaded checklist artifact");
        Ok(artifact)
    }
}

/// Move `tmp` to `dest` without replacing an existing file.
///
/// `hard_link` fails if `dest` exists, so a concurrent writer is never
/// overwritten. Filesystems without hard links fall back to an exclusive create.
fn publish_new(tmp: &Path, dest: &Path) -> Result<()> {
    let published = match fs::hard_link(tmp, dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(anyhow!("artifact {} already exists", dest.display()))
        }
        Err(_) => copy_exclusive(tmp, dest),
    };
    let cleanup = fs::remove_file(tmp);
    published?;
    cleanup.with_context(|| format!("remove temp artifact {}", tmp.display()))
}

fn copy_exclusive(src: &Path, dest: &Path) -> Result<()> {
    let contents = fs::read(src).with_context(|| format!("read {}", src.display()))?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .with_context(|| format!("create artifact {}", dest.display()))?;
    file.write_all(&contents)
        .with_context(|| format!("write artifact {}", dest.display()))?;
    file.sync_all()
        .with_context(|| format!("sync artifact {}", dest.display()))
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(ARTIFACT_SCHEMA).context("parse artifact schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "artifact schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Phase;
    use crate::test_support::{fixed_time, item, state_in};

    fn artifact() -> ChecklistArtifact {
        let state = state_in(Phase::AwaitingApproval { approved: true }, vec![item("item-1")]);
        ChecklistArtifact::from_state(&state, fixed_time()).expect("artifact")
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = FileRepository::new(temp.path().join("checklists"));
        let location = repo.save(&artifact()).expect("save");
        assert!(location.as_str().ends_with("checklist_20250101T120000.000000Z.json"));
        assert_eq!(repo.load(&location).expect("load"), artifact());
    }

    /// Two saves at the same instant produce two files.
    #[test]
    fn saves_never_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = FileRepository::new(temp.path());
        let first = repo.save(&artifact()).expect("first");
        let second = repo.save(&artifact()).expect("second");
        assert_ne!(first, second);
        assert_eq!(repo.list().expect("list"), vec![first, second]);
        let leftovers = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn load_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("checklist_bad.json");
        fs::write(&path, r#"{"task_description": "x"}"#).expect("write");
        let err = FileRepository::new(temp.path())
            .load(&ArtifactLocation::new(path.display().to_string()))
            .expect_err("expected error");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }
}
