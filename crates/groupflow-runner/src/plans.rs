use std::path::PathBuf;

use tracing::{debug, info};

use groupflow_core::error::{GroupflowError, Result};
use groupflow_core::types::ExecutionPlan;

/// Named execution plans persisted as JSON files in a dedicated directory.
///
/// Names are sanitized to a filesystem-safe subset before use; a name with
/// nothing left after sanitization is rejected.
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Strip every character outside `[A-Za-z0-9._-]`.
    fn sanitize(name: &str) -> Result<String> {
        let cleaned: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            return Err(GroupflowError::InvalidPlanName(name.to_string()));
        }
        Ok(cleaned)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let cleaned = Self::sanitize(name)?;
        Ok(self.dir.join(format!("{}.json", cleaned)))
    }

    /// Persist a plan under (the sanitized form of) `name`, overwriting any
    /// previous plan with that name. Returns the stored name.
    pub fn save(&self, name: &str, plan: &ExecutionPlan) -> Result<String> {
        let cleaned = Self::sanitize(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", cleaned));
        let raw = serde_json::to_string_pretty(plan)?;
        std::fs::write(&path, raw)?;
        info!(name = %cleaned, path = %path.display(), "Plan saved");
        Ok(cleaned)
    }

    /// Names of all stored plans, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names
    }

    pub fn load(&self, name: &str) -> Result<ExecutionPlan> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(GroupflowError::PlanNotFound(name.to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        let plan = serde_json::from_str(&raw)?;
        debug!(name, "Plan loaded");
        Ok(plan)
    }

    /// Remove a stored plan. Returns false when no such plan exists.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        info!(name, "Plan deleted");
        Ok(true)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupflow_core::types::ExecutionEntry;

    fn store() -> (tempfile::TempDir, PlanStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        (dir, store)
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan::new(vec![
            ExecutionEntry::group("base").with_repeat(2).with_delay(0.5),
            ExecutionEntry::delay(1.0),
            ExecutionEntry::group("upscale"),
        ])
    }

    #[test]
    fn save_load_roundtrip() {
        let (_dir, store) = store();
        store.save("nightly", &plan()).unwrap();

        let loaded = store.load("nightly").unwrap();
        assert_eq!(loaded, plan());
    }

    #[test]
    fn list_is_sorted() {
        let (_dir, store) = store();
        store.save("zeta", &plan()).unwrap();
        store.save("alpha", &plan()).unwrap();
        assert_eq!(store.list(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn names_are_sanitized() {
        let (_dir, store) = store();
        let stored = store.save("my plan/№1!", &plan()).unwrap();
        assert_eq!(stored, "myplan1");
        assert!(store.load("myplan1").is_ok());
        // The unsanitized spelling resolves to the same file
        assert!(store.load("my plan/№1!").is_ok());
    }

    #[test]
    fn empty_after_sanitize_is_invalid() {
        let (_dir, store) = store();
        let err = store.save("///", &plan()).unwrap_err();
        assert!(matches!(err, GroupflowError::InvalidPlanName(_)));
        let err = store.save("..", &plan()).unwrap_err();
        assert!(matches!(err, GroupflowError::InvalidPlanName(_)));
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("ghost").unwrap_err();
        assert!(matches!(err, GroupflowError::PlanNotFound(_)));
    }

    #[test]
    fn delete_reports_presence() {
        let (_dir, store) = store();
        store.save("once", &plan()).unwrap();
        assert!(store.delete("once").unwrap());
        assert!(!store.delete("once").unwrap());
        assert!(!store.exists("once"));
    }
}
