use camino::{Utf8Path, Utf8PathBuf};
use scrivener_errors::PathSafetyError;

/// Path contract for a single job's storage namespace, `jobs/<user_id>/<job_id>/…`.
///
/// Every accessor that takes a caller-supplied relative path routes through
/// [`JobStoragePaths::relative`], which rejects anything that could escape
/// the job's root — an empty segment, an absolute path, or a `..` component
/// — so no stage can read or write outside its own job by constructing a
/// crafted filename (e.g. from an LLM-echoed diagram id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStoragePaths {
    user_id: String,
    job_id: String,
}

impl JobStoragePaths {
    #[must_use]
    pub fn new(user_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            job_id: job_id.into(),
        }
    }

    /// `jobs/<user_id>/<job_id>`.
    #[must_use]
    pub fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from("jobs").join(&self.user_id).join(&self.job_id)
    }

    /// Validate and join a caller-supplied relative path onto the job root.
    ///
    /// Rejects an empty path, an absolute path, and any path containing a
    /// `..` component, regardless of where in the path it appears.
    pub fn relative(&self, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        if rel.trim().is_empty() {
            return Err(PathSafetyError::Empty);
        }
        let candidate = Utf8Path::new(rel);
        if candidate.is_absolute() {
            return Err(PathSafetyError::Absolute { path: rel.to_string() });
        }
        use camino::Utf8Component;
        for component in candidate.components() {
            match component {
                Utf8Component::ParentDir => {
                    return Err(PathSafetyError::Ascends { path: rel.to_string() });
                }
                Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                    return Err(PathSafetyError::Absolute { path: rel.to_string() });
                }
                Utf8Component::CurDir | Utf8Component::Normal(_) => {}
            }
        }
        Ok(self.root().join(candidate))
    }

    /// Canonical draft blob, `draft.md`.
    #[must_use]
    pub fn draft(&self) -> Utf8PathBuf {
        self.root().join("draft.md")
    }

    /// Planner output, `plan.json`.
    #[must_use]
    pub fn plan(&self) -> Utf8PathBuf {
        self.root().join("plan.json")
    }

    /// Finalized document, `final.<ext>`.
    #[must_use]
    pub fn final_document(&self, ext: &str) -> Utf8PathBuf {
        self.root().join(format!("final.{ext}"))
    }

    /// A path under `intake/`, e.g. uploaded answers or source material.
    pub fn intake(&self, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        self.relative(&format!("intake/{rel}"))
    }

    /// A path under `images/`, e.g. rendered diagram bitmaps.
    pub fn images(&self, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        self.relative(&format!("images/{rel}"))
    }

    /// A path under `diagrams/`, e.g. sanitized PlantUML sources.
    pub fn diagrams(&self, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        self.relative(&format!("diagrams/{rel}"))
    }

    /// A path under `metrics/`, e.g. token-usage reports.
    pub fn metrics(&self, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        self.relative(&format!("metrics/{rel}"))
    }

    /// A path under `cycle_<idx>/`, e.g. per-cycle review progress.
    pub fn cycle(&self, idx: u32, rel: &str) -> Result<Utf8PathBuf, PathSafetyError> {
        self.relative(&format!("cycle_{idx}/{rel}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> JobStoragePaths {
        JobStoragePaths::new("user-1", "job-1")
    }

    #[test]
    fn root_is_namespaced_by_user_and_job() {
        assert_eq!(paths().root(), Utf8PathBuf::from("jobs/user-1/job-1"));
    }

    #[test]
    fn relative_rejects_empty_absolute_and_ascending_paths() {
        let p = paths();
        assert_eq!(p.relative(""), Err(PathSafetyError::Empty));
        assert!(matches!(p.relative("/etc/passwd"), Err(PathSafetyError::Absolute { .. })));
        assert!(matches!(p.relative("../escape.txt"), Err(PathSafetyError::Ascends { .. })));
        assert!(matches!(p.relative("a/../../escape.txt"), Err(PathSafetyError::Ascends { .. })));
    }

    #[test]
    fn relative_accepts_nested_safe_paths() {
        let p = paths();
        assert_eq!(
            p.relative("a/b/c.json").unwrap(),
            Utf8PathBuf::from("jobs/user-1/job-1/a/b/c.json")
        );
    }

    #[test]
    fn cycle_path_is_namespaced_by_cycle_index() {
        let p = paths();
        assert_eq!(
            p.cycle(2, "review_progress.json").unwrap(),
            Utf8PathBuf::from("jobs/user-1/job-1/cycle_2/review_progress.json")
        );
    }

    proptest::proptest! {
        #[test]
        fn ascending_relative_paths_are_always_rejected(segments in proptest::collection::vec("[a-z]{1,5}", 0..5)) {
            let p = paths();
            let mut rel = segments.join("/");
            rel.push_str("/../escape");
            assert!(p.relative(&rel).is_err());
        }
    }
}
