//! Trait for reporting release operations.

/// Trait for reporting release progress.
///
/// This trait allows the core library to report release operations without
/// directly writing to stdout/stderr.
pub trait ReleaseReporter: Send + Sync {
    /// Reports a package that changed since the last release.
    ///
    /// # Arguments
    ///
    /// * `package` - The package name
    /// * `version` - Its current version
    /// * `changed_files` - Number of changed files (0 when there is no tag)
    fn report_dirty(&self, package: &str, version: &str, changed_files: usize);

    /// Reports a version write-back.
    fn report_bump(&self, package: &str, old: Option<&str>, new: &str);

    /// Reports a dependent whose requirement on a released package changed.
    fn report_dependent(&self, package: &str, dependency: &str, requirement: &str);
}

/// Discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ReleaseReporter for SilentReporter {
    fn report_dirty(&self, _package: &str, _version: &str, _changed_files: usize) {}
    fn report_bump(&self, _package: &str, _old: Option<&str>, _new: &str) {}
    fn report_dependent(&self, _package: &str, _dependency: &str, _requirement: &str) {}
}
