//! Semantic versioning and release management.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use indexmap::IndexMap;
use semver::{BuildMetadata, Prerelease, Version};
use tracing::{info, warn};

use crate::config::BumpDependents;
use crate::error::{Error, PreconditionKind, Result};
use crate::graph::DependencyGraph;
use crate::package::{DepType, Manifest, Workspace, ROOT_PACKAGE};
use crate::prompt::Prompt;
use crate::release_reporter::ReleaseReporter;
use crate::runner::{shell_quote, CommandRunner};
use crate::scheduler::{ExecutionMode, Job, JobScheduler, SchedulerOptions};
use crate::store::ManifestStore;
use crate::vcs::{Vcs, CHANGED_SENTINEL};

/// Prerelease channels offered when choosing the next version.
pub const PRERELEASE_CHANNELS: [&str; 3] = ["rc", "beta", "alpha"];

/// How to derive the next version from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementBy {
    /// Major version bump (1.2.3 -> 2.0.0).
    Major,
    /// Minor version bump (1.2.3 -> 1.3.0).
    Minor,
    /// Patch version bump (1.2.3 -> 1.2.4).
    Patch,
    /// Prerelease on a named channel (1.2.3 -> 2.0.0-rc.0 -> 2.0.0-rc.1).
    Prerelease(String),
}

impl IncrementBy {
    /// All choices, in the order they are offered.
    pub fn all() -> Vec<IncrementBy> {
        let mut all = vec![IncrementBy::Major, IncrementBy::Minor, IncrementBy::Patch];
        all.extend(
            PRERELEASE_CHANNELS
                .iter()
                .map(|c| IncrementBy::Prerelease((*c).to_string())),
        );
        all
    }

    pub fn label(&self) -> &str {
        match self {
            IncrementBy::Major => "Major",
            IncrementBy::Minor => "Minor",
            IncrementBy::Patch => "Patch",
            IncrementBy::Prerelease(channel) => match channel.as_str() {
                "rc" => "Release candidate",
                "beta" => "Beta",
                "alpha" => "Alpha",
                other => other,
            },
        }
    }
}

impl FromStr for IncrementBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "major" => Ok(IncrementBy::Major),
            "minor" => Ok(IncrementBy::Minor),
            "patch" => Ok(IncrementBy::Patch),
            channel if PRERELEASE_CHANNELS.contains(&channel) => {
                Ok(IncrementBy::Prerelease(channel.to_string()))
            }
            other => Err(Error::Validation(format!(
                "Invalid increment-by value: {} (expected major, minor, patch, rc, beta or alpha)",
                other
            ))),
        }
    }
}

impl fmt::Display for IncrementBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncrementBy::Major => write!(f, "major"),
            IncrementBy::Minor => write!(f, "minor"),
            IncrementBy::Patch => write!(f, "patch"),
            IncrementBy::Prerelease(channel) => write!(f, "{}", channel),
        }
    }
}

/// Parses a version, failing with a validation error.
pub fn parse_version(version: &str) -> Result<Version> {
    Version::parse(version.trim())
        .map_err(|e| Error::Validation(format!("Invalid version {}: {}", version, e)))
}

/// Computes the version that follows `current`.
///
/// # Errors
///
/// Returns a validation error if `current` is not a valid semantic version.
pub fn calc_next_version(current: &str, by: &IncrementBy) -> Result<String> {
    Ok(increment(&parse_version(current)?, by)?.to_string())
}

fn increment(current: &Version, by: &IncrementBy) -> Result<Version> {
    let mut next = current.clone();
    next.build = BuildMetadata::EMPTY;
    let on_prerelease = !current.pre.is_empty();

    match by {
        IncrementBy::Major => {
            if !on_prerelease || current.minor != 0 || current.patch != 0 {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        IncrementBy::Minor => {
            if !on_prerelease || current.patch != 0 {
                next.minor += 1;
            }
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        IncrementBy::Patch => {
            if !on_prerelease {
                next.patch += 1;
            }
            next.pre = Prerelease::EMPTY;
        }
        IncrementBy::Prerelease(channel) => {
            let active = current.pre.as_str().split('.').next() == Some(channel.as_str());
            if active {
                next.pre = bump_prerelease(&current.pre)?;
            } else {
                next = increment(current, &IncrementBy::Major)?;
                next.pre = Prerelease::new(&format!("{}.0", channel))
                    .map_err(|e| Error::Validation(format!("Invalid prerelease channel {}: {}", channel, e)))?;
            }
        }
    }
    Ok(next)
}

// Increments the last numeric identifier, or appends `.0` if there is none.
fn bump_prerelease(pre: &Prerelease) -> Result<Prerelease> {
    let mut identifiers: Vec<String> = pre.as_str().split('.').map(str::to_string).collect();
    match identifiers
        .iter_mut()
        .rev()
        .find_map(|id| id.parse::<u64>().ok().map(|n| (id, n)))
    {
        Some((id, n)) => *id = (n + 1).to_string(),
        None => identifiers.push("0".to_string()),
    }
    Prerelease::new(&identifiers.join("."))
        .map_err(|e| Error::Validation(format!("Invalid prerelease {}: {}", pre, e)))
}

/// Every increment choice paired with the version it would produce.
pub fn version_choices(current: &Version) -> Result<Vec<(IncrementBy, String)>> {
    IncrementBy::all()
        .into_iter()
        .map(|by| {
            let next = increment(current, &by)?.to_string();
            Ok((by, next))
        })
        .collect()
}

/// Decides which version the next one is derived from.
///
/// Starts from the manifest version. If the last tag names a different
/// version, the user must confirm, and the higher of both is used. Returns
/// `None` if the user declines.
pub fn resolve_reference_version(
    manifest_version: &str,
    last_tag: Option<&str>,
    prompt: &dyn Prompt,
) -> Result<Option<Version>> {
    let mut reference = manifest_version.trim().to_string();
    match last_tag {
        Some(tag) => {
            let tag_version = tag.trim().trim_start_matches(['v', '=']);
            if tag_version != reference {
                warn!(
                    "Last tagged version {} does not match package.json version {}",
                    tag_version, reference
                );
                warn!("This may cause inaccuracies when detecting which packages changed, since tags are used for that");
                if !prompt.confirm("Continue?", false)? {
                    return Ok(None);
                }
                if let (Ok(tagged), Ok(current)) = (Version::parse(tag_version), Version::parse(&reference)) {
                    if tagged > current {
                        reference = tag_version.to_string();
                    }
                }
                warn!("Using {} as reference (the highest one of both)", reference);
            }
        }
        None => warn!("Repo has no tags yet"),
    }
    parse_version(&reference).map(Some)
}

/// A package considered for release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub package: String,
    pub dirty: bool,
    /// Files changed since the last tag; 0 when there is no tag.
    pub changed_files: usize,
    pub next_version: Option<String>,
}

/// How a release run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No package changed since the last tag.
    NothingToRelease,
    /// The user declined one of the confirmations.
    Aborted,
    Released {
        version: String,
        candidates: Vec<ReleaseCandidate>,
    },
}

/// Options of a release run.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Treat the repository root as the only package.
    pub single: bool,
    /// Run the branch and working tree checks at all.
    pub checks: bool,
    pub allow_any_branch: bool,
    pub check_uncommitted: bool,
    pub check_unpulled: bool,
    /// Ask for confirmations.
    pub confirm: bool,
    /// Write versions (and commit them).
    pub bump: bool,
    pub git_commit: bool,
    /// Run `npm publish`.
    pub publish: bool,
    pub new_version: Option<String>,
    pub increment_by: Option<IncrementBy>,
    pub publish_tag: Option<String>,
    pub otp: Option<String>,
    pub access: Option<String>,
    pub bump_dependents: BumpDependents,
    /// Publish in dependency order instead of discovery order.
    pub graph_order: bool,
    pub changelog: bool,
    pub changelog_path: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            single: false,
            checks: true,
            allow_any_branch: false,
            check_uncommitted: true,
            check_unpulled: true,
            confirm: true,
            bump: true,
            git_commit: true,
            publish: true,
            new_version: None,
            increment_by: None,
            publish_tag: None,
            otp: None,
            access: None,
            bump_dependents: BumpDependents::default(),
            graph_order: true,
            changelog: true,
            changelog_path: "CHANGELOG.md".to_string(),
        }
    }
}

impl PublishOptions {
    /// The `npm publish` command line for these options.
    pub fn publish_command(&self) -> String {
        let mut cmd = String::from("npm publish");
        if let Some(tag) = &self.publish_tag {
            cmd.push_str(&format!(" --tag {}", shell_quote(tag)));
        }
        if let Some(otp) = &self.otp {
            cmd.push_str(&format!(" --otp {}", shell_quote(otp)));
        }
        match self.access.as_deref() {
            Some(access @ ("public" | "restricted")) => {
                cmd.push_str(&format!(" --access {}", access));
            }
            Some(other) => warn!("Ignoring unknown access level: {}", other),
            None => {}
        }
        cmd
    }
}

/// Engine for planning and executing releases.
pub struct ReleaseEngine<'a> {
    store: &'a ManifestStore,
    vcs: Arc<dyn Vcs>,
    runner: Arc<dyn CommandRunner>,
    prompt: Arc<dyn Prompt>,
    reporter: Box<dyn ReleaseReporter>,
    today: NaiveDate,
}

impl<'a> ReleaseEngine<'a> {
    /// Creates a new release engine.
    ///
    /// The `reporter` is used to report release progress without directly
    /// writing to stdout/stderr.
    pub fn new<R>(
        store: &'a ManifestStore,
        vcs: Arc<dyn Vcs>,
        runner: Arc<dyn CommandRunner>,
        prompt: Arc<dyn Prompt>,
        reporter: R,
    ) -> Self
    where
        R: ReleaseReporter + 'static,
    {
        Self {
            store,
            vcs,
            runner,
            prompt,
            reporter: Box::new(reporter),
            today: Local::now().date_naive(),
        }
    }

    /// Date written to the changelog heading.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Runs the whole release workflow.
    ///
    /// Validation and precondition failures happen before any manifest is
    /// written.
    pub async fn release(&self, workspace: &Workspace, opts: &PublishOptions) -> Result<ReleaseOutcome> {
        if opts.confirm
            && !self
                .prompt
                .confirm("Have you built all your packages for production?", false)?
        {
            return Ok(ReleaseOutcome::Aborted);
        }

        self.check_preconditions(opts).await?;

        let last_tag = self.vcs.last_release_tag().await;
        if let Some(tag) = &last_tag {
            info!("Last tag found: {}", tag);
        }
        let mut candidates = self
            .find_candidates(workspace, last_tag.as_deref(), opts.single)
            .await?;
        let dirty: Vec<String> = candidates
            .iter()
            .filter(|c| c.dirty)
            .map(|c| c.package.clone())
            .collect();
        if dirty.is_empty() {
            info!("No packages need to be published");
            return Ok(ReleaseOutcome::NothingToRelease);
        }

        let manifest_version = workspace
            .root_package()
            .map(|root| root.version().to_string())
            .ok_or_else(|| Error::Validation("Missing root package manifest".to_string()))?;
        let Some(reference) =
            resolve_reference_version(&manifest_version, last_tag.as_deref(), self.prompt.as_ref())?
        else {
            return Ok(ReleaseOutcome::Aborted);
        };
        let next_version = self.next_version(&reference, opts)?;

        if opts.confirm {
            let message = format!(
                "Confirm publish ({} package/s, v{})?",
                dirty.len(),
                next_version
            );
            if !self.prompt.confirm(&message, false)? {
                return Ok(ReleaseOutcome::Aborted);
            }
        }

        for candidate in candidates.iter_mut().filter(|c| c.dirty) {
            candidate.next_version = Some(next_version.clone());
        }

        if opts.bump {
            self.write_versions(workspace, &dirty, &next_version, opts)?;
            if opts.changelog {
                self.add_changelog_line(&next_version, &opts.changelog_path)?;
            }
            if opts.git_commit {
                let tag = format!("v{}", next_version);
                self.vcs.commit(&tag).await?;
                self.vcs.tag(&tag).await?;
                self.vcs.push_with_tags().await?;
            }
        }

        if opts.publish {
            self.publish_packages(workspace, &dirty, opts).await?;
        }

        Ok(ReleaseOutcome::Released {
            version: next_version,
            candidates,
        })
    }

    /// Branch, working tree and upstream checks.
    pub async fn check_preconditions(&self, opts: &PublishOptions) -> Result<()> {
        if !opts.checks {
            return Ok(());
        }

        let branch = self.vcs.current_branch().await?;
        if branch == "master" || branch == "main" {
            info!("Current branch: {}", branch);
        } else if opts.allow_any_branch {
            warn!("Publishing from a non-master branch: {}", branch);
        } else {
            return Err(Error::Precondition(PreconditionKind::WrongBranch(branch)));
        }

        if opts.check_uncommitted {
            let uncommitted = self.vcs.uncommitted_changes().await?;
            if !uncommitted.trim().is_empty() {
                return Err(Error::Precondition(PreconditionKind::Uncommitted(uncommitted)));
            }
            info!("No uncommitted changes");
        }

        if opts.check_unpulled {
            let unpulled = self.vcs.unpulled_commit_count().await?;
            if unpulled != 0 {
                return Err(Error::Precondition(PreconditionKind::Unpulled(unpulled.to_string())));
            }
            info!("Remote history matches local history");
        }
        Ok(())
    }

    /// Diffs every releasable package against `last_tag`.
    ///
    /// Without a tag every package is dirty. The root is only considered in
    /// single mode, where it is the only package.
    pub async fn find_candidates(
        &self,
        workspace: &Workspace,
        last_tag: Option<&str>,
        single: bool,
    ) -> Result<Vec<ReleaseCandidate>> {
        let packages: Vec<_> = if single {
            workspace.root_package().into_iter().collect()
        } else {
            workspace.sub_packages().collect()
        };

        let mut candidates = Vec::with_capacity(packages.len());
        for package in packages {
            let diff = self.vcs.diff_since(last_tag, &package.path).await?;
            let diff = diff.trim();
            let dirty = !diff.is_empty();
            let changed_files = if diff.is_empty() || diff == CHANGED_SENTINEL {
                0
            } else {
                diff.lines().count()
            };
            if dirty {
                self.reporter
                    .report_dirty(package.display_name(), package.version(), changed_files);
            }
            candidates.push(ReleaseCandidate {
                package: package.name.clone(),
                dirty,
                changed_files,
                next_version: None,
            });
        }
        Ok(candidates)
    }

    /// Explicit version, increment channel, or interactive choice.
    pub fn next_version(&self, reference: &Version, opts: &PublishOptions) -> Result<String> {
        if let Some(version) = &opts.new_version {
            return Ok(parse_version(version)?.to_string());
        }
        if let Some(by) = &opts.increment_by {
            return Ok(increment(reference, by)?.to_string());
        }

        let choices = version_choices(reference)?;
        let labels: Vec<String> = choices
            .iter()
            .map(|(by, version)| format!("{} ({})", by.label(), version))
            .collect();
        let idx = self.prompt.select(
            &format!("Current version is {}. Next one?", reference),
            &labels,
            2,
        )?;
        choices
            .into_iter()
            .nth(idx)
            .map(|(_, version)| version)
            .ok_or_else(|| Error::Validation(format!("No version choice at index {}", idx)))
    }

    /// Writes `version` to every dirty package (and the root unless in single
    /// mode), then rewrites requirements of packages depending on them.
    pub fn write_versions(
        &self,
        workspace: &Workspace,
        dirty: &[String],
        version: &str,
        opts: &PublishOptions,
    ) -> Result<()> {
        let mut edited: IndexMap<String, Manifest> = IndexMap::new();

        let mut targets: Vec<&str> = dirty.iter().map(String::as_str).collect();
        if !opts.single && !targets.contains(&ROOT_PACKAGE) && workspace.root_package().is_some() {
            targets.push(ROOT_PACKAGE);
        }
        for name in targets {
            let package = workspace.require(name)?;
            let manifest = edited
                .entry(name.to_string())
                .or_insert_with(|| package.manifest.clone());
            let old = manifest.version().map(str::to_string);
            manifest.set_version(version);
            self.reporter
                .report_bump(package.display_name(), old.as_deref(), version);
        }

        if let Some(requirement) = opts.bump_dependents.requirement(version) {
            let dirty_set: HashSet<&str> = dirty.iter().map(String::as_str).collect();
            for package in workspace.packages().filter(|p| !dirty_set.contains(p.name.as_str())) {
                for dep_type in DepType::ALL {
                    for dep in dirty {
                        if package.manifest.dep_range(dep_type, dep).is_none() {
                            continue;
                        }
                        let manifest = edited
                            .entry(package.name.clone())
                            .or_insert_with(|| package.manifest.clone());
                        manifest.set_dep(dep_type, dep, &requirement);
                        self.reporter
                            .report_dependent(package.display_name(), dep, &requirement);
                    }
                }
            }
        }

        for (name, manifest) in &edited {
            let package = workspace.require(name)?;
            self.store.write(&package.manifest_path, manifest)?;
        }
        Ok(())
    }

    /// Prepends `## <version> (<date>)` to the changelog, if there is one.
    pub fn add_changelog_line(&self, version: &str, changelog_path: &str) -> Result<()> {
        let path = self.store.root().join(changelog_path);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            warn!("Could not find changelog ({}). Skipped update", path.display());
            return Ok(());
        };
        let line = format!(
            "## {} ({}-{}-{})",
            version,
            self.today.year(),
            self.today.month(),
            self.today.day()
        );
        std::fs::write(&path, format!("{}\n\n{}", line, contents))?;
        Ok(())
    }

    /// Runs `npm publish` serially for every public dirty package.
    pub async fn publish_packages(
        &self,
        workspace: &Workspace,
        dirty: &[String],
        opts: &PublishOptions,
    ) -> Result<()> {
        let order: Vec<String> = if opts.graph_order {
            DependencyGraph::new(workspace)
                .traversal_order()
                .iter()
                .filter(|name| dirty.contains(*name))
                .cloned()
                .collect()
        } else {
            dirty.to_vec()
        };

        let command = opts.publish_command();
        let mut jobs = Vec::with_capacity(order.len());
        for name in &order {
            let package = workspace.require(name)?;
            if package.is_private() {
                info!("Skipping private package {}", package.display_name());
                continue;
            }
            jobs.push(Job::new(
                package.display_name(),
                workspace.package_dir(package),
                command.clone(),
            ));
        }

        let scheduler = JobScheduler::new(
            Arc::clone(&self.runner),
            SchedulerOptions {
                mode: ExecutionMode::Serial,
                ..SchedulerOptions::default()
            },
        );
        scheduler.run(jobs).await?;
        Ok(())
    }
}
