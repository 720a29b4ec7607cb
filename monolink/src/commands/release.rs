//! Release commands.

use anyhow::{anyhow, Result};
use clap::Args;
use monolink_core::config::BumpDependents;
use monolink_core::ops::{self, DEFAULT_COPY_ATTRS};
use monolink_core::release::{IncrementBy, PublishOptions, ReleaseOutcome};

use crate::formatting::{print_section_header, print_success, print_summary_box, print_warning};

use super::release_reporter::CliReleaseReporter;
use super::Session;

#[derive(Args, Clone, Debug, Default)]
pub struct PublishArgs {
    /// Treat the repository root as the only package
    #[arg(long, action)]
    single: bool,
    /// Skip branch, uncommitted and unpulled checks
    #[arg(long, action)]
    no_checks: bool,
    /// Allow publishing from a branch other than master/main
    #[arg(long, action)]
    no_master: bool,
    #[arg(long, action)]
    no_check_uncommitted: bool,
    #[arg(long, action)]
    no_check_unpulled: bool,
    /// Do not ask for confirmations
    #[arg(long, action)]
    no_confirm: bool,
    /// Do not write new versions (and do not commit)
    #[arg(long, action)]
    no_bump: bool,
    #[arg(long, action)]
    no_git_commit: bool,
    /// Do not run `npm publish`
    #[arg(long, action)]
    no_npm_publish: bool,
    /// Publish in discovery order instead of dependency order
    #[arg(long, action)]
    no_graph_order: bool,
    #[arg(long, action)]
    no_changelog: bool,
    #[arg(long)]
    new_version: Option<String>,
    /// major, minor, patch, rc, beta or alpha
    #[arg(long)]
    increment_version_by: Option<String>,
    #[arg(long)]
    publish_tag: Option<String>,
    #[arg(long)]
    otp: Option<String>,
    /// public or restricted
    #[arg(long)]
    access: Option<String>,
    /// no, range or exact
    #[arg(long)]
    bump_dependent_reqs: Option<String>,
    #[arg(long)]
    changelog_path: Option<String>,
}

impl PublishArgs {
    fn options(self, session: &Session) -> Result<PublishOptions> {
        let file = &session.config.publish;
        let defaults = PublishOptions::default();

        let bump_dependents = match self.bump_dependent_reqs.as_deref() {
            Some(value) => BumpDependents::from_str(value)
                .ok_or_else(|| anyhow!("Invalid --bump-dependent-reqs value: {} (expected no, range or exact)", value))?,
            None => file.bump_dependents.unwrap_or_default(),
        };
        let increment_by = self
            .increment_version_by
            .as_deref()
            .map(str::parse::<IncrementBy>)
            .transpose()?;

        Ok(PublishOptions {
            single: self.single,
            checks: !self.no_checks,
            allow_any_branch: self.no_master,
            check_uncommitted: !self.no_check_uncommitted,
            check_unpulled: !self.no_check_unpulled,
            confirm: !self.no_confirm,
            bump: !self.no_bump,
            git_commit: !self.no_git_commit,
            publish: !self.no_npm_publish,
            new_version: self.new_version,
            increment_by,
            publish_tag: self.publish_tag.or_else(|| file.publish_tag.clone()),
            otp: self.otp,
            access: self.access.or_else(|| file.access.clone()),
            bump_dependents,
            graph_order: !self.no_graph_order && file.graph_order.unwrap_or(defaults.graph_order),
            changelog: !self.no_changelog,
            changelog_path: self
                .changelog_path
                .or_else(|| file.changelog_path.clone())
                .unwrap_or(defaults.changelog_path),
        })
    }
}

pub fn cmd_prepublish(session: &Session, copy_attrs: Option<Vec<String>>) -> Result<()> {
    let attrs = copy_attrs
        .unwrap_or_else(|| DEFAULT_COPY_ATTRS.iter().map(|a| a.to_string()).collect());
    ops::prepublish(&session.ctx, &attrs)?;
    print_success("Prepublish finished");
    Ok(())
}

pub async fn cmd_publish(session: &Session, args: PublishArgs) -> Result<()> {
    let opts = args.options(session)?;
    if session.assume_yes && opts.new_version.is_none() && opts.increment_by.is_none() {
        return Err(anyhow!(
            "--yes needs an explicit version: pass --new-version or --increment-version-by"
        ));
    }
    print_section_header("Publish");

    match ops::publish(&session.ctx, &opts, CliReleaseReporter).await? {
        ReleaseOutcome::NothingToRelease => print_success("No packages need to be published"),
        ReleaseOutcome::Aborted => print_warning("Publish aborted"),
        ReleaseOutcome::Released {
            version,
            candidates,
        } => {
            let released: Vec<&str> = candidates
                .iter()
                .filter(|c| c.dirty)
                .map(|c| c.package.as_str())
                .collect();
            println!();
            print_summary_box(
                "Release",
                &[
                    ("Version", version),
                    ("Packages", released.join(", ")),
                    ("Published", opts.publish.to_string()),
                ],
            );
        }
    }
    println!();
    Ok(())
}

pub fn cmd_reset_all_versions(session: &Session, version: &str) -> Result<()> {
    if ops::reset_all_versions(&session.ctx, version, !session.assume_yes)? {
        print_success(&format!("All packages reset to {}", version));
    } else {
        print_warning("Nothing changed");
    }
    Ok(())
}
