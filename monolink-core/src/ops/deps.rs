use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::package::{parse_dep, DepType, Workspace};
use crate::runner::{shell_quote, ExecOptions};
use crate::transaction::ManifestTransaction;

use super::OpContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepOperation {
    Add,
    Remove,
    Upgrade,
}

impl DepOperation {
    fn yarn_verb(&self) -> &'static str {
        match self {
            DepOperation::Add => "add",
            DepOperation::Remove => "remove",
            DepOperation::Upgrade => "upgrade",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepOptions {
    pub dev: bool,
    pub peer: bool,
    pub optional: bool,
    pub exact: bool,
    pub tilde: bool,
    pub ignore_engines: bool,
}

impl DepOptions {
    fn dep_type(&self) -> DepType {
        if self.dev {
            DepType::DevDependencies
        } else if self.peer {
            DepType::PeerDependencies
        } else if self.optional {
            DepType::OptionalDependencies
        } else {
            DepType::Dependencies
        }
    }

    fn flags(&self, op: DepOperation) -> Vec<&'static str> {
        let candidates: &[(bool, &'static str)] = match op {
            DepOperation::Add => &[
                (self.dev, "--dev"),
                (self.peer, "--peer"),
                (self.optional, "--optional"),
                (self.exact, "--exact"),
                (self.tilde, "--tilde"),
            ],
            DepOperation::Remove => &[],
            DepOperation::Upgrade => &[(self.ignore_engines, "--ignore-engines")],
        };
        candidates
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| *flag)
            .collect()
    }
}

/// Adds, removes or upgrades dependencies of one package.
///
/// External dependencies are handed to `yarn` inside a transaction. Internal
/// ones never reach `yarn`: they are edited directly in the set of links the
/// transaction restores.
pub async fn add_remove_upgrade(
    ctx: &OpContext,
    package_name: &str,
    op: DepOperation,
    deps: &[String],
    opts: &DepOptions,
) -> Result<()> {
    let workspace = ctx.workspace(true)?;
    let package = workspace.require(package_name)?;
    let matcher = workspace.matcher();

    let mut external = Vec::new();
    let mut internal = Vec::new();
    for spec in deps {
        let (name, range) = parse_dep(spec);
        if matcher.is_internal(&name) {
            internal.push((name, range));
        } else {
            external.push(spec.as_str());
        }
    }

    let mut tx = ManifestTransaction::begin(&ctx.store, package, matcher)?;
    for (name, range) in &internal {
        match op {
            DepOperation::Add => {
                let range = match range {
                    Some(range) => range.clone(),
                    None => default_internal_range(&workspace, name),
                };
                let record = tx.removed_mut();
                record.forget(name);
                record.insert(opts.dep_type(), name, &range);
                info!("Linking {}@{}", name, range);
            }
            DepOperation::Remove => {
                if !tx.removed_mut().forget(name) {
                    warn!("{} is not a dependency of {}", name, package.display_name());
                }
            }
            DepOperation::Upgrade => match range {
                Some(range) => {
                    if !tx.removed_mut().set_range(name, range) {
                        warn!("{} is not a dependency of {}", name, package.display_name());
                    }
                }
                None => debug!("Skipping internal dependency {} without a range", name),
            },
        }
    }

    if external.is_empty() && (op != DepOperation::Upgrade || !internal.is_empty()) {
        return tx.commit();
    }

    let mut cmd = format!("yarn {}", op.yarn_verb());
    for spec in &external {
        cmd.push(' ');
        cmd.push_str(&shell_quote(spec));
    }
    for flag in opts.flags(op) {
        cmd.push(' ');
        cmd.push_str(flag);
    }

    info!("Executing '{}'...", cmd);
    let exec = ExecOptions::new(workspace.package_dir(package)).with_label(format!("[{}]", package.display_name()));
    match ctx.runner.execute(&cmd, &exec).await {
        Ok(_) => tx.commit(),
        Err(e) => {
            if let Err(restore_err) = tx.abort() {
                warn!("Could not roll back {}: {}", package.manifest_path.display(), restore_err);
            }
            Err(e)
        }
    }
}

// Siblings get `^<their version>`, other link-pattern matches `*`.
fn default_internal_range(workspace: &Workspace, name: &str) -> String {
    match workspace.get(name) {
        Some(sibling) if !sibling.version().is_empty() => format!("^{}", sibling.version()),
        _ => "*".to_string(),
    }
}

/// Sets the range of each dependency everywhere it is declared.
///
/// Returns the range chosen for every dependency.
pub async fn bump(ctx: &OpContext, deps: &[String]) -> Result<IndexMap<String, String>> {
    let workspace = ctx.workspace(true)?;
    let matcher = workspace.matcher();

    let mut versions = IndexMap::new();
    for spec in deps {
        let (name, range) = parse_dep(spec);
        let range = match range {
            Some(range) => range,
            None if matcher.is_known_package(&name) => default_internal_range(&workspace, &name),
            None if matcher.matches_link_pattern(&name) => "*".to_string(),
            None => {
                let output = ctx
                    .runner
                    .execute(
                        &format!("npm info {} version", shell_quote(&name)),
                        &ExecOptions::new(ctx.store.root()),
                    )
                    .await?;
                let latest = output.stdout.trim();
                if latest.is_empty() {
                    return Err(Error::Validation(format!("Could not find a version for {}", name)));
                }
                format!("^{}", latest)
            }
        };
        versions.insert(name, range);
    }
    info!("New versions of these packages: {:?}", versions);

    for package in workspace.packages() {
        let mut manifest = package.manifest.clone();
        let mut changed = false;
        for (name, range) in &versions {
            for dep_type in DepType::ALL {
                if manifest.dep_range(dep_type, name).is_some_and(|r| r != range) {
                    manifest.set_dep(dep_type, name, range);
                    changed = true;
                }
            }
        }
        if changed {
            ctx.store.write(&package.manifest_path, &manifest)?;
        }
    }
    Ok(versions)
}

/// Removes dependencies from every package. Returns how many manifests
/// changed.
pub fn remove_all(ctx: &OpContext, deps: &[String]) -> Result<usize> {
    let workspace = ctx.workspace(true)?;
    let names: Vec<String> = deps.iter().map(|spec| parse_dep(spec).0).collect();

    let mut changed_count = 0;
    for package in workspace.packages() {
        let mut manifest = package.manifest.clone();
        let mut changed = false;
        for name in &names {
            for dep_type in DepType::ALL {
                changed |= manifest.remove_dep(dep_type, name).is_some();
            }
        }
        if changed {
            ctx.store.write(&package.manifest_path, &manifest)?;
            changed_count += 1;
        }
    }
    Ok(changed_count)
}
