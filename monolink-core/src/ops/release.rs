use std::fs;

use tracing::{debug, info, warn};

use crate::config::WorkspaceOptions;
use crate::error::{Error, Result};
use crate::release::{parse_version, PublishOptions, ReleaseEngine, ReleaseOutcome};
use crate::release_reporter::ReleaseReporter;

use super::OpContext;

/// Root manifest attributes copied to sub-packages by [`prepublish`].
pub const DEFAULT_COPY_ATTRS: &[&str] = &[
    "description",
    "keywords",
    "author",
    "license",
    "homepage",
    "bugs",
    "repository",
];

/// Validates sub-package versions and copies shared files and attributes
/// from the root to every public sub-package.
pub fn prepublish(ctx: &OpContext, copy_attrs: &[String]) -> Result<()> {
    let workspace = ctx.workspace(true)?;
    let root = workspace
        .root_package()
        .ok_or_else(|| Error::Validation("Missing root package manifest".to_string()))?;
    let root_version = parse_version(root.version())?;
    let public: Vec<_> = workspace.sub_packages().filter(|p| !p.is_private()).collect();

    for package in &public {
        let version = parse_version(package.version()).map_err(|_| {
            Error::Validation(format!(
                "Invalid version for {}: {}",
                package.name,
                package.version()
            ))
        })?;
        if version > root_version {
            return Err(Error::Validation(format!(
                "Version for {} ({}) > master version ({})",
                package.name, version, root_version
            )));
        }
    }

    let root_dir = ctx.store.root();
    for package in &public {
        let readme = if root.manifest.name() == Some(package.name.as_str()) {
            "README.md"
        } else {
            "README-LINK.md"
        };
        let src = root_dir.join(readme);
        let dst = workspace.package_dir(package).join("README.md");
        if !src.is_file() {
            warn!("Could not find {}, not copied to {}", readme, package.name);
            continue;
        }
        debug!("Copying {} -> {}...", src.display(), dst.display());
        fs::copy(&src, &dst)?;
    }

    info!("Updating package attributes: {}", copy_attrs.join(", "));
    for package in &public {
        let mut manifest = package.manifest.clone();
        for attr in copy_attrs {
            if let Some(value) = root.manifest.get(attr) {
                manifest.set(attr, value.clone());
            }
        }
        if manifest != package.manifest {
            ctx.store.write(&package.manifest_path, &manifest)?;
        }
    }

    warn!("Please make sure you commit all changes before you attempt a publish");
    Ok(())
}

/// Releases every package changed since the last tag.
pub async fn publish<R>(ctx: &OpContext, opts: &PublishOptions, reporter: R) -> Result<ReleaseOutcome>
where
    R: ReleaseReporter + 'static,
{
    let workspace = if opts.single {
        let root_only = WorkspaceOptions {
            src: Vec::new(),
            ..ctx.options.clone()
        };
        ctx.store.load_workspace(&root_only, true)?
    } else {
        ctx.workspace(true)?
    };

    let engine = ReleaseEngine::new(
        &ctx.store,
        ctx.vcs.clone(),
        ctx.runner.clone(),
        ctx.prompt.clone(),
        reporter,
    );
    engine.release(&workspace, opts).await
}

/// Writes `version` to every manifest, the root included.
///
/// Returns `false` if the user declined.
pub fn reset_all_versions(ctx: &OpContext, version: &str, confirm: bool) -> Result<bool> {
    let version = parse_version(version)?.to_string();
    let workspace = ctx.workspace(true)?;

    if confirm {
        let message = format!(
            "Are you sure you want to reset the version number of all packages, including the monorepo root, to {} ({} package/s, including monorepo)?",
            version,
            workspace.len()
        );
        if !ctx.prompt.confirm(&message, false)? {
            return Ok(false);
        }
    }

    for package in workspace.packages() {
        let mut manifest = package.manifest.clone();
        manifest.set_version(&version);
        ctx.store.write(&package.manifest_path, &manifest)?;
    }
    Ok(true)
}
