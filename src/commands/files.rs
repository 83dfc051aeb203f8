use anyhow::{Context as _, Result};
use materialize::{DestRoot, HostDirectory, Materializer, RootDirectory, SchemeFetcher};
use std::path::PathBuf;

use crate::Context;
use crate::cli::FilesArgs;
use crate::document::Document;
use crate::settings::{IdentitySource, Settings};
use crate::ui;

/// What a run landed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub links: usize,
}

pub fn run(ctx: &Context, args: FilesArgs) -> Result<()> {
    let document = Document::load(&args.document)?;
    if document.is_empty() {
        log::info!("{} declares nothing", args.document.display());
        if !ctx.quiet {
            ui::info("Nothing to do");
        }
        return Ok(());
    }

    let root = args.root.unwrap_or_else(|| ctx.settings.root.clone());
    let materializer = materializer_for(&ctx.settings, root.clone());
    let summary = apply(&materializer, &document)?;

    if !ctx.quiet {
        ui::success(&format!(
            "Wrote {} file(s) and {} link(s) under {}",
            summary.files,
            summary.links,
            root.display()
        ));
    }
    Ok(())
}

fn materializer_for(settings: &Settings, root: PathBuf) -> Materializer {
    let root = DestRoot::new(root);
    let materializer = Materializer::new(root.clone())
        .with_fetcher(SchemeFetcher::new(settings.retry_config()));
    match settings.identities {
        IdentitySource::Root => materializer.with_identities(RootDirectory::new(root)),
        IdentitySource::Host => materializer.with_identities(HostDirectory),
    }
}

/// Land every file, then every link, in document order. The first failure
/// stops the run.
pub fn apply(materializer: &Materializer, document: &Document) -> Result<Summary> {
    let mut summary = Summary::default();

    for file in &document.files {
        let path = &file.node.path;
        let op = materializer
            .prepare_fetch(file)
            .with_context(|| format!("Invalid file entry {path}"))?;
        materializer
            .perform_fetch(op)
            .with_context(|| format!("Failed to write {path}"))?;
        summary.files += 1;
    }

    for link in &document.links {
        let path = &link.node.path;
        materializer
            .delete_path_on_overwrite(&link.node)
            .with_context(|| format!("Failed to clear {path}"))?;
        materializer
            .write_link(link)
            .with_context(|| format!("Failed to create link {path}"))?;
        summary.links += 1;
    }

    Ok(summary)
}
