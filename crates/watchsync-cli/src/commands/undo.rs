use super::{open_context, report_outcome, MediaArgs};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, PathManager};

pub async fn run_undo(
    config: &Config,
    paths: &PathManager,
    service: Option<&str>,
    media: &MediaArgs,
    output: &Output,
) -> Result<()> {
    let identity = media.identity()?;
    let context = open_context(config, paths, service)?;
    let outcome = context
        .undo(&identity)
        .await
        .map_err(|e| eyre!("Failed to undo {} on {}: {}", identity.label(), context.service_name(), e))?;

    report_outcome(output, "undo", &identity, &outcome);
    Ok(())
}
