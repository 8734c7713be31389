use super::{open_context, report_outcome, MediaArgs};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, PathManager};
use media_sync_models::Rating;

pub async fn run_rate(
    config: &Config,
    paths: &PathManager,
    service: Option<&str>,
    media: &MediaArgs,
    rating: u8,
    output: &Output,
) -> Result<()> {
    let identity = media.identity()?;
    let rating = Rating::new(rating).ok_or_else(|| eyre!("Rating must be between 1 and 10, got {}", rating))?;
    let context = open_context(config, paths, service)?;
    let outcome = context
        .rate(&identity, rating)
        .await
        .map_err(|e| eyre!("Failed to rate {} on {}: {}", identity.label(), context.service_name(), e))?;

    report_outcome(output, "rate", &identity, &outcome);
    Ok(())
}
