use super::{open_context, report_outcome, MediaArgs};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, PathManager};
use media_sync_models::{MediaKind, Observation, PartialDate};

#[allow(clippy::too_many_arguments)]
pub async fn run_watch(
    config: &Config,
    paths: &PathManager,
    service: Option<&str>,
    media: &MediaArgs,
    episode: Option<u32>,
    total_episodes: Option<u32>,
    date: Option<PartialDate>,
    output: &Output,
) -> Result<()> {
    let identity = media.identity()?;
    let observation = match identity.kind {
        MediaKind::Movie => {
            if episode.is_some() || total_episodes.is_some() {
                output.warn("Episode numbers are ignored for movies");
            }
            Observation::Movie
        }
        MediaKind::Show => Observation::Show {
            episode,
            total_episodes,
        },
    };

    let context = open_context(config, paths, service)?;
    let now = date.unwrap_or_else(PartialDate::now);
    let outcome = context
        .watch(&identity, &observation, now)
        .await
        .map_err(|e| eyre!("Failed to record {} on {}: {}", identity.label(), context.service_name(), e))?;

    report_outcome(output, "watch", &identity, &outcome);
    Ok(())
}

/// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD` into a validated date.
pub fn parse_date(value: &str) -> Result<PartialDate, String> {
    let mut parts = value.trim().split('-');
    let parse = |part: Option<&str>, name: &str| -> Result<Option<u32>, String> {
        part.map(|p| p.parse::<u32>().map_err(|_| format!("invalid {} '{}' in '{}'", name, p, value)))
            .transpose()
    };

    let year = parts
        .next()
        .filter(|y| !y.is_empty())
        .ok_or_else(|| format!("missing year in '{}'", value))?
        .parse::<i32>()
        .map_err(|_| format!("invalid year in '{}'", value))?;
    let month = parse(parts.next(), "month")?;
    let day = parse(parts.next(), "day")?;
    if parts.next().is_some() {
        return Err(format!("expected YYYY, YYYY-MM or YYYY-MM-DD, got '{}'", value));
    }

    PartialDate::new(year, month, day).map_err(|e| e.to_string())
}
