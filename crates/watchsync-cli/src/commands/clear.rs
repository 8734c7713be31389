use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, PathManager};
use media_sync_core::FileOriginalDateStore;
use media_sync_sources::LocalListService;

pub async fn run_clear(
    config: &Config,
    paths: &PathManager,
    all: bool,
    lists: bool,
    original_dates: bool,
    output: &Output,
) -> Result<()> {
    if !(all || lists || original_dates) {
        output.warn("No clear option specified. Use --lists, --original-dates or --all");
        output.info("\nExample: watchsync clear --lists");
        return Ok(());
    }

    if all || lists {
        clear_lists(config, paths, output).await?;
    }
    if all || original_dates {
        clear_original_dates(paths, output).await?;
    }
    Ok(())
}

async fn clear_lists(config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    let mut cleared_any = false;
    for service in config.enabled_services() {
        let list_file = paths.local_list_file(&service.name);
        if !list_file.exists() {
            continue;
        }
        let list = LocalListService::open(&service.name, &list_file)
            .map_err(|e| eyre!("Failed to open list at {}: {}", list_file.display(), e))?;
        let removed = list
            .clear()
            .await
            .map_err(|e| eyre!("Failed to clear {}: {}", list_file.display(), e))?;
        output.success(format!("Cleared {} entries from the {} list", removed, service.name));
        cleared_any = true;
    }
    if !cleared_any {
        output.info("No local lists found to clear");
    }
    Ok(())
}

async fn clear_original_dates(paths: &PathManager, output: &Output) -> Result<()> {
    let dates_file = paths.original_dates_file();
    if !dates_file.exists() {
        output.info("No original completion dates found to clear");
        return Ok(());
    }
    let store = FileOriginalDateStore::open(&dates_file)
        .map_err(|e| eyre!("Failed to open {}: {}", dates_file.display(), e))?;
    let removed = store.clear_all().await?;
    output.success(format!(
        "Forgot {} original completion date(s); rewatches started before now can no longer restore them",
        removed
    ));
    Ok(())
}
