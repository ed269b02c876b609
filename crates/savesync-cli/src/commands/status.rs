use savesync_core::storage::{CloudError, CloudStore, LocalSaveStore};

use crate::commands::common::{format_status_lines, Context, SideStatus, StatusItem};
use crate::error::CliError;

pub async fn run_status(context: &Context, as_json: bool) -> Result<(), CliError> {
    let status = collect_status(context).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in format_status_lines(&status) {
        println!("{line}");
    }
    Ok(())
}

/// Read both sides without writing, recovering or uploading anything.
pub async fn collect_status(context: &Context) -> Result<StatusItem, CliError> {
    let local = match context.open_local()?.read_local() {
        Ok(Some(save)) => SideStatus::Present {
            metadata: save.metadata().clone(),
        },
        Ok(None) => SideStatus::Missing,
        Err(error) => SideStatus::Unreadable {
            reason: error.to_string(),
        },
    };

    let cloud_store = context.open_cloud()?;
    let fetched = match context.config.cloud_timeout {
        Some(timeout) => tokio::time::timeout(timeout, cloud_store.fetch_metadata())
            .await
            .unwrap_or_else(|_| Err(CloudError::Unavailable("status check timed out".to_string()))),
        None => cloud_store.fetch_metadata().await,
    };
    let cloud = match fetched {
        Ok(metadata) => SideStatus::Present { metadata },
        Err(CloudError::NotFound) => SideStatus::Missing,
        Err(error) => SideStatus::Unreadable {
            reason: error.to_string(),
        },
    };

    Ok(StatusItem::new(local, cloud))
}
