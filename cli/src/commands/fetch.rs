//! `gce-backend fetch`: list the instance URLs of one group.

use anyhow::Result;
use clap::Args;
use gce_backend_common::ManagerKey;

use crate::app::AppContext;
use crate::application::services::discovery;

#[derive(Args)]
pub struct FetchArgs {
    /// Instance group manager key: "<base_name> <revision> <zone>"
    pub key: ManagerKey,
}

/// Run the fetch command.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the compute API fails.
pub async fn run(app: &AppContext, args: &FetchArgs) -> Result<()> {
    let urls = discovery::fetch(
        &app.store,
        &app.compute,
        &args.key,
        app.config.discovery.page_size,
    )
    .await?;
    app.emit(&urls, || urls.join("\n"))
}
