// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, the API client and the settings
//   location, then hand over to the interactive menu.
// - Exits non-zero when any remote request failed during the session.

use standup_cli::{api::ApiClient, logging, settings::SettingsStore, ui::main_menu};

fn main() -> anyhow::Result<()> {
    logging::init_logging();

    // Base URL comes from `STANDUP_API_URL`, see `api::ApiClient::from_env`.
    let api = ApiClient::from_env()?;
    let store = SettingsStore::default_location();
    tracing::debug!(base_url = api.base_url(), settings = %store.path().display(), "starting");

    let failures = main_menu(&api, &store)?;
    if failures > 0 {
        anyhow::bail!("{} request(s) failed", failures);
    }
    Ok(())
}
