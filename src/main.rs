use anyhow::Context;
use bf2cc_monitor_core::{
    args::Args,
    monitor::{open_session, DataFiles},
    settings::{self, AppDetails, Settings},
    LogHub, Monitor,
};
use clap::Parser;

mod tracing_setup;

pub const APP: AppDetails<'static> = AppDetails {
    qualifier: "org.bf2cc",
    organization: "BF2CC",
    application: "BF2CCMonitor",
};

fn main() -> anyhow::Result<()> {
    let _guard = tracing_setup::init_tracing();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| {
        Settings::default_file_location(APP).unwrap_or_else(|e| {
            tracing::error!("Failed to find a suitable location to store settings ({e}). Settings will be written to {}", settings::CONFIG_FILE_NAME);
            settings::CONFIG_FILE_NAME.into()
        })
    });
    let mut settings = Settings::load_or_create(config_path)
        .context("Failed to load settings. Please fix any issues mentioned and try again.")?;
    settings.save_ok();

    // Overrides from the command line are not saved
    settings.apply_args(&args);

    let data_directory = settings
        .data_directory(APP)
        .context("Failed to find a directory for the monitor's data")?;
    tracing::debug!("Using data directory {data_directory:?}");

    let hub = LogHub::default();
    let mut monitor = Monitor::load(DataFiles::in_directory(&data_directory), hub);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?
        .block_on(async {
            let rcon = open_session(&settings)
                .await
                .with_context(|| format!("Failed to open a session with {}", settings.address))?;

            let result = tokio::select! {
                result = monitor.run(rcon, settings.poll_interval()) => result,
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::error!("Error with Ctrl+C handler: {e}");
                    }
                    tracing::info!("Saving and exiting.");
                    Ok(())
                }
            };

            monitor.save_ok();
            result.context("Lost the session with the server")
        })
}
