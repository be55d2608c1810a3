use clap::Parser;
use relaybell::cli::{commands, Cli, Commands};
use relaybell::logging;
use relaybell::settings::Settings;
use relaybell::sync::{Destinations, VisibleRules};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("relaybell {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Config(opts) => commands::config(&settings, opts.action).await?,
        Commands::Destinations(opts) => {
            commands::edit_list(&settings, Destinations, opts.action).await?
        }
        Commands::Rules(opts) => {
            commands::edit_list(&settings, VisibleRules::default(), opts.action).await?
        }
        Commands::Toggle(opts) => commands::toggle(&settings, opts).await?,
        Commands::Provider(opts) => commands::provider(&settings, opts).await?,
        Commands::Notifications(opts) => commands::notifications(&settings, opts).await?,
        Commands::Logs(opts) => commands::logs(&settings, opts).await?,
        Commands::Watch(opts) => commands::watch(&settings, opts).await?,
        Commands::Version => {}
    }

    Ok(())
}
