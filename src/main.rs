use clap::Parser;
use petwatch::app::Commands;
use petwatch::config::{Cli, Command, Settings};
use petwatch::core::client::TrackerClient;
use petwatch::core::Credentials;
use petwatch::utils::format::print_disclaimer;
use petwatch::utils::logger;
use petwatch::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.debug);

    let exit_code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                err.exit_code()
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted by user");
            130
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::from_env();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }

    if !matches!(cli.command, Command::LoginTest) {
        print_disclaimer();
    }

    let credentials = Credentials::resolve(&settings)?;
    let client = TrackerClient::new(&settings, credentials)?;
    let mut commands = Commands::new(client);

    match cli.command {
        Command::LoginTest => commands.login_test().await,
        Command::Trackers {
            format,
            battery_only,
        } => commands.trackers(format, battery_only).await,
        Command::Latest { tracker, format } => commands.latest(&tracker, format).await,
        Command::History {
            tracker,
            from_time,
            to_time,
            format,
            max_points,
        } => {
            commands
                .history(&tracker, &from_time, &to_time, format, max_points)
                .await
        }
        Command::Geofences { tracker } => commands.geofences(&tracker).await,
        Command::Live { tracker, on, .. } => commands.live(&tracker, on).await,
    }
}
