use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use riseclock::alarm_editor::parse_weekday;
use riseclock::alarm_service::AlarmService;
use riseclock::commands::{self, AlarmEdits};
use riseclock::config::Config;

#[derive(Parser)]
#[command(version, about = "Spoken alarm clock")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Debug, Default)]
struct AlarmArgs {
    /// Time of day, e.g. `07:30` or `7:30 AM`
    #[arg(short, long)]
    time: Option<String>,
    #[arg(long)]
    task: Option<String>,
    /// Comma separated weekdays, e.g. `mon,tue` or `1,2`
    #[arg(short, long, value_delimiter = ',', value_parser = weekday)]
    days: Option<Vec<u8>>,
    /// Calendar date for a one-time alarm (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,
    /// Ring once instead of repeating; defaults to today
    #[arg(long)]
    once: bool,
}

impl From<AlarmArgs> for AlarmEdits {
    fn from(args: AlarmArgs) -> Self {
        Self {
            time: args.time,
            task: args.task,
            days: args.days,
            date: args.date,
            once: args.once,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show all alarms
    List,
    Add {
        #[command(flatten)]
        alarm: AlarmArgs,
    },
    Edit {
        id: u64,
        #[command(flatten)]
        alarm: AlarmArgs,
    },
    Toggle {
        id: u64,
    },
    Delete {
        id: u64,
    },
    /// Ask for a task idea for the given time
    Suggest {
        #[arg(short, long)]
        time: Option<String>,
    },
    /// Watch the clock and ring alarms until `q` or ctrl-c. Keeps watching
    /// when stdin is closed.
    Run,
}

fn weekday(raw: &str) -> Result<u8, String> {
    parse_weekday(raw).ok_or_else(|| format!("not a weekday: {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "loaded configuration");
    let service = AlarmService::from_config(&config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::List => {
            let alarms = commands::list_alarms(&service).map_err(|e| anyhow!(e))?;
            if alarms.is_empty() {
                println!("no alarms");
            }
            for alarm in &alarms {
                println!("{}", commands::format_alarm(alarm));
            }
        }
        Commands::Add { alarm } => {
            let alarm = commands::add_alarm(&service, alarm.into()).map_err(|e| anyhow!(e))?;
            println!("{}", commands::format_alarm(&alarm));
            finish_speaking(&service).await?;
        }
        Commands::Edit { id, alarm } => {
            let alarm =
                commands::edit_alarm(&service, id, alarm.into()).map_err(|e| anyhow!(e))?;
            println!("{}", commands::format_alarm(&alarm));
            finish_speaking(&service).await?;
        }
        Commands::Toggle { id } => {
            match commands::toggle_alarm(&service, id).map_err(|e| anyhow!(e))? {
                Some(alarm) => println!("{}", commands::format_alarm(&alarm)),
                None => println!("no alarm #{id}"),
            }
        }
        Commands::Delete { id } => {
            commands::delete_alarm(&service, id).map_err(|e| anyhow!(e))?;
            println!("deleted #{id}");
        }
        Commands::Suggest { time } => {
            let suggestion =
                commands::suggest_task(&service, time.as_deref()).map_err(|e| anyhow!(e))?;
            if suggestion.is_empty() {
                println!("no suggestion available");
            } else {
                println!("{suggestion}");
            }
        }
        Commands::Run => run(&service, &config).await?,
    }

    Ok(())
}

async fn run(service: &AlarmService, config: &Config) -> anyhow::Result<()> {
    println!("watching alarms; Enter or `d` dismisses, `m` motivates, `q` or ctrl-c quits");
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "could not listen for ctrl-c");
        }
    };
    commands::watch(
        service,
        config.tick_interval,
        BufReader::new(tokio::io::stdin()),
        shutdown,
    )
    .await
    .map_err(|e| anyhow!(e))
}

async fn finish_speaking(service: &AlarmService) -> anyhow::Result<()> {
    let service = service.clone();
    tokio::task::spawn_blocking(move || service.finish_speaking()).await?;
    Ok(())
}
