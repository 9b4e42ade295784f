use crate::demo::{run_demo, run_trend, DemoArgs, TrendArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use clinic_quality::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Clinic Quality Engine",
    about = "Score program quality, raise threshold alerts, and gate research enrollment",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print notifications, metric status, and enrollment eligibility for seeded clinic data
    Demo(DemoArgs),
    /// Analyze a metric history CSV (date,value) and print its trend
    Trend(TrendArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Trend(args) => run_trend(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_quality::workflows::quality::TrendPeriod;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["clinic-quality-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn trend_accepts_period_and_date() {
        let cli = Cli::try_parse_from([
            "clinic-quality-api",
            "trend",
            "--csv",
            "history.csv",
            "--period",
            "1year",
            "--today",
            "2024-06-30",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Trend(args)) => {
                assert_eq!(args.period, TrendPeriod::OneYear);
                assert_eq!(
                    args.today,
                    chrono::NaiveDate::from_ymd_opt(2024, 6, 30)
                );
            }
            other => panic!("expected trend command, got {other:?}"),
        }
    }

    #[test]
    fn unknown_period_is_rejected() {
        assert!(Cli::try_parse_from([
            "clinic-quality-api",
            "trend",
            "--csv",
            "history.csv",
            "--period",
            "fortnight",
        ])
        .is_err());
    }
}
