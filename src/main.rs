use clap::{Parser, Subcommand};
use icmsc::cmd::{
    assess::AssessCommand, history::HistoryCommand, schema::SchemaCommand,
    validate::ValidateCommand,
};

#[derive(Parser, Debug)]
#[command(name = "icmsc", version, about = "ICMS period assessment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess one company period
    Assess(AssessCommand),
    /// List recorded assessments
    History(HistoryCommand),
    /// Check an input file for classification and reference problems
    Validate(ValidateCommand),
    /// Print the expected input formats
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Assess(cmd) => cmd.exec(),
        Command::History(cmd) => cmd.exec(),
        Command::Validate(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
