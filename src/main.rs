use std::process;

use clap::Parser;
use rosa_roles::{
  Cli, Commands,
  cli::{CreateCommands, ListCommands, UpgradeCommands, VerifyCommands},
};
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  let subscriber = FmtSubscriber::builder()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .without_time()
    .finish();
  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

  let result = match &cli.commands {
    Commands::Create(args) => match &args.command {
      CreateCommands::AccountRoles(args) => rosa_roles::create(&cli, args).await,
    },
    Commands::Upgrade(args) => match &args.command {
      UpgradeCommands::AccountRoles(args) => rosa_roles::upgrade(&cli, args).await,
    },
    Commands::Verify(args) => match &args.command {
      VerifyCommands::AccountRoles(args) => rosa_roles::verify(&cli, args).await,
    },
    Commands::List(args) => match &args.command {
      ListCommands::AccountRoles(args) => rosa_roles::list(&cli, args).await,
    },
  };

  match result {
    Ok(outcome) => process::exit(outcome.exit_code()),
    Err(err) => {
      eprintln!("{err:#}");
      process::exit(2);
    }
  }
}
