mod cli;
mod config;
mod doctor;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Doctor(args) => doctor::run(args).await,
    }
}
