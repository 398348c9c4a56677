use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Doctor,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Doctor(DoctorArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub driver: Option<String>,
    pub server_version: Option<String>,
    pub json: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "doctor" => parse_doctor(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_doctor<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from("sqlexpr.toml");
    let mut database: Option<String> = None;
    let mut driver: Option<String> = None;
    let mut server_version: Option<String> = None;
    let mut json = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Doctor)),
            "--json" => json = true,
            "--config" => config = PathBuf::from(value(&mut it, "--config")?),
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--database" => database = Some(value(&mut it, "--database")?.to_string()),
            _ if token.starts_with("--database=") => {
                database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--driver" => driver = Some(value(&mut it, "--driver")?.to_string()),
            _ if token.starts_with("--driver=") => {
                driver = Some(token.trim_start_matches("--driver=").to_string());
            }
            "--server-version" => {
                server_version = Some(value(&mut it, "--server-version")?.to_string());
            }
            _ if token.starts_with("--server-version=") => {
                server_version = Some(token.trim_start_matches("--server-version=").to_string());
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Command::Doctor(DoctorArgs {
        config,
        database,
        driver,
        server_version,
        json,
    }))
}

fn value<'a>(it: &mut impl Iterator<Item = &'a str>, flag: &str) -> anyhow::Result<&'a str> {
    let Some(v) = it.next() else {
        anyhow::bail!("{flag} requires a value");
    };
    Ok(v)
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
sqlexpr - diagnostics for sqlexpr expressions

USAGE:
  sqlexpr <COMMAND> [OPTIONS]

COMMANDS:
  doctor        Check that expressions resolve and compile for a connection

Run `sqlexpr <command> --help` for more."
            );
        }
        HelpTopic::Doctor => {
            println!(
                "\
USAGE:
  sqlexpr doctor [OPTIONS]

OPTIONS:
  --config <FILE>             Config file path (default: sqlexpr.toml)
  --database <URL>            Connect to Postgres and read its server version
  --driver <NAME>             Driver without connecting (mysql, pgsql, sqlite, sqlsrv)
  --server-version <VERSION>  Server version to assume with --driver
  --json                      Print the report as JSON
  -h, --help                  Print help

The command exits non-zero when any check fails."
            );
        }
    }
}
