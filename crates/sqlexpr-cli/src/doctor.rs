use crate::cli::DoctorArgs;
use crate::config::{ConfigFile, ProjectConfig};
use colored::Colorize;
use sqlexpr::{CheckOutcome, Doctor, DoctorReport, PgConnection, StaticConnection};
use tokio_postgres::NoTls;

/// Where the doctor takes its connection from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Database(String),
    Static {
        driver: String,
        server_version: Option<String>,
    },
}

pub async fn run(args: DoctorArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let file = if args.config.exists() {
        ProjectConfig::load(args.config.clone())?.file
    } else {
        ConfigFile::default()
    };
    let target = resolve_target(&args, &file, std::env::var("DATABASE_URL").ok())?;

    let report = match target {
        Target::Database(url) => {
            let conn = connect(&url).await?;
            Doctor::run(&conn)
        }
        Target::Static {
            driver,
            server_version,
        } => {
            let mut conn = StaticConnection::new(driver.as_str());
            if let Some(v) = server_version {
                conn = conn.with_version(v.as_str());
            }
            Doctor::run(&conn)
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.success() {
        anyhow::bail!("doctor: {} check(s) failed", report.failures().count());
    }
    Ok(())
}

fn resolve_target(
    args: &DoctorArgs,
    file: &ConfigFile,
    env_url: Option<String>,
) -> anyhow::Result<Target> {
    if let Some(url) = &args.database {
        return Ok(Target::Database(url.clone()));
    }
    if let Some(driver) = args.driver.clone().or_else(|| file.database.driver.clone()) {
        let server_version = args
            .server_version
            .clone()
            .or_else(|| file.database.server_version.clone());
        // A configured URL wins only when the driver is not overridden on the command line.
        if args.driver.is_none() {
            if let Some(url) = &file.database.url {
                return Ok(Target::Database(url.clone()));
            }
        }
        return Ok(Target::Static {
            driver,
            server_version,
        });
    }
    if let Some(url) = file.database.url.clone().or(env_url) {
        return Ok(Target::Database(url));
    }
    anyhow::bail!(
        "no connection configured; pass --driver or --database, or set database.driver in {}",
        args.config.display()
    )
}

async fn connect(database_url: &str) -> anyhow::Result<PgConnection> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("postgres connection error: {e}");
        }
    });
    Ok(PgConnection::from_client(client).await?)
}

fn print_report(report: &DoctorReport) {
    let version = report.server_version.as_deref().unwrap_or("unknown");
    println!(
        "{} {} (server version {})",
        "driver".bold(),
        report.driver.cyan(),
        version
    );
    for check in &report.checks {
        let mark = match check.outcome {
            CheckOutcome::Passed => "✓".green().bold(),
            CheckOutcome::Failed => "✗".red().bold(),
            CheckOutcome::Ignored => "-".bright_black(),
        };
        println!("  {} {:<15} {}", mark, check.name, check.message);
    }
    if report.success() {
        println!("{}", "all checks passed".green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use std::path::PathBuf;

    fn args() -> DoctorArgs {
        DoctorArgs {
            config: PathBuf::from("sqlexpr.toml"),
            database: None,
            driver: None,
            server_version: None,
            json: false,
        }
    }

    #[test]
    fn database_flag_wins() {
        let mut a = args();
        a.database = Some("postgres://a".to_string());
        a.driver = Some("mysql".to_string());
        assert_eq!(
            resolve_target(&a, &ConfigFile::default(), None).unwrap(),
            Target::Database("postgres://a".to_string())
        );
    }

    #[test]
    fn driver_flag_overrides_config_url() {
        let mut a = args();
        a.driver = Some("sqlite".to_string());
        let file = ConfigFile {
            database: DatabaseConfig {
                url: Some("postgres://b".to_string()),
                driver: None,
                server_version: Some("3.45".to_string()),
            },
        };
        assert_eq!(
            resolve_target(&a, &file, None).unwrap(),
            Target::Static {
                driver: "sqlite".to_string(),
                server_version: Some("3.45".to_string()),
            }
        );
    }

    #[test]
    fn falls_back_to_env_url() {
        assert_eq!(
            resolve_target(&args(), &ConfigFile::default(), Some("postgres://env".to_string()))
                .unwrap(),
            Target::Database("postgres://env".to_string())
        );
    }

    #[test]
    fn nothing_configured_is_an_error() {
        assert!(resolve_target(&args(), &ConfigFile::default(), None).is_err());
    }
}
