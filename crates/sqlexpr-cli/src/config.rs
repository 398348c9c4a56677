use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    #[allow(dead_code)]
    pub config_path: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;
        let file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to load config file {}: {e}",
                config_path.display()
            )
        })?;
        Ok(Self { config_path, file })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL; when set the doctor connects to it.
    pub url: Option<String>,
    /// Driver name used without a connection.
    pub driver: Option<String>,
    pub server_version: Option<String>,
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.expand_env()?;
        file.validate()?;
        Ok(file)
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        let db = &mut self.database;
        for field in [&mut db.url, &mut db.driver, &mut db.server_version] {
            if let Some(v) = field.as_mut() {
                *v = expand_env_vars(v)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let db = &self.database;
        if db.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            anyhow::bail!("database.url must not be empty");
        }
        if db.driver.as_deref().is_some_and(|d| d.trim().is_empty()) {
            anyhow::bail!("database.driver must not be empty");
        }
        if db.url.is_some() {
            if let Some(driver) = &db.driver {
                if sqlexpr::Driver::from(driver.as_str()) != sqlexpr::Driver::Postgres {
                    anyhow::bail!("database.url requires the pgsql driver, got {driver}");
                }
            }
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
