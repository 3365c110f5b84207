use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "tinymap")]
#[command(about = "Runs the tinymap layer service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tinymap")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

fn default_database() -> String {
    "tinymap.db".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for App {
    fn default() -> Self {
        App {
            database: default_database(),
            port: default_port(),
        }
    }
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: App,
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not
    /// exist; the service is usable with zero configuration. `${VAR}`
    /// references in the file are substituted from the environment.
    pub fn new(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Config::default());
        }
        let yaml_str = fs::read_to_string(path)?;
        let yaml_with_env = substitute_env_vars(&yaml_str);
        Ok(serde_yaml::from_str(&yaml_with_env)?)
    }
}

fn substitute_env_vars(yaml_str: &str) -> String {
    let mut result = yaml_str.to_string();
    let mut offset = 0;

    while let Some(start) = result[offset..].find("${") {
        let start = offset + start;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let name = &result[start + 2..start + end];
        let value = env::var(name).unwrap_or_else(|_| {
            tracing::warn!("environment variable '{}' not set", name);
            String::new()
        });
        result.replace_range(start..start + end + 1, &value);
        offset = start + value.len();
    }

    result
}
