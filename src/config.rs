use crate::models::ScanRange;
use crate::scanner::DEFAULT_PROGRESS_INTERVAL;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DUMP_START_BLOCK: i64 = 4_080_066;
const DEFAULT_DUMP_END_BLOCK: i64 = 4_380_066;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc: RpcConfig,
    pub listen_ip: IpAddr,
    pub listen_port: u16,
    pub database_url: String,
    pub output_dir: PathBuf,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub urls: Vec<String>,
    pub request_timeout: Duration,
    pub max_retries: usize,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub progress_interval: u64,
    pub default_range: ScanRange,
    /// Largest range served synchronously over HTTP.
    pub max_http_range: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let urls = vars
            .get("JSON_RPC_URLS")
            .or_else(|| vars.get("JSON_RPC_URL"))
            .context("JSON_RPC_URLS or JSON_RPC_URL must be set in .env")?
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if urls.is_empty() {
            anyhow::bail!("JSON_RPC_URLS does not contain any URL");
        }

        let request_timeout =
            Duration::from_secs(parse_or(&vars, "REQUEST_TIMEOUT_SECS", 120u64)?);
        let max_retries = parse_or(&vars, "RPC_MAX_RETRIES", 5usize)?;

        let listen_ip = parse_or(&vars, "LISTEN_IP", IpAddr::from([127, 0, 0, 1]))?;
        let listen_port = parse_or(&vars, "LISTEN_PORT", 8080u16)?;

        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| "sqlite:./tokens.db".to_string());
        let output_dir = vars
            .get("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let start = parse_or(&vars, "DUMP_START_BLOCK", DEFAULT_DUMP_START_BLOCK)?;
        let end = parse_or(&vars, "DUMP_END_BLOCK", DEFAULT_DUMP_END_BLOCK)?;
        let default_range = ScanRange::new(start, end)
            .context("DUMP_START_BLOCK must not be greater than DUMP_END_BLOCK")?;

        Ok(Config {
            rpc: RpcConfig {
                urls,
                request_timeout,
                max_retries,
            },
            listen_ip,
            listen_port,
            database_url,
            output_dir,
            scan: ScanConfig {
                progress_interval: parse_or(
                    &vars,
                    "PROGRESS_INTERVAL",
                    DEFAULT_PROGRESS_INTERVAL,
                )?,
                default_range,
                max_http_range: parse_or(&vars, "MAX_HTTP_RANGE", 1000u64)?,
            },
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.listen_port)
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_rpc_is_set() {
        let config = Config::from_vars(vars(&[("JSON_RPC_URL", "http://localhost:8545")])).unwrap();

        assert_eq!(config.rpc.urls, vec!["http://localhost:8545"]);
        assert_eq!(config.rpc.request_timeout, Duration::from_secs(120));
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.database_url, "sqlite:./tokens.db");
        assert_eq!(config.scan.progress_interval, 50);
        assert_eq!(config.scan.default_range.start(), 4_080_066);
        assert_eq!(config.scan.default_range.end(), 4_380_066);
    }

    #[test]
    fn multiple_urls_are_split() {
        let config = Config::from_vars(vars(&[(
            "JSON_RPC_URLS",
            "http://a:8545, http://b:8545,",
        )]))
        .unwrap();
        assert_eq!(config.rpc.urls, vec!["http://a:8545", "http://b:8545"]);
    }

    #[test]
    fn missing_rpc_url_is_an_error() {
        let err = Config::from_vars(HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("JSON_RPC_URL"));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = Config::from_vars(vars(&[
            ("JSON_RPC_URL", "http://localhost:8545"),
            ("LISTEN_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LISTEN_PORT"));
    }

    #[test]
    fn inverted_dump_range_is_rejected() {
        let result = Config::from_vars(vars(&[
            ("JSON_RPC_URL", "http://localhost:8545"),
            ("DUMP_START_BLOCK", "10"),
            ("DUMP_END_BLOCK", "5"),
        ]));
        assert!(result.is_err());
    }
}
