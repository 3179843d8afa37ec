use anyhow::{Context, Result};
use std::env;

/// Process configuration, read once at boot from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub problem_service_url: String,
    pub jwt_secret: String,
    pub docker_socket: String,
    pub worker_concurrency: usize,
    pub test_timeout_ms: u64,
    pub compile_run_timeout_ms: u64,
    pub memory_limit_mb: u64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub push_endpoints: Vec<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, default)
        .parse::<T>()
        .with_context(|| format!("invalid value for {}", name))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        Ok(Self {
            port: parse_var("PORT", "5001")?,
            mongo_uri: var_or("MONGO_URI", "mongodb://127.0.0.1:27017"),
            mongo_db: var_or("MONGO_DB", "verdict"),
            redis_host: var_or("REDIS_HOST", "127.0.0.1"),
            redis_port: parse_var("REDIS_PORT", "6379")?,
            problem_service_url: var_or(
                "PROBLEM_SERVICE_URL",
                "http://127.0.0.1:4000/api/problems",
            ),
            jwt_secret,
            docker_socket: var_or("DOCKER_SOCKET", "/var/run/docker.sock"),
            worker_concurrency: parse_var("WORKER_CONCURRENCY", "1")?,
            test_timeout_ms: parse_var("TEST_TIMEOUT_MS", "4000")?,
            compile_run_timeout_ms: parse_var("COMPILE_RUN_TIMEOUT_MS", "10000")?,
            memory_limit_mb: parse_var("MEMORY_LIMIT_MB", "512")?,
            cpu_period: parse_var("CPU_PERIOD", "100000")?,
            cpu_quota: parse_var("CPU_QUOTA", "50000")?,
            push_endpoints: var_or("PUSH_ENDPOINTS", "http://127.0.0.1:5001")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    pub fn memory_limit_bytes(&self) -> i64 {
        (self.memory_limit_mb * 1024 * 1024) as i64
    }
}
