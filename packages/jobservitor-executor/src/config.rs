use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use jobservitor_core::GpuType;

/// Executor worker configuration, loaded once at startup. Mirrors the
/// `Config::from_env` pattern used by the scheduler API binary: `.env` is
/// read best-effort, then every setting comes from `std::env::var` with
/// `anyhow::Context` on required values and sane defaults otherwise.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_uri: String,
    pub worker_id: String,
    pub gpu_type: GpuType,
    pub cpu_cores: u32,
    pub memory_gb: u32,
    pub dc: String,
    pub region: String,
    pub idle_time: Duration,
    pub blocking_time: Duration,
    pub record_ttl_seconds: Option<u64>,
}

fn parse_gpu_type(raw: &str) -> GpuType {
    match raw {
        "NVIDIA" => GpuType::Nvidia,
        "AMD" => GpuType::Amd,
        "Intel" => GpuType::Intel,
        _ => GpuType::Any,
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let redis_uri = env::var("REDIS_URI").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());

        let name_prefix = env::var("EXECUTOR_NAME").unwrap_or_else(|_| "executor-1".to_string());
        let local_ip = local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "unknown-ip".to_string());
        let worker_id = format!("{name_prefix}-{local_ip}");

        let gpu_type = env::var("EXECUTOR_GPU_TYPE")
            .map(|v| parse_gpu_type(&v))
            .unwrap_or(GpuType::Any);

        let cpu_cores = match env::var("EXECUTOR_CPU_CORES") {
            Ok(v) => v.parse().context("EXECUTOR_CPU_CORES must be a valid number")?,
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
        };

        let memory_gb = match env::var("EXECUTOR_MEMORY_GB") {
            Ok(v) => v.parse().context("EXECUTOR_MEMORY_GB must be a valid number")?,
            Err(_) => detect_memory_gb(),
        };

        let dc = env::var("EXECUTOR_DATA_CENTER").unwrap_or_else(|_| "unknown-dc".to_string());
        // Intentional divergence from the upstream default: the source copy-pasted
        // "unknown-dc" here too. "unknown-region" is the intended value.
        let region = env::var("EXECUTOR_REGION").unwrap_or_else(|_| "unknown-region".to_string());

        let idle_time = Duration::from_secs(
            env::var("EXECUTOR_IDLE_TIME")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("EXECUTOR_IDLE_TIME must be a valid number of seconds")?,
        );
        let blocking_time = Duration::from_secs(
            env::var("EXECUTOR_BLOCKING_TIME")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("EXECUTOR_BLOCKING_TIME must be a valid number of seconds")?,
        );

        let record_ttl_seconds = match env::var("JOB_RECORD_TTL_SECONDS") {
            Ok(v) => Some(v.parse().context("JOB_RECORD_TTL_SECONDS must be a valid number")?),
            Err(_) => None,
        };

        Ok(Self {
            redis_uri,
            worker_id,
            gpu_type,
            cpu_cores,
            memory_gb,
            dc,
            region,
            idle_time,
            blocking_time,
            record_ttl_seconds,
        })
    }
}

fn detect_memory_gb() -> u32 {
    // Best-effort host memory detection; falls back to a conservative
    // default when /proc/meminfo isn't available (e.g. non-Linux dev boxes).
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|contents| {
            contents.lines().find_map(|line| {
                line.strip_prefix("MemTotal:")
                    .and_then(|rest| rest.trim().split_whitespace().next())
                    .and_then(|kb| kb.parse::<u64>().ok())
            })
        })
        .map(|kb| (kb / (1024 * 1024)).max(1) as u32)
        .unwrap_or(4)
}
