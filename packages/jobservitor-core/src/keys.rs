//! Centralized store keyspace formatting.
//!
//! Both the API and the executor worker must agree on these strings; keeping
//! the formatting in one place avoids the "string-literal queue key
//! composition" divergence risk between callers.

use uuid::Uuid;

use crate::job::GpuType;

pub fn record_key(id: Uuid) -> String {
    format!("jobservitor:{id}")
}

pub fn queue_key(gpu_type: GpuType, dc: &str, region: &str) -> String {
    format!("jobservitor:queue:{}:{}:{}", gpu_type.as_key(), dc, region)
}
