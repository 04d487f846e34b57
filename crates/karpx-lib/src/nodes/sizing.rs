//! Minimum node sizing derived from the largest observed pod

/// vCPU buckets considered for node sizing, ascending
pub const CPU_BUCKETS: [u32; 7] = [2, 4, 8, 16, 32, 48, 64];

/// Memory buckets in MiB, ascending
pub const MEMORY_BUCKETS_MIB: [u64; 8] = [2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144];

/// Minimum vCPUs per node: the largest pod's request plus 20% headroom,
/// rounded up to the next bucket. Requests beyond the largest bucket saturate.
pub fn min_node_cpu(max_pod_cpu_millis: u64) -> u32 {
    // ceil(millis * 1.2) without floating point
    let needed_millis = max_pod_cpu_millis.saturating_mul(6).div_ceil(5);
    CPU_BUCKETS
        .iter()
        .copied()
        .find(|&vcpu| u64::from(vcpu) * 1000 >= needed_millis)
        .unwrap_or(CPU_BUCKETS[CPU_BUCKETS.len() - 1])
}

/// Minimum memory per node in MiB: the largest pod's request plus 25% headroom,
/// rounded up to the next bucket. Requests beyond the largest bucket saturate.
pub fn min_node_memory_mib(max_pod_memory_mib: u64) -> u64 {
    let needed_mib = max_pod_memory_mib.saturating_mul(5).div_ceil(4);
    MEMORY_BUCKETS_MIB
        .iter()
        .copied()
        .find(|&bucket| bucket >= needed_mib)
        .unwrap_or(MEMORY_BUCKETS_MIB[MEMORY_BUCKETS_MIB.len() - 1])
}

/// Every vCPU bucket at or above the node minimum
pub fn cpu_sizes(min_cpu: u32) -> Vec<u32> {
    CPU_BUCKETS.iter().copied().filter(|&vcpu| vcpu >= min_cpu).collect()
}
