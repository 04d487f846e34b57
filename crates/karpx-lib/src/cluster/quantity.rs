//! Kubernetes resource quantity parsing

const MIB: f64 = 1024.0 * 1024.0;

/// Parse a CPU quantity (`"100m"`, `"1"`, `"0.5"`, `"500000n"`) to millicores.
/// Unparseable quantities count as zero.
pub fn parse_cpu_millicores(quantity: &str) -> u64 {
    let quantity = quantity.trim();

    // (digits, multiplier, divisor) relative to millicores
    let (number, multiplier, divisor) = if let Some(val) = quantity.strip_suffix('n') {
        (val, 1.0, 1e6)
    } else if let Some(val) = quantity.strip_suffix('u') {
        (val, 1.0, 1e3)
    } else if let Some(val) = quantity.strip_suffix('m') {
        (val, 1.0, 1.0)
    } else {
        (quantity, 1000.0, 1.0)
    };

    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| (n * multiplier / divisor).round() as u64)
        .unwrap_or(0)
}

/// Parse a memory quantity (`"128Mi"`, `"1Gi"`, `"500M"`, `"1048576"`) to MiB,
/// rounding down and saturating. Unparseable quantities count as zero.
pub fn parse_memory_mib(quantity: &str) -> u64 {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", MIB),
        ("Gi", MIB * 1024.0),
        ("Ti", MIB * 1024.0 * 1024.0),
        ("Pi", MIB * 1024.0 * 1024.0 * 1024.0),
        ("Ei", MIB * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("k", 1e3),
        ("K", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let quantity = quantity.trim();
    // (digits, multiplier, divisor) relative to bytes
    let (number, multiplier, divisor) = match quantity.strip_suffix('m') {
        Some(val) => (val, 1.0, 1000.0),
        None => SUFFIXES
            .iter()
            .find_map(|(suffix, mult)| quantity.strip_suffix(suffix).map(|n| (n, *mult, 1.0)))
            .unwrap_or((quantity, 1.0, 1.0)),
    };

    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| (n * multiplier / divisor / MIB).floor() as u64)
        .unwrap_or(0)
}
