use hoist_core::ItemStatus;

/// Format a key-value pair for display.
pub fn kv(key: &str, value: &str) -> String {
    format!("{key:>12}: {value}")
}

/// Format a header line.
pub fn header(title: &str) -> String {
    format!("=== {title} ===")
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// One status line for an item, e.g. `[uploading]  photos/a.jpg`.
pub fn status_line(status: ItemStatus, name: &str, detail: Option<&str>) -> String {
    let tag = format!("[{status}]");
    match detail {
        Some(detail) => format!("{tag:<12} {name} ({detail})"),
        None => format!("{tag:<12} {name}"),
    }
}
