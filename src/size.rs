//! Human-readable byte sizes (1024-based)

const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count as e.g. `1.5 KB` or `3.18 MB`.
///
/// Values are rounded half-up to two decimals; anything past terabytes is
/// still expressed in TB.
pub fn readable_size(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }

    let mut scaled = bytes;
    let mut exponent = 0;
    while scaled >= 1024.0 && exponent < SUFFIXES.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }

    format!("{} {}", round_half_up(scaled, 2), SUFFIXES[exponent])
}

fn round_half_up(value: f64, places: i32) -> f64 {
    let pow = 10f64.powi(places);
    let digits = value * pow;
    let rounded = if digits.fract() >= 0.5 {
        digits.ceil()
    } else {
        digits.floor()
    };
    rounded / pow
}
