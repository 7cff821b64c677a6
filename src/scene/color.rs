//! Deterministic material colors

/// Hue in degrees derived from a part id
///
/// Sum of the UTF-16 code units times 137.5, modulo 360.
pub fn part_hue(part_id: &str) -> f64 {
    let sum: u64 = part_id.encode_utf16().map(u64::from).sum();
    (sum as f64 * 137.5) % 360.0
}

/// `#rrggbb` for an HSL color (h in degrees, s and l in percent)
pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let s = s / 100.0;
    let l = l / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Material color of a part
pub fn part_color(part_id: &str) -> String {
    hsl_to_hex(part_hue(part_id), 70.0, 60.0)
}
