use eframe::egui::Color32;
use image::Rgba;

/// Fully transparent cell (the "empty" color).
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pastel pink used when no color was ever picked.
pub const DEFAULT_COLOR_HEX: &str = "#ff66a3";
pub const DEFAULT_COLOR: Rgba<u8> = Rgba([0xff, 0x66, 0xa3, 0xff]);

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
///
/// Short form expands each nibble (`#f6a` → `#ff66aa`). Colors without an
/// alpha component are opaque.
pub fn parse_hex(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let n = u32::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        3 => {
            let r = ((n >> 8) & 0xF) as u8 * 17;
            let g = ((n >> 4) & 0xF) as u8 * 17;
            let b = (n & 0xF) as u8 * 17;
            Some(Rgba([r, g, b, 255]))
        }
        6 => Some(Rgba([(n >> 16) as u8, (n >> 8) as u8, n as u8, 255])),
        8 => Some(Rgba([
            (n >> 24) as u8,
            (n >> 16) as u8,
            (n >> 8) as u8,
            n as u8,
        ])),
        _ => None,
    }
}

/// Format as `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
pub fn to_hex(c: Rgba<u8>) -> String {
    let [r, g, b, a] = c.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

pub fn to_color32(c: Rgba<u8>) -> Color32 {
    let [r, g, b, a] = c.0;
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

pub fn from_color32(c: Color32) -> Rgba<u8> {
    Rgba(c.to_srgba_unmultiplied())
}
