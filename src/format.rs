//! Human-readable distances, durations and maneuver glyphs.

use crate::route::Maneuver;

/// `"350m"` below a kilometer, `"1.2km"` above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// `"12 min"` below an hour, `"1h 5m"` above.
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    if minutes < 60 {
        format!("{} min", minutes)
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

pub fn maneuver_glyph(maneuver: &Maneuver) -> &'static str {
    match (maneuver.kind.as_str(), maneuver.modifier.as_deref()) {
        ("turn", Some("left")) => "↰",
        ("turn", Some("right")) => "↱",
        ("turn", Some("slight left")) => "↖",
        ("turn", Some("slight right")) => "↗",
        ("turn", Some("sharp left")) => "↺",
        ("turn", Some("sharp right")) => "↻",
        ("depart", _) => "🚶",
        ("arrive", _) => "🎯",
        ("merge", _) | ("roundabout", _) => "🔄",
        ("fork", _) => "Y",
        ("end of road", _) => "⤴",
        _ => "↑",
    }
}
