//! Percentage and letter-grade computation for marks entry.

/// 0.0 when the total is not positive; callers validate totals at the edge.
pub fn percentage(marks: f64, total: f64) -> f64 {
    if total > 0.0 {
        100.0 * marks / total
    } else {
        0.0
    }
}

/// One-decimal display rounding.
pub fn round_percent(p: f64) -> f64 {
    (p * 10.0).round() / 10.0
}

/// Static threshold table. The grade comes from the unrounded percentage.
pub fn letter_grade(percent: f64) -> &'static str {
    if percent >= 90.0 {
        "A+"
    } else if percent >= 80.0 {
        "A"
    } else if percent >= 70.0 {
        "B+"
    } else if percent >= 60.0 {
        "B"
    } else if percent >= 50.0 {
        "C"
    } else if percent >= 40.0 {
        "D"
    } else {
        "F"
    }
}
