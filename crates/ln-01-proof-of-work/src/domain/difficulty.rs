//! Difficulty measurement and stall relaxation.

/// Expand every character to its 8-bit code, zero padded.
pub fn bin_convert(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 8);
    for byte in s.bytes() {
        out.push_str(&format!("{:08b}", byte));
    }
    out
}

/// Length of the common prefix of two bit strings.
pub fn shared_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// Requirement after a stall of `gap_secs` since the last accepted block.
///
/// Returns `None` while the gap is within the stall threshold.
pub fn relaxed_requirement(
    required: f64,
    gap_secs: f64,
    stall_threshold_secs: f64,
    min_difficulty: f64,
) -> Option<f64> {
    if gap_secs <= stall_threshold_secs {
        return None;
    }
    let emergency = stall_threshold_secs * 2.0;
    let relaxed = if gap_secs > emergency {
        required - 1.0 - 10.0 * (gap_secs - emergency) / stall_threshold_secs
    } else {
        required + 1.0 - gap_secs / stall_threshold_secs
    };
    Some(relaxed.max(min_difficulty))
}
