//! Human-readable relative time labels ("3 hours ago", "in a minute").

/// Describe `then` relative to `now`, both in unix seconds.
///
/// Thresholds follow the conventional fuzzy buckets: up to 44 seconds is "a few
/// seconds", under 45 minutes counts minutes, under 22 hours counts hours, under
/// 26 days counts days, under 11 months counts months, and anything beyond that
/// counts years.
pub fn time_ago(then: i64, now: i64) -> String {
    let delta = now - then;
    let phrase = describe(delta.unsigned_abs() as f64);
    if delta < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn describe(elapsed_secs: f64) -> String {
    let seconds = elapsed_secs.round();
    let minutes = (elapsed_secs / 60.0).round();
    let hours = (elapsed_secs / 3_600.0).round();
    let days_exact = elapsed_secs / 86_400.0;
    let days = days_exact.round();
    let months_exact = days_exact * 4_800.0 / 146_097.0;
    let months = months_exact.round();
    let years = (months_exact / 12.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}

#[cfg(test)]
mod tests {
    use super::time_ago;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn buckets_past_durations() {
        assert_eq!(time_ago(NOW - 10, NOW), "a few seconds ago");
        assert_eq!(time_ago(NOW - 60, NOW), "a minute ago");
        assert_eq!(time_ago(NOW - 5 * 60, NOW), "5 minutes ago");
        assert_eq!(time_ago(NOW - 50 * 60, NOW), "an hour ago");
        assert_eq!(time_ago(NOW - 3 * 3_600, NOW), "3 hours ago");
        assert_eq!(time_ago(NOW - 30 * 3_600, NOW), "a day ago");
        assert_eq!(time_ago(NOW - 4 * 86_400, NOW), "4 days ago");
        assert_eq!(time_ago(NOW - 30 * 86_400, NOW), "a month ago");
        assert_eq!(time_ago(NOW - 90 * 86_400, NOW), "3 months ago");
        assert_eq!(time_ago(NOW - 365 * 86_400, NOW), "a year ago");
        assert_eq!(time_ago(NOW - 3 * 365 * 86_400, NOW), "3 years ago");
    }

    #[test]
    fn future_timestamps_read_forward() {
        assert_eq!(time_ago(NOW + 120, NOW), "in 2 minutes");
    }
}
