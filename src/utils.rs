use chrono::{DateTime, Utc};

/// Relative label such as "3 days ago" for API views.
pub fn format_date_label(date: DateTime<Utc>) -> String {
    format_date_label_at(date, Utc::now())
}

pub fn format_date_label_at(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - date).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    match () {
        _ if seconds < 45 => "less than a minute ago".to_string(),
        _ if seconds < 90 => "1 minute ago".to_string(),
        _ if minutes < 45 => format!("{} minutes ago", (seconds + 30) / 60),
        _ if minutes < 90 => "about 1 hour ago".to_string(),
        _ if hours < 24 => format!("about {} hours ago", (minutes + 30) / 60),
        _ if hours < 42 => "1 day ago".to_string(),
        _ if days < 30 => format!("{} days ago", (hours + 12) / 24),
        _ if days < 45 => "about 1 month ago".to_string(),
        _ if days < 60 => "about 2 months ago".to_string(),
        _ if days < 365 => format!("{} months ago", days / 30),
        _ => {
            let years = days / 365;
            if years == 1 {
                "about 1 year ago".to_string()
            } else {
                format!("about {} years ago", years)
            }
        }
    }
}

/// Collects a length violation for a trimmed text field.
pub fn check_length(
    errors: &mut Vec<String>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    message: &str,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(format!("{}: {}", field, message));
    }
}

/// Trims an optional text input, mapping blank strings to `None`.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
