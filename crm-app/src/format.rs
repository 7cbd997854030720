use time::{Date, OffsetDateTime};

/// `$` followed by the amount with two decimals, no grouping, no locale.
pub fn format_currency(v: f64) -> String {
    let v = if v.is_finite() { v } else { 0.0 };
    // Avoid rendering "-0.00" for values that round to zero.
    let v = if round_cents(v) == 0.0 { 0.0 } else { v };
    format!("${:.2}", v)
}

pub fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Reads the longest numeric prefix of `input` (after leading whitespace),
/// the same way a float-prefix parser does: `"12abc"` is 12, `"abc"` is 0.
/// Empty, unparsable and non-finite input yields 0.
pub fn parse_amount(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    match s[..end].parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// `YYYY-MM-DD` (optionally followed by a time part) rendered as `M/D/YYYY`.
/// Anything unparsable is returned unchanged.
pub fn format_date(input: &str) -> String {
    let trimmed = input.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    match parse_ymd(day_part) {
        Some(d) => format!("{}/{}/{}", u8::from(d.month()), d.day(), d.year()),
        None => trimmed.to_string(),
    }
}

pub fn parse_ymd(input: &str) -> Option<Date> {
    let format = time::format_description::parse("[year]-[month]-[day]").ok()?;
    Date::parse(input.trim(), &format).ok()
}

/// Fixed-width UTC timestamp so that string ordering matches time ordering.
pub fn now_iso() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.microsecond()
    )
}

pub fn today_ymd() -> String {
    let d = OffsetDateTime::now_utc().date();
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' || ch == ' ';
        out.push(if ok { ch } else { '_' });
    }
    let trimmed = out.trim().to_string();
    if trimmed.is_empty() { "document".to_string() } else { trimmed }
}
