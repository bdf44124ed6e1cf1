//! Parser for the uploader's ad-hoc progress stream.
//!
//! One line of mixed stdout/stderr goes in; a typed [`UploadProgress`]
//! comes out when the line is a transfer-stats line. Anything else is the
//! caller's diagnostic material. Lines are ANSI-stripped first and leading
//! date/level prefixes are tolerated because the stats token is located by
//! search, not by position.

use crate::model::UploadProgress;

const TRANSFER_TOKEN: &str = "transferred:";

/// Parses one child-output line. `None` means "not a progress line".
pub fn parse_progress_line(line: &str) -> Option<UploadProgress> {
    let clean = strip_ansi(line);
    let lower = clean.to_ascii_lowercase();
    let token_at = lower.find(TRANSFER_TOKEN)?;
    let payload = &clean[token_at + TRANSFER_TOKEN.len()..];

    let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
    let (uploaded, total) = split_size_pair(fields.first()?)?;

    let mut percent: Option<u8> = None;
    let mut speed: Option<String> = None;
    for field in fields.iter().skip(1) {
        if let Some(number) = field.strip_suffix('%') {
            percent = number.trim().parse::<f64>().ok().map(clamp_percent);
        } else if field.contains("/s") {
            let field = field.strip_prefix("@ ").unwrap_or(field);
            speed = Some(field.to_string());
        }
    }

    let percent = percent
        .or_else(|| derive_percent(&uploaded, &total))
        .unwrap_or(if uploaded.eq_ignore_ascii_case(&total) {
            100
        } else {
            0
        });

    Some(UploadProgress {
        percent,
        speed: speed.unwrap_or_else(|| "0 B".to_string()),
        uploaded,
        total,
    })
}

/// The "<uploaded> / <total>" (or "<uploaded>/<total>") leading field.
/// Both sides must look like an amount with a unit.
fn split_size_pair(field: &str) -> Option<(String, String)> {
    let (left, right) = field.split_once('/')?;
    let left = left.trim();
    let right = right.trim();
    let looks_sized =
        |side: &str| !side.is_empty() && side.chars().any(|c| c.is_ascii_alphabetic());
    if looks_sized(left) && looks_sized(right) {
        Some((left.to_string(), right.to_string()))
    } else {
        None
    }
}

fn derive_percent(uploaded: &str, total: &str) -> Option<u8> {
    let uploaded = parse_human_size(uploaded)?;
    let total = parse_human_size(total)?;
    if total <= 0.0 {
        return None;
    }
    Some(clamp_percent(uploaded / total * 100.0))
}

fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Parses human byte sizes such as "52.403 MiB", "1 GiB", "958M".
pub fn parse_human_size(input: &str) -> Option<f64> {
    let input = input.trim();
    let number_len = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(input.len());
    let amount: f64 = input[..number_len].parse().ok()?;
    let unit = input[number_len..].trim();
    let factor = match unit.to_ascii_lowercase().as_str() {
        "b" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        "pb" => 1e15,
        "k" | "kib" => 1024.0,
        "m" | "mib" => 1024.0 * 1024.0,
        "g" | "gib" => 1024.0 * 1024.0 * 1024.0,
        "t" | "tib" => 1024.0f64.powi(4),
        "p" | "pib" => 1024.0f64.powi(5),
        _ => return None,
    };
    Some(amount * factor)
}

/// Removes ANSI CSI sequences and bare carriage returns.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    // Consume parameter/intermediate bytes up to the final
                    // byte of the sequence.
                    for seq in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&seq) {
                            break;
                        }
                    }
                }
            }
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}
