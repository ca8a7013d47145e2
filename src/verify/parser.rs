//! Checksum-file parser (spec §4.8).
//!
//! Handles the heterogeneous shapes real GitHub releases ship: plain
//! `<hex>  <filename>` pairs (with optional `*` prefix and path
//! components), electron-style `latest-linux.yml` (base64 in a YAML
//! scalar), GitHub's header/column style, and single-hash-per-file
//! `<filename>.sha256` files whose entire content is the hex digest.

use data_encoding::BASE64;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("no checksum for {filename} found in the checksum file")]
    #[diagnostic(code(my_unicorn::verify::hash_not_found))]
    HashNotFound { filename: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChecksum {
    pub algorithm: String,
    pub hex: String,
}

/// Extracts the checksum for `target_filename` from `text`, trying each
/// format in turn. `checksum_file_name` is the name of the file `text` came
/// from, used to recognize the single-hash-per-file shape.
pub fn parse(text: &str, target_filename: &str, checksum_file_name: &str) -> Result<ParsedChecksum, ParseError> {
    let text = strip_bom(text);

    if let Some(parsed) = parse_single_hash_file(text, checksum_file_name) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_yaml(text, target_filename) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_line_based(text, target_filename) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_by_substring_search(text, target_filename) {
        return Ok(parsed);
    }

    Err(ParseError::HashNotFound { filename: target_filename.to_string() })
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn algorithm_for_hex_len(len: usize) -> Option<&'static str> {
    match len {
        128 => Some("sha512"),
        64 => Some("sha256"),
        40 => Some("sha1"),
        32 => Some("md5"),
        _ => None,
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// `<filename>.sha256`/`.sha512`: the whole (trimmed) file content is the
/// hex digest, no filename column at all.
fn parse_single_hash_file(text: &str, checksum_file_name: &str) -> Option<ParsedChecksum> {
    let lower = checksum_file_name.to_ascii_lowercase();
    if !(lower.ends_with(".sha256") || lower.ends_with(".sha512")) {
        return None;
    }

    let candidate = text.trim();
    // Some single-hash files still carry a trailing " filename" column; take
    // just the first whitespace-delimited token in that case.
    let token = candidate.split_whitespace().next().unwrap_or(candidate);
    if !is_hex(token) {
        return None;
    }

    let algorithm = if lower.ends_with(".sha512") { "sha512" } else { "sha256" };
    Some(ParsedChecksum { algorithm: algorithm.to_string(), hex: token.to_ascii_lowercase() })
}

/// electron's `latest-linux.yml`: a YAML document with a top-level (or
/// per-file) `sha512:` key whose value is base64, not hex.
fn parse_yaml(text: &str, target_filename: &str) -> Option<ParsedChecksum> {
    let mut current_url: Option<&str> = None;
    let mut top_level_sha512: Option<&str> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim_start().trim_start_matches("- ");

        if let Some(rest) = trimmed.strip_prefix("url:") {
            current_url = Some(unquote(rest.trim()));
        } else if let Some(rest) = trimmed.strip_prefix("sha512:") {
            let value = unquote(rest.trim());
            let belongs_to_target = current_url.map(|u| basename(u) == target_filename).unwrap_or(false);

            if belongs_to_target {
                return base64_to_hex(value).map(|hex| ParsedChecksum { algorithm: "sha512".to_string(), hex });
            }
            if current_url.is_none() && top_level_sha512.is_none() {
                top_level_sha512 = Some(value);
            }
        } else if trimmed.starts_with("path:") || trimmed.starts_with("size:") {
            // other per-file keys; url/sha512 pairing above already captured what we need.
        } else if !trimmed.starts_with(' ') && !trimmed.contains(':') {
            current_url = None;
        }
    }

    top_level_sha512.and_then(base64_to_hex).map(|hex| ParsedChecksum { algorithm: "sha512".to_string(), hex })
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"').trim_matches('\'')
}

fn base64_to_hex(value: &str) -> Option<String> {
    let bytes = BASE64.decode(value.as_bytes()).ok()?;
    Some(data_encoding::HEXLOWER.encode(&bytes))
}

/// `<hex>  <filename>` / `<hex>  ./path/to/<filename>`, optionally with a
/// leading `*` (binary-mode marker), separated by one or more whitespace
/// characters (spaces or tabs, CRLF-tolerant).
fn parse_line_based(text: &str, target_filename: &str) -> Option<ParsedChecksum> {
    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(hex_candidate) = parts.next() else { continue };
        let Some(path_candidate) = parts.next() else { continue };

        let hex_candidate = hex_candidate.strip_prefix('*').unwrap_or(hex_candidate);
        if !is_hex(hex_candidate) {
            continue;
        }

        let path_candidate = path_candidate.strip_prefix("./").unwrap_or(path_candidate);
        if basename(path_candidate) == target_filename {
            let Some(algorithm) = algorithm_for_hex_len(hex_candidate.len()) else { continue };
            return Some(ParsedChecksum { algorithm: algorithm.to_string(), hex: hex_candidate.to_ascii_lowercase() });
        }
    }

    None
}

/// GitHub-style files with headers/columns, or any line that simply
/// mentions the target filename somewhere alongside a hex token of
/// plausible length — a last-resort search before giving up.
fn parse_by_substring_search(text: &str, target_filename: &str) -> Option<ParsedChecksum> {
    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r');
        if !line.contains(target_filename) {
            continue;
        }

        for token in line.split(|c: char| c.is_whitespace() || c == '|' || c == ',') {
            let token = token.trim();
            if let Some(algorithm) = algorithm_for_hex_len(token.len())
                && is_hex(token)
            {
                return Some(ParsedChecksum { algorithm: algorithm.to_string(), hex: token.to_ascii_lowercase() });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_two_space_format() {
        let text = "d41d8cd98f00b204e9800998ecf8427e  App-x86_64.AppImage\n";
        let parsed = parse(text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.algorithm, "md5");
    }

    #[test]
    fn parses_star_prefixed_binary_marker() {
        let hex = "a".repeat(64);
        let text = format!("*{hex}  App-x86_64.AppImage\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.hex, hex);
        assert_eq!(parsed.algorithm, "sha256");
    }

    #[test]
    fn parses_path_bearing_line() {
        let hex = "b".repeat(64);
        let text = format!("{hex}  ./dist/App-x86_64.AppImage\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.hex, hex);
    }

    #[test]
    fn parses_crlf_and_mixed_whitespace() {
        let hex = "c".repeat(64);
        let text = format!("{hex}\t\tApp-x86_64.AppImage\r\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.hex, hex);
    }

    #[test]
    fn strips_bom_before_parsing() {
        let hex = "d".repeat(64);
        let text = format!("\u{feff}{hex}  App-x86_64.AppImage\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.hex, hex);
    }

    #[test]
    fn parses_single_hash_per_file_shape() {
        let hex = "e".repeat(64);
        let parsed = parse(&hex, "App-x86_64.AppImage", "App-x86_64.AppImage.sha256").unwrap();
        assert_eq!(parsed.hex, hex);
        assert_eq!(parsed.algorithm, "sha256");
    }

    #[test]
    fn parses_electron_latest_linux_yml() {
        let bytes = vec![1u8; 64];
        let b64 = BASE64.encode(&bytes);
        let text = format!(
            "version: 1.2.3\nfiles:\n  - url: App-x86_64.AppImage\n    sha512: {b64}\n    size: 123\npath: App-x86_64.AppImage\nsha512: {b64}\n"
        );
        let parsed = parse(&text, "App-x86_64.AppImage", "latest-linux.yml").unwrap();
        assert_eq!(parsed.algorithm, "sha512");
        assert_eq!(parsed.hex, data_encoding::HEXLOWER.encode(&bytes));
    }

    #[test]
    fn falls_back_to_basename_when_exact_path_absent() {
        let hex = "f".repeat(64);
        let text = format!("{hex}  some/other/dir/App-x86_64.AppImage\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap();
        assert_eq!(parsed.hex, hex);
    }

    #[test]
    fn returns_hash_not_found_when_filename_absent() {
        let text = format!("{}  OtherApp.AppImage\n", "a".repeat(64));
        let err = parse(&text, "App-x86_64.AppImage", "SHA256SUMS").unwrap_err();
        assert!(matches!(err, ParseError::HashNotFound { .. }));
    }

    #[test]
    fn parses_github_style_table_with_headers() {
        let hex = "a".repeat(64);
        let text = format!("| Filename | SHA256 |\n|---|---|\n| App-x86_64.AppImage | {hex} |\n");
        let parsed = parse(&text, "App-x86_64.AppImage", "checksums.txt").unwrap();
        assert_eq!(parsed.hex, hex);
    }
}
