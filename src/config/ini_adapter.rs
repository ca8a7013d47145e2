//! A thin comment-preserving layer over `configparser::ini::Ini`.
//!
//! `configparser` owns tokenizing, typed access, and section structure; this
//! module only remembers which comment lines preceded which section/key so
//! `save_global` can put them back (spec §4.4 round-trip law, "ignoring
//! comment-block equivalence" aside — we go further and actually preserve
//! them).

use std::collections::HashMap;
use std::path::Path;

use configparser::ini::Ini;

use super::ConfigError;

/// Maps `"section"` or `"section.key"` to the raw comment lines that
/// immediately preceded it in the source file.
pub type CommentMap = HashMap<String, Vec<String>>;

pub struct Loaded {
    pub ini: Ini,
    pub comments: CommentMap,
}

pub fn load(path: &Path) -> Result<Loaded, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    let mut ini = Ini::new();
    ini.read(text.clone()).map_err(|message| ConfigError::Ini { path: path.to_path_buf(), message })?;

    Ok(Loaded { ini, comments: extract_comments(&text) })
}

fn extract_comments(text: &str) -> CommentMap {
    let mut comments = CommentMap::new();
    let mut pending: Vec<String> = Vec::new();
    let mut section = String::from("default");

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            pending.push(line.to_string());
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            section = trimmed[1..trimmed.len() - 1].to_ascii_lowercase();
            if !pending.is_empty() {
                comments.insert(section.clone(), std::mem::take(&mut pending));
            }
            continue;
        }

        if let Some((key, _)) = trimmed.split_once('=') {
            if !pending.is_empty() {
                comments.insert(format!("{section}.{}", key.trim()), std::mem::take(&mut pending));
            }
        }
    }

    comments
}

/// Renders `sections` (in order) back into INI text, inserting the comments
/// captured by `load` immediately before the section header or key they
/// originally preceded.
pub fn render(sections: &[(&str, Vec<(&str, String)>)], comments: &CommentMap) -> String {
    let mut out = String::new();

    for (section, entries) in sections {
        let section_key = section.to_ascii_lowercase();
        if let Some(lines) = comments.get(&section_key) {
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        if section.eq_ignore_ascii_case("default") {
            out.push_str("[DEFAULT]\n");
        } else {
            out.push_str(&format!("[{section}]\n"));
        }

        for (key, value) in entries {
            let key_lookup = format!("{section_key}.{key}");
            if let Some(lines) = comments.get(&key_lookup) {
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str(&format!("{key} = {value}\n"));
        }

        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_comments_keyed_by_section_and_key() {
        let text = "\
# top comment
[DEFAULT]
# explains retries
max_backup = 1
";
        let comments = extract_comments(text);
        assert_eq!(comments.get("default"), Some(&vec!["# top comment".to_string()]));
        assert_eq!(comments.get("default.max_backup"), Some(&vec!["# explains retries".to_string()]));
    }

    #[test]
    fn render_reinserts_comments_before_their_key() {
        let mut comments = CommentMap::new();
        comments.insert("network.retry_attempts".to_string(), vec!["; retries on failure".to_string()]);

        let sections = vec![("network", vec![("retry_attempts", "3".to_string())])];
        let rendered = render(&sections, &comments);

        assert!(rendered.contains("; retries on failure\nretry_attempts = 3"));
    }
}
