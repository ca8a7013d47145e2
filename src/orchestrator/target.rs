//! Target parsing (spec §6): a CLI target is a bare catalog name, an
//! `owner/repo` pair, or a full GitHub URL.

use crate::config::CatalogStore;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A bundled catalog entry, resolved by name.
    Catalog(String),
    /// A GitHub `owner/repo` pair given directly or extracted from a URL.
    Repo { owner: String, repo: String },
}

/// Parses `raw` per spec §6: bare names are looked up in `catalog`; anything
/// containing a slash is either `owner/repo` or a GitHub URL.
pub fn parse(raw: &str, catalog: &CatalogStore) -> Result<Target, Error> {
    if let Some(rest) = strip_github_host(raw) {
        return parse_owner_repo(rest, raw);
    }

    if raw.contains('/') {
        return parse_owner_repo(raw, raw);
    }

    if catalog.contains(raw) {
        return Ok(Target::Catalog(raw.to_string()));
    }

    Err(Error::BadTarget { target: raw.to_string() })
}

fn strip_github_host(raw: &str) -> Option<&str> {
    for prefix in ["https://github.com/", "http://github.com/", "github.com/", "www.github.com/"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return Some(rest);
        }
    }
    None
}

fn parse_owner_repo(rest: &str, original: &str) -> Result<Target, Error> {
    let rest = rest.trim_end_matches('/');
    let mut segments = rest.splitn(3, '/');
    let owner = segments.next().filter(|s| !s.is_empty());
    let repo = segments.next().filter(|s| !s.is_empty());

    match (owner, repo) {
        (Some(owner), Some(repo)) => {
            let repo = repo.trim_end_matches(".git");
            Ok(Target::Repo { owner: owner.to_string(), repo: repo.to_string() })
        }
        _ => Err(Error::BadTarget { target: original.to_string() }),
    }
}

/// The app-state key/slug for a target: the catalog name for catalog
/// targets, or a lowercased repo name for URL/`owner/repo` targets.
pub fn app_slug(target: &Target) -> String {
    match target {
        Target::Catalog(name) => name.clone(),
        Target::Repo { repo, .. } => slugify(repo),
    }
}

fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_github_url() {
        let catalog = CatalogStore::bundled();
        let target = parse("https://github.com/nukeop/nuclear", &catalog).unwrap();
        assert_eq!(target, Target::Repo { owner: "nukeop".to_string(), repo: "nuclear".to_string() });
    }

    #[test]
    fn parses_owner_repo_shorthand() {
        let catalog = CatalogStore::bundled();
        let target = parse("pbek/QOwnNotes", &catalog).unwrap();
        assert_eq!(target, Target::Repo { owner: "pbek".to_string(), repo: "QOwnNotes".to_string() });
    }

    #[test]
    fn parses_bundled_catalog_name() {
        let catalog = CatalogStore::bundled();
        let target = parse("qownnotes", &catalog).unwrap();
        assert_eq!(target, Target::Catalog("qownnotes".to_string()));
    }

    #[test]
    fn unknown_bare_name_is_a_bad_target() {
        let catalog = CatalogStore::bundled();
        assert!(parse("does-not-exist", &catalog).is_err());
    }

    #[test]
    fn strips_trailing_git_suffix_and_slash() {
        let catalog = CatalogStore::bundled();
        let target = parse("https://github.com/nukeop/nuclear.git/", &catalog).unwrap();
        assert_eq!(target, Target::Repo { owner: "nukeop".to_string(), repo: "nuclear".to_string() });
    }

    #[test]
    fn app_slug_lowercases_repo_name() {
        let target = Target::Repo { owner: "pbek".to_string(), repo: "QOwnNotes".to_string() };
        assert_eq!(app_slug(&target), "qownnotes");
    }

    #[test]
    fn app_slug_keeps_catalog_name_verbatim() {
        assert_eq!(app_slug(&Target::Catalog("qownnotes".to_string())), "qownnotes");
    }
}
