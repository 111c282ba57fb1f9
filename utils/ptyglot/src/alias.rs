//! Locale alias file lookup, consulted when a locale name misses the
//! built-in table. The file holds `alias canonical` lines, `#` starts a
//! comment; alias names ending in `:` (an older file format) match too.

use ptyglot_charset::registry::names_match;

pub fn lookup(path: &str, locale: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("");
        let mut fields = line.split_whitespace();
        let (Some(name), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let name = name.trim_end_matches(':');
        if names_match(name, locale) {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn alias_file(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("ptyglot-alias-{}", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn aliases_resolve_through_the_file() {
        let path = alias_file(
            "# comment line\n\
             ja_JP.ujis:\tja_JP.eucJP\n\
             french\tfr_FR.ISO8859-1 # trailing comment\n",
        );
        let path = path.to_str().unwrap();
        assert_eq!(lookup(path, "ja_JP.ujis").as_deref(), Some("ja_JP.eucJP"));
        assert_eq!(lookup(path, "french").as_deref(), Some("fr_FR.ISO8859-1"));
        assert_eq!(lookup(path, "german"), None);
    }

    #[test]
    fn missing_files_yield_nothing() {
        assert_eq!(lookup("/no/such/file", "anything"), None);
    }
}
