//! Turns document keys into safe file names.

/// Characters rejected in file names on at least one supported platform.
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Removes every character that cannot appear in a file name.
///
/// Control characters are dropped too. A key made only of illegal characters
/// becomes `_` so the resulting file is never hidden or nameless.
pub fn sanitize_file_name(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .filter(|c| !c.is_control() && !ILLEGAL.contains(c))
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_separators_and_colons() {
        assert_eq!(sanitize_file_name("a/b:c"), "abc");
        assert_eq!(sanitize_file_name(r"user\42|x"), "user42x");
    }

    #[test]
    fn keeps_ordinary_keys() {
        assert_eq!(sanitize_file_name("order::2024-01-01"), "order2024-01-01");
        assert_eq!(sanitize_file_name("beer_21st_amendment"), "beer_21st_amendment");
        assert_eq!(sanitize_file_name("café ☕"), "café ☕");
    }

    #[test]
    fn drops_control_characters() {
        assert_eq!(sanitize_file_name("line\nbreak\t\0"), "linebreak");
    }

    #[test]
    fn empty_result_gets_placeholder() {
        assert_eq!(sanitize_file_name("/:*"), "_");
        assert_eq!(sanitize_file_name(""), "_");
    }
}
