/// Sanitize a thread name into a filesystem-safe slug (§4.3): lowercase,
/// collapse non-alphanumeric runs to a single `-`, trim leading/trailing `-`;
/// an empty result sanitises to `"untitled"`.
pub fn sanitize_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_trims() {
        assert_eq!(sanitize_name("  Hello, World!! "), "hello-world");
    }

    #[test]
    fn empty_becomes_untitled() {
        assert_eq!(sanitize_name("###"), "untitled");
        assert_eq!(sanitize_name(""), "untitled");
    }

    #[test]
    fn lowercases() {
        assert_eq!(sanitize_name("CamelCase"), "camelcase");
    }
}
