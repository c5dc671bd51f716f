//! Bidirectional mapping between project paths and the directory-safe names
//! the assistant uses for its per-project log folders.
//!
//! `/Users/foo/bar` <-> `-Users-foo-bar`, and on Windows
//! `C:\Users\foo` <-> `C--Users-foo`.

/// Encode an absolute project path into a directory-name-safe form.
///
/// Path separators become single dashes; a leading drive-letter colon `X:`
/// becomes `X-`, so the separator that follows it yields `X--…`.
pub fn encode(decoded: &str) -> String {
    let mut out = String::with_capacity(decoded.len());
    let bytes = decoded.as_bytes();

    let mut rest = decoded;
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        out.push(bytes[0] as char);
        out.push('-');
        rest = &decoded[2..];
    }

    for ch in rest.chars() {
        if ch == '/' || ch == '\\' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }

    out
}

/// Decode an encoded directory name back into a filesystem path.
///
/// A leading `X--` restores `X:\` with backslash separators; anything else
/// restores dashes to `/` rooted at `/`. Identity holds for every input
/// `encode` can produce.
pub fn decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();

    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b'-' && bytes[2] == b'-' {
        let rest = &encoded[3..];
        return format!("{}:\\{}", bytes[0] as char, rest.replace('-', "\\"));
    }

    let rest = encoded.strip_prefix('-').unwrap_or(encoded);
    format!("/{}", rest.replace('-', "/"))
}

/// Last non-empty segment of a decoded path; the human-facing project name.
pub fn project_name(decoded: &str) -> String {
    decoded
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(decoded)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_unix_path() {
        assert_eq!(encode("/Users/foo/bar"), "-Users-foo-bar");
        assert_eq!(encode("/home/dev/projects/memnex"), "-home-dev-projects-memnex");
    }

    #[test]
    fn test_encode_windows_drive() {
        assert_eq!(encode("C:\\Users\\foo"), "C--Users-foo");
        assert_eq!(encode("D:\\work"), "D--work");
    }

    #[test]
    fn test_decode_unix_path() {
        assert_eq!(decode("-Users-foo-bar"), "/Users/foo/bar");
    }

    #[test]
    fn test_decode_windows_drive() {
        assert_eq!(decode("C--Users-foo"), "C:\\Users\\foo");
    }

    #[test]
    fn test_round_trip_identity() {
        for path in [
            "/Users/foo/bar",
            "/home/dev/projects/memnex",
            "C:\\Users\\foo\\code",
            "/",
        ] {
            assert_eq!(decode(&encode(path)), path, "round trip failed for {}", path);
        }
    }

    #[test]
    fn test_encode_root() {
        assert_eq!(encode("/"), "-");
        assert_eq!(decode("-"), "/");
    }

    #[test]
    fn test_project_name_last_segment() {
        assert_eq!(project_name("/Users/foo/bar"), "bar");
        assert_eq!(project_name("/Users/foo/bar/"), "bar");
        assert_eq!(project_name("C:\\Users\\foo"), "foo");
        assert_eq!(project_name("/"), "/");
    }
}
