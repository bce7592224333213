use std::path::Path;

fn is_shell_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"@%+=:,./-_".contains(&byte)
}

/// Quote `path` for a POSIX shell. Paths made only of safe characters are left
/// bare; everything else is wrapped in single quotes with `'` written as `'\''`.
///
/// Works on the raw path bytes, so names that are not valid UTF-8 survive
/// unchanged inside the quotes.
pub fn escape_posix(path: &Path) -> Vec<u8> {
    let bytes = path.as_os_str().as_encoded_bytes();
    if bytes.is_empty() {
        return b"''".to_vec();
    }
    if bytes.iter().copied().all(is_shell_safe) {
        return bytes.to_vec();
    }

    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'\'');
    for &byte in bytes {
        if byte == b'\'' {
            quoted.extend_from_slice(b"'\\''");
        } else {
            quoted.push(byte);
        }
    }
    quoted.push(b'\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(path: &str) -> String {
        String::from_utf8(escape_posix(Path::new(path))).unwrap()
    }

    #[test]
    fn test_escape_posix() {
        assert_eq!(escaped("/foo/bar.txt"), "/foo/bar.txt");
        assert_eq!(escaped("/foo's/bar.txt"), "'/foo'\\''s/bar.txt'");
        assert_eq!(escaped("/foo bar/baz.txt"), "'/foo bar/baz.txt'");
        assert_eq!(escaped("/foo$bar/`baz`.txt"), "'/foo$bar/`baz`.txt'");
        assert_eq!(escaped("/a\nb"), "'/a\nb'");
        assert_eq!(escaped(""), "''");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_bytes_kept_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/old/caf\xe9.txt"));
        assert_eq!(escape_posix(path), b"'/old/caf\xe9.txt'".to_vec());

        let path = Path::new(OsStr::from_bytes(b"/old/it's\xff"));
        assert_eq!(escape_posix(path), b"'/old/it'\\''s\xff'".to_vec());
    }
}
