//! On-disk layout and key-to-filename encoding for the disk tier.
//!
//! Every cache instance owns one flat directory under the shared
//! `DiskCache/` namespace, and every entry is exactly one file in it. The
//! file name is derived from the entry key by a reversible percent-style
//! escape, so a key may contain separators, dots, or arbitrary Unicode and
//! still map to a safe, unique file name.

use std::path::{Path, PathBuf};

/// Directory component that groups all cache instances under the root.
pub const DISK_CACHE_DIR: &str = "DiskCache";

/// Suffix carried by every entry file.
pub const ENTRY_SUFFIX: &str = ".json";

/// Suffix carried by in-flight scratch files before they are renamed into
/// place.
pub const TEMP_SUFFIX: &str = ".tmp";

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Bytes that pass through the key encoding unescaped.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Encodes a cache key into a filesystem-safe token.
///
/// Unreserved bytes (`A-Z a-z 0-9 - . _ ~`) map to themselves; every other
/// byte of the key's UTF-8 form becomes `%XX` with uppercase hex. The
/// mapping is injective, so two distinct keys can never collide on the same
/// file.
///
/// # Examples
///
/// ```
/// use stratacache::path::encode_key;
///
/// assert_eq!(encode_key("user-42.avatar"), "user-42.avatar");
/// assert_eq!(encode_key("user/42?lang=en"), "user%2F42%3Flang%3Den");
/// ```
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Decodes a token produced by [`encode_key`]; exact inverse.
///
/// Returns `None` for anything this codec could not have produced (stray
/// reserved byte, truncated or lowercase escape, non-UTF-8 result), which
/// lets diagnostics flag foreign files instead of guessing at a key.
///
/// # Examples
///
/// ```
/// use stratacache::path::decode_key;
///
/// assert_eq!(decode_key("user%2F42"), Some("user/42".to_string()));
/// assert_eq!(decode_key("user%2"), None);
/// ```
pub fn decode_key(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push(hi << 4 | lo);
                i += 3;
            }
            b if is_unreserved(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Directory holding one instance's entry files.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stratacache::path::tier_directory;
///
/// let dir = tier_directory(Path::new("/var/cache/app"), "thumbnails");
/// assert_eq!(dir, Path::new("/var/cache/app/DiskCache/thumbnails"));
/// ```
pub fn tier_directory(root: &Path, instance_name: &str) -> PathBuf {
    root.join(DISK_CACHE_DIR).join(instance_name)
}

/// Full path of the entry file for `key` inside `dir`.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}{}", encode_key(key), ENTRY_SUFFIX))
}

/// True for paths that name an entry record, as opposed to a scratch file
/// left by an interrupted write or some unrelated stray.
pub fn is_entry_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.ends_with(ENTRY_SUFFIX))
}

/// Scratch name a record is written under before the rename into `path`.
///
/// The suffix is appended, never swapped in for an extension: the entry
/// files for the keys `""` and `".json"` differ only after the last dot,
/// and an extension-replacing scheme would hand both the same scratch name.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// True for scratch files stranded by an interrupted write.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.ends_with(TEMP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_keys_pass_through() {
        assert_eq!(encode_key("abc-123_x.y~z"), "abc-123_x.y~z");
    }

    #[test]
    fn reserved_bytes_are_escaped() {
        assert_eq!(encode_key("a/b"), "a%2Fb");
        assert_eq!(encode_key("a b"), "a%20b");
        assert_eq!(encode_key("a\\b"), "a%5Cb");
        assert_eq!(encode_key("%"), "%25");
    }

    #[test]
    fn unicode_keys_encode_per_byte() {
        assert_eq!(encode_key("é"), "%C3%A9");
        assert_eq!(decode_key("%C3%A9"), Some("é".to_string()));
    }

    #[test]
    fn empty_key_is_allowed() {
        assert_eq!(encode_key(""), "");
        assert_eq!(decode_key(""), Some(String::new()));
        assert!(is_entry_file(&entry_path(Path::new("/d"), "")));
    }

    #[test]
    fn decode_rejects_foreign_tokens() {
        assert_eq!(decode_key("a/b"), None);
        assert_eq!(decode_key("a%2"), None);
        assert_eq!(decode_key("a%zz"), None);
        assert_eq!(decode_key("a%2f"), None); // lowercase never produced
        assert_eq!(decode_key("%FF"), None); // not valid UTF-8 on its own
    }

    #[test]
    fn entry_paths_carry_the_suffix() {
        let path = entry_path(Path::new("/cache/DiskCache/thumbs"), "user/42");
        assert_eq!(
            path,
            Path::new("/cache/DiskCache/thumbs/user%2F42.json")
        );
        assert!(is_entry_file(&path));
    }

    #[test]
    fn temp_and_stray_files_are_not_entries() {
        assert!(!is_entry_file(Path::new("/d/user%2F42.tmp")));
        assert!(!is_entry_file(Path::new("/d/notes.txt")));
        assert!(!is_entry_file(Path::new("/d")));
    }

    #[test]
    fn temp_names_append_to_the_entry_name() {
        let temp = temp_path(&entry_path(Path::new("/d"), "user/42"));
        assert_eq!(temp, Path::new("/d/user%2F42.json.tmp"));
        assert!(is_temp_file(&temp));
        assert!(!is_entry_file(&temp));
    }

    #[test]
    fn dot_led_keys_get_distinct_temp_names() {
        // "" and ".json" produce entry names ".json" and ".json.json"; a
        // codec that replaced the extension would give both ".json.tmp".
        let dir = Path::new("/d");
        let empty = temp_path(&entry_path(dir, ""));
        let dotted = temp_path(&entry_path(dir, ".json"));
        assert_eq!(empty, Path::new("/d/.json.tmp"));
        assert_eq!(dotted, Path::new("/d/.json.json.tmp"));
        assert_ne!(empty, dotted);
    }

    #[test]
    fn traversal_shaped_keys_stay_in_the_directory() {
        let dir = Path::new("/cache/DiskCache/thumbs");
        let path = entry_path(dir, "../../etc/passwd");
        assert!(path.starts_with(dir));
        assert_eq!(path.components().count(), dir.components().count() + 1);
    }

    proptest! {
        #[test]
        fn encode_decode_round_trips(key in ".*") {
            prop_assert_eq!(decode_key(&encode_key(&key)), Some(key));
        }

        #[test]
        fn encoded_tokens_use_only_safe_bytes(key in ".*") {
            let token = encode_key(&key);
            prop_assert!(token
                .bytes()
                .all(|b| b == b'%' || super::is_unreserved(b)));
        }

        #[test]
        fn distinct_keys_never_share_a_file(a in ".*", b in ".*") {
            prop_assume!(a != b);
            prop_assert_ne!(encode_key(&a), encode_key(&b));
        }
    }
}
