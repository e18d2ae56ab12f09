//! Metric name trimming for size-limited wire formats.

/// Shorten `name` to at most `max_bytes`, keeping its tail.
///
/// Leading dot-delimited segments are dropped first, so `web.api.Foo.bar`
/// with a budget of 8 becomes `Foo.bar`. If the last segment alone is still
/// too long, its leading characters are cut. Never splits a UTF-8 character.
pub fn trim_name(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut rest = name;
    while let Some((_, tail)) = rest.split_once('.') {
        rest = tail;
        if rest.len() <= max_bytes {
            return rest;
        }
    }
    let mut cut = rest.len() - max_bytes;
    while !rest.is_char_boundary(cut) {
        cut += 1;
    }
    &rest[cut..]
}
