//! External-name collision resolution.
//!
//! Two modules may declare the same name from different files.  The first
//! keeps it; later ones get the stem with the next free numeric suffix:
//!
//! ```text
//! Lights   (a.lv)  → Lights
//! Lights   (b.lv)  → Lights1
//! Lights2  (c.lv)  → Lights2
//! Lights2  (d.lv)  → Lights3
//! Lights   (a.lv)  → Lights        reload keeps its name
//! ```

/// Resolve the external name for a module declared as `declared` in
/// `location`.
///
/// - `is_taken(external)` reports whether a module is currently registered
///   under `external`.
/// - `known(location, declared)` reports the external name a module with the
///   same declared name and location was given earlier, if any.
pub fn resolve_external_name(
    declared:    &str,
    location:    &str,
    is_taken:    impl Fn(&str) -> bool,
    known:       impl Fn(&str, &str) -> Option<String>,
) -> String {
    if let Some(existing) = known(location, declared) {
        return existing;
    }
    if !is_taken(declared) {
        return declared.to_string();
    }

    let (stem, mut n) = split_suffix(declared);
    loop {
        n = n.saturating_add(1);
        let candidate = format!("{stem}{n}");
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

/// Split into the stem and its trailing decimal suffix (0 when absent).
///
/// A name that is all digits keeps the whole name as its stem.
fn split_suffix(name: &str) -> (&str, u64) {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits == name.len() {
        return (name, 0);
    }
    let (stem, suffix) = name.split_at(name.len() - digits);
    match suffix.parse() {
        Ok(n) => (stem, n),
        Err(_) => (name, 0),
    }
}
