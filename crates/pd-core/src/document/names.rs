//! Internal name generation
//!
//! Names are identifiers (`[A-Za-z_][A-Za-z0-9_]*`) unique within a
//! document. Clashes get a zero-padded numeric suffix: `Body`, `Body001`, ...

use crate::constants::{FALLBACK_NAME, NAME_SUFFIX_DIGITS};

/// Derive an identifier from a free-form label
pub fn sanitize_name(label: &str) -> String {
    let mut name: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.trim_matches('_').is_empty() {
        return FALLBACK_NAME.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// First name derived from `base` for which `taken` returns false
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = sanitize_name(base);
    if !taken(&base) {
        return base;
    }

    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = if stem.is_empty() { base.as_str() } else { stem };
    (1..)
        .map(|n| format!("{stem}{n:0width$}", width = NAME_SUFFIX_DIGITS))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_name("Body"), "Body");
        assert_eq!(sanitize_name("My Test-Body"), "My_Test_Body");
        assert_eq!(sanitize_name("3D part"), "_3D_part");
        assert_eq!(sanitize_name("Träger"), "Tr_ger");
        assert_eq!(sanitize_name(""), "Unnamed");
        assert_eq!(sanitize_name("???"), "Unnamed");
    }

    #[test]
    fn test_unique_suffix() {
        let taken = ["Body", "Body001"];
        let is_taken = |n: &str| taken.contains(&n);
        assert_eq!(unique_name("Pad", is_taken), "Pad");
        assert_eq!(unique_name("Body", is_taken), "Body002");
        assert_eq!(unique_name("Body001", is_taken), "Body002");
    }
}
