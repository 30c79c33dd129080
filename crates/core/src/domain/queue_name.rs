//! Logical queue name parsing
//!
//! A logical name such as `orders.eu.retail` is a path into a virtual
//! hierarchy. Segments are separated by `.`; empty segments are ignored so
//! `orders..eu` and `.orders.eu` address the same path as `orders.eu`.

/// Segment separator in logical names
pub const SEPARATOR: char = '.';

/// Split a logical name into its ordered, non-empty segments
pub fn parse(name: &str) -> Vec<&str> {
    name.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Join segments back into a canonical path
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push(SEPARATOR);
        }
        path.push_str(segment.as_ref());
    }
    path
}

/// Canonical form of a name (`a..b` -> `a.b`)
pub fn canonical(name: &str) -> String {
    join(&parse(name))
}

/// True if `name` is non-empty and already in canonical form
pub fn is_canonical(name: &str) -> bool {
    !name.is_empty() && canonical(name) == name
}

/// Last segment of a name, used as the display label of its node
pub fn leaf_label(name: &str) -> &str {
    parse(name).last().copied().unwrap_or("")
}

/// True if `name` is `prefix` itself or lies below it, segment-wise
pub fn is_under(name: &str, prefix: &str) -> bool {
    let name = parse(name);
    let prefix = parse(prefix);
    prefix.len() <= name.len() && name[..prefix.len()] == prefix[..]
}

/// Name of a child queue directly below `parent` (an empty parent means top level)
pub fn child_of(parent: &str, child: &str) -> String {
    let mut segments = parse(parent);
    segments.extend(parse(child));
    join(&segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_dots() {
        assert_eq!(parse("orders.eu.retail"), vec!["orders", "eu", "retail"]);
        assert_eq!(parse("orders"), vec!["orders"]);
    }

    #[test]
    fn test_parse_empty_and_degenerate() {
        assert!(parse("").is_empty());
        assert!(parse("...").is_empty());
        assert_eq!(parse(".orders..eu."), vec!["orders", "eu"]);
    }

    #[test]
    fn test_canonical_and_leaf_label() {
        assert_eq!(canonical("a..b"), "a.b");
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical("orders.eu"));
        assert!(!is_canonical("orders..eu"));
        assert!(!is_canonical(".orders"));
        assert!(!is_canonical("orders."));
        assert!(!is_canonical(""));
        assert_eq!(leaf_label("orders.eu"), "eu");
        assert_eq!(leaf_label(""), "");
    }

    #[test]
    fn test_is_under_is_segment_aware() {
        assert!(is_under("orders.eu", "orders"));
        assert!(is_under("orders", "orders"));
        assert!(!is_under("ordersx", "orders"));
        assert!(!is_under("orders", "orders.eu"));
        assert!(is_under("anything", ""));
    }

    #[test]
    fn test_child_of() {
        assert_eq!(child_of("orders", "eu"), "orders.eu");
        assert_eq!(child_of("", "orders"), "orders");
    }
}
