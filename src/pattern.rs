//! Wildcard matching for policy attribute matchers
//!
//! Attribute values are split into segments on a separator (`/` by default,
//! so `"/docs/2024/report"` has three segments). Patterns support:
//! - `*` - any single segment, or any run of characters inside a segment (`*.txt`)
//! - `**` - zero or more whole segments

/// Segment-aware wildcard matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatcher {
    separator: char,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        PatternMatcher { separator: '/' }
    }
}

impl PatternMatcher {
    /// Matcher splitting on a custom separator (e.g. `:` for `user:alice`)
    pub fn with_separator(separator: char) -> Self {
        PatternMatcher { separator }
    }

    /// Check if `value` matches `pattern`
    ///
    /// # Examples
    /// ```
    /// use abac_store::PatternMatcher;
    ///
    /// let m = PatternMatcher::default();
    /// assert!(m.matches("/users/*", "/users/alice"));
    /// assert!(m.matches("/admin/**", "/admin/users/bob"));
    /// assert!(!m.matches("/users/*", "/admin/alice"));
    /// ```
    pub fn matches(&self, pattern: &str, value: &str) -> bool {
        let mut pattern_segments = self.segments(pattern);
        let value_segments = self.segments(value);

        if !pattern.contains('*') {
            return pattern_segments == value_segments;
        }

        // `**/**` matches exactly what `**` matches
        pattern_segments.dedup_by(|a, b| *a == "**" && *b == "**");

        Self::match_segments(&pattern_segments, &value_segments)
    }

    /// Split into non-empty segments; leading/trailing separators are ignored
    fn segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split(self.separator).filter(|s| !s.is_empty()).collect()
    }

    /// Walk the pattern once, tracking which value prefixes are consumed so
    /// far; `reachable[j]` means the first `j` value segments are matched.
    /// Runs in `O(pattern * value)` however many `**` the pattern holds.
    fn match_segments(pattern: &[&str], value: &[&str]) -> bool {
        let mut reachable = vec![false; value.len() + 1];
        reachable[0] = true;

        for head in pattern {
            let mut next = vec![false; value.len() + 1];
            if *head == "**" {
                let mut seen = false;
                for (j, slot) in next.iter_mut().enumerate() {
                    seen |= reachable[j];
                    *slot = seen;
                }
            } else {
                for (j, segment) in value.iter().enumerate() {
                    if reachable[j] && Self::match_segment(head, segment) {
                        next[j + 1] = true;
                    }
                }
            }
            if !next.contains(&true) {
                return false;
            }
            reachable = next;
        }

        reachable[value.len()]
    }

    /// Match one segment, where `*` spans any run of characters
    fn match_segment(pattern: &str, segment: &str) -> bool {
        if !pattern.contains('*') {
            return pattern == segment;
        }

        let parts: Vec<&str> = pattern.split('*').collect();
        let (first, last) = (parts[0], parts[parts.len() - 1]);

        if segment.len() < first.len() + last.len()
            || !segment.starts_with(first)
            || !segment.ends_with(last)
        {
            return false;
        }

        // Middle pieces must appear in order between the anchored ends
        let mut window = &segment[first.len()..segment.len() - last.len()];
        for part in &parts[1..parts.len() - 1] {
            match window.find(part) {
                Some(found) => window = &window[found + part.len()..],
                None => return false,
            }
        }

        true
    }
}
