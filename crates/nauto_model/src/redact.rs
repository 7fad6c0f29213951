/// Default keywords applied when no redaction patterns are configured
/// (spec.md §4.2).
pub const DEFAULT_PATTERNS: &[&str] = &["password", "secret", "community"];

const MARKER: &str = "*** REDACTED ***";

/// Masks any line containing a configured keyword (case-insensitive),
/// replacing the whole line with a fixed marker. Preserves line count.
/// Pure function — no I/O, no logging.
pub fn redact(text: &str, patterns: &[&str]) -> String {
    let patterns: Vec<String> = if patterns.is_empty() {
        DEFAULT_PATTERNS.iter().map(|p| p.to_lowercase()).collect()
    } else {
        patterns.iter().map(|p| p.to_lowercase()).collect()
    };

    text.lines()
        .map(|line| {
            let lower = line.to_lowercase();
            if patterns.iter().any(|p| lower.contains(p.as_str())) {
                MARKER
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_matching_lines_case_insensitively() {
        let input = "interface Gi0/1\n PASSWORD cisco123\n no shutdown\n";
        let out = redact(input, &[]);
        assert!(!out.to_lowercase().contains("cisco123"));
        assert_eq!(out.lines().count(), input.lines().count());
    }

    #[test]
    fn leaves_unrelated_lines_untouched() {
        let input = "show version\nsome output here";
        assert_eq!(redact(input, &[]), input);
    }

    #[test]
    fn uses_custom_patterns_when_provided() {
        let input = "snmp-server community PUBLIC RO\nhostname r1";
        let out = redact(input, &["community"]);
        assert!(out.lines().next().unwrap().contains("REDACTED"));
        assert_eq!(out.lines().nth(1).unwrap(), "hostname r1");
    }
}
