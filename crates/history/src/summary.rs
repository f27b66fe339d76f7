/// Build a bounded preview of script content.
///
/// Runs of whitespace (including newlines) collapse to a single space, the
/// result is trimmed, and then cut to at most `max_chars` characters. Cuts
/// happen on character boundaries, never inside a multi-byte sequence.
///
/// ```
/// use draftcast_history::summarize;
///
/// assert_eq!(summarize("  INTRO\n\nWelcome   back ", 140), "INTRO Welcome back");
/// assert_eq!(summarize("abcdef", 3), "abc");
/// ```
pub fn summarize(content: &str, max_chars: usize) -> String {
    content.split_whitespace().flat_map(|word| [" ", word]).skip(1).flat_map(str::chars).take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", 140, "")]
    #[case("   \n\t ", 140, "")]
    #[case("Hello", 140, "Hello")]
    #[case("Hello", 0, "")]
    #[case("Hello world", 5, "Hello")]
    #[case("Hello world", 6, "Hello ")]
    #[case("[MUSIC]\n\nHOST: Welcome\tback", 140, "[MUSIC] HOST: Welcome back")]
    #[case("日本語のポッドキャスト", 3, "日本語")]
    fn test_summarize(#[case] content: &str, #[case] max: usize, #[case] expected: &str) {
        assert_eq!(summarize(content, max), expected);
    }

    #[test]
    fn test_summary_is_bounded() {
        let long = "word ".repeat(500);
        assert_eq!(summarize(&long, 140).chars().count(), 140);
    }
}
