/// Character cursor over script source with bounded lookahead.
///
/// Works on decoded chars, not bytes, so multi-byte identifiers do not
/// split the cursor. Line endings are not normalized; `\r\n` and `\n`
/// are distinct literals to the matchers.
pub struct SourceCodeReader {
    chars: Vec<char>,
    pos: usize,
}

impl SourceCodeReader {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.chars.len()
    }

    /// 1-based line of the cursor: 1 + newlines before it.
    pub fn current_line(&self) -> usize {
        1 + self.chars[..self.pos].iter().filter(|c| **c == '\n').count()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Next `n` characters without consuming, or None if fewer remain.
    pub fn peek(&self, n: usize) -> Option<String> {
        if self.pos + n > self.chars.len() {
            return None;
        }
        Some(self.chars[self.pos..self.pos + n].iter().collect())
    }

    /// Next `n` characters, consuming them.
    pub fn read(&mut self, n: usize) -> Option<String> {
        let s = self.peek(n)?;
        self.pos += n;
        Some(s)
    }

    /// True when the source continues with `lit` at the cursor.
    pub fn starts_with(&self, lit: &str) -> bool {
        let mut it = self.chars[self.pos..].iter();
        lit.chars().all(|c| it.next() == Some(&c))
    }

    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut r = SourceCodeReader::new("abc");
        assert_eq!(r.peek(2).as_deref(), Some("ab"));
        assert_eq!(r.read(2).as_deref(), Some("ab"));
        assert_eq!(r.peek(2), None);
        assert_eq!(r.read(1).as_deref(), Some("c"));
        assert!(!r.has_remaining());
    }

    #[test]
    fn current_line_counts_consumed_newlines() {
        let mut r = SourceCodeReader::new("a\nb\r\nc");
        assert_eq!(r.current_line(), 1);
        r.advance(2); // past "a\n"
        assert_eq!(r.current_line(), 2);
        r.advance(3); // past "b\r\n"
        assert_eq!(r.current_line(), 3);
    }

    #[test]
    fn starts_with_checks_literal_at_cursor() {
        let mut r = SourceCodeReader::new("<<=");
        assert!(r.starts_with("<<="));
        assert!(r.starts_with("<<"));
        r.advance(1);
        assert!(r.starts_with("<="));
        assert!(!r.starts_with("<<"));
    }
}
