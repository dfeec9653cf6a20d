pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based page window clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// `LIMIT .. OFFSET ..` with literal numbers; both are clamped integers.
    pub fn limit_clause(&self) -> String {
        format!(" LIMIT {} OFFSET {}", self.per_page, self.offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let w = PageWindow::new(None, None);
        assert_eq!(w, PageWindow { page: 1, per_page: DEFAULT_PER_PAGE });
        assert_eq!(w.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let w = PageWindow::new(Some(0), Some(10_000));
        assert_eq!(w.page, 1);
        assert_eq!(w.per_page, MAX_PER_PAGE);
        assert_eq!(PageWindow::new(Some(3), Some(0)).per_page, 1);
    }

    #[test]
    fn offset_and_limit() {
        let w = PageWindow::new(Some(3), Some(25));
        assert_eq!(w.offset(), 50);
        assert_eq!(w.limit_clause(), " LIMIT 25 OFFSET 50");
    }
}
