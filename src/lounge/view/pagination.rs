use std::ops::Range;

/// 每页默认条数
pub const DEFAULT_PER_PAGE: usize = 5;

/// 分页窗口，页码从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: usize,
    total: usize,
    current: usize,
}

impl Paginator {
    pub fn new(total: usize) -> Self {
        Self::with_per_page(DEFAULT_PER_PAGE, total)
    }

    pub fn with_per_page(per_page: usize, total: usize) -> Self {
        Self {
            per_page: per_page.max(1),
            total,
            current: 1,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }

    /// 条目数变化后把当前页收回到有效范围
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.current = self.current.min(self.total_pages()).max(1);
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    /// 翻到下一页，已在最后一页时返回 false
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.current -= 1;
        true
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// 当前页在列表中的下标范围
    pub fn window(&self) -> Range<usize> {
        let start = ((self.current - 1) * self.per_page).min(self.total);
        let end = (start + self.per_page).min(self.total);
        start..end
    }

    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let window = self.window();
        let end = window.end.min(items.len());
        &items[window.start.min(end)..end]
    }
}
