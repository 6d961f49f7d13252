use std::num::NonZeroUsize;

/// The `page`-th slice of `size` items, clamped to the bounds of `items`.
pub fn window<T>(items: &[T], page: usize, size: NonZeroUsize) -> &[T] {
    let start = page.saturating_mul(size.get()).min(items.len());
    let end = start.saturating_add(size.get()).min(items.len());
    &items[start..end]
}

pub fn page_count(total: usize, size: NonZeroUsize) -> usize {
    total.div_ceil(size.get())
}

/// Largest valid page index for `total` items (0 when there are none).
pub fn last_page(total: usize, size: NonZeroUsize) -> usize {
    page_count(total, size).saturating_sub(1)
}
