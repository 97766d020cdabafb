use std::fmt;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
// efetch refuses (or silently truncates) larger pages
pub const MAX_PAGE_SIZE: u64 = 10_000;

/// Slice `[offset, offset + size)` of a server-side result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub offset: u64,
    pub size: u64,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.offset + self.size)
    }
}

/// Splits `[0, min(total_count, max_records))` into consecutive windows of at most
/// `page_size` records. The plan is fixed up front and never adjusted to what the
/// server actually returns.
pub fn plan_windows(total_count: u64, max_records: u64, page_size: u64) -> Vec<Window> {
    let end = total_count.min(max_records);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    (0..end)
        .step_by(page_size as usize)
        .map(|offset| Window {
            offset,
            size: page_size.min(end - offset),
        })
        .collect()
}
