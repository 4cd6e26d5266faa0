// In crates/backtest-model/src/paginate.rs

use crate::error::{Error, Result};

/// One page of a paginated list, borrowing from the underlying slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
}

/// Slices `items` into 1-indexed pages of `page_size`.
///
/// `total_pages` is at least 1, even for an empty list, so the display layer
/// always has a valid page to stand on. A page outside `1..=total_pages`
/// fails with `Error::OutOfRange` rather than being silently clamped; the
/// caller is expected to clamp before asking, and the hard error makes a
/// caller that forgot visible in tests.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> Result<Page<'_, T>> {
    if page_size == 0 {
        return Err(Error::Malformed("page size must be at least 1".into()));
    }
    let total_pages = items.len().div_ceil(page_size).max(1);
    if page < 1 || page > total_pages {
        return Err(Error::OutOfRange { page, total_pages });
    }
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    Ok(Page {
        items: &items[start..end],
        page,
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_still_has_one_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 10, 1).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn page_beyond_the_end_is_out_of_range() {
        let items = vec![1, 2, 3];
        let err = paginate(&items, 10, 2).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfRange {
                page: 2,
                total_pages: 1
            }
        );
    }

    #[test]
    fn page_zero_is_out_of_range() {
        let items = vec![1, 2, 3];
        assert!(matches!(
            paginate(&items, 10, 0),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn partitions_without_overlap() {
        let items: Vec<u32> = (0..25).collect();
        let first = paginate(&items, 10, 1).unwrap();
        let last = paginate(&items, 10, 3).unwrap();
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items, &items[0..10]);
        assert_eq!(last.items, &items[20..25]);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let items = vec![1, 2, 3];
        assert!(matches!(
            paginate(&items, 0, 1),
            Err(Error::Malformed(_))
        ));
    }
}
