/// Page metadata and navigation link computation for list endpoints
///
/// `paginate` is a pure function from (total rows, page size, requested page)
/// to page metadata. Out-of-range pages are not an error: they produce an
/// empty result set with `current_page` echoing the request and the
/// neighbors computed against the real total.
use serde::Serialize;

/// Page metadata computed from a total row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub previous_page: Option<u32>,
    pub next_page: Option<u32>,
    pub first_page: u32,
    pub last_page: u32,
    pub total_pages: u32,
}

/// Compute page metadata. `per_page` must be >= 1; callers normalize input
/// before reaching here.
pub fn paginate(total_rows: u64, per_page: u32, requested_page: u32) -> PageInfo {
    let per_page = per_page.max(1);
    let current_page = requested_page.max(1);
    let total_pages = (total_rows.div_ceil(per_page as u64)) as u32;

    let previous_page = if total_pages > 0 && current_page > 1 {
        Some(current_page - 1)
    } else {
        None
    };
    let next_page = if current_page < total_pages {
        Some(current_page + 1)
    } else {
        None
    };

    PageInfo {
        current_page,
        previous_page,
        next_page,
        first_page: 1,
        last_page: total_pages,
        total_pages,
    }
}

/// Row offset for a page, for LIMIT/OFFSET queries.
pub fn offset(per_page: u32, page: u32) -> i64 {
    (page.max(1) as i64 - 1) * per_page.max(1) as i64
}

/// Ready-to-use navigation URLs built from page numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationLinks {
    pub first: String,
    pub previous: Option<String>,
    pub current: String,
    pub next: Option<String>,
    pub last: String,
}

/// The pagination block attached to non-empty list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub links: PaginationLinks,
    pub first_page: u32,
    pub previous_page: Option<u32>,
    pub current_page: u32,
    pub next_page: Option<u32>,
    pub last_page: u32,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(base_path: &str, info: &PageInfo, per_page: u32) -> Self {
        let link = |page: u32| format!("{base_path}?page={page}&per_page={per_page}");

        Self {
            links: PaginationLinks {
                first: link(1),
                previous: info.previous_page.map(link),
                current: link(info.current_page),
                next: info.next_page.map(link),
                last: link(info.last_page),
            },
            first_page: info.first_page,
            previous_page: info.previous_page,
            current_page: info.current_page,
            next_page: info.next_page,
            last_page: info.last_page,
            total_pages: info.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page_has_both_neighbors() {
        let info = paginate(25, 10, 2);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.previous_page, Some(1));
        assert_eq!(info.next_page, Some(3));
        assert_eq!(info.total_pages, 3);
    }

    #[test]
    fn last_page_has_no_next() {
        let info = paginate(25, 10, 3);
        assert_eq!(info.current_page, 3);
        assert_eq!(info.previous_page, Some(2));
        assert_eq!(info.next_page, None);
        assert_eq!(info.last_page, 3);
        assert_eq!(info.total_pages, 3);
    }

    #[test]
    fn empty_collection_has_zero_pages_and_no_neighbors() {
        let info = paginate(0, 10, 1);
        assert_eq!(info.current_page, 1);
        assert_eq!(info.previous_page, None);
        assert_eq!(info.next_page, None);
        assert_eq!(info.total_pages, 0);
        assert_eq!(info.last_page, 0);
    }

    #[test]
    fn out_of_range_page_echoes_request() {
        let info = paginate(25, 10, 9);
        assert_eq!(info.current_page, 9);
        assert_eq!(info.next_page, None);
        assert_eq!(info.previous_page, Some(8));
        assert_eq!(info.total_pages, 3);
    }

    #[test]
    fn exact_multiple_has_no_partial_page() {
        let info = paginate(20, 10, 2);
        assert_eq!(info.total_pages, 2);
        assert_eq!(info.next_page, None);
    }

    #[test]
    fn offsets_step_by_page_size() {
        assert_eq!(offset(10, 1), 0);
        assert_eq!(offset(10, 3), 20);
        assert_eq!(offset(10, 0), 0);
    }

    #[test]
    fn links_follow_page_numbers() {
        let info = paginate(25, 10, 3);
        let meta = PaginationMeta::new("/api/v1/comments", &info, 10);

        assert_eq!(meta.links.first, "/api/v1/comments?page=1&per_page=10");
        assert_eq!(
            meta.links.previous.as_deref(),
            Some("/api/v1/comments?page=2&per_page=10")
        );
        assert_eq!(meta.links.current, "/api/v1/comments?page=3&per_page=10");
        assert_eq!(meta.links.next, None);
        assert_eq!(meta.links.last, "/api/v1/comments?page=3&per_page=10");
        assert_eq!(meta.total_pages, 3);
    }
}
