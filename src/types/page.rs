use serde::{Deserialize, Serialize};

/// One page of a list request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub items: Vec<T>,
}

impl<T> ListResult<T> {
    pub fn new(page: usize, per_page: usize, total_items: usize, items: Vec<T>) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_items.div_ceil(per_page)
        };
        Self {
            page,
            per_page,
            total_items,
            total_pages,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page: ListResult<u8> = ListResult::new(1, 20, 41, vec![]);
        assert_eq!(page.total_pages, 3);
        let empty: ListResult<u8> = ListResult::new(1, 20, 0, vec![]);
        assert_eq!(empty.total_pages, 0);
    }
}
