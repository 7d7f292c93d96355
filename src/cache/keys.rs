//! Cache key naming for the HTTP handlers.

use crate::domain::types::Category;

/// `news`, `news3`, `best`, ... Page 1 carries no suffix.
pub fn list_key(category: Category, page: usize) -> String {
    if page > 1 {
        format!("{}{}", category.as_str(), page)
    } else {
        category.as_str().to_string()
    }
}

pub fn post_key(id: u64) -> String {
    format!("post{id}")
}

pub fn user_key(id: &str) -> String {
    format!("user{id}")
}

/// Keys that go stale when `category` page `page` is recomputed.
///
/// The front page and its second page overlap, so a fresh front page
/// invalidates page two.
pub fn invalidated_by(category: Category, page: usize) -> Option<String> {
    match (category, page) {
        (Category::News, 0 | 1) => Some(list_key(Category::News, 2)),
        _ => None,
    }
}
