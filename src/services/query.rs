//! Pagination and filter helpers shared by the list operations.

use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect, Select};
use serde::Serialize;

use crate::error::Result;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 50;
const MAX_OFFSET: u64 = i64::MAX as u64;

/// 1-indexed page request with the page size clamped to `1..=MAX_PAGE_SIZE`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1) as u64;
        let page_size = page_size
            .map(|size| size.clamp(1, MAX_PAGE_SIZE as i64) as u64)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    /// Row offset of the page, capped at what SQLite accepts as an integer
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .checked_mul(self.page_size)
            .map_or(MAX_OFFSET, |offset| offset.min(MAX_OFFSET))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Count all rows matching `select`, then fetch the requested window of it
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    request: PageRequest,
) -> Result<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
{
    let total = select.clone().count(db).await?;
    let items = select
        .offset(request.offset())
        .limit(request.page_size)
        .all(db)
        .await?;

    Ok(Page {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
    })
}

/// Case-insensitive substring match on a text column
pub fn contains_ci<C: ColumnTrait>(column: C, needle: &str) -> SimpleExpr {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\'))
}

/// Trimmed filter value, `None` when absent or blank
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamping() {
        assert_eq!(PageRequest::default(), PageRequest { page: 1, page_size: 20 });
        assert_eq!(PageRequest::new(Some(0), Some(500)), PageRequest { page: 1, page_size: 50 });
        assert_eq!(PageRequest::new(Some(-3), Some(0)), PageRequest { page: 1, page_size: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_offset_stays_in_sqlite_range() {
        assert_eq!(PageRequest::new(Some(i64::MAX), Some(50)).offset(), i64::MAX as u64);
        assert_eq!(PageRequest::new(Some(i64::MAX / 2), Some(2)).offset(), i64::MAX as u64 - 3);
        assert_eq!(PageRequest::new(Some(i64::MAX), Some(1)).offset(), i64::MAX as u64 - 1);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  acme ".into())), Some("acme"));
        assert_eq!(non_blank(&Some("   ".into())), None);
        assert_eq!(non_blank(&None), None);
    }
}
