//! Pagination
//!
//! Offset mode takes a 1-based page number. Cursor mode takes an opaque,
//! forward-only token: URL-safe base64 of `{"offset", "fp"}`, where `fp`
//! fingerprints the query it was issued for so a cursor cannot be replayed
//! against a different search.

use crate::error::AppError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex chars of the SHA-256 digest kept in a cursor
const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CursorState {
    offset: usize,
    fp: String,
}

/// Fingerprint of whatever identifies a search (query, filters, kinds)
pub fn fingerprint(parts: &impl Serialize) -> String {
    let bytes = serde_json::to_vec(parts).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    let mut fp = hex::encode(digest);
    fp.truncate(FINGERPRINT_LEN);
    fp
}

pub fn encode_cursor(offset: usize, fingerprint: &str) -> String {
    let state = CursorState {
        offset,
        fp: fingerprint.to_string(),
    };
    let json = serde_json::to_vec(&state).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Offset a cursor points at; fails when the cursor is malformed or was
/// issued for a different search
pub fn decode_cursor(cursor: &str, fingerprint: &str) -> Result<usize, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .map_err(|_| AppError::InvalidInput("Malformed cursor".to_string()))?;
    let state: CursorState = serde_json::from_slice(&bytes)
        .map_err(|_| AppError::InvalidInput("Malformed cursor".to_string()))?;
    if state.fp != fingerprint {
        return Err(AppError::InvalidInput(
            "Cursor does not belong to this search".to_string(),
        ));
    }
    Ok(state.offset)
}

/// Requested page size, defaulted and capped; never zero
pub fn clamp_page_size(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max.max(1))
}

/// The slice of the ranked sequence a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub page_size: usize,
    /// 1-based
    pub page: usize,
    pub cursor_mode: bool,
}

impl PageWindow {
    pub fn resolve(
        page: Option<usize>,
        page_size: usize,
        cursor: Option<&str>,
        fingerprint: &str,
    ) -> Result<Self, AppError> {
        match cursor.filter(|c| !c.trim().is_empty()) {
            Some(cursor) => {
                let offset = decode_cursor(cursor, fingerprint)?;
                Ok(Self {
                    offset,
                    page_size,
                    page: offset / page_size + 1,
                    cursor_mode: true,
                })
            }
            None => {
                let page = page.unwrap_or(1).max(1);
                Ok(Self {
                    offset: (page - 1).saturating_mul(page_size),
                    page_size,
                    page,
                    cursor_mode: false,
                })
            }
        }
    }

    /// Items of `items` that fall in this window
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset)
            .take(self.page_size)
            .cloned()
            .collect()
    }

    pub fn info(&self, total: usize, fingerprint: &str) -> PageInfo {
        let total_pages = total.div_ceil(self.page_size);
        let next_offset = self.offset.saturating_add(self.page_size);
        let has_next_page = next_offset < total;

        PageInfo {
            page: self.page,
            page_size: self.page_size,
            total_pages,
            has_next_page,
            has_previous_page: self.offset > 0,
            next_cursor: has_next_page.then(|| encode_cursor(next_offset, fingerprint)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_capped() {
        assert_eq!(clamp_page_size(Some(500), 20, 50), 50);
        assert_eq!(clamp_page_size(None, 20, 50), 20);
        assert_eq!(clamp_page_size(Some(0), 20, 50), 1);
    }

    #[test]
    fn test_offset_window() {
        let window = PageWindow::resolve(Some(3), 5, None, "fp").unwrap();
        assert_eq!(window.offset, 10);
        assert_eq!(window.slice(&(0..12).collect::<Vec<_>>()), vec![10, 11]);

        let info = window.info(12, "fp");
        assert_eq!(info.total_pages, 3);
        assert!(!info.has_next_page);
        assert!(info.has_previous_page);
        assert!(info.next_cursor.is_none());
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let window = PageWindow::resolve(Some(0), 5, None, "fp").unwrap();
        assert_eq!(window.page, 1);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn test_cursor_walks_forward() {
        let fp = fingerprint(&("python", ["vibes"]));
        let first = PageWindow::resolve(None, 4, None, &fp).unwrap();
        let info = first.info(10, &fp);
        assert!(info.has_next_page);

        let cursor = info.next_cursor.unwrap();
        let second = PageWindow::resolve(None, 4, Some(&cursor), &fp).unwrap();
        assert!(second.cursor_mode);
        assert_eq!(second.offset, 4);
        assert_eq!(second.page, 2);
    }

    #[test]
    fn test_cursor_rejected_for_other_search() {
        let cursor = encode_cursor(20, &fingerprint(&"python"));
        let err = PageWindow::resolve(None, 10, Some(&cursor), &fingerprint(&"rust")).unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");

        let err = decode_cursor("not base64 !!", "fp").unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[test]
    fn test_empty_total() {
        let window = PageWindow::resolve(None, 20, None, "fp").unwrap();
        let info = window.info(0, "fp");
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next_page);
        assert!(!info.has_previous_page);
    }
}
