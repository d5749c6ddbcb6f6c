//! Offset-cursor pagination for paginated relationship fields.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::schema::SchemaSettings;

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<String>,
}

/// An item of a connection with its cursor
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// One page of a paginated relationship
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Build a page from items tagged with their absolute position in the
    /// underlying result, so cursors stay exact when rows were dropped.
    pub fn from_positioned(items: Vec<(u64, T)>, offset: u64, has_next_page: bool) -> Self {
        let edges: Vec<Edge<T>> = items
            .into_iter()
            .map(|(position, node)| Edge {
                cursor: encode_cursor(position),
                node,
            })
            .collect();

        let page_info = PageInfo {
            has_next_page,
            has_previous_page: offset > 0,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self { edges, page_info }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: u64) -> String {
    BASE64.encode(format!("cursor:{}", offset))
}

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<u64, &'static str> {
    let decoded = BASE64.decode(cursor).map_err(|_| "invalid cursor format")?;
    let s = String::from_utf8(decoded).map_err(|_| "invalid cursor encoding")?;

    let Some(value) = s.strip_prefix("cursor:") else {
        return Err("invalid cursor prefix");
    };

    value.parse().map_err(|_| "invalid cursor value")
}

/// Paging arguments of a paginated relationship field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Return the first N items
    pub first: Option<i64>,
    /// Return items after this cursor
    pub after: Option<String>,
    /// Items to skip, counted after the cursor
    pub skip: Option<i64>,
}

impl PageRequest {
    pub fn first(n: i64) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn skip(mut self, n: i64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Resolve into `(offset, limit)` using the configured page sizes.
    pub fn to_offset_limit(&self, settings: &SchemaSettings) -> Result<(u64, u64), &'static str> {
        let limit = self
            .first
            .map_or(settings.default_page_size, i64::unsigned_abs)
            .min(settings.max_page_size);

        let after = match &self.after {
            Some(cursor) => decode_cursor(cursor)?
                .checked_add(1)
                .ok_or("invalid cursor value")?,
            None => 0,
        };
        let offset = after
            .checked_add(self.skip.map_or(0, i64::unsigned_abs))
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or("offset out of range")?;

        Ok((offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_roundtrip() {
        for offset in [0, 1, 100, 999999] {
            let cursor = encode_cursor(offset);
            assert_eq!(decode_cursor(&cursor).unwrap(), offset);
        }
        assert!(decode_cursor("not base64!").is_err());
        assert_eq!(decode_cursor(&BASE64.encode("page:3")), Err("invalid cursor prefix"));
    }

    #[test]
    fn test_offset_limit_defaults_and_caps() {
        let settings = SchemaSettings::default();
        assert_eq!(PageRequest::default().to_offset_limit(&settings).unwrap(), (0, 25));
        assert_eq!(PageRequest::first(1000).to_offset_limit(&settings).unwrap(), (0, 100));
    }

    #[test]
    fn test_offset_starts_after_cursor_plus_skip() {
        let settings = SchemaSettings::default();
        let request = PageRequest::first(5).after(encode_cursor(10)).skip(2);
        assert_eq!(request.to_offset_limit(&settings).unwrap(), (13, 5));
    }

    #[test]
    fn test_extreme_cursor_and_skip_are_rejected() {
        let settings = SchemaSettings::default();
        assert_eq!(
            PageRequest::first(1)
                .after(encode_cursor(u64::MAX))
                .to_offset_limit(&settings),
            Err("invalid cursor value")
        );
        assert_eq!(
            PageRequest::first(1)
                .after(encode_cursor(u64::MAX - 1))
                .skip(i64::MIN)
                .to_offset_limit(&settings),
            Err("offset out of range")
        );
        assert_eq!(
            PageRequest::default().skip(i64::MIN).to_offset_limit(&settings),
            Err("offset out of range")
        );
        assert_eq!(
            PageRequest::first(1)
                .after(BASE64.encode("cursor:99999999999999999999999"))
                .to_offset_limit(&settings),
            Err("invalid cursor value")
        );
    }

    #[test]
    fn test_extreme_first_is_capped() {
        let settings = SchemaSettings::default();
        assert_eq!(PageRequest::first(i64::MIN).to_offset_limit(&settings).unwrap(), (0, 100));
        assert_eq!(PageRequest::first(-3).to_offset_limit(&settings).unwrap(), (0, 3));
    }

    #[test]
    fn test_largest_offset_is_accepted() {
        let settings = SchemaSettings::default();
        let request = PageRequest::first(1).skip(i64::MAX);
        assert_eq!(request.to_offset_limit(&settings).unwrap(), (i64::MAX as u64, 1));
    }

    #[test]
    fn test_positioned_cursors_keep_gaps() {
        let page = Connection::from_positioned(vec![(4, "a"), (6, "c")], 4, false);
        assert_eq!(page.page_info.start_cursor, Some(encode_cursor(4)));
        assert_eq!(page.page_info.end_cursor, Some(encode_cursor(6)));
        assert_eq!(page.edges[1].cursor, encode_cursor(6));
    }

    #[test]
    fn test_positioned_page_info_flags() {
        let page = Connection::from_positioned(vec![(4, "a"), (5, "b")], 4, true);
        assert_eq!(page.edges.len(), 2);
        assert!(page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);

        let first = Connection::from_positioned(vec![(0, "a")], 0, false);
        assert!(!first.page_info.has_next_page);
        assert!(!first.page_info.has_previous_page);

        let empty = Connection::<&str>::from_positioned(Vec::new(), 0, false);
        assert_eq!(empty.page_info.start_cursor, None);
        assert_eq!(empty.page_info.end_cursor, None);
    }
}
