//! Filtered, sorted, paginated list queries.
//!
//! Each entity describes its table with a [`ListShape`]. Query-string input is
//! normalized into [`ListParams`], then turned into one WHERE predicate that
//! the count, page and summary queries all share. Column names only ever
//! come from the static `ListShape` safelists; user input is always bound.

use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{ListPage, Listed};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct ListShape {
    pub table: &'static str,
    pub columns: &'static str,
    pub orderable: &'static [&'static str],
    pub keyword_columns: &'static [&'static str],
    pub date_column: &'static str,
    pub area_column: Option<&'static str>,
}

/// Raw query string. Everything is optional text so that junk such as
/// `page=abc` degrades to defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub keyword: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub area_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: i64,
    pub page_size: i64,
    pub order_by: &'static str,
    pub order_dir: SortDir,
    pub keyword: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub area_id: Option<i64>,
}

impl ListParams {
    pub fn from_query(shape: &ListShape, query: ListQuery) -> Self {
        let page = parse_int(query.page.as_deref()).filter(|p| *p >= 1).unwrap_or(1);
        let page_size = parse_int(query.page_size.as_deref())
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let order_by = query
            .order_by
            .as_deref()
            .map(str::trim)
            .and_then(|wanted| shape.orderable.iter().copied().find(|col| *col == wanted))
            .unwrap_or("id");

        Self {
            page,
            page_size,
            order_by,
            order_dir: SortDir::parse(query.order_dir.as_deref()),
            keyword: non_blank(query.keyword),
            start_time: non_blank(query.start_time),
            end_time: non_blank(query.end_time),
            area_id: shape
                .area_column
                .and_then(|_| parse_int(query.area_id.as_deref())),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Escapes LIKE wildcards so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// A WHERE clause with its positional parameters.
pub struct Predicate {
    pub clause: String,
    params: Vec<Box<dyn ToSql>>,
}

impl Predicate {
    fn new() -> Self {
        Self {
            clause: "WHERE 1=1".to_string(),
            params: Vec::new(),
        }
    }

    /// Binds a value and returns its `?N` index.
    fn bind<T: ToSql + 'static>(&mut self, value: T) -> usize {
        self.params.push(Box::new(value));
        self.params.len()
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref() as &dyn ToSql).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }
}

pub fn predicate(shape: &ListShape, params: &ListParams) -> Predicate {
    let mut pred = Predicate::new();

    if let (Some(column), Some(area_id)) = (shape.area_column, params.area_id) {
        let idx = pred.bind(area_id);
        pred.clause.push_str(&format!(" AND {column} = ?{idx}"));
    }

    if let Some(keyword) = &params.keyword {
        let idx = pred.bind(like_pattern(keyword));
        let ors = shape
            .keyword_columns
            .iter()
            .map(|col| format!("{col} LIKE ?{idx} ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        pred.clause.push_str(&format!(" AND ({ors})"));
    }

    if let Some(start) = &params.start_time {
        let idx = pred.bind(start.clone());
        pred.clause
            .push_str(&format!(" AND {} >= ?{idx}", shape.date_column));
    }
    if let Some(end) = &params.end_time {
        let idx = pred.bind(end.clone());
        pred.clause
            .push_str(&format!(" AND {} <= ?{idx}", shape.date_column));
    }

    pred
}

/// Runs the count and page queries for one filter. `summary` is left empty
/// for the caller to fill.
pub fn fetch_page<T, F>(
    conn: &Connection,
    shape: &ListShape,
    params: &ListParams,
    map_row: F,
) -> AppResult<ListPage<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let pred = predicate(shape, params);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} {}", shape.table, pred.clause),
        rusqlite::params_from_iter(pred.params()),
        |row| row.get(0),
    )?;

    let limit_idx = pred.len() + 1;
    let offset_idx = pred.len() + 2;
    let dir = params.order_dir.as_sql();
    let tiebreak = if params.order_by == "id" {
        String::new()
    } else {
        format!(", id {dir}")
    };
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY {} {dir}{tiebreak} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        shape.columns, shape.table, pred.clause, params.order_by
    );

    let offset = params.offset();
    let mut bound = pred.params();
    bound.push(&params.page_size);
    bound.push(&offset);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bound), map_row)?;
    let items: Result<Vec<_>, _> = rows.collect();

    let list = items?
        .into_iter()
        .enumerate()
        .map(|(i, item)| Listed {
            sid: offset.saturating_add(i as i64 + 1),
            item,
        })
        .collect();

    Ok(ListPage {
        total,
        page: params.page,
        page_size: params.page_size,
        list,
        summary: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const THINGS: ListShape = ListShape {
        table: "things",
        columns: "id, label",
        orderable: &["id", "label", "created_at"],
        keyword_columns: &["label", "note"],
        date_column: "created_at",
        area_column: Some("area_id"),
    };

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => q.page = v,
                "page_size" => q.page_size = v,
                "order_by" => q.order_by = v,
                "order_dir" => q.order_dir = v,
                "keyword" => q.keyword = v,
                "start_time" => q.start_time = v,
                "end_time" => q.end_time = v,
                "area_id" => q.area_id = v,
                other => panic!("unknown key {other}"),
            }
        }
        q
    }

    #[test]
    fn defaults_when_empty() {
        let p = ListParams::from_query(&THINGS, ListQuery::default());
        assert_eq!((p.page, p.page_size, p.order_by, p.order_dir), (1, 20, "id", SortDir::Desc));
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn clamps_page_and_size() {
        for (raw_page, raw_size, page, size) in [
            ("0", "0", 1, 20),
            ("-4", "101", 1, 20),
            ("abc", "xyz", 1, 20),
            ("3", "100", 3, 100),
            ("2", "1", 2, 1),
        ] {
            let p = ListParams::from_query(&THINGS, query(&[("page", raw_page), ("page_size", raw_size)]));
            assert_eq!((p.page, p.page_size), (page, size), "{raw_page}/{raw_size}");
        }
    }

    #[test]
    fn order_by_must_be_safelisted() {
        let p = ListParams::from_query(&THINGS, query(&[("order_by", "label"), ("order_dir", "asc")]));
        assert_eq!((p.order_by, p.order_dir), ("label", SortDir::Asc));

        let p = ListParams::from_query(
            &THINGS,
            query(&[("order_by", "id; DROP TABLE things"), ("order_dir", "sideways")]),
        );
        assert_eq!((p.order_by, p.order_dir), ("id", SortDir::Desc));
    }

    #[test]
    fn predicate_combines_filters_in_order() {
        let p = ListParams::from_query(
            &THINGS,
            query(&[
                ("area_id", "4"),
                ("keyword", " red "),
                ("start_time", "2024-01-01"),
                ("end_time", "2024-12-31"),
            ]),
        );
        let pred = predicate(&THINGS, &p);
        assert_eq!(
            pred.clause,
            "WHERE 1=1 AND area_id = ?1 \
             AND (label LIKE ?2 ESCAPE '\\' OR note LIKE ?2 ESCAPE '\\') \
             AND created_at >= ?3 AND created_at <= ?4"
        );
        assert_eq!(pred.len(), 4);
    }

    #[test]
    fn area_is_ignored_without_area_column() {
        let shape = ListShape { area_column: None, ..THINGS };
        let p = ListParams::from_query(&shape, query(&[("area_id", "4")]));
        assert_eq!(p.area_id, None);
        assert_eq!(predicate(&shape, &p).clause, "WHERE 1=1");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    fn seeded(rows: i64) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, label TEXT, note TEXT, area_id INTEGER, created_at TEXT);",
        )
        .unwrap();
        for i in 1..=rows {
            conn.execute(
                "INSERT INTO things (id, label, note, area_id, created_at) VALUES (?1, ?2, '', ?3, ?4)",
                rusqlite::params![i, format!("item {i}"), i % 2, format!("2024-01-{i:02}")],
            )
            .unwrap();
        }
        conn
    }

    fn page_of(conn: &Connection, pairs: &[(&str, &str)]) -> ListPage<(i64, String)> {
        let params = ListParams::from_query(&THINGS, query(pairs));
        fetch_page(conn, &THINGS, &params, |row| Ok((row.get(0)?, row.get(1)?))).unwrap()
    }

    #[test]
    fn huge_page_number_is_empty_not_a_panic() {
        let conn = seeded(3);
        let p = page_of(&conn, &[("page", &i64::MAX.to_string()), ("page_size", "100")]);
        assert_eq!(p.total, 3);
        assert!(p.list.is_empty());
        assert_eq!(p.page, i64::MAX);
    }

    #[test]
    fn pages_sum_to_total() {
        let conn = seeded(23);
        let mut seen = Vec::new();
        for page in 1..=3 {
            let p = page_of(&conn, &[("page", &page.to_string()), ("page_size", "10")]);
            assert_eq!(p.total, 23);
            seen.extend(p.list.iter().map(|l| l.item.0));
        }
        assert_eq!(seen.len(), 23);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 23);
    }

    #[test]
    fn page_past_end_is_empty_with_total() {
        let conn = seeded(5);
        let p = page_of(&conn, &[("page", "9"), ("page_size", "2")]);
        assert!(p.list.is_empty());
        assert_eq!(p.total, 5);
    }

    #[test]
    fn sid_continues_across_pages() {
        let conn = seeded(5);
        let p = page_of(&conn, &[("page", "2"), ("page_size", "2"), ("order_dir", "ASC")]);
        let sids: Vec<_> = p.list.iter().map(|l| (l.sid, l.item.0)).collect();
        assert_eq!(sids, vec![(3, 3), (4, 4)]);
    }

    #[test]
    fn filters_narrow_total() {
        let conn = seeded(10);
        assert_eq!(page_of(&conn, &[("area_id", "0")]).total, 5);
        assert_eq!(page_of(&conn, &[("keyword", "ITEM 1")]).total, 2);
        assert_eq!(page_of(&conn, &[("keyword", "%")]).total, 0);
        assert_eq!(
            page_of(&conn, &[("start_time", "2024-01-03"), ("end_time", "2024-01-05")]).total,
            3
        );
    }
}
