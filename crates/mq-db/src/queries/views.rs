//! Per-day view counters.

use chrono::NaiveDate;
use rusqlite::Connection;
use mq_core::{Error, Result, TitleId};

use super::is_foreign_key_violation;
use crate::models::TitleView;

/// Count one view of `title_id` on `date`, creating the day's row on first
/// view. Returns the updated count for the day.
pub fn record_view(conn: &Connection, title_id: TitleId, date: NaiveDate) -> Result<i64> {
    let day = date.format("%Y-%m-%d").to_string();
    conn.query_row(
        "INSERT INTO title_views (title_id, view_date, count) VALUES (?1, ?2, 1)
         ON CONFLICT(title_id, view_date) DO UPDATE SET count = count + 1
         RETURNING count",
        rusqlite::params![title_id.to_string(), day],
        |row| row.get(0),
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            Error::not_found("title", title_id)
        } else {
            Error::database(e.to_string())
        }
    })
}

/// Daily counters for a title, oldest day first.
pub fn views_for_title(conn: &Connection, title_id: TitleId) -> Result<Vec<TitleView>> {
    let mut stmt = conn
        .prepare(
            "SELECT title_id, view_date, count FROM title_views
             WHERE title_id = ?1 ORDER BY view_date ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([title_id.to_string()], TitleView::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Sum of all views of a title.
pub fn total_views(conn: &Connection, title_id: TitleId) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(count), 0) FROM title_views WHERE title_id = ?1",
        [title_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::titles::{self, TitleFields};
    use mq_core::TitleKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn same_day_views_increment() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();

        assert_eq!(record_view(&conn, t.id, day(1)).unwrap(), 1);
        assert_eq!(record_view(&conn, t.id, day(1)).unwrap(), 2);
        assert_eq!(record_view(&conn, t.id, day(2)).unwrap(), 1);

        let rows = views_for_title(&conn, t.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].view_date, "2025-03-01");
        assert_eq!(rows[0].count, 2);
        assert_eq!(total_views(&conn, t.id).unwrap(), 3);
    }

    #[test]
    fn unknown_title() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let err = record_view(&conn, TitleId::new(), day(1)).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(total_views(&conn, TitleId::new()).unwrap(), 0);
    }
}
