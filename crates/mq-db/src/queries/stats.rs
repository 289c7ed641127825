//! Aggregates for the admin dashboard.

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use mq_core::{Error, Result, TitleKind};

use super::{actors, playlists, profiles, titles, users};

/// Total views across all titles on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyViews {
    pub date: String,
    pub views: i64,
}

/// A title ranked by total views.
#[derive(Debug, Clone, Serialize)]
pub struct TopTitle {
    pub title_id: String,
    pub name: String,
    pub kind: String,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub profiles: i64,
    pub movies: i64,
    pub series: i64,
    pub episodes: i64,
    pub actors: i64,
    pub playlists: i64,
    pub total_views: i64,
    /// One entry per day from `today - (days - 1)` to `today`; days without
    /// views are reported as zero.
    pub daily_views: Vec<DailyViews>,
    pub top_titles: Vec<TopTitle>,
}

const TOP_TITLES: i64 = 10;

/// Compute dashboard statistics for the `days` days ending at `today`.
pub fn dashboard(conn: &Connection, days: u32, today: NaiveDate) -> Result<DashboardStats> {
    let days = days.max(1);
    let start = today - Duration::days(i64::from(days) - 1);

    let total_views: i64 = conn
        .query_row("SELECT COALESCE(SUM(count), 0) FROM title_views", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(DashboardStats {
        users: users::count_users(conn)?,
        profiles: profiles::count_all_profiles(conn)?,
        movies: titles::count_titles(conn, TitleKind::Movie)?,
        series: titles::count_titles(conn, TitleKind::Series)?,
        episodes: titles::count_titles(conn, TitleKind::Episode)?,
        actors: actors::count_actors(conn)?,
        playlists: playlists::count_playlists(conn)?,
        total_views,
        daily_views: daily_views(conn, start, today)?,
        top_titles: top_titles(conn, TOP_TITLES)?,
    })
}

fn daily_views(conn: &Connection, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyViews>> {
    let mut stmt = conn
        .prepare(
            "SELECT view_date, SUM(count) FROM title_views
             WHERE view_date >= ?1 AND view_date <= ?2
             GROUP BY view_date",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
    let counted: std::collections::HashMap<String, i64> = stmt
        .query_map(rusqlite::params![fmt(start), fmt(end)], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| {
            let date = fmt(d);
            let views = counted.get(&date).copied().unwrap_or(0);
            DailyViews { date, views }
        })
        .collect())
}

fn top_titles(conn: &Connection, limit: i64) -> Result<Vec<TopTitle>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.name, t.kind, SUM(v.count) AS total
             FROM title_views v
             JOIN titles t ON t.id = v.title_id
             GROUP BY t.id
             ORDER BY total DESC, t.name ASC
             LIMIT ?1",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(TopTitle {
                title_id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
                views: row.get(3)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::titles::TitleFields;
    use crate::queries::views;
    use mq_core::Role;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn empty_database() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let stats = dashboard(&conn, 7, day(10)).unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.total_views, 0);
        assert_eq!(stats.daily_views.len(), 7);
        assert!(stats.daily_views.iter().all(|d| d.views == 0));
        assert_eq!(stats.daily_views[0].date, "2025-03-04");
        assert_eq!(stats.daily_views[6].date, "2025-03-10");
        assert!(stats.top_titles.is_empty());
    }

    #[test]
    fn counts_and_rankings() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let u = users::create_user(&conn, "admin", None, "h", Role::Admin).unwrap();
        profiles::create_profile(&conn, u.id, "Admin", None, false, 5).unwrap();
        let heat = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();
        let dark = titles::create_title(&conn, &TitleFields::new(TitleKind::Series, "Dark")).unwrap();
        actors::create_actor(&conn, "Al Pacino", None, None).unwrap();

        views::record_view(&conn, heat.id, day(9)).unwrap();
        views::record_view(&conn, heat.id, day(10)).unwrap();
        views::record_view(&conn, dark.id, day(10)).unwrap();
        views::record_view(&conn, dark.id, day(1)).unwrap();
        views::record_view(&conn, heat.id, day(1)).unwrap();

        let stats = dashboard(&conn, 3, day(10)).unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.profiles, 1);
        assert_eq!(stats.movies, 1);
        assert_eq!(stats.series, 1);
        assert_eq!(stats.actors, 1);
        assert_eq!(stats.total_views, 5);
        assert_eq!(
            stats.daily_views,
            vec![
                DailyViews { date: "2025-03-08".into(), views: 0 },
                DailyViews { date: "2025-03-09".into(), views: 1 },
                DailyViews { date: "2025-03-10".into(), views: 2 },
            ]
        );
        assert_eq!(stats.top_titles[0].name, "Heat");
        assert_eq!(stats.top_titles[0].views, 3);
        assert_eq!(stats.top_titles[1].views, 2);
    }
}
