//! Catalog title CRUD, listing and search.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{Error, Result, TitleId, TitleKind};

use super::{is_foreign_key_violation, like_pattern, now_ts};
use crate::models::Title;

/// Column list used in SELECT statements.
const COLS: &str = "id, kind, name, sort_name, overview, year, genre, runtime_minutes,
    rating, thumbnail_url, video_path, parent_id, season_number, episode_number,
    created_at, updated_at";

/// Editable fields of a title, used for both insert and update.
#[derive(Debug, Clone)]
pub struct TitleFields<'a> {
    pub kind: TitleKind,
    pub name: &'a str,
    pub sort_name: Option<&'a str>,
    pub overview: Option<&'a str>,
    pub year: Option<i32>,
    pub genre: Option<&'a str>,
    pub runtime_minutes: Option<i32>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<&'a str>,
    pub parent_id: Option<TitleId>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

impl<'a> TitleFields<'a> {
    /// Minimal fields for a title of the given kind.
    pub fn new(kind: TitleKind, name: &'a str) -> Self {
        Self {
            kind,
            name,
            sort_name: None,
            overview: None,
            year: None,
            genre: None,
            runtime_minutes: None,
            rating: None,
            thumbnail_url: None,
            parent_id: None,
            season_number: None,
            episode_number: None,
        }
    }
}

/// Listing filter for [`list_titles`] and [`search_titles`].
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    pub kind: Option<TitleKind>,
    pub genre: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

/// Episodes must point at an existing series; other kinds must not have a
/// parent.
fn check_parent(conn: &Connection, fields: &TitleFields<'_>) -> Result<()> {
    match (fields.kind, fields.parent_id) {
        (TitleKind::Episode, Some(parent)) => {
            let parent_title =
                get_title(conn, parent)?.ok_or_else(|| Error::not_found("series", parent))?;
            if parent_title.kind != TitleKind::Series {
                return Err(Error::Validation("An episode's parent must be a series".into()));
            }
            Ok(())
        }
        (TitleKind::Episode, None) => {
            Err(Error::Validation("An episode requires a parent series".into()))
        }
        (_, Some(_)) => Err(Error::Validation(format!(
            "A {} cannot have a parent title",
            fields.kind
        ))),
        (_, None) => Ok(()),
    }
}

/// Create a new title.
pub fn create_title(conn: &Connection, fields: &TitleFields<'_>) -> Result<Title> {
    check_parent(conn, fields)?;

    let id = TitleId::new();
    let now = now_ts();

    conn.execute(
        "INSERT INTO titles (id, kind, name, sort_name, overview, year, genre,
            runtime_minutes, rating, thumbnail_url, video_path, parent_id,
            season_number, episode_number, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,NULL,?11,?12,?13,?14,?15)",
        rusqlite::params![
            id.to_string(),
            fields.kind.as_str(),
            fields.name,
            fields.sort_name,
            fields.overview,
            fields.year,
            fields.genre,
            fields.runtime_minutes,
            fields.rating,
            fields.thumbnail_url,
            fields.parent_id.map(|p| p.to_string()),
            fields.season_number,
            fields.episode_number,
            &now,
            &now,
        ],
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            Error::Validation("Parent title does not exist".into())
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Title {
        id,
        kind: fields.kind,
        name: fields.name.to_string(),
        sort_name: fields.sort_name.map(String::from),
        overview: fields.overview.map(String::from),
        year: fields.year,
        genre: fields.genre.map(String::from),
        runtime_minutes: fields.runtime_minutes,
        rating: fields.rating,
        thumbnail_url: fields.thumbnail_url.map(String::from),
        video_path: None,
        parent_id: fields.parent_id,
        season_number: fields.season_number,
        episode_number: fields.episode_number,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a title by ID.
pub fn get_title(conn: &Connection, id: TitleId) -> Result<Option<Title>> {
    let q = format!("SELECT {COLS} FROM titles WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], Title::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List browsable titles with optional kind/genre filters.
///
/// Episodes are only listed when explicitly requested by kind; otherwise
/// they are reached through their series.
pub fn list_titles(conn: &Connection, filter: &TitleFilter) -> Result<Vec<Title>> {
    let q = format!(
        "SELECT {COLS} FROM titles
         WHERE (?1 IS NULL AND kind != 'episode' OR kind = ?1)
           AND (?2 IS NULL OR lower(genre) = lower(?2))
         ORDER BY COALESCE(sort_name, name) COLLATE NOCASE ASC, rowid ASC
         LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                filter.kind.map(|k| k.as_str()),
                filter.genre.as_deref(),
                filter.limit,
                filter.offset
            ],
            Title::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Case-insensitive substring search over name and overview, narrowed by
/// the kind and genre of `filter` and paged by its offset and limit. Name
/// matches rank ahead of overview-only matches. Without a kind, every kind
/// (episodes included) is searched.
pub fn search_titles(conn: &Connection, query: &str, filter: &TitleFilter) -> Result<Vec<Title>> {
    let q = format!(
        "SELECT {COLS} FROM titles
         WHERE (name LIKE ?1 ESCAPE '\\' OR overview LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR kind = ?2)
           AND (?3 IS NULL OR lower(genre) = lower(?3))
         ORDER BY CASE WHEN name LIKE ?1 ESCAPE '\\' THEN 0 ELSE 1 END,
                  COALESCE(sort_name, name) COLLATE NOCASE ASC, rowid ASC
         LIMIT ?4 OFFSET ?5"
    );
    let pattern = like_pattern(query);
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                pattern,
                filter.kind.map(|k| k.as_str()),
                filter.genre.as_deref(),
                filter.limit,
                filter.offset
            ],
            Title::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Replace the editable fields of a title. The kind is fixed at creation.
pub fn update_title(conn: &Connection, id: TitleId, fields: &TitleFields<'_>) -> Result<bool> {
    let existing = match get_title(conn, id)? {
        Some(t) => t,
        None => return Ok(false),
    };
    if existing.kind != fields.kind {
        return Err(Error::Validation("A title's kind cannot be changed".into()));
    }
    if fields.parent_id == Some(id) {
        return Err(Error::Validation("A title cannot be its own parent".into()));
    }
    check_parent(conn, fields)?;

    let n = conn
        .execute(
            "UPDATE titles SET name=?1, sort_name=?2, overview=?3, year=?4, genre=?5,
                runtime_minutes=?6, rating=?7, thumbnail_url=?8, parent_id=?9,
                season_number=?10, episode_number=?11, updated_at=?12
             WHERE id=?13",
            rusqlite::params![
                fields.name,
                fields.sort_name,
                fields.overview,
                fields.year,
                fields.genre,
                fields.runtime_minutes,
                fields.rating,
                fields.thumbnail_url,
                fields.parent_id.map(|p| p.to_string()),
                fields.season_number,
                fields.episode_number,
                now_ts(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Attach (or replace) the video file backing a title.
pub fn set_video_path(conn: &Connection, id: TitleId, video_path: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE titles SET video_path = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![video_path, now_ts(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Video files referenced by a title and, for a series, by its episodes.
pub fn video_paths(conn: &Connection, id: TitleId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT video_path FROM titles
             WHERE (id = ?1 OR parent_id = ?1) AND video_path IS NOT NULL",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([id.to_string()], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete a title. Episodes of a series, cast links, bookmarks, playlist
/// entries, progress and view counters are removed by cascade.
pub fn delete_title(conn: &Connection, id: TitleId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM titles WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// List the episodes of a series, ordered by season then episode number.
pub fn list_episodes(conn: &Connection, series_id: TitleId) -> Result<Vec<Title>> {
    let q = format!(
        "SELECT {COLS} FROM titles WHERE parent_id = ?1 AND kind = 'episode'
         ORDER BY COALESCE(season_number, 0), COALESCE(episode_number, 0), name ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], Title::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Distinct non-empty genres, alphabetically.
pub fn list_genres(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT genre FROM titles
             WHERE genre IS NOT NULL AND genre != ''
             ORDER BY genre COLLATE NOCASE ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Number of titles of a kind.
pub fn count_titles(conn: &Connection, kind: TitleKind) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM titles WHERE kind = ?1",
        [kind.as_str()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    fn movie<'a>(name: &'a str, genre: Option<&'a str>) -> TitleFields<'a> {
        TitleFields {
            genre,
            ..TitleFields::new(TitleKind::Movie, name)
        }
    }

    #[test]
    fn create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t = create_title(
            &conn,
            &TitleFields {
                year: Some(1994),
                rating: Some(8.9),
                ..movie("Pulp Fiction", Some("Crime"))
            },
        )
        .unwrap();

        let found = get_title(&conn, t.id).unwrap().unwrap();
        assert_eq!(found.name, "Pulp Fiction");
        assert_eq!(found.kind, TitleKind::Movie);
        assert_eq!(found.year, Some(1994));
        assert!(found.video_path.is_none());
    }

    #[test]
    fn list_filters_and_hides_episodes() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_title(&conn, &movie("Heat", Some("Crime"))).unwrap();
        create_title(&conn, &movie("Alien", Some("Horror"))).unwrap();
        let series = create_title(&conn, &TitleFields::new(TitleKind::Series, "Dark")).unwrap();
        create_title(
            &conn,
            &TitleFields {
                parent_id: Some(series.id),
                season_number: Some(1),
                episode_number: Some(1),
                ..TitleFields::new(TitleKind::Episode, "Secrets")
            },
        )
        .unwrap();

        let all = list_titles(&conn, &TitleFilter { limit: 50, ..Default::default() }).unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alien", "Dark", "Heat"]);

        let crime = list_titles(
            &conn,
            &TitleFilter {
                genre: Some("crime".into()),
                limit: 50,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(crime.len(), 1);

        let episodes = list_titles(
            &conn,
            &TitleFilter {
                kind: Some(TitleKind::Episode),
                limit: 50,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(list_genres(&conn).unwrap(), vec!["Crime", "Horror"]);
    }

    #[test]
    fn pagination() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        for name in ["A", "B", "C", "D"] {
            create_title(&conn, &movie(name, None)).unwrap();
        }
        let page = list_titles(
            &conn,
            &TitleFilter {
                offset: 1,
                limit: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<_> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn search_ranks_name_matches_first() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_title(
            &conn,
            &TitleFields {
                overview: Some("A space crew meets an alien"),
                ..movie("Nostromo Log", None)
            },
        )
        .unwrap();
        create_title(&conn, &movie("Alien", None)).unwrap();
        create_title(&conn, &movie("Heat", None)).unwrap();

        let all = TitleFilter {
            limit: 10,
            ..Default::default()
        };
        let results = search_titles(&conn, "ALIEN", &all).unwrap();
        let names: Vec<_> = results.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alien", "Nostromo Log"]);
        assert!(search_titles(&conn, "%", &all).unwrap().is_empty());
    }

    #[test]
    fn search_respects_kind_and_paging() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_title(&conn, &movie("Dark Movie", None)).unwrap();
        create_title(&conn, &TitleFields::new(TitleKind::Series, "Dark")).unwrap();

        let series_only = TitleFilter {
            kind: Some(TitleKind::Series),
            limit: 10,
            ..Default::default()
        };
        let results = search_titles(&conn, "dark", &series_only).unwrap();
        let names: Vec<_> = results.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Dark"]);

        let page = |offset| TitleFilter {
            offset,
            limit: 1,
            ..Default::default()
        };
        let first = search_titles(&conn, "dark", &page(0)).unwrap();
        let second = search_titles(&conn, "dark", &page(1)).unwrap();
        assert_eq!(first[0].name, "Dark");
        assert_eq!(second[0].name, "Dark Movie");
        assert!(search_titles(&conn, "dark", &page(2)).unwrap().is_empty());
    }

    #[test]
    fn episodes_require_series_parent() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let film = create_title(&conn, &movie("Heat", None)).unwrap();

        let orphan = create_title(&conn, &TitleFields::new(TitleKind::Episode, "Pilot"));
        assert!(matches!(orphan, Err(Error::Validation(_))));

        let under_movie = create_title(
            &conn,
            &TitleFields {
                parent_id: Some(film.id),
                ..TitleFields::new(TitleKind::Episode, "Pilot")
            },
        );
        assert!(matches!(under_movie, Err(Error::Validation(_))));
    }

    #[test]
    fn episodes_ordered_and_cascade() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let series = create_title(&conn, &TitleFields::new(TitleKind::Series, "Dark")).unwrap();
        for (s, e, name) in [(2, 1, "S2E1"), (1, 2, "S1E2"), (1, 1, "S1E1")] {
            create_title(
                &conn,
                &TitleFields {
                    parent_id: Some(series.id),
                    season_number: Some(s),
                    episode_number: Some(e),
                    ..TitleFields::new(TitleKind::Episode, name)
                },
            )
            .unwrap();
        }

        let eps = list_episodes(&conn, series.id).unwrap();
        let names: Vec<_> = eps.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["S1E1", "S1E2", "S2E1"]);

        assert!(delete_title(&conn, series.id).unwrap());
        assert_eq!(count_titles(&conn, TitleKind::Episode).unwrap(), 0);
    }

    #[test]
    fn update_keeps_kind() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t = create_title(&conn, &movie("Heta", None)).unwrap();

        assert!(update_title(&conn, t.id, &movie("Heat", Some("Crime"))).unwrap());
        assert_eq!(get_title(&conn, t.id).unwrap().unwrap().name, "Heat");

        let err = update_title(&conn, t.id, &TitleFields::new(TitleKind::Series, "Heat"));
        assert!(matches!(err, Err(Error::Validation(_))));
        assert!(!update_title(&conn, TitleId::new(), &movie("Ghost", None)).unwrap());
    }

    #[test]
    fn video_path_attach() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t = create_title(&conn, &movie("Heat", None)).unwrap();
        assert!(set_video_path(&conn, t.id, "/videos/heat.mp4").unwrap());
        assert_eq!(
            get_title(&conn, t.id).unwrap().unwrap().video_path.as_deref(),
            Some("/videos/heat.mp4")
        );
    }

    #[test]
    fn video_paths_include_episodes() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let series = create_title(&conn, &TitleFields::new(TitleKind::Series, "Dark")).unwrap();
        let pilot = create_title(
            &conn,
            &TitleFields {
                parent_id: Some(series.id),
                ..TitleFields::new(TitleKind::Episode, "Secrets")
            },
        )
        .unwrap();
        create_title(
            &conn,
            &TitleFields {
                parent_id: Some(series.id),
                ..TitleFields::new(TitleKind::Episode, "Lies")
            },
        )
        .unwrap();
        let other = create_title(&conn, &movie("Heat", None)).unwrap();
        set_video_path(&conn, pilot.id, "/videos/secrets.mp4").unwrap();
        set_video_path(&conn, other.id, "/videos/heat.mp4").unwrap();

        assert_eq!(video_paths(&conn, series.id).unwrap(), vec!["/videos/secrets.mp4"]);
        assert_eq!(video_paths(&conn, other.id).unwrap(), vec!["/videos/heat.mp4"]);
    }
}
