//! Actor metadata and title cast links.

use rusqlite::{Connection, OptionalExtension};
use mq_core::{ActorId, Error, Result, TitleId};

use super::{is_foreign_key_violation, now_ts};
use crate::models::{Actor, CastMember, Title};

const COLS: &str = "id, name, bio, photo_url, created_at";

/// Create a new actor.
pub fn create_actor(
    conn: &Connection,
    name: &str,
    bio: Option<&str>,
    photo_url: Option<&str>,
) -> Result<Actor> {
    let id = ActorId::new();
    let created_at = now_ts();

    conn.execute(
        "INSERT INTO actors (id, name, bio, photo_url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), name, bio, photo_url, created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Actor {
        id,
        name: name.to_string(),
        bio: bio.map(String::from),
        photo_url: photo_url.map(String::from),
        created_at,
    })
}

pub fn get_actor(conn: &Connection, id: ActorId) -> Result<Option<Actor>> {
    let q = format!("SELECT {COLS} FROM actors WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], Actor::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List actors by name, optionally filtered by a name prefix.
pub fn list_actors(
    conn: &Connection,
    name_prefix: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Actor>> {
    let prefix = name_prefix.map(|p| {
        let escaped = p.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("{escaped}%")
    });
    let q = format!(
        "SELECT {COLS} FROM actors
         WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
         ORDER BY name COLLATE NOCASE ASC, rowid ASC
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![prefix, limit, offset], Actor::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn count_actors(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM actors", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Delete an actor and every cast credit pointing at it.
pub fn delete_actor(conn: &Connection, id: ActorId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM actors WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Credit an actor on a title, replacing any existing credit for the pair.
pub fn link_actor(
    conn: &Connection,
    title_id: TitleId,
    actor_id: ActorId,
    character: Option<&str>,
    billing_order: i32,
) -> Result<()> {
    conn.execute(
        "INSERT INTO title_actors (title_id, actor_id, character, billing_order)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(title_id, actor_id)
         DO UPDATE SET character = excluded.character, billing_order = excluded.billing_order",
        rusqlite::params![title_id.to_string(), actor_id.to_string(), character, billing_order],
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            Error::not_found("title or actor", format!("{title_id}/{actor_id}"))
        } else {
            Error::database(e.to_string())
        }
    })?;
    Ok(())
}

/// Remove an actor's credit from a title.
pub fn unlink_actor(conn: &Connection, title_id: TitleId, actor_id: ActorId) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM title_actors WHERE title_id = ?1 AND actor_id = ?2",
            rusqlite::params![title_id.to_string(), actor_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Cast of a title in billing order.
pub fn list_cast(conn: &Connection, title_id: TitleId) -> Result<Vec<CastMember>> {
    let mut stmt = conn
        .prepare(
            "SELECT a.id, a.name, a.bio, a.photo_url, a.created_at, ta.character, ta.billing_order
             FROM title_actors ta
             JOIN actors a ON a.id = ta.actor_id
             WHERE ta.title_id = ?1
             ORDER BY ta.billing_order ASC, a.name COLLATE NOCASE ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([title_id.to_string()], CastMember::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Titles an actor is credited on, newest release first.
pub fn list_filmography(conn: &Connection, actor_id: ActorId) -> Result<Vec<Title>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.kind, t.name, t.sort_name, t.overview, t.year, t.genre,
                    t.runtime_minutes, t.rating, t.thumbnail_url, t.video_path, t.parent_id,
                    t.season_number, t.episode_number, t.created_at, t.updated_at
             FROM title_actors ta
             JOIN titles t ON t.id = ta.title_id
             WHERE ta.actor_id = ?1
             ORDER BY t.year IS NULL, t.year DESC, t.name COLLATE NOCASE ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([actor_id.to_string()], Title::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::titles::{self, TitleFields};
    use mq_core::TitleKind;

    #[test]
    fn cast_in_billing_order() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let film = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();
        let pacino = create_actor(&conn, "Al Pacino", None, None).unwrap();
        let de_niro = create_actor(&conn, "Robert De Niro", Some("Actor"), None).unwrap();

        link_actor(&conn, film.id, de_niro.id, Some("Neil McCauley"), 2).unwrap();
        link_actor(&conn, film.id, pacino.id, Some("Vincent Hanna"), 1).unwrap();

        let cast = list_cast(&conn, film.id).unwrap();
        assert_eq!(cast.len(), 2);
        assert_eq!(cast[0].actor.name, "Al Pacino");
        assert_eq!(cast[1].character.as_deref(), Some("Neil McCauley"));
    }

    #[test]
    fn link_is_upsert() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let film = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();
        let actor = create_actor(&conn, "Val Kilmer", None, None).unwrap();

        link_actor(&conn, film.id, actor.id, Some("Chris"), 3).unwrap();
        link_actor(&conn, film.id, actor.id, Some("Chris Shiherlis"), 0).unwrap();

        let cast = list_cast(&conn, film.id).unwrap();
        assert_eq!(cast.len(), 1);
        assert_eq!(cast[0].character.as_deref(), Some("Chris Shiherlis"));
        assert_eq!(cast[0].billing_order, 0);

        assert!(unlink_actor(&conn, film.id, actor.id).unwrap());
        assert!(list_cast(&conn, film.id).unwrap().is_empty());
    }

    #[test]
    fn link_unknown_actor_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let film = titles::create_title(&conn, &TitleFields::new(TitleKind::Movie, "Heat")).unwrap();
        let err = link_actor(&conn, film.id, ActorId::new(), None, 0).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn filmography_and_delete() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let actor = create_actor(&conn, "Sigourney Weaver", None, None).unwrap();
        for (name, year) in [("Alien", 1979), ("Aliens", 1986)] {
            let t = titles::create_title(
                &conn,
                &TitleFields {
                    year: Some(year),
                    ..TitleFields::new(TitleKind::Movie, name)
                },
            )
            .unwrap();
            link_actor(&conn, t.id, actor.id, Some("Ripley"), 0).unwrap();
        }

        let films = list_filmography(&conn, actor.id).unwrap();
        let names: Vec<_> = films.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Aliens", "Alien"]);

        assert!(delete_actor(&conn, actor.id).unwrap());
        assert!(list_filmography(&conn, actor.id).unwrap().is_empty());
        assert_eq!(count_actors(&conn).unwrap(), 0);
    }

    #[test]
    fn list_by_prefix() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        for name in ["Tom Hanks", "Tom Hardy", "Emma Stone"] {
            create_actor(&conn, name, None, None).unwrap();
        }
        assert_eq!(list_actors(&conn, Some("tom"), 0, 10).unwrap().len(), 2);
        assert_eq!(list_actors(&conn, None, 0, 10).unwrap().len(), 3);
        assert_eq!(list_actors(&conn, None, 2, 10).unwrap()[0].name, "Tom Hardy");
    }
}
