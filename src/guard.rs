use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Error;
use crate::models::Category;

// Every mutation path runs through these checks, in this order:
// missing record, then global marker (categories only), then owner mismatch.

pub fn owned_category(conn: &Connection, user_id: i64, id: i64) -> Result<Category, Error> {
    let category = fetch_category(conn, id)?.ok_or(Error::NotFound("Category"))?;
    match category.user_id {
        None => Err(Error::GlobalResource),
        Some(owner) if owner != user_id => Err(Error::NotAuthorized),
        Some(_) => Ok(category),
    }
}

/// Resolves a category for use by a new or updated record. A category that
/// exists but belongs to someone else reports "not found", so the check never
/// leaks whether another user's category id is taken.
pub fn usable_category(conn: &Connection, user_id: i64, id: i64) -> Result<Category, Error> {
    match fetch_category(conn, id)? {
        Some(category) if category.user_id == Some(user_id) => Ok(category),
        _ => Err(Error::NotFound("Category")),
    }
}

pub fn owned_record(conn: &Connection, table: &str, user_id: i64, id: i64) -> Result<(), Error> {
    let owner: Option<i64> = conn
        .query_row(
            &format!("SELECT user_id FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let not_found = if table == "incomes" {
        Error::NotFound("Income")
    } else {
        Error::NotFound("Expense")
    };
    match owner {
        None => Err(not_found),
        Some(owner) if owner != user_id => Err(Error::NotAuthorized),
        Some(_) => Ok(()),
    }
}

fn fetch_category(conn: &Connection, id: i64) -> Result<Option<Category>, Error> {
    let category = conn
        .query_row(
            "SELECT id, name, color, icon, type, user_id FROM categories WHERE id = ?1",
            params![id],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                    icon: row.get(3)?,
                    category_type: row.get(4)?,
                    user_id: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(category)
}

#[cfg(test)]
mod tests {
    use rusqlite::{params, Connection};

    use crate::db::init_db;
    use crate::error::Error;

    use super::{owned_category, owned_record, usable_category};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (email, password_hash) VALUES ('a@test.com', 'x'), ('b@test.com', 'x')",
            [],
        )
        .unwrap();
        conn
    }

    fn insert_category(conn: &Connection, name: &str, user_id: Option<i64>) -> i64 {
        conn.execute(
            "INSERT INTO categories (name, type, user_id) VALUES (?1, 'EXPENSE', ?2)",
            params![name, user_id],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn missing_category_is_not_found() {
        let conn = setup();
        assert!(matches!(
            owned_category(&conn, 1, 999),
            Err(Error::NotFound("Category"))
        ));
    }

    #[test]
    fn global_category_is_denied_before_ownership() {
        let conn = setup();
        let id = insert_category(&conn, "Transport", None);
        // Both users get the global-resource denial, never the mismatch one.
        assert!(matches!(owned_category(&conn, 1, id), Err(Error::GlobalResource)));
        assert!(matches!(owned_category(&conn, 2, id), Err(Error::GlobalResource)));
    }

    #[test]
    fn foreign_category_is_not_authorized() {
        let conn = setup();
        let id = insert_category(&conn, "Loisirs", Some(1));
        assert!(matches!(owned_category(&conn, 2, id), Err(Error::NotAuthorized)));
        assert!(owned_category(&conn, 1, id).is_ok());
    }

    #[test]
    fn usable_category_masks_foreign_ownership() {
        let conn = setup();
        let id = insert_category(&conn, "Salaire", Some(1));
        assert!(matches!(
            usable_category(&conn, 2, id),
            Err(Error::NotFound("Category"))
        ));
        assert!(usable_category(&conn, 1, id).is_ok());
    }

    #[test]
    fn usable_category_rejects_global_defaults() {
        let conn = setup();
        let id = insert_category(&conn, "Transport", None);
        assert!(matches!(
            usable_category(&conn, 1, id),
            Err(Error::NotFound("Category"))
        ));
    }

    #[test]
    fn record_ownership_mismatch() {
        let conn = setup();
        let category = insert_category(&conn, "Alimentation", Some(1));
        conn.execute(
            "INSERT INTO expenses (title, amount, date, user_id, category_id)
             VALUES ('Lunch', 12.0, '2024-03-04', 1, ?1)",
            params![category],
        )
        .unwrap();
        let id = conn.last_insert_rowid();

        assert!(matches!(
            owned_record(&conn, "expenses", 2, id),
            Err(Error::NotAuthorized)
        ));
        assert!(owned_record(&conn, "expenses", 1, id).is_ok());
        assert!(matches!(
            owned_record(&conn, "incomes", 1, id),
            Err(Error::NotFound("Income"))
        ));
    }
}
