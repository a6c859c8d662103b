use diesel::{connection::SimpleConnection, sqlite::SqliteConnection, QueryResult};

diesel::table! {
    pages (id) {
        id -> Nullable<Integer>,
        parent_id -> Nullable<Integer>,
        title -> Text,
        body -> Text,
        author -> Nullable<Text>,
        slug -> Text,
        active -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    redirects (id) {
        id -> Nullable<Integer>,
        old_path -> Text,
        new_path -> Text,
        usage_count -> Integer,
        last_used -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(pages, redirects);

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER REFERENCES pages (id) ON DELETE SET NULL,
        title VARCHAR(200) NOT NULL,
        body TEXT NOT NULL,
        author VARCHAR(150),
        slug VARCHAR(75) NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    CREATE INDEX IF NOT EXISTS pages_slug ON pages (slug);
    CREATE INDEX IF NOT EXISTS pages_parent_id ON pages (parent_id);

    CREATE TABLE IF NOT EXISTS redirects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        old_path VARCHAR(200) NOT NULL UNIQUE,
        new_path VARCHAR(200) NOT NULL DEFAULT '',
        usage_count INTEGER NOT NULL DEFAULT 0,
        last_used TIMESTAMP NOT NULL
    );
"#;

/// Creates the tables and indexes if they don't exist yet.
pub fn create_tables(connection: &mut SqliteConnection) -> QueryResult<()> {
    connection.batch_execute(CREATE_TABLES)
}
