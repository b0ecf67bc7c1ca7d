use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE users (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username TEXT,
                phone TEXT,
                password TEXT NOT NULL,

                role TEXT NOT NULL DEFAULT 'user' CHECK(role IN ('admin', 'editor', 'viewer', 'user')),
                organization_slug TEXT NOT NULL,

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME
            );

            CREATE INDEX users_organization_slug ON users (organization_slug);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE notes (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                user_id BLOB CHECK(length(user_id) = 16),
                organization_slug TEXT NOT NULL,

                title TEXT NOT NULL CHECK(length(trim(title)) > 0),
                description TEXT,
                content TEXT,
                is_public INTEGER NOT NULL DEFAULT 0,

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME,

                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE SET NULL
            );

            CREATE INDEX notes_user_id ON notes (user_id);
            CREATE INDEX notes_organization_slug ON notes (organization_slug, created_at);
            CREATE INDEX notes_is_public ON notes (is_public, created_at);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE invites (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                token TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL COLLATE NOCASE,
                role TEXT NOT NULL CHECK(role IN ('admin', 'editor', 'viewer', 'user')),
                organization_slug TEXT NOT NULL,

                invited_by BLOB CHECK(length(invited_by) = 16),
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                expires_at DATETIME NOT NULL,
                accepted_at DATETIME,

                FOREIGN KEY (invited_by) REFERENCES users (id) ON DELETE SET NULL
            );

            CREATE TABLE password_resets (
                token TEXT PRIMARY KEY NOT NULL,
                user_id BLOB NOT NULL CHECK(length(user_id) = 16),
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                expires_at DATETIME NOT NULL,
                used_at DATETIME,

                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );
        "#
        ),
    ]);
}

