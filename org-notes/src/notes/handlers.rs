use rusqlite::{params, OptionalExtension};
use sea_query::{Cond, Expr, Iden, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_rusqlite::{RusqliteBinder, RusqliteValues};

use crate::{
    config,
    ctx::{BaseParams, Ctx},
    db::{self, DB},
    realtime::ChangeEvent,
    users::UserId,
    Error, Result,
};

use super::{
    access::{can_delete, can_read, can_update},
    export::{self, ExportFormat},
    CreateNote, FindNotesResponse, Note, NoteId, Scope, UpdateNote, NOTE_COLUMNS,
};

#[derive(Iden)]
pub enum Notes {
    Table,
    Id,
    UserId,
    OrganizationSlug,
    Title,
    Description,
    Content,
    IsPublic,
    CreatedAt,
    UpdatedAt,
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("Note title cannot be empty".into()));
    }
    Ok(title.to_string())
}

fn not_found() -> Error {
    Error::NotFound("Note not found".into())
}

fn list_query(scope: Scope, ctx: &Ctx) -> Result<SelectStatement> {
    let mut query = Query::select();
    query
        .columns({
            use Notes::*;
            [Id, UserId, OrganizationSlug, Title, Description, Content, IsPublic, CreatedAt, UpdatedAt]
        })
        .from(Notes::Table);

    let condition = match scope {
        Scope::Mine => {
            let user = ctx.require_user()?;
            Cond::all().add(Expr::col(Notes::UserId).eq(user.id))
        }
        Scope::Organization => {
            let user = ctx.require_user()?;
            let organization = Cond::all().add(Expr::col(Notes::OrganizationSlug).eq(user.organization_slug.clone()));
            if ctx.is_admin_of(&user.organization_slug) {
                organization
            } else {
                organization.add(
                    Cond::any()
                        .add(Expr::col(Notes::IsPublic).eq(true))
                        .add(Expr::col(Notes::UserId).eq(user.id)),
                )
            }
        }
        Scope::Public => Cond::all().add(Expr::col(Notes::IsPublic).eq(true)),
    };

    query
        .cond_where(condition)
        .order_by(Notes::CreatedAt, Order::Desc)
        .order_by(Notes::Id, Order::Desc);

    Ok(query)
}

/// Statements are built before any await, `SelectStatement` is not `Send`.
async fn select_notes(db: DB, (sql, values): (String, RusqliteValues)) -> Result<Vec<Note>> {
    db.call(move |conn| {
        let notes = conn
            .prepare(&sql)?
            .query_map(&*values.as_params(), |row| Note::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

fn find_note(conn: &rusqlite::Connection, note_id: NoteId) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
        params![note_id],
        |row| Note::try_from(row),
    )
    .optional()
}

/// Notes the caller may not read are reported as missing.
fn readable(ctx: &Ctx, note: Option<Note>) -> Result<Note> {
    note.filter(|note| can_read(ctx, note)).ok_or_else(not_found)
}

pub async fn find_notes(scope: Scope, BaseParams { db, ctx, .. }: BaseParams) -> Result<FindNotesResponse> {
    let statement = list_query(scope, &ctx)?.build_rusqlite(SqliteQueryBuilder);
    let notes = select_notes(db, statement).await?;

    Ok(FindNotesResponse { results: notes })
}

async fn insert_note(
    db: DB,
    user_id: Option<UserId>,
    organization_slug: String,
    CreateNote {
        title,
        description,
        content,
        is_public,
    }: CreateNote,
) -> Result<Note> {
    let title = validate_title(&title)?;

    db.call(move |conn| {
        conn.query_row(
            &format!(
                r#"INSERT INTO notes (user_id, organization_slug, title, description, content, is_public, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING {NOTE_COLUMNS}"#
            ),
            params![
                user_id,
                organization_slug,
                title,
                description,
                content,
                is_public,
                chrono::Utc::now()
            ],
            |row| Note::try_from(row),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

pub async fn create_note(args: CreateNote, BaseParams { db, ctx, changes }: BaseParams) -> Result<Note> {
    let user = ctx.require_user()?;
    if !ctx.capabilities().can_edit {
        return Err(Error::Forbidden("Your role cannot create notes".into()));
    }

    let note = insert_note(db, Some(user.id), user.organization_slug.clone(), args).await?;
    tracing::info!(note_id = %note.id, "note created");

    changes.notes.publish(ChangeEvent::Created { new: note.clone() });
    Ok(note)
}

/// Anonymous post to the public board. The note has no owner, even when the caller is signed in.
pub async fn create_public_note(args: CreateNote, BaseParams { db, changes, .. }: BaseParams) -> Result<Note> {
    let args = CreateNote {
        is_public: true,
        ..args
    };

    let note = insert_note(db, None, config().public_org_slug.clone(), args).await?;
    tracing::info!(note_id = %note.id, "public board note created");

    changes.notes.publish(ChangeEvent::Created { new: note.clone() });
    Ok(note)
}

pub async fn get_note(note_id: NoteId, BaseParams { db, ctx, .. }: BaseParams) -> Result<Note> {
    let note = db
        .call(move |conn| find_note(conn, note_id).map_err(|e| e.into()))
        .await
        .map_err(db::Error::from)?;

    readable(&ctx, note)
}

pub async fn update_note(
    note_id: NoteId,
    UpdateNote {
        title,
        description,
        content,
        is_public,
    }: UpdateNote,
    BaseParams { db, ctx, changes }: BaseParams,
) -> Result<Note> {
    let title = title.as_deref().map(validate_title).transpose()?;

    let (old, new) = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let old = readable(&ctx, find_note(&tx, note_id)?)?;
            if !can_update(&ctx, &old) {
                return Err(Error::Forbidden("You cannot edit this note".into()).into());
            }

            let new = tx.query_row(
                &format!(
                    r#"UPDATE notes SET
                        title = coalesce(?1, title),
                        description = CASE WHEN ?2 THEN ?3 ELSE description END,
                        content = CASE WHEN ?4 THEN ?5 ELSE content END,
                        is_public = coalesce(?6, is_public),
                        updated_at = ?7
                    WHERE id = ?8
                    RETURNING {NOTE_COLUMNS}"#
                ),
                params![
                    title,
                    description.is_some(),
                    description.flatten(),
                    content.is_some(),
                    content.flatten(),
                    is_public,
                    chrono::Utc::now(),
                    note_id
                ],
                |row| Note::try_from(row),
            )?;

            tx.commit()?;
            Ok((old, new))
        })
        .await?;

    tracing::info!(note_id = %new.id, "note updated");
    changes.notes.publish(ChangeEvent::Modified {
        old,
        new: new.clone(),
    });

    Ok(new)
}

pub async fn delete_note(note_id: NoteId, BaseParams { db, ctx, changes }: BaseParams) -> Result<Note> {
    let deleted = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let note = readable(&ctx, find_note(&tx, note_id)?)?;
            if !can_delete(&ctx, &note) {
                return Err(Error::Forbidden("You cannot delete this note".into()).into());
            }

            tx.execute("DELETE FROM notes WHERE id = ?", params![note_id])?;
            tx.commit()?;
            Ok(note)
        })
        .await?;

    tracing::info!(note_id = %deleted.id, "note deleted");
    changes.notes.publish(ChangeEvent::Removed { old: deleted.clone() });

    Ok(deleted)
}

pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Exports the notes of `scope`, narrowed to `ids` when a selection is given.
pub async fn export_notes(
    scope: Scope,
    format: ExportFormat,
    ids: Option<Vec<NoteId>>,
    BaseParams { db, ctx, .. }: BaseParams,
) -> Result<ExportFile> {
    let statement = {
        let mut query = list_query(scope, &ctx)?;
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Err(Error::Validation("Select at least one note to export".into()));
            }
            query.and_where(Expr::col(Notes::Id).is_in(ids));
        }
        query.build_rusqlite(SqliteQueryBuilder)
    };

    let notes = select_notes(db, statement).await?;
    let body = export::render(&notes, format)?;
    tracing::info!(notes = notes.len(), format = format.extension(), "notes exported");

    Ok(ExportFile {
        file_name: export::file_name(&notes, format, chrono::Utc::now()),
        content_type: format.content_type(),
        body,
    })
}
