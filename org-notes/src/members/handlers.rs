use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    auth::store::{self as invites, Invite, NewInvite},
    config,
    ctx::BaseParams,
    notes::{Note, NOTE_COLUMNS},
    realtime::ChangeEvent,
    users::{self, Role, User, UserId, USER_COLUMNS},
    Error, Result,
};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindMembersResponse {
    pub results: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InviteMemberArgs {
    pub email: String,
    pub role: Role,
}

/// Export bundle of a removed member, taken before anything was changed.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeletedMember {
    pub user: User,
    pub timestamp: DateTime<Utc>,
    pub notes: Vec<Note>,
    /// Public notes now owned by the admin who removed the member.
    pub reassigned: usize,
    /// Private notes that were deleted.
    pub deleted: usize,
}

pub async fn find_members(BaseParams { db, ctx, .. }: BaseParams) -> Result<FindMembersResponse> {
    let admin = ctx.require_admin()?;
    let members = users::store::find_by_organization(db, admin.organization_slug.clone()).await?;

    Ok(FindMembersResponse { results: members })
}

pub async fn invite_member(
    InviteMemberArgs { email, role }: InviteMemberArgs,
    BaseParams { db, ctx, .. }: BaseParams,
) -> Result<Invite> {
    let admin = ctx.require_admin()?;
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Validation("Email is not valid".into()));
    }

    let invite = invites::create_invite(
        db,
        NewInvite {
            email,
            role,
            organization_slug: admin.organization_slug.clone(),
            invited_by: admin.id,
            ttl: Duration::hours(config().invite_ttl_hours),
        },
    )
    .await?;

    // no mail transport: the token is handed over in the response and the logs
    tracing::info!(invite_id = %invite.id, email = %invite.email, role = %invite.role, token = %invite.token, "member invited");
    Ok(invite)
}

/// Removes a member of the admin's organization in one transaction: public
/// notes move to the admin, private notes are deleted with the account.
pub async fn delete_member(user_id: UserId, BaseParams { db, ctx, changes }: BaseParams) -> Result<DeletedMember> {
    let admin = ctx.require_admin()?.clone();
    if admin.id == user_id {
        return Err(Error::Forbidden("You cannot delete your own account".into()));
    }

    let (user, notes, reassigned, deleted) = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let user = tx
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                    params![user_id],
                    |row| User::try_from(row),
                )
                .optional()?
                .filter(|user| user.organization_slug == admin.organization_slug)
                .ok_or_else(|| Error::NotFound("Member not found".into()))?;

            let notes = tx
                .prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ? ORDER BY created_at DESC, id DESC"
                ))?
                .query_map(params![user_id], |row| Note::try_from(row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let reassigned = tx
                .prepare(&format!(
                    "UPDATE notes SET user_id = ?, updated_at = ? WHERE user_id = ? AND is_public = 1 RETURNING {NOTE_COLUMNS}"
                ))?
                .query_map(params![admin.id, Utc::now(), user_id], |row| Note::try_from(row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let deleted = tx.execute(
                "DELETE FROM notes WHERE user_id = ? AND is_public = 0",
                params![user_id],
            )?;
            tx.execute("DELETE FROM users WHERE id = ?", params![user_id])?;

            tx.commit()?;
            Ok((user, notes, reassigned, deleted))
        })
        .await?;

    tracing::info!(
        user_id = %user.id,
        reassigned = reassigned.len(),
        deleted,
        "member deleted"
    );

    for old in &notes {
        match reassigned.iter().find(|new| new.id == old.id) {
            Some(new) => changes.notes.publish(ChangeEvent::Modified {
                old: old.clone(),
                new: new.clone(),
            }),
            None => changes.notes.publish(ChangeEvent::Removed { old: old.clone() }),
        }
    }
    changes.users.publish(ChangeEvent::Removed { old: user.clone() });

    Ok(DeletedMember {
        user,
        timestamp: Utc::now(),
        notes,
        reassigned: reassigned.len(),
        deleted,
    })
}

pub async fn profile(BaseParams { db, ctx, .. }: BaseParams) -> Result<User> {
    let user = ctx.require_user()?;
    let user = users::store::find_one_by_id(db, user.id).await?;
    Ok(user)
}
