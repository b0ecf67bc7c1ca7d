use crate::ctx::Ctx;

use super::{Note, Scope};

fn is_owner(ctx: &Ctx, note: &Note) -> bool {
    note.user_id.is_some() && note.user_id == ctx.get_user_id()
}

/// Public board notes have no owner; anyone may tidy them up.
fn is_public_board_note(note: &Note) -> bool {
    note.user_id.is_none() && note.is_public
}

pub fn can_read(ctx: &Ctx, note: &Note) -> bool {
    note.is_public || is_owner(ctx, note) || ctx.is_admin_of(&note.organization_slug)
}

pub fn can_update(ctx: &Ctx, note: &Note) -> bool {
    is_public_board_note(note)
        || (is_owner(ctx, note) && ctx.capabilities().can_edit)
        || ctx.is_admin_of(&note.organization_slug)
}

pub fn can_delete(ctx: &Ctx, note: &Note) -> bool {
    is_public_board_note(note)
        || (is_owner(ctx, note) && ctx.capabilities().can_delete)
        || ctx.is_admin_of(&note.organization_slug)
}

impl Scope {
    /// Row-level twin of the listing query, used to filter realtime events.
    pub fn includes(self, ctx: &Ctx, note: &Note) -> bool {
        match self {
            Scope::Mine => is_owner(ctx, note),
            Scope::Organization => {
                ctx.user
                    .as_ref()
                    .is_some_and(|user| user.organization_slug == note.organization_slug)
                    && can_read(ctx, note)
            }
            Scope::Public => note.is_public,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::users::{Role, User};

    fn user(role: Role, organization_slug: &str) -> User {
        User {
            id: Uuid::now_v7(),
            email: format!("{role}@{organization_slug}.com"),
            username: None,
            phone: None,
            role,
            organization_slug: organization_slug.into(),
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    fn note(owner: Option<&User>, organization_slug: &str, is_public: bool) -> Note {
        Note {
            id: Uuid::now_v7(),
            user_id: owner.map(|u| u.id),
            organization_slug: organization_slug.into(),
            title: "title".into(),
            description: None,
            content: None,
            is_public,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn private_notes_are_for_owner_and_admin() {
        let owner = user(Role::User, "acme");
        let colleague = user(Role::Editor, "acme");
        let admin = user(Role::Admin, "acme");
        let foreign_admin = user(Role::Admin, "globex");
        let private = note(Some(&owner), "acme", false);

        assert!(can_read(&Ctx::new(Some(owner)), &private));
        assert!(!can_read(&Ctx::new(Some(colleague)), &private));
        assert!(can_delete(&Ctx::new(Some(admin)), &private));
        assert!(!can_read(&Ctx::new(Some(foreign_admin)), &private));
        assert!(!can_read(&Ctx::default(), &private));
    }

    #[test]
    fn viewers_cannot_change_their_own_notes() {
        let viewer = user(Role::Viewer, "acme");
        let own = note(Some(&viewer), "acme", false);
        let ctx = Ctx::new(Some(viewer));

        assert!(can_read(&ctx, &own));
        assert!(!can_update(&ctx, &own));
        assert!(!can_delete(&ctx, &own));
    }

    #[test]
    fn public_board_notes_are_open_to_everyone() {
        let board = note(None, "public-notes", true);
        let owned_public = note(Some(&user(Role::User, "acme")), "acme", true);

        assert!(can_update(&Ctx::default(), &board));
        assert!(can_delete(&Ctx::default(), &board));
        assert!(can_read(&Ctx::default(), &owned_public));
        assert!(!can_update(&Ctx::default(), &owned_public));
    }

    #[test]
    fn organization_scope_stays_inside_the_organization() {
        let member = user(Role::User, "acme");
        let outsider_note = note(Some(&user(Role::User, "globex")), "globex", true);
        let colleague_note = note(Some(&user(Role::User, "acme")), "acme", true);
        let ctx = Ctx::new(Some(member));

        assert!(!Scope::Organization.includes(&ctx, &outsider_note));
        assert!(Scope::Organization.includes(&ctx, &colleague_note));
        assert!(Scope::Public.includes(&ctx, &outsider_note));
        assert!(!Scope::Mine.includes(&ctx, &colleague_note));
    }
}
