use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    config,
    ctx::BaseParams,
    notes::{self, Note, Scope},
    users::{self, Capabilities, User},
    Result,
};

/// Everything a dashboard renders, shaped by the caller's capabilities.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Dashboard {
    pub profile: User,
    pub capabilities: Capabilities,
    pub notes: Vec<Note>,
    /// Organization members, for admins only.
    pub members: Option<Vec<User>>,
}

pub enum DashboardOutcome {
    Redirect(String),
    Render(Dashboard),
}

/// `path` is the requested path, kept for the login redirect.
pub async fn dashboard(
    organization_slug: String,
    role: Option<String>,
    path: &str,
    base: BaseParams,
) -> Result<DashboardOutcome> {
    let Some(user) = base.ctx.user.clone() else {
        return Ok(DashboardOutcome::Redirect(format!(
            "{}?redirectedFrom={}",
            config().login_path,
            urlencoding::encode(path)
        )));
    };

    if organization_slug != user.organization_slug || role.as_deref() != Some(user.role.as_str()) {
        tracing::debug!(requested = path, expected = %user.dashboard_path(), "dashboard redirect");
        return Ok(DashboardOutcome::Redirect(user.dashboard_path()));
    }

    let capabilities = user.role.capabilities();
    let db = base.db.clone();
    let notes = notes::find_notes(Scope::Organization, base).await?.results;
    let members = if capabilities.is_admin {
        Some(users::store::find_by_organization(db, user.organization_slug.clone()).await?)
    } else {
        None
    };

    Ok(DashboardOutcome::Render(Dashboard {
        profile: user,
        capabilities,
        notes,
        members,
    }))
}
