mod handlers;
mod routes;

pub use handlers::{DeletedMember, FindMembersResponse};
pub use routes::router;
