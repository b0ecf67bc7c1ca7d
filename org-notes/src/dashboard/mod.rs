mod handlers;
mod routes;

pub use handlers::Dashboard;
pub use routes::router;
