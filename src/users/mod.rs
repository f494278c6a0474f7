use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users))
        .route("/stats", get(handlers::stats))
        .route("/scholar-accounts", get(handlers::scholar_accounts))
        .route("/admin-accounts", get(handlers::admin_accounts))
        .route("/super-admin-accounts", get(handlers::super_admin_accounts))
        .route("/admin-placements", get(handlers::admin_placements))
        .route("/create-admin", post(handlers::create_admin))
        .route("/update-admin/:id", put(handlers::update_admin))
        .route(
            "/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/:id/password", patch(handlers::change_password))
        .route("/:id/role", patch(handlers::change_role))
}
