use axum::Router;

pub mod comments;
pub mod games;
pub mod groups;
pub mod notifications;
pub mod posts;
pub mod surveys;
pub mod system;
pub mod users;

/// Router for every endpoint that sees the caller context.
pub fn router() -> Router {
    Router::new()
        .merge(groups::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(surveys::router())
        .merge(games::router())
        .merge(users::router())
        .merge(notifications::router())
}
