pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::applications;
use crate::embedding::handlers as embedding_handlers;
use crate::jobs::handlers as job_handlers;
use crate::profile;
use crate::scoring::handlers as scoring_handlers;
use crate::search::handlers as search_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_handler))
        // Jobs
        .route("/api/jobs", get(job_handlers::handle_list_jobs))
        .route("/api/jobs/search", get(job_handlers::handle_search_jobs))
        .route("/api/jobs/score", post(scoring_handlers::handle_score_batch))
        .route("/api/jobs/embed", post(embedding_handlers::handle_embed_batch))
        .route(
            "/api/jobs/:id",
            get(job_handlers::handle_get_job)
                .patch(job_handlers::handle_update_job)
                .delete(job_handlers::handle_delete_job),
        )
        .route("/api/jobs/:id/score", post(scoring_handlers::handle_score_job))
        .route("/api/jobs/:id/embed", post(embedding_handlers::handle_embed_job))
        .route(
            "/api/jobs/:id/similar",
            get(embedding_handlers::handle_similar_jobs),
        )
        // Search runs & semantic retrieval
        .route("/api/search/run", post(search_handlers::handle_run_search))
        .route("/api/search/runs", get(search_handlers::handle_list_runs))
        .route(
            "/api/search/semantic",
            get(search_handlers::handle_semantic_search),
        )
        // Profile
        .route(
            "/api/profile",
            get(profile::handle_get_profile).put(profile::handle_update_profile),
        )
        // Applications
        .route(
            "/api/applications",
            get(applications::handle_list_applications)
                .post(applications::handle_create_application),
        )
        .route(
            "/api/applications/:id",
            get(applications::handle_get_application)
                .patch(applications::handle_update_application),
        )
        .with_state(state)
}
