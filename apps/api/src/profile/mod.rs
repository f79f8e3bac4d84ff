//! User profile endpoints. The profile is a single document; updates merge
//! into the stored version so a client can PATCH-style PUT a subset of keys.

use axum::{extract::State, Json};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::state::AppState;
use crate::store::ProfileStore;

/// GET /api/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.store.load_profile().await?))
}

/// PUT /api/profile — merges the given keys into the stored document and
/// validates the result before saving.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> Result<Json<Profile>, AppError> {
    let Value::Object(patch) = patch else {
        return Err(AppError::Validation(
            "profile update must be a JSON object".to_string(),
        ));
    };

    let current = state.store.load_profile().await?;
    let mut document = serde_json::to_value(&current).map_err(anyhow::Error::new)?;
    if let Value::Object(document) = &mut document {
        for (key, value) in patch {
            document.insert(key, value);
        }
    }

    let updated: Profile = serde_json::from_value(document)
        .map_err(|e| AppError::Validation(format!("invalid profile: {e}")))?;
    state.store.save_profile(&updated).await?;

    Ok(Json(updated))
}
