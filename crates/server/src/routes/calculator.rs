use axum::{extract::State, Json};
use serde::Deserialize;
use service::calculator::{CalculatorState, Key};

use crate::errors::JsonApiError;
use crate::routes::WithNotice;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeyPress {
    pub key: String,
}

pub async fn state(State(state): State<AppState>) -> Json<CalculatorState> {
    Json(state.calculator.state().await)
}

pub async fn press(
    State(state): State<AppState>,
    Json(req): Json<KeyPress>,
) -> Result<Json<WithNotice<CalculatorState>>, JsonApiError> {
    let key = req.key.parse::<Key>()?;
    let committed = state.calculator.press(key).await;
    Ok(Json(WithNotice::new(committed.value, committed.notice)))
}
