use axum::extract::State;
use axum::Json;
use sb_common::api::DashboardStats;
use sb_common::error::AppResult;

use crate::state::AppState;
use crate::stores::invoice::InvoiceStore;

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = InvoiceStore::new(state.db_pool.clone())
        .dashboard_stats()
        .await?;
    Ok(Json(stats))
}
