use super::AppState;
use crate::agent_card::AgentCard;
use axum::{extract::State, Json};

/// Handle /.well-known/agent.json and /.well-known/agent-card.json
pub async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.card.card().await)
}
