// src/activities.rs

use actix_web::{web, HttpRequest, HttpResponse};

use crate::app_state::AppState;
use crate::auth::session_for;
use crate::error::PipelineResult;
use crate::models::{ActivityFilter, NewActivity};
use crate::stage::Pipeline;

/// GET /teams/{team_id}/activities?lead_id=
/// Newest first. Without `lead_id`, covers every lead the caller can see.
pub async fn list_activities(
    req: HttpRequest,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    query: web::Query<ActivityFilter>,
) -> PipelineResult<HttpResponse> {
    let session = session_for(&req, &data, &team_id).await?;
    let activities = data
        .service
        .list_activities(&session, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(activities))
}

/// POST /teams/{team_id}/activities
pub async fn create_activity(
    req: HttpRequest,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    payload: web::Json<NewActivity>,
) -> PipelineResult<HttpResponse> {
    let session = session_for(&req, &data, &team_id).await?;
    let activity = data
        .service
        .create_activity(&session, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(activity))
}

/// GET /teams/{team_id}/leads/{lead_id}/activities/summary
pub async fn activity_summary(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let summary = data.service.activity_summary(&session, &lead_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}
