// team_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;

use crate::app_state::AppState;
use crate::auth::{caller_id, session_for};
use crate::error::PipelineResult;
use crate::models::{AddMemberRequest, RegisterUserRequest};

// GET /teams/{team_id}/members
// Only a user who belongs to the team can view its members.
pub async fn get_team_members(
    req: HttpRequest,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
) -> PipelineResult<HttpResponse> {
    let session = session_for(&req, &data, &team_id).await?;
    let members = data.service.team_members(&session).await?;
    Ok(HttpResponse::Ok().json(members))
}

// POST /teams/{team_id}/members
// Team admins add an existing user to the team.
pub async fn add_team_member(
    req: HttpRequest,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    payload: web::Json<AddMemberRequest>,
) -> PipelineResult<HttpResponse> {
    debug!("add_team_member called for team {} with payload: {:?}", team_id, payload);
    let session = session_for(&req, &data, &team_id).await?;
    let membership = data
        .service
        .add_team_member(&session, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(membership))
}

// POST /users
// Admin-only registration of directory users.
pub async fn register_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<RegisterUserRequest>,
) -> PipelineResult<HttpResponse> {
    let current_user = caller_id(&req)?;
    let user = data
        .service
        .register_user(&current_user, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(user))
}
