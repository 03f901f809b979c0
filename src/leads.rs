// src/leads.rs

//! Lead and candidate endpoints. The same handlers serve `/leads` and
//! `/candidates`; the scope's `Pipeline` data decides which vocabulary applies.
//! A lead is only reachable under its own pipeline's routes, and its pipeline
//! is fixed at creation, so checking it before a write cannot go stale.

use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::session_for;
use crate::error::PipelineResult;
use crate::models::{LeadFilter, LeadUpdate, LeadView, NewLead, NewObjection};
use crate::stage::{Pipeline, Stage, StageRegistry};
use crate::visibility::VisibleLeads;

#[derive(Debug, Deserialize)]
pub struct StageChangeRequest {
    pub stage: String,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct StageList {
    pub pipeline: Pipeline,
    pub stages: &'static [Stage],
}

/// GET /pipelines/{pipeline}/stages
pub async fn list_stages(path: web::Path<String>) -> PipelineResult<HttpResponse> {
    let pipeline = Pipeline::parse(&path.into_inner())?;
    let registry = StageRegistry::for_pipeline(pipeline);
    Ok(HttpResponse::Ok().json(StageList { pipeline, stages: registry.stages() }))
}

/// GET /teams/{team_id}/leads?pipeline=
///
/// Without a `pipeline` query the scope's own pipeline is listed.
pub async fn list_leads(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    team_id: web::Path<String>,
    query: web::Query<LeadFilter>,
) -> PipelineResult<HttpResponse> {
    let session = session_for(&req, &data, &team_id).await?;
    let filter = LeadFilter { pipeline: query.pipeline.or(Some(*pipeline.get_ref())) };
    let visible = data.service.list_leads(&session, filter).await?;
    debug!(
        "list_leads for {} in team {}: {} rows ({:?})",
        session.user_id,
        session.team_id,
        visible.leads.len(),
        visible.view
    );
    Ok(HttpResponse::Ok().json(VisibleLeads {
        view: visible.view,
        can_assign: visible.can_assign,
        leads: visible.leads.into_iter().map(LeadView::from).collect::<Vec<_>>(),
    }))
}

/// POST /teams/{team_id}/leads
pub async fn create_lead(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    team_id: web::Path<String>,
    payload: web::Json<NewLead>,
) -> PipelineResult<HttpResponse> {
    let session = session_for(&req, &data, &team_id).await?;
    let mut new_lead = payload.into_inner();
    new_lead.pipeline = Some(*pipeline.get_ref());
    let lead = data.service.create_lead(&session, new_lead).await?;
    Ok(HttpResponse::Created().json(LeadView::from(lead)))
}

/// GET /teams/{team_id}/leads/{lead_id}
pub async fn get_lead(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    let lead = data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// PUT /teams/{team_id}/leads/{lead_id}
pub async fn update_lead(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    payload: web::Json<LeadUpdate>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.update_lead(&session, &lead_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// DELETE /teams/{team_id}/leads/{lead_id}
pub async fn delete_lead(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    data.service.delete_lead(&session, &lead_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /teams/{team_id}/leads/{lead_id}/stage
pub async fn change_stage(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    payload: web::Json<StageChangeRequest>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.change_stage(&session, &lead_id, &payload.stage).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// POST /teams/{team_id}/leads/{lead_id}/tags
pub async fn add_tag(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    payload: web::Json<TagRequest>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.add_tag(&session, &lead_id, &payload.tag).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// DELETE /teams/{team_id}/leads/{lead_id}/tags/{tag}
pub async fn remove_tag(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String, String)>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id, tag) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.remove_tag(&session, &lead_id, &tag).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// POST /teams/{team_id}/leads/{lead_id}/notes
pub async fn add_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    payload: web::Json<NoteRequest>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.add_note(&session, &lead_id, &payload.text).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// PUT /teams/{team_id}/leads/{lead_id}/notes/{index}
pub async fn update_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String, usize)>,
    payload: web::Json<NoteRequest>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id, index) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data
        .service
        .update_note(&session, &lead_id, index, &payload.text)
        .await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// DELETE /teams/{team_id}/leads/{lead_id}/notes/{index}
pub async fn remove_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String, usize)>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id, index) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data.service.remove_note(&session, &lead_id, index).await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}

/// POST /teams/{team_id}/leads/{lead_id}/objections
pub async fn add_objection(
    req: HttpRequest,
    data: web::Data<AppState>,
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    payload: web::Json<NewObjection>,
) -> PipelineResult<HttpResponse> {
    let (team_id, lead_id) = path.into_inner();
    let session = session_for(&req, &data, &team_id).await?;
    data.service.get_lead_in(&session, &lead_id, *pipeline.get_ref()).await?;
    let lead = data
        .service
        .add_objection(&session, &lead_id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(LeadView::from(lead)))
}
