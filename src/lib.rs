//! Lead and candidate pipeline service: stage transitions, role-scoped
//! visibility, activity timelines and per-lead annotations behind a REST API.

pub mod activities;
pub mod annotations;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod leads;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod service;
pub mod stage;
pub mod team_management;
pub mod timeline;
pub mod visibility;

use actix_web::web;

use crate::stage::Pipeline;

/// Registers every route. Shared by the server binary and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/pipelines/{pipeline}/stages", web::get().to(leads::list_stages))
        .route("/users", web::post().to(team_management::register_user))
        .service(
            web::scope("/teams/{team_id}")
                .service(
                    web::scope("/members")
                        .route("", web::get().to(team_management::get_team_members))
                        .route("", web::post().to(team_management::add_team_member)),
                )
                .service(
                    web::scope("/activities")
                        .route("", web::get().to(activities::list_activities))
                        .route("", web::post().to(activities::create_activity)),
                )
                .service(pipeline_scope("/leads", Pipeline::Sales))
                .service(pipeline_scope("/candidates", Pipeline::Recruitment)),
        );
}

fn pipeline_scope(path: &str, pipeline: Pipeline) -> actix_web::Scope {
    web::scope(path)
        .app_data(web::Data::new(pipeline))
        .route("", web::get().to(leads::list_leads))
        .route("", web::post().to(leads::create_lead))
        .route("/{lead_id}", web::get().to(leads::get_lead))
        .route("/{lead_id}", web::put().to(leads::update_lead))
        .route("/{lead_id}", web::delete().to(leads::delete_lead))
        .route("/{lead_id}/stage", web::put().to(leads::change_stage))
        .route("/{lead_id}/tags", web::post().to(leads::add_tag))
        .route("/{lead_id}/tags/{tag}", web::delete().to(leads::remove_tag))
        .route("/{lead_id}/notes", web::post().to(leads::add_note))
        .route("/{lead_id}/notes/{index}", web::put().to(leads::update_note))
        .route("/{lead_id}/notes/{index}", web::delete().to(leads::remove_note))
        .route("/{lead_id}/objections", web::post().to(leads::add_objection))
        .route(
            "/{lead_id}/activities/summary",
            web::get().to(activities::activity_summary),
        )
}
