// src/main.rs

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info};

use leadline::app_state::AppState;
use leadline::auth::Authentication;
use leadline::config::{self, Config};
use leadline::db::MongoDB;
use leadline::repository::{LeadRepository, MemoryRepository, MongoRepository};
use leadline::service::LeadService;

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    error!("Startup failed: {}", e);
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(startup_error)?;

    let repo: Arc<dyn LeadRepository> = match &config.mongo_uri {
        Some(uri) => {
            let mongodb = MongoDB::init(uri, &config.database_name)
                .await
                .map_err(startup_error)?;
            Arc::new(MongoRepository::new(mongodb))
        }
        None => {
            info!("MONGO_URI not set, keeping data in memory");
            Arc::new(MemoryRepository::new())
        }
    };
    let service = Arc::new(LeadService::new(repo));

    if let Some(path) = &config.directory_file {
        let directory = config::load_directory_file(path).map_err(startup_error)?;
        service.load_directory(directory).await.map_err(startup_error)?;
    }

    let state = AppState { service, config: config.clone() };
    let bind_addr = config.bind_addr.clone();

    info!("Server running at http://{}", bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
                http::header::HeaderName::from_static("x-view-as"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(&state.config.jwt_secret))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(leadline::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
