use actix_web::{web, App, HttpServer};
use articles_backend::config::AppConfig;
use articles_backend::job_controller::state::{self, JobsState};
use articles_backend::services;
use articles_backend::store::RecordStore;
use env_logger::Env;
use log::{error, info};
use tokio::sync::mpsc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    // Fail early on a bad schema declaration rather than on the first run.
    if let Err(e) = config.registry() {
        error!("Invalid schema configuration: {}", e);
        return Err(std::io::Error::other(e.to_string()));
    }
    RecordStore::open(&config.database_path)
        .and_then(|store| store.ensure_tables())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let (tx, rx) = mpsc::channel(100);
    let jobs_state = JobsState::new(tx);

    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        state::start_job_updater(updater_state, rx).await;
    });

    let host = config.host.clone();
    let port = config.port;
    info!("Server running at http://{}:{}", host, port);

    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(jobs_state.clone()))
            .app_data(config.clone())
            .service(services::pipeline::configure_routes())
            .service(services::data_sources::csv::configure_routes())
            .service(services::quarantine::configure_routes())
            .service(services::dimensions::configure_routes())
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
