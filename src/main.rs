mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use services::mail::ResendMailer;
use services::report::ReportFonts;
use services::storage::SftpStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let queries = db::catalog::QueryCatalog::load(config.queries_path.as_deref()).expect("query catalog load failed");
    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let port = config.port;
    let sftp = config.sftp.clone();
    let mail = config.mail.clone();
    let fonts = ReportFonts::discover(std::path::Path::new(&config.fonts_path));
    let mut state = state::AppState::new(pool, config, queries);

    match sftp {
        Some(sftp) => match (SftpStore::avatars(&sftp), SftpStore::dog_photos(&sftp)) {
            (Ok(avatars), Ok(dog_photos)) => {
                state = state.with_image_stores(Arc::new(avatars), Arc::new(dog_photos));
            }
            (Err(e), _) | (_, Err(e)) => tracing::warn!(error = %e, "image storage misconfigured, uploads disabled"),
        },
        None => tracing::warn!("SSH_HOST not set, uploads disabled"),
    }

    match mail {
        Some(mail) => state = state.with_mailer(Arc::new(ResendMailer::new(&mail))),
        None => tracing::warn!("RESEND_API_KEY or MAIL_FROM not set, welcome mail disabled"),
    }

    if !fonts.is_unicode() {
        tracing::warn!(path = %state.config.fonts_path, "no report font found, reports limited to Latin-1");
    }
    state = state.with_report_fonts(fonts);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "doghub listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
