//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod jobs;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some(admin) = &config.bootstrap_admin {
        app_state
            .auth_service
            .ensure_admin(&admin.name, &admin.email, &admin.password)
            .await?;
    }

    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas protegidas pelo middleware
    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let call_routes = Router::new()
        .route("/", post(handlers::calls::submit_contact))
        .route("/my", get(handlers::calls::list_my_calls))
        .route("/follow-ups", get(handlers::calls::follow_up_queue))
        .route(
            "/{id}",
            get(handlers::calls::get_call).put(handlers::calls::correct_call),
        )
        .route("/{id}/follow-up", post(handlers::calls::record_follow_up))
        .route("/{id}/follow-up-history", get(handlers::calls::follow_up_history));

    let lead_routes = Router::new()
        .route("/my", get(handlers::leads::list_my_leads))
        .route("/{id}", get(handlers::leads::get_lead));

    // Somente ADMIN (verificado pelo extrator RequireRole em cada handler)
    let admin_routes = Router::new()
        .route("/kpis", get(handlers::dashboard::get_kpis))
        .route("/performance-cards", get(handlers::dashboard::get_performance_cards))
        .route("/salespersons", get(handlers::dashboard::list_salespersons))
        .route("/leads", get(handlers::dashboard::list_leads))
        .route("/calls", get(handlers::dashboard::list_calls));

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/calls", call_routes)
        .nest("/leads", lead_routes)
        .nest("/admin", admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let shutdown_scheduler = jobs::spawn_scheduler(
        app_state.reminder_service.clone(),
        config.reminder_poll,
        config.daily_summary_at,
        config.utc_offset,
    );

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(docs::ApiDoc::openapi()) }))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("🔥 Falha ao escutar Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let _ = shutdown_scheduler.send(true);
    tracing::info!("Servidor encerrado");
    Ok(())
}
