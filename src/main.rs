// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use assessment_backend::config::Config;
use assessment_backend::engine::SessionRegistry;
use assessment_backend::models::{
    role::Role,
    user::{User, UserStatus},
};
use assessment_backend::repository::{
    MemoryCatalogStore, MemoryProgressStore, MemorySubmissionService, MemoryUserStore,
    PgCatalogStore, PgProgressStore, PgSubmissionService, PgUserStore,
};
use assessment_backend::routes;
use assessment_backend::state::{AppState, Stores};
use assessment_backend::utils::hash::hash_password;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let stores = match &config.database_url {
        Some(database_url) => postgres_stores(database_url, &config).await,
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all data in memory");
            memory_stores(&config).await
        }
    };

    let state = AppState::new(config.clone(), stores);
    SessionRegistry::spawn_sweeper(&state.sessions, &config.session);

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

async fn postgres_stores(database_url: &str, config: &Config) -> Stores {
    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    Stores {
        users: Arc::new(PgUserStore::new(pool.clone())),
        catalog: Arc::new(PgCatalogStore::new(pool.clone())),
        progress: Arc::new(PgProgressStore::new(pool.clone())),
        submissions: Arc::new(PgSubmissionService::new(pool)),
    }
}

async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let hashed_password = hash_password(password)?;
        let created = PgUserStore::new(pool.clone())
            .insert_if_absent(username, &hashed_password, Role::Administrator.as_str())
            .await?;
        if created {
            tracing::info!("Admin user '{}' created successfully.", username);
        }
    }
    Ok(())
}

async fn memory_stores(config: &Config) -> Stores {
    let users = MemoryUserStore::new();

    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        match hash_password(password) {
            Ok(hashed_password) => {
                users
                    .insert(User {
                        id: 1,
                        username: username.clone(),
                        password: hashed_password,
                        role: Role::Administrator.as_str().to_string(),
                        permissions: None,
                        status: UserStatus::Active,
                    })
                    .await;
                tracing::info!("Seeded in-memory admin user '{}'", username);
            }
            Err(e) => tracing::error!("Failed to seed admin user: {:?}", e),
        }
    }

    Stores {
        users: Arc::new(users),
        catalog: Arc::new(MemoryCatalogStore::new()),
        progress: Arc::new(MemoryProgressStore::new()),
        submissions: Arc::new(MemorySubmissionService::new()),
    }
}
