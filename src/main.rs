use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};

use zerotrust_auth_core::config::AppConfig;
use zerotrust_auth_core::handlers::{auth, dev_otp, health};
use zerotrust_auth_core::middleware::auth_interceptor::auth_interceptor;
use zerotrust_auth_core::middleware::error_handling::AppError;
use zerotrust_auth_core::middleware::ip_rate_limiter::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use zerotrust_auth_core::middleware::metrics::{metrics_handler, metrics_middleware};
use zerotrust_auth_core::middleware::request_id::request_id_middleware;
use zerotrust_auth_core::middleware::security_headers::security_headers_middleware;
use zerotrust_auth_core::repositories::dev_otp_store::InMemoryDevOtpStore;
use zerotrust_auth_core::repositories::pg::{
    PgAuditRepository, PgDeviceRepository, PgIdentityRepository, PgMembershipRepository,
    PgMfaChallengeRepository, PgMfaIntentRepository, PgOrgMfaSettingsRepository,
    PgOrgPolicyRuleRepository, PgPlatformSettingsRepository, PgSessionRepository,
    PgUserRepository,
};
use zerotrust_auth_core::repositories::sms_sender::{HttpOtpSender, NoopOtpSender};
use zerotrust_auth_core::repositories::traits::{AuditRepository, DevOtpStore, OtpSender, SessionRepository};
use zerotrust_auth_core::services::auth_service::{AuthService, AuthServiceDeps};
use zerotrust_auth_core::services::password_hasher::PasswordHasher;
use zerotrust_auth_core::services::policy_evaluator::PolicyEvaluator;
use zerotrust_auth_core::services::telemetry::{NoopTelemetryEmitter, Telemetry};
use zerotrust_auth_core::services::token_signer::TokenSigner;
use zerotrust_auth_core::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_core=info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    let config = AppConfig::from_env().await?;
    let addr: SocketAddr = config.server_address().parse()?;

    let app = create_app(config);

    tracing::info!(%addr, "starting authentication core");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Mounted when the auth core is administratively disabled: every auth
/// operation returns `Unimplemented`, and no authorization interceptor is
/// installed since there is no identity to validate.
fn stub_auth_router() -> Router<AppConfig> {
    async fn unimplemented() -> AppError {
        AppError::Unimplemented
    }

    Router::new()
        .route("/register", post(unimplemented))
        .route("/verify-credentials", post(unimplemented))
        .route("/login", post(unimplemented))
        .route("/submit-phone", post(unimplemented))
        .route("/verify-mfa", post(unimplemented))
        .route("/refresh", post(unimplemented))
        .route("/logout", post(unimplemented))
}

fn create_app(config: AppConfig) -> Router {
    let cors = cors_layer(&config.cors_origins);

    if !config.auth_enabled {
        tracing::warn!("auth core disabled, mounting stub router");
        return Router::new()
            .nest("/v1/auth", stub_auth_router())
            .route("/v1/health", get(health::health_check_disabled))
            .route("/metrics", get(metrics_handler))
            .layer(cors)
            .with_state(config);
    }

    let pool = config
        .database_pool
        .clone()
        .expect("auth_enabled implies database_pool is set");

    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let identities = Arc::new(PgIdentityRepository::new(pool.clone()));
    let sessions: Arc<dyn SessionRepository> = Arc::new(PgSessionRepository::new(pool.clone()));
    let devices = Arc::new(PgDeviceRepository::new(pool.clone()));
    let memberships = Arc::new(PgMembershipRepository::new(pool.clone()));
    let platform_settings = Arc::new(PgPlatformSettingsRepository::new(pool.clone()));
    let org_mfa_settings = Arc::new(PgOrgMfaSettingsRepository::new(pool.clone()));
    let org_policy_rules = Arc::new(PgOrgPolicyRuleRepository::new(pool.clone()));
    let mfa_challenges = Arc::new(PgMfaChallengeRepository::new(pool.clone()));
    let mfa_intents = Arc::new(PgMfaIntentRepository::new(pool.clone()));
    let audit: Arc<dyn AuditRepository> = Arc::new(PgAuditRepository::new(pool.clone()));

    let otp_sender: Arc<dyn OtpSender> = match &config.sms_provider_credentials {
        Some(credentials) => Arc::new(HttpOtpSender::new(credentials.clone())),
        None => Arc::new(NoopOtpSender),
    };

    let dev_otp_store: Option<Arc<dyn DevOtpStore>> = if config.dev_otp_enabled() {
        Some(Arc::new(InMemoryDevOtpStore::new()))
    } else {
        None
    };

    let token_signer = TokenSigner::new(
        config
            .jwt_encoding_key
            .clone()
            .expect("auth_enabled implies jwt_encoding_key is set"),
        config
            .jwt_decoding_key
            .clone()
            .expect("auth_enabled implies jwt_decoding_key is set"),
        config.jwt_algorithm,
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
        config.jwt_access_ttl,
        config.jwt_refresh_ttl,
    );
    let password_hasher = PasswordHasher::new(config.bcrypt_cost);
    let policy_evaluator = Arc::new(PolicyEvaluator::new());
    let telemetry = Telemetry::new(Arc::new(NoopTelemetryEmitter));

    let auth_service = Arc::new(AuthService::new(
        AuthServiceDeps {
            users,
            identities,
            sessions: sessions.clone(),
            devices,
            memberships,
            platform_settings,
            org_mfa_settings,
            org_policy_rules,
            mfa_challenges,
            mfa_intents,
            otp_sender,
            dev_otp_store: dev_otp_store.clone(),
            audit: audit.clone(),
            telemetry: telemetry.clone(),
        },
        password_hasher,
        token_signer.clone(),
        config.mfa_challenge_ttl,
    ));

    let state = AppState {
        auth_service,
        token_signer,
        sessions,
        audit,
        telemetry,
        policy_evaluator,
        dev_otp_store,
        config: config.clone(),
    };

    let mut auth_router = Router::new()
        .route("/register", post(auth::register))
        .route("/verify-credentials", post(auth::verify_credentials))
        .route("/login", post(auth::login))
        .route("/submit-phone", post(auth::submit_phone_and_request_mfa))
        .route("/verify-mfa", post(auth::verify_mfa))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    if state.config.dev_otp_enabled() {
        auth_router = auth_router.route("/dev-otp/peek/:challenge_id", get(dev_otp::peek_otp));
    }

    let auth_rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::auth()));
    let auth_router = auth_router.layer(
        ServiceBuilder::new()
            .layer(Extension(auth_rate_limiter))
            .layer(axum::middleware::from_fn(rate_limit_middleware)),
    );

    let protected = Router::new()
        .nest("/v1/auth", auth_router)
        .route("/v1/health", get(health::health_check))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_interceptor,
        ));

    Router::new()
        .merge(protected)
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn(security_headers_middleware))
                .layer(axum::middleware::from_fn(metrics_middleware)),
        )
        .with_state(state)
}
