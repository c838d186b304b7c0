use crate::error::StackTrace;
use crate::handler::AppModule;
use axum::http::HeaderValue;
use error_stack::{Report, ResultExt};
use kernel::KernelError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

mod controller;
mod error;
mod handler;
mod request;
mod response;
mod route;

static SERVER_HOST: &str = "SERVER_HOST";
static SERVER_PORT: &str = "SERVER_PORT";
static CORS_ALLOW_ORIGIN: &str = "CORS_ALLOW_ORIGIN";
static LOG_DIR: &str = "LOG_DIR";

fn cors() -> error_stack::Result<CorsLayer, KernelError> {
    let origin = match dotenvy::var(CORS_ALLOW_ORIGIN) {
        Ok(origin) => AllowOrigin::exact(
            HeaderValue::from_str(&origin)
                .change_context_lazy(|| KernelError::Internal)
                .attach_printable_lazy(|| format!("Invalid {}: {}", CORS_ALLOW_ORIGIN, origin))?,
        ),
        Err(_) => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

fn bind_address() -> error_stack::Result<SocketAddr, KernelError> {
    let host = dotenvy::var(SERVER_HOST).unwrap_or_else(|_| "0.0.0.0".into());
    let port = dotenvy::var(SERVER_PORT).unwrap_or_else(|_| "8080".into());
    format!("{}:{}", host, port).parse::<SocketAddr>().map_err(|e| {
        Report::new(e)
            .change_context(KernelError::Internal)
            .attach_printable(format!("Invalid bind address {}:{}", host, port))
    })
}

#[tokio::main]
async fn main() -> Result<(), StackTrace> {
    let _ = dotenvy::dotenv();

    let log_dir = dotenvy::var(LOG_DIR).unwrap_or_else(|_| "./logs/".into());
    let appender = tracing_appender::rolling::daily(std::path::Path::new(&log_dir), "debug.log");
    let (non_blocking_appender, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_filter(tracing_subscriber::EnvFilter::new(
                    std::env::var("RUST_LOG").unwrap_or_else(|_| {
                        "driver=debug,application=debug,server=debug,tower_http=debug,sqlx=info"
                            .into()
                    }),
                ))
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
        )
        .with(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(non_blocking_appender)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
        )
        .init();

    let app = AppModule::new().await?;

    let router = route::api(app)
        .layer(cors()?)
        .layer(TraceLayer::new_for_http());

    let bind = bind_address()?;
    let tcp = TcpListener::bind(bind)
        .await
        .change_context_lazy(|| KernelError::Internal)
        .attach_printable_lazy(|| format!("Failed to listen tcp on {}", bind))?;
    tracing::info!(%bind, "Listening");

    axum::serve(tcp, router.into_make_service())
        .await
        .change_context_lazy(|| KernelError::Internal)?;

    Ok(())
}
