pub mod query;
pub mod routes;

pub use routes::{AppState, router};

use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::AppError;

/// Serves the router on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
