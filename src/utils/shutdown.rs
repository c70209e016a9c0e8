use tokio::sync::watch;

/// Resolves once shutdown has been requested on `shutdown`.
///
/// If the sending side is gone shutdown can never be requested, so this
/// never resolves.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
