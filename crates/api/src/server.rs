//! Serving with a bounded graceful drain.

use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Serve `app` until `shutdown` is cancelled, then give in-flight requests
/// `drain` to finish before dropping them.
pub async fn serve_until(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    drain: Duration,
) -> io::Result<()> {
    let server =
        axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return flatten(joined),
        () = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(drain, &mut server).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!(
                secs = drain.as_secs_f64(),
                "In-flight requests did not drain in time, dropping them"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten(joined: Result<io::Result<()>, JoinError>) -> io::Result<()> {
    joined.map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::routing::get;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::Notify;

    use super::*;

    async fn bind() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn idle_server_stops_on_cancel() {
        let (listener, _) = bind().await;
        let shutdown = CancellationToken::new();
        let app = Router::new().route("/", get(|| async { "ok" }));

        let serving = tokio::spawn(serve_until(
            listener,
            app,
            shutdown.clone(),
            Duration::from_secs(5),
        ));
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), serving)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stuck_request_is_dropped_after_the_drain_window() {
        let (listener, addr) = bind().await;
        let shutdown = CancellationToken::new();
        let entered = Arc::new(Notify::new());
        let app = Router::new().route(
            "/slow",
            get({
                let entered = entered.clone();
                move || async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                }
            }),
        );

        let serving = tokio::spawn(serve_until(
            listener,
            app,
            shutdown.clone(),
            Duration::from_millis(100),
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        entered.notified().await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("drain window was not enforced")
            .unwrap();
        assert!(result.is_ok());
    }
}
