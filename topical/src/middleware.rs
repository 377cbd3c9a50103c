use axum::{http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Log method, path, status and latency of every request.
pub async fn request_logger<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use std::{
        io,
        sync::{Arc, Mutex},
    };
    use tower::ServiceExt;

    struct LogWriter(Arc<Mutex<Vec<u8>>>);
    impl io::Write for LogWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    struct MakeLogWriter(Arc<Mutex<Vec<u8>>>);
    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for MakeLogWriter {
        type Writer = LogWriter;
        fn make_writer(&'a self) -> Self::Writer {
            LogWriter(self.0.clone())
        }
    }

    #[tokio::test]
    async fn logs_method_and_path() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(MakeLogWriter(buf.clone()))
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = Router::new()
            .route("/path", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_logger));
        let res = app
            .oneshot(Request::builder().uri("/path").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(res.status().is_success());

        let logs = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("method=GET"), "logs: {logs}");
        assert!(logs.contains("path=/path"), "logs: {logs}");
        assert!(logs.contains("status=200"), "logs: {logs}");
    }
}
