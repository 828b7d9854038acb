//! Prometheus metrics HTTP endpoint
//!
//! Exposes controller metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{LevelSnapshot, Metrics, MetricsSummary};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with garage label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    garage: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{garage=\"{garage}\"}} {val}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, garage: &str) -> String {
    let summary = metrics.snapshot();
    let mut output = String::with_capacity(4096);

    write_event_metrics(&mut output, garage, &summary);
    write_relay_metrics(&mut output, garage, &summary);
    write_alert_metrics(&mut output, garage, &summary);
    write_level_metrics(&mut output, garage, &summary);

    output
}

fn write_event_metrics(output: &mut String, garage: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "garage_events_total",
        "Total controller events processed",
        MetricType::Counter,
        garage,
        summary.events_total,
    );
    write_metric(
        output,
        "garage_trips_admitted_total",
        "Sensor trips admitted by the debounce gate",
        MetricType::Counter,
        garage,
        summary.trips_admitted,
    );
    write_metric(
        output,
        "garage_trips_ignored_total",
        "Sensor trips ignored (debounced or entry already pending)",
        MetricType::Counter,
        garage,
        summary.trips_ignored,
    );
    write_metric(
        output,
        "garage_entries_confirmed_total",
        "Pending entries confirmed after the dwell period",
        MetricType::Counter,
        garage,
        summary.entries_confirmed,
    );
    write_metric(
        output,
        "garage_entries_cancelled_total",
        "Pending entries cancelled by an exit",
        MetricType::Counter,
        garage,
        summary.entries_cancelled,
    );
    write_metric(
        output,
        "garage_ingress_dropped_total",
        "Sensor events dropped because the event channel was full",
        MetricType::Counter,
        garage,
        summary.ingress_dropped,
    );
    write_metric(
        output,
        "garage_resets_total",
        "Manual resets",
        MetricType::Counter,
        garage,
        summary.resets_total,
    );
}

fn write_relay_metrics(output: &mut String, garage: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "garage_relay_sent_total",
        "Sensor events accepted by the backend",
        MetricType::Counter,
        garage,
        summary.relays_sent,
    );
    write_metric(
        output,
        "garage_relay_failed_total",
        "Sensor events rejected by or unreachable at the backend",
        MetricType::Counter,
        garage,
        summary.relays_failed,
    );
    write_metric(
        output,
        "garage_relay_dropped_total",
        "Sensor events dropped because the relay queue was full",
        MetricType::Counter,
        garage,
        summary.relays_dropped,
    );
    write_metric(
        output,
        "garage_relay_latency_max_ms",
        "Maximum relay latency since the last report",
        MetricType::Gauge,
        garage,
        summary.relay_latency_max_ms,
    );
}

fn write_alert_metrics(output: &mut String, garage: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "garage_alert_state",
        "Current alert state (0=normal, 1=full_alert)",
        MetricType::Gauge,
        garage,
        summary.alert_state,
    );
    write_metric(
        output,
        "garage_alert_transitions_total",
        "Alert state transitions",
        MetricType::Counter,
        garage,
        summary.alert_transitions,
    );
}

fn write_level_metrics(output: &mut String, garage: &str, summary: &MetricsSummary) {
    let gauges: [(&str, &str, fn(&LevelSnapshot) -> u64); 3] = [
        ("garage_level_capacity", "Configured spaces per level", |l| l.capacity),
        ("garage_level_validated", "Dwell-confirmed vehicles per level", |l| l.validated),
        ("garage_level_immediate", "Unconfirmed vehicle count per level", |l| l.immediate),
    ];

    for (name, help, value) in gauges {
        let _ = writeln!(output, "# HELP {name} {help}");
        let _ = writeln!(output, "# TYPE {name} gauge");
        for level in &summary.levels {
            let _ = writeln!(
                output,
                "{name}{{garage=\"{garage}\",level=\"{}\"}} {}",
                level.name,
                value(level)
            );
        }
    }
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    garage: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&metrics, &garage),
        )),
        (&Method::GET, "/health") => {
            Ok(text_response(StatusCode::OK, "text/plain", "ok".to_string()))
        }
        _ => Ok(text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    garage: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let garage = Arc::new(garage);

    info!(port = %port, garage = %garage, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let garage = garage.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let garage = garage.clone();
                                async move { handle_request(req, metrics, garage).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
