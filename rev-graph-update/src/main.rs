use std::time::Duration;

use axum::routing::get;
use axum::Router;
use envconfig::Envconfig;
use futures::future::ready;
use health::{HealthHandle, HealthRegistry};
use metrics_exporter_prometheus::PrometheusBuilder;
use rdkafka::error::KafkaError;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use rev_graph_update::config::Config;
use rev_graph_update::consumer::WriteResponseConsumer;
use rev_graph_update::metrics_consts::{EVENTS_RECEIVED, PIPELINE_ERRORS};
use rev_graph_update::pipeline;
use rev_graph_update::resolver::{GraphStoreClient, ParentResolver};
use rev_graph_update::sinks::kafka::KafkaSink;
use rev_graph_update::sinks::{PrintSink, UpdateSink};

// How long to wait on an idle topic before refreshing liveness
const IDLE_RECV_TIMEOUT: Duration = Duration::from_secs(15);

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

async fn index() -> &'static str {
    "rev-graph-update service"
}

fn start_liveness_server(config: &Config, liveness: HealthRegistry) -> JoinHandle<()> {
    let recorder_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");
    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route("/metrics", get(move || ready(recorder_handle.render())));
    let bind = format!("{}:{}", config.host, config.port);
    tokio::task::spawn(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .expect("failed to bind liveness server");
        axum::serve(listener, router)
            .await
            .expect("failed to serve liveness endpoints");
    })
}

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("shutting down gracefully...");
}

async fn process_loop<R, S>(
    consumer: &WriteResponseConsumer,
    resolver: &R,
    sink: &S,
    liveness: HealthHandle,
) -> Result<(), KafkaError>
where
    R: ParentResolver,
    S: UpdateSink,
{
    loop {
        liveness.report_healthy();

        let message = match tokio::time::timeout(IDLE_RECV_TIMEOUT, consumer.recv()).await {
            // Idle topic; go around to refresh liveness
            Err(_) => continue,
            Ok(received) => received?,
        };
        metrics::counter!(EVENTS_RECEIVED).increment(1);

        let payload = message.payload.as_deref().unwrap_or_default();
        match pipeline::process_message(resolver, sink, payload, message.partition, message.offset)
            .await
        {
            Ok(outcome) => debug!(
                partition = message.partition,
                offset = message.offset,
                ?outcome,
                "message settled"
            ),
            Err(pipeline_error) => {
                metrics::counter!(PIPELINE_ERRORS, &[("kind", pipeline_error.kind())]).increment(1);
                error!(
                    partition = message.partition,
                    offset = message.offset,
                    "dropping propagation for message: {pipeline_error}"
                );
            }
        }

        // Exactly one offset store per consumed message, settled or failed
        consumer.mark_processed(&message)?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("starting up...");

    let config = Config::init_from_env()?;

    let liveness = HealthRegistry::new("liveness");
    let worker_liveness = liveness.register("consumer", Duration::from_secs(60));

    let consumer = WriteResponseConsumer::new(&config.kafka, &config.consumer)?;
    info!("subscribed to {}", config.consumer.kafka_consumer_topic);

    let resolver = GraphStoreClient::new(
        &config.graph_store_url,
        Duration::from_millis(config.graph_store_timeout_ms),
    )?;

    start_liveness_server(&config, liveness.clone());

    let exit: Result<(), KafkaError> = if config.print_sink {
        let sink = PrintSink;
        tokio::select! {
            result = process_loop(&consumer, &resolver, &sink, worker_liveness) => result,
            _ = shutdown() => Ok(()),
        }
    } else {
        let producer_liveness = liveness.register("kafka_producer", Duration::from_secs(30));
        let sink = KafkaSink::new(
            &config.kafka,
            config.kafka_write_request_topic.clone(),
            config.kafka_partition_key.clone(),
            producer_liveness,
        )?;

        let result = tokio::select! {
            result = process_loop(&consumer, &resolver, &sink, worker_liveness) => result,
            _ = shutdown() => Ok(()),
        };

        // Best-effort drain of write requests still queued in the producer
        if let Err(flush_error) = sink.flush(Duration::from_secs(10)) {
            error!("failed to drain producer queue: {flush_error}");
        }
        result
    };

    if let Err(bus_error) = exit {
        // Broken bus connection: close it and bail with a distinct status
        // so the supervisor restarts us
        error!("bus connection failed: {bus_error}");
        drop(consumer);
        std::process::exit(99);
    }
    Ok(())
}
