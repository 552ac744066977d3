use gauge::TimestampedGaugeCollector;
use iot_config::Config;
use iot_core::{run_dispatch, BrokerConsumer};
use iot_worker_metrics::{gauge, scrape, MetricsDispatchHandler, WireFormat};
use std::env;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(err) = run().await {
        eprintln!("iot-worker-metrics: fatal: {err}");
        process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_args::<_, std::ffi::OsString>(env::args_os())?;
    iot_logging::init(&config.raw.log)?;

    let listen_addr: SocketAddr = env::var("IOT_METRICS_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:2112".to_string())
        .parse()?;

    let collector = Arc::new(TimestampedGaugeCollector::new());

    let scrape_collector = collector.clone();
    tokio::spawn(async move {
        info!(%listen_addr, "scrape endpoint listening");
        scrape::serve(scrape_collector, listen_addr).await;
    });

    let (mut consumer, queue_ref, consumer_tag, wire): (
        Box<dyn BrokerConsumer>,
        String,
        String,
        WireFormat,
    ) = if let Some(mqtt) = &config.raw.mqtt {
        let topic = mqtt.topics["metrics"].topic.clone();
        let mut consumer =
            iot_broker_mqtt::MqttConsumer::new(&mqtt.broker, "iot-worker-metrics")?;
        consumer.connect().await?;
        (Box::new(consumer), topic, "iot-worker-metrics".to_string(), WireFormat::Json)
    } else {
        let amqp = config
            .raw
            .amqp
            .as_ref()
            .expect("validated config guarantees mqtt or amqp is present");
        let queue = amqp.queues["metrics"].topic.clone();
        let mut consumer = iot_broker_amqp::AmqpConsumer::new(&amqp.uri);
        consumer.connect().await?;
        (Box::new(consumer), queue, "iot-worker-metrics".to_string(), WireFormat::Binary)
    };

    let handler = MetricsDispatchHandler::new(collector, wire);
    info!(queue = %queue_ref, "iot-worker-metrics dispatch loop starting");

    if let Err(err) = run_dispatch(consumer.as_mut(), &queue_ref, &consumer_tag, &handler).await {
        error!(error = %err, "dispatch loop exited with error");
        return Err(Box::new(err));
    }

    Ok(())
}
