use iot_config::Config;
use iot_core::{run_dispatch, BrokerConsumer};
use iot_worker_data::{run_migrations, SensorDataHandler, WireFormat};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(err) = run().await {
        eprintln!("iot-worker-data: fatal: {err}");
        process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_args::<_, std::ffi::OsString>(env::args_os())?;
    iot_logging::init(&config.raw.log)?;

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/iot_telemetry".to_string());
    let pool = PgPoolOptions::new().max_connections(5).connect(&database_url).await?;
    run_migrations(&pool).await?;

    let (mut consumer, queue_ref, consumer_tag, wire): (
        Box<dyn BrokerConsumer>,
        String,
        String,
        WireFormat,
    ) = if let Some(mqtt) = &config.raw.mqtt {
        let topic = mqtt.topics["data_json"].topic.clone();
        let mut consumer =
            iot_broker_mqtt::MqttConsumer::new(&mqtt.broker, "iot-worker-data")?;
        consumer.connect().await?;
        (Box::new(consumer), topic, "iot-worker-data".to_string(), WireFormat::Json)
    } else {
        let amqp = config
            .raw
            .amqp
            .as_ref()
            .expect("validated config guarantees mqtt or amqp is present");
        let queue = amqp.queues["data_json"].topic.clone();
        let mut consumer = iot_broker_amqp::AmqpConsumer::new(&amqp.uri);
        consumer.connect().await?;
        (Box::new(consumer), queue, "iot-worker-data".to_string(), WireFormat::Binary)
    };

    let handler = SensorDataHandler::new(pool, wire);
    info!(queue = %queue_ref, "iot-worker-data dispatch loop starting");

    if let Err(err) = run_dispatch(consumer.as_mut(), &queue_ref, &consumer_tag, &handler).await {
        error!(error = %err, "dispatch loop exited with error");
        return Err(Box::new(err));
    }

    Ok(())
}
