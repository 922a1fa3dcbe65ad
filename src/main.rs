use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use oxyprobe::config::app_config::load_config;
use oxyprobe::mimir::MimirSink;
use oxyprobe::{HttpResponse, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let app_config = load_config()?;

    // Build every input before probing anything: configuration errors are fatal.
    let mut inputs = Vec::with_capacity(app_config.config.len());
    for (key, org_config) in app_config.config {
        let input = HttpResponse::new(org_config.http_response).map_err(|e| {
            error!("[{key}] Invalid http_response configuration: {e}");
            e
        })?;
        inputs.push((
            key,
            org_config.organisation_id,
            org_config.polling_interval_seconds,
            input,
        ));
    }

    let mut handles = Vec::with_capacity(inputs.len());
    for (key, organisation_id, interval, input) in inputs {
        let sink = MimirSink::new(app_config.mimir_endpoint.clone(), Some(organisation_id));
        info!("[{key}] Probing {} target(s) every {interval}s", input.urls().count());

        handles.push(tokio::spawn(async move {
            loop {
                input.gather(&sink).await;

                match sink.flush().await {
                    Ok(count) => info!("[{key}] Pushed {count} series"),
                    Err(e) => error!("[{key}] Failed to send metrics: {e}"),
                }

                sleep(Duration::from_secs(interval)).await;
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }
    Ok(())
}
