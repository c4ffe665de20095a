//! Observability client example
//!
//! Sends calls with OpenTelemetry tracing and metrics enabled.
//!
//! Run with: cargo run --example observability_client

use rpctunnel::{Argument, RpcTunnel, TransportKind, TypeDescriptor};
use rpctunnel_core::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let otel_config = ObservabilityConfig::new("rpctunnel-observability-client")
        .with_endpoint("http://localhost:4317")
        .with_log_level("debug");

    let tunnel = RpcTunnel::builder("http://127.0.0.1:3000/endpoint/1.0")
        .with_observability(otel_config)
        .service_name("observability-client")
        .build()?;

    println!("Sending calls with distributed tracing...\n");

    for i in 1..=5i64 {
        tracing::info!(iteration = i, "Starting iteration");

        let sum = tunnel
            .call("ns1.sum", vec![Argument::value(i * 10), Argument::value(i * 5)], TypeDescriptor::Integer)
            .await?;
        println!("Iteration {}: {} + {} = {:?}", i, i * 10, i * 5, sum.as_i64());

        let product = tunnel
            .call_via(
                "ns1.multiply",
                vec![Argument::value(i * 2), Argument::value(i * 3)],
                TypeDescriptor::Integer,
                TransportKind::WebSocket,
            )
            .await?;
        println!("Iteration {}: {} * {} = {:?}", i, i * 2, i * 3, product.as_i64());

        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
    }

    println!("\nAll calls completed!");
    println!("View distributed traces at http://localhost:16686 (Jaeger UI)");

    tunnel.close().await;

    // Give time for telemetry to flush
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    rpctunnel_core::shutdown_observability();

    Ok(())
}
