//! Render service client
//!
//! Calls a json-ws render service over both transports and listens for its
//! progress events.
//!
//! Run with: cargo run --example render_client -- http://localhost:3000/endpoint/1.0

use chrono::Utc;
use rpctunnel::{
    Argument, EnumType, RpcTunnel, StructType, StructValue, TransportKind, TypeDescriptor,
    TypeRegistry, Value,
};
use std::sync::Arc;

fn render_types() -> rpctunnel::Result<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register_enum(
        EnumType::new("RenderMode")
            .variant("Production", -1)
            .variant("Normal", 0)
            .variant("Fast", 1),
    );
    registry.register_struct(
        StructType::new("RenderOptions")
            .field("width", TypeDescriptor::Integer)
            .field("height", TypeDescriptor::Integer)
            .field("renderMode", TypeDescriptor::named("RenderMode")),
    );
    registry.register_struct(
        StructType::new("Progress")
            .field("frame", TypeDescriptor::Integer)
            .field("total", TypeDescriptor::Integer),
    );
    registry.validate()?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rpctunnel_client=debug".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000/endpoint/1.0".to_string());

    let registry = Arc::new(render_types()?);
    let tunnel = RpcTunnel::builder(&url).registry(Arc::clone(&registry)).build()?;

    // Plain call over HTTP
    let sum = tunnel
        .call("ns1.sum", vec![Argument::value(2), Argument::value(3)], TypeDescriptor::Integer)
        .await?;
    println!("2 + 3 = {:?}", sum.as_i64());

    // Dates travel as UTC text
    let seconds = tunnel
        .call("ns1.getSeconds", vec![Argument::value(Utc::now())], TypeDescriptor::Integer)
        .await?;
    println!("Seconds: {:?}", seconds.as_i64());

    // Structured argument, optional trailing argument left out
    let options_type = registry
        .get_struct("RenderOptions")
        .ok_or("RenderOptions not registered")?;
    let mode = registry
        .get_enum("RenderMode")
        .ok_or("RenderMode not registered")?
        .value("Fast")?;
    let options = StructValue::new(&options_type)
        .with("width", 640)?
        .with("height", 480)?
        .with("renderMode", mode)?;
    tunnel
        .call(
            "ns1.render",
            vec![
                Argument::value(options),
                Argument::optional(None::<i64>, TypeDescriptor::Integer),
            ],
            TypeDescriptor::Any,
        )
        .await?;

    // Progress events arrive over the socket
    tunnel
        .on("progress", TypeDescriptor::named("Progress"), |data: Value| async move {
            if let Some(progress) = data.as_struct() {
                println!("Progress: {:?} of {:?}", progress.get("frame"), progress.get("total"));
            }
        })
        .await?;

    // Same call, now over the socket
    let echoed = tunnel
        .call_via("ns1.echo", vec![Argument::value("hello")], TypeDescriptor::String, TransportKind::WebSocket)
        .await?;
    println!("Echo: {:?}", echoed.as_str());

    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

    tunnel.off("progress").await?;
    tunnel.close().await;
    Ok(())
}
