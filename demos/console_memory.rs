//! Console session over the in-memory transport.
//!
//! Runs a toy embedded console and a host session in one process. The
//! console answers each query with a fake row count and rejects anything
//! containing `DELETE`.
//!
//! Run with: cargo run --example console_memory --features logging

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

use console_bridge::{
    // ---
    run_consumer,
    Action,
    CallResult,
    Command,
    ConsoleConfig,
    ConsoleSession,
    Envelope,
    Handlers,
    InboundResult,
    Result,
    Subscription,
    TransportConsumer,
    TransportPtr,
};
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

struct ToyConsole {
    // ---
    transport: TransportPtr,
    address: String,
}

#[async_trait::async_trait]
impl TransportConsumer for ToyConsole {
    // ---
    fn subscription(&self) -> Subscription {
        Subscription::from(self.address.as_str())
    }

    async fn handle_envelope(&self, env: Envelope) -> Result<()> {
        // ---
        let command: Command = serde_json::from_slice(&env.payload)?;
        let Some(reply_to) = env.source else {
            return Ok(());
        };

        let replies = match command.action {
            Action::Init => vec![InboundResult::success(command.call_id, Default::default())
                .with_field("message", "database initialized")],
            Action::Query => {
                let queries: Vec<String> = serde_json::from_value(command.data)?;
                queries
                    .iter()
                    .map(|query| {
                        if query.contains("DELETE") {
                            InboundResult::failure(command.call_id, "read-only console")
                        } else {
                            InboundResult::success(command.call_id, Default::default())
                                .with_field("query", query.as_str())
                                .with_field("rows", query.len())
                        }
                    })
                    .collect()
            }
            Action::Input => {
                println!("console input field now holds {}", command.data);
                Vec::new()
            }
        };

        for reply in replies {
            self.transport
                .publish(Envelope::new(reply_to.clone(), reply.to_bytes()?))
                .await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let config = ConsoleConfig::memory("cypher-docs");
    let transport = console_bridge::create_transport(&config).await?;

    let console = ToyConsole {
        transport: transport.clone(),
        address: config.frame_address.clone(),
    };
    let console_task = run_consumer(transport.clone(), console).await?;

    let session = ConsoleSession::with_transport(transport.clone(), config).await?;

    let init = session
        .init_replies(serde_json::json!("CREATE (:Person {name: 'Ann'})"))
        .await?
        .collect()
        .await;
    println!("init: {:?}", init[0].result().field("message"));

    session
        .query(
            ["MATCH (p:Person) RETURN p"],
            Handlers::new().on_success(|result, index| {
                println!("callback #{index}: {:?}", result.field("rows"));
            }),
        )
        .await?;

    let batch = session
        .query_replies([
            "MATCH (p:Person) RETURN p.name",
            "MATCH (p) DELETE p",
            "RETURN 1",
        ])
        .await?
        .collect()
        .await;

    for reply in &batch {
        match reply {
            CallResult::Success { result, index } => {
                println!("#{index} ok: {:?}", result.field("query"))
            }
            CallResult::Error { result, index } => {
                println!("#{index} failed: {:?}", result.error)
            }
        }
    }

    session.input("MATCH (p:Person) RETURN count(p)").await?;

    session.close().await?;
    console_task.await.expect("console task panicked")?;
    Ok(())
}
