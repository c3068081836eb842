use tracing_subscriber::{EnvFilter, fmt};
use wildfly_orchestrator::Orchestrator;
use wildfly_orchestrator::error::{Error, Result};
use wildfly_orchestrator::server::ServerType;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG selects the level, e.g. RUST_LOG=wildfly_orchestrator=debug
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting pipeline example");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/orchestrator.yaml".to_string());
    let mut orchestrator = Orchestrator::from_config_file(&config_path)?;

    println!("Starting the server...");
    let server_id = orchestrator.start_server(ServerType::Standalone).await?;
    println!("Server {} is running", server_id);

    let result = async {
        println!("\n=== Commands ===");
        orchestrator.execute_commands().await?;
        for event in orchestrator.state_machine().events(None) {
            println!("- {:?} after {}", event.event, event.state);
        }

        println!("\n=== Undeploy ===");
        let removed = orchestrator.undeploy().await?;
        for request in &removed {
            println!("- {}", request.name());
        }
        Ok::<(), Error>(())
    }
    .await;

    println!("\nStopping the server...");
    orchestrator.stop_server().await?;

    if let Err(e) = &result {
        eprintln!("Pipeline failed: {}", e);
        std::process::exit(e.exit_code());
    }
    result
}
