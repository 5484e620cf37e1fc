/*
[INPUT]:  Backend URL and login credentials from the environment
[OUTPUT]: Logged-in session and the user's task list
[POS]:    Examples - session lifecycle demonstration
[UPDATE]: When login flow or session API changes
*/

use std::sync::Arc;

use workflow_client::*;

/// Example: session lifecycle
///
/// Set WORKFLOW_BASE_URL, WORKFLOW_USERNAME and WORKFLOW_PASSWORD, then run
/// `cargo run --example session_example`.
#[tokio::main]
async fn main() {
    println!("=== Workflow Session Example ===\n");

    let base_url = std::env::var("WORKFLOW_BASE_URL")
        .unwrap_or_else(|_| ClientConfig::default().base_url);
    let username = std::env::var("WORKFLOW_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("WORKFLOW_PASSWORD").unwrap_or_default();

    let client = match WorkflowClient::with_config(ClientConfig::with_base_url(base_url)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    let state = SessionState::new(Arc::new(client));
    let _listener = state.spawn_signal_listener();

    match state.login(&username, &password).await {
        Ok(session) => println!("✓ Logged in as {} {:?}", session.username, session.roles),
        Err(_) => {
            eprintln!("✗ {}", state.last_error().unwrap_or_default());
            return;
        }
    }

    // Expired tokens are refreshed transparently here
    match state.client().fetch_my_tasks().await {
        Ok(tasks) => {
            println!("✓ {} task(s) assigned", tasks.len());
            for task in tasks {
                println!("  - {} ({})", task.name, task.id);
            }
        }
        Err(e) => eprintln!("✗ Failed to fetch tasks: {}", e),
    }

    state.logout().await;
    println!("\n✓ Session example complete");
}
