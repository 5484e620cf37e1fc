/*
[INPUT]:  Parsed subcommand and the session state
[OUTPUT]: JSON value to print for the command
[POS]:    CLI layer - command execution against the workflow client
[UPDATE]: When adding commands or changing their output
*/

use std::path::Path;

use anyhow::{Context, Result, bail};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use serde_json::{Value, json};
use tracing::info;
use workflow_client::{ProcessScope, Session, SessionState, StartProcessRequest};

use crate::cli::{Command, into_variables};

/// Run one command and return what should be printed
pub async fn execute(state: &SessionState, command: Command) -> Result<Value> {
    if command.requires_session() && !state.is_authenticated() {
        bail!("not logged in; run `workflow-cli login` first");
    }

    let client = state.client();
    let output = match command {
        Command::Login { username, password } => {
            let (username, password) = resolve_login(username, password)?;
            match state.login(&username, &password).await {
                Ok(session) => session_json(&session),
                Err(err) => {
                    let message = state.last_error().unwrap_or_else(|| err.to_string());
                    return Err(anyhow::Error::new(err).context(message));
                }
            }
        }
        Command::Logout => {
            state.logout().await;
            session_json(&state.session())
        }
        Command::Whoami => session_json(&state.session()),
        Command::Tasks { scope } => to_json(client.fetch_tasks(scope.into()).await?)?,
        Command::Claim { task_id } => {
            client.claim_task(&task_id).await?;
            json!({ "claimed": task_id })
        }
        Command::Complete { task_id, vars } => {
            client.complete_task(&task_id, into_variables(vars)).await?;
            json!({ "completed": task_id })
        }
        Command::Deploy { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let file_name = file_name(&file)?;
            info!(file = %file.display(), size = bytes.len(), "deploying process definition");
            to_json(client.deploy_process(&file_name, bytes).await?)?
        }
        Command::Start {
            process_definition_key,
            business_key,
            vars,
        } => {
            let variables = (!vars.is_empty()).then(|| into_variables(vars));
            let request = StartProcessRequest {
                process_definition_key,
                business_key,
                variables,
            };
            to_json(client.start_process(&request).await?)?
        }
        Command::Processes { scope } => match ProcessScope::from(scope) {
            ProcessScope::Active => to_json(client.fetch_active_processes().await?)?,
            ProcessScope::Completed => to_json(client.fetch_completed_processes().await?)?,
        },
        Command::Suspend {
            process_instance_id,
        } => {
            client.suspend_process(&process_instance_id).await?;
            json!({ "suspended": process_instance_id })
        }
        Command::Activate {
            process_instance_id,
        } => {
            client.activate_process(&process_instance_id).await?;
            json!({ "activated": process_instance_id })
        }
        Command::Delete {
            process_instance_id,
            reason,
        } => {
            client
                .delete_process(&process_instance_id, reason.as_deref())
                .await?;
            json!({ "deleted": process_instance_id })
        }
        Command::History {
            process_instance_id,
        } => to_json(client.fetch_historic_tasks(&process_instance_id).await?)?,
    };

    Ok(output)
}

pub fn session_json(session: &Session) -> Value {
    json!({
        "authenticated": session.authenticated,
        "username": session.username,
        "roles": session.roles,
        "admin": session.is_admin(),
    })
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("encode response")
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn resolve_login(username: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let theme = ColorfulTheme::default();
    let username = match username {
        Some(username) => username,
        None => Input::with_theme(&theme)
            .with_prompt("Username")
            .interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?,
    };
    Ok((username, password))
}
