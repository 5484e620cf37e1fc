/*
[INPUT]:  Command-line arguments
[OUTPUT]: Parsed subcommands and variable assignments
[POS]:    CLI layer - argument definitions
[UPDATE]: When adding commands or flags
*/

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use workflow_client::{ProcessScope, TaskScope};

#[derive(Parser, Debug)]
#[command(name = "workflow-cli", version, about = "Workflow backend command-line client")]
pub struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    pub config_path: Option<PathBuf>,
    /// Overrides the configured log level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        username: Option<String>,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// End the session
    Logout,
    /// Show the current session
    Whoami,
    /// List tasks
    Tasks {
        #[arg(value_enum, default_value = "mine")]
        scope: TaskListArg,
    },
    /// Claim a candidate task
    Claim { task_id: String },
    /// Complete a task
    Complete {
        task_id: String,
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
    /// Deploy a process definition file
    Deploy { file: PathBuf },
    /// Start a process instance
    Start {
        process_definition_key: String,
        #[arg(long)]
        business_key: Option<String>,
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
    /// List process instances
    Processes {
        #[arg(value_enum, default_value = "active")]
        scope: ProcessListArg,
    },
    Suspend { process_instance_id: String },
    Activate { process_instance_id: String },
    Delete {
        process_instance_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Task history of a process instance
    History { process_instance_id: String },
}

impl Command {
    /// Commands that talk to protected endpoints
    pub fn requires_session(&self) -> bool {
        !matches!(self, Command::Login { .. } | Command::Logout | Command::Whoami)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskListArg {
    Mine,
    Candidate,
}

impl From<TaskListArg> for TaskScope {
    fn from(arg: TaskListArg) -> Self {
        match arg {
            TaskListArg::Mine => TaskScope::Mine,
            TaskListArg::Candidate => TaskScope::Candidate,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessListArg {
    Active,
    Completed,
}

impl From<ProcessListArg> for ProcessScope {
    fn from(arg: ProcessListArg) -> Self {
        match arg {
            ProcessListArg::Active => ProcessScope::Active,
            ProcessListArg::Completed => ProcessScope::Completed,
        }
    }
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn into_variables(vars: Vec<(String, Value)>) -> Map<String, Value> {
    vars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_var_values() {
        assert_eq!(parse_var("approved=true").unwrap(), ("approved".to_string(), json!(true)));
        assert_eq!(parse_var("amount=42").unwrap(), ("amount".to_string(), json!(42)));
        assert_eq!(
            parse_var("comment=looks good").unwrap(),
            ("comment".to_string(), json!("looks good"))
        );
        assert_eq!(parse_var("url=a=b").unwrap(), ("url".to_string(), json!("a=b")));
    }

    #[test]
    fn test_parse_var_rejects_malformed() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=1").is_err());
    }

    #[test]
    fn test_complete_command_parses_vars() {
        let cli = Cli::try_parse_from([
            "workflow-cli",
            "complete",
            "t-1",
            "--var",
            "approved=true",
            "--var",
            "note=ok",
        ])
        .unwrap();

        let Command::Complete { task_id, vars } = cli.command else {
            panic!("expected complete command");
        };
        assert_eq!(task_id, "t-1");
        let variables = into_variables(vars);
        assert_eq!(variables.get("approved"), Some(&json!(true)));
        assert_eq!(variables.get("note"), Some(&json!("ok")));
    }

    #[test]
    fn test_default_scopes() {
        let cli = Cli::try_parse_from(["workflow-cli", "tasks"]).unwrap();
        assert_eq!(cli.command, Command::Tasks { scope: TaskListArg::Mine });
        assert!(cli.command.requires_session());

        let cli = Cli::try_parse_from(["workflow-cli", "whoami"]).unwrap();
        assert!(!cli.command.requires_session());
    }
}
