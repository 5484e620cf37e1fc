/*
[INPUT]:  Task identifiers and completion variables
[OUTPUT]: Task lists and claim/complete confirmations
[POS]:    HTTP layer - task endpoints (require bearer auth)
[UPDATE]: When adding task endpoints or changing payloads
*/

use serde_json::{Map, Value};

use crate::http::{Result, WorkflowClient};
use crate::types::{CompleteTaskRequest, Task, TaskScope};

use super::pipeline::ApiRequest;

impl WorkflowClient {
    /// Query a task list
    ///
    /// GET /tasks/{my|candidate}
    pub async fn fetch_tasks(&self, scope: TaskScope) -> Result<Vec<Task>> {
        let endpoint = format!("/tasks/{}", scope.path_segment());
        self.send_json(ApiRequest::get(endpoint)).await
    }

    /// Tasks assigned to the current user
    pub async fn fetch_my_tasks(&self) -> Result<Vec<Task>> {
        self.fetch_tasks(TaskScope::Mine).await
    }

    /// Tasks the current user may claim
    pub async fn fetch_candidate_tasks(&self) -> Result<Vec<Task>> {
        self.fetch_tasks(TaskScope::Candidate).await
    }

    /// POST /tasks/{id}/claim
    pub async fn claim_task(&self, task_id: &str) -> Result<()> {
        let request = ApiRequest::post(format!("/tasks/{task_id}/claim"))
            .with_json(&serde_json::json!({}))?;
        self.send_unit(request).await
    }

    /// POST /tasks/{id}/complete
    pub async fn complete_task(&self, task_id: &str, variables: Map<String, Value>) -> Result<()> {
        let request = ApiRequest::post(format!("/tasks/{task_id}/complete"))
            .with_json(&CompleteTaskRequest { variables })?;
        self.send_unit(request).await
    }
}
