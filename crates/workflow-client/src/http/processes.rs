/*
[INPUT]:  Process definitions, instance identifiers, BPMN uploads
[OUTPUT]: Process instances, deployments, and history
[POS]:    HTTP layer - process lifecycle endpoints (require bearer auth)
[UPDATE]: When adding process endpoints or changing payloads
*/

use crate::http::{Result, WorkflowClient};
use crate::types::{
    DeploymentResponse, HistoricProcessInstance, HistoricTask, ProcessInstance, ProcessScope,
    StartProcessRequest,
};

use super::pipeline::ApiRequest;

impl WorkflowClient {
    /// Upload a process definition
    ///
    /// POST /processes/deploy (multipart, field `file`)
    pub async fn deploy_process(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<DeploymentResponse> {
        let request = ApiRequest::post("/processes/deploy").with_multipart("file", file_name, bytes);
        self.send_json(request).await
    }

    /// POST /processes/start
    pub async fn start_process(&self, payload: &StartProcessRequest) -> Result<ProcessInstance> {
        let request = ApiRequest::post("/processes/start").with_json(payload)?;
        self.send_json(request).await
    }

    /// GET /processes/active
    pub async fn fetch_active_processes(&self) -> Result<Vec<ProcessInstance>> {
        self.send_json(ApiRequest::get(process_list(ProcessScope::Active)))
            .await
    }

    /// GET /processes/completed
    pub async fn fetch_completed_processes(&self) -> Result<Vec<HistoricProcessInstance>> {
        self.send_json(ApiRequest::get(process_list(ProcessScope::Completed)))
            .await
    }

    /// POST /processes/{id}/suspend
    pub async fn suspend_process(&self, process_instance_id: &str) -> Result<()> {
        let request = ApiRequest::post(format!("/processes/{process_instance_id}/suspend"))
            .with_json(&serde_json::json!({}))?;
        self.send_unit(request).await
    }

    /// POST /processes/{id}/activate
    pub async fn activate_process(&self, process_instance_id: &str) -> Result<()> {
        let request = ApiRequest::post(format!("/processes/{process_instance_id}/activate"))
            .with_json(&serde_json::json!({}))?;
        self.send_unit(request).await
    }

    /// DELETE /processes/{id}?reason={reason}
    pub async fn delete_process(
        &self,
        process_instance_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut request = ApiRequest::delete(format!("/processes/{process_instance_id}"));
        if let Some(reason) = reason {
            request = request.with_query("reason", reason);
        }
        self.send_unit(request).await
    }

    /// GET /processes/{id}/history/tasks
    pub async fn fetch_historic_tasks(&self, process_instance_id: &str) -> Result<Vec<HistoricTask>> {
        let endpoint = format!("/processes/{process_instance_id}/history/tasks");
        self.send_json(ApiRequest::get(endpoint)).await
    }
}

fn process_list(scope: ProcessScope) -> String {
    format!("/processes/{}", scope.path_segment())
}
