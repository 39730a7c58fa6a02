//! REST + realtime surface. Every handler reads from the
//! in-memory managers rather than durable storage — storage is a
//! best-effort sink, never a read path for the dashboard.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use warden_approval::{ApprovalStatus, AuditLogFilter, AuditStatus, LogOperation, RiskLevel};
use warden_orchestrator::FeedbackRequest;
use warden_registry::ToolContext;
use warden_storage::WriteJob;

use crate::error::ApiError;
use crate::hub::{from_approval_event, DashboardEvent};
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/api/issues", get(list_issues))
        .route("/api/issues/{id}", get(get_issue))
        .route("/api/issues/{id}/comments", get(issue_comments))
        .route("/api/issues/{id}/process-feedback", post(process_feedback))
        .route("/api/agent/results", get(agent_results))
        .route("/api/agent/approve/{alert_id}/{action_index}", post(legacy_approve_action))
        .route("/api/plugins", get(list_plugin_types))
        .route("/api/servers/{server_id}/plugins", get(list_server_plugins).post(create_server_plugin))
        .route("/api/servers/{server_id}/plugins/{instance_id}", get(get_server_plugin).delete(delete_server_plugin))
        .route("/api/servers/{server_id}/plugins/{instance_id}/health", get(plugin_health))
        .route("/api/servers/{server_id}/plugins/{instance_id}/tools", get(plugin_tools))
        .route("/api/servers/{server_id}/plugins/{instance_id}/execute", post(execute_plugin_tool))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/close", post(close_session))
        .route("/api/sessions/{id}/messages", get(list_messages).post(post_message))
        .route("/api/approvals", get(list_approvals))
        .route("/api/approvals/{id}", get(get_approval))
        .route("/api/approvals/{id}/approve", post(approve_approval))
        .route("/api/approvals/{id}/reject", post(reject_approval))
        .route("/api/audit", get(list_audit))
        .route("/api/audit/stats", get(audit_stats))
        .route("/ws", get(ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "serverId": state.server_id,
        "time": Utc::now(),
    }))
}

// ---------------------------------------------------------------- alerts

async fn list_alerts(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "active": state.alerts.active_alerts(),
        "history": state.alerts.history(200),
    }))
}

async fn acknowledge_alert(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.alerts.acknowledge(&id) {
        return Err(ApiError::not_found(format!("alert {id} not found")));
    }
    state.storage.enqueue(WriteJob::AcknowledgeAlert(id.clone()));
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------- issues

async fn list_issues(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.issues.list_for_server(&state.server_id))
}

async fn get_issue(State(state): State<SharedState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.issues.get(&id)?))
}

async fn issue_comments(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    Json(state.issues.comments(&id))
}

#[derive(Debug, Deserialize)]
struct ProcessFeedbackBody {
    author_name: String,
    feedback: String,
}

/// `POST /api/issues/:id/process-feedback`: append the human
/// comment, then hand the issue's timeline to the orchestrator's feedback
/// follow-up for an LLM-authored acknowledgement.
async fn process_feedback(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<ProcessFeedbackBody>,
) -> Result<impl IntoResponse, ApiError> {
    let issue = state.issues.add_feedback(&id, &body.author_name, &body.feedback, Utc::now())?;
    let timeline: Vec<Value> = state
        .issues
        .comments(&id)
        .into_iter()
        .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
        .collect();

    let response = state
        .orchestrator
        .feedback_followup(FeedbackRequest {
            issue_context: serde_json::to_value(&issue).unwrap_or(Value::Null),
            timeline,
            feedback: body.feedback,
        })
        .await?;

    Ok(Json(json!({ "success": true, "issue": issue, "response": response })))
}

// ---------------------------------------------------------- agent results

/// `GET /api/agent/results`: a flattened view over issues and
/// their comment timelines, the closest in-memory analogue to the
/// original `agent_responses`/`agent_actions` tables.
async fn agent_results(State(state): State<SharedState>) -> impl IntoResponse {
    let results: Vec<Value> = state
        .issues
        .list_for_server(&state.server_id)
        .into_iter()
        .map(|issue| {
            let comments = state.issues.comments(&issue.id);
            json!({ "issue": issue, "comments": comments })
        })
        .collect();
    Json(results)
}

/// Legacy `POST /api/agent/approve/:alertId/:actionIndex`.
/// Pre-approval workflows identified an action by its position within an
/// alert's proposed-action list; the approval manager keyed by opaque id
/// has no notion of that ordinal, so this endpoint is a best-effort shim:
/// it treats `alertId` as an approval id and ignores `actionIndex`,
/// documented as an open question resolved this way in DESIGN.md.
async fn legacy_approve_action(
    State(state): State<SharedState>,
    Path((alert_id, _action_index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    approve_approval(State(state), Path(alert_id), Json(ApproveBody { approved_by: "legacy-api".to_string(), reason: None }))
        .await
}

// --------------------------------------------------------------- plugins

async fn list_plugin_types(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.plugin_types.list())
}

async fn list_server_plugins(State(state): State<SharedState>, Path(server_id): Path<String>) -> impl IntoResponse {
    Json(state.instances.get_server_instances(&server_id))
}

#[derive(Debug, Deserialize)]
struct CreatePluginInstanceBody {
    plugin_id: String,
    #[serde(default)]
    config: HashMap<String, Value>,
}

async fn create_server_plugin(
    State(state): State<SharedState>,
    Path(server_id): Path<String>,
    Json(body): Json<CreatePluginInstanceBody>,
) -> Result<impl IntoResponse, ApiError> {
    let instance = state.instances.create_instance(server_id, &body.plugin_id, body.config).await?;
    state.storage.enqueue(WriteJob::UpsertPluginInstance(instance.clone()));
    Ok(Json(instance))
}

async fn get_server_plugin(
    State(state): State<SharedState>,
    Path((_server_id, instance_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .instances
        .get(&instance_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("instance {instance_id} not found")))
}

async fn delete_server_plugin(
    State(state): State<SharedState>,
    Path((_server_id, instance_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.instances.remove_instance(&instance_id).await?;
    state.storage.enqueue(WriteJob::RemovePluginInstance(instance_id));
    Ok(Json(json!({ "success": true })))
}

async fn plugin_health(
    State(state): State<SharedState>,
    Path((_server_id, instance_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (status, message) = state
        .instances
        .get_instance_health(&instance_id)
        .ok_or_else(|| ApiError::not_found(format!("instance {instance_id} not found")))?;
    Ok(Json(json!({ "status": status, "message": message })))
}

async fn plugin_tools(
    State(state): State<SharedState>,
    Path((_server_id, instance_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let tools = state
        .instances
        .get_instance_tools(&instance_id)
        .ok_or_else(|| ApiError::not_found(format!("instance {instance_id} not found")))?;
    Ok(Json(tools))
}

#[derive(Debug, Deserialize)]
struct ExecuteToolBody {
    tool: String,
    #[serde(default)]
    parameters: HashMap<String, Value>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    approval_id: Option<String>,
}

async fn execute_plugin_tool(
    State(state): State<SharedState>,
    Path((server_id, instance_id)): Path<(String, String)>,
    Json(body): Json<ExecuteToolBody>,
) -> Result<impl IntoResponse, ApiError> {
    let instance = state
        .instances
        .get(&instance_id)
        .ok_or_else(|| ApiError::not_found(format!("instance {instance_id} not found")))?;

    let context = ToolContext {
        server_id: server_id.clone(),
        session_id: body.session_id.clone(),
        user_id: body.user_id.clone(),
        approval_id: body.approval_id.clone(),
    };
    let started = Instant::now();
    let result = state.instances.execute_tool(&instance_id, &body.tool, body.parameters.clone(), context).await?;

    if !result.requires_approval {
        let entry = state.audit.log_operation(
            LogOperation {
                server_id,
                plugin_id: instance.plugin_id,
                session_id: body.session_id,
                approval_id: None,
                operation: body.tool,
                parameters: body.parameters,
                risk_level: result.approval_request.as_ref().map(|p| p.risk_level).unwrap_or(RiskLevel::Low),
                status: if result.success { AuditStatus::Success } else { AuditStatus::Failed },
                result: result.output.clone(),
                error: result.error.clone(),
                executed_by: body.user_id.unwrap_or_else(|| "api".to_string()),
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
            Utc::now(),
        );
        state.storage.enqueue(WriteJob::InsertAuditLogEntry(entry));
    }

    Ok(Json(result))
}

// -------------------------------------------------------------- sessions

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    server_id: Option<String>,
}

async fn list_sessions(State(state): State<SharedState>, Query(q): Query<ListSessionsQuery>) -> impl IntoResponse {
    let server_id = q.server_id.unwrap_or_else(|| state.server_id.clone());
    Json(state.orchestrator.list_sessions(&server_id))
}

#[derive(Debug, Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    server_id: Option<String>,
    title: String,
    #[serde(default)]
    plugin_instance_ids: Vec<String>,
    #[serde(default)]
    created_by: Option<String>,
}

async fn create_session(
    State(state): State<SharedState>,
    Json(body): Json<CreateSessionBody>,
) -> impl IntoResponse {
    let server_id = body.server_id.unwrap_or_else(|| state.server_id.clone());
    let session = state.orchestrator.create_session(server_id, body.title, body.plugin_instance_ids, body.created_by);
    state.storage.enqueue(WriteJob::UpsertChatSession(session.clone()));
    Json(session)
}

async fn get_session(State(state): State<SharedState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let session = state.orchestrator.get_session(&id).ok_or_else(|| ApiError::not_found(format!("session {id} not found")))?;
    let messages = state.orchestrator.history(&id);
    Ok(Json(json!({ "session": session, "messages": messages })))
}

async fn close_session(State(state): State<SharedState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let session = state.orchestrator.close_session(&id)?;
    state.storage.enqueue(WriteJob::UpsertChatSession(session.clone()));
    Ok(Json(session))
}

async fn list_messages(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    Json(state.orchestrator.history(&id))
}

#[derive(Debug, Deserialize)]
struct PostMessageBody {
    content: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn post_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<PostMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.orchestrator.run_turn(&id, &body.content, body.user_id).await?;

    for event in &events {
        match event {
            warden_orchestrator::ChatEvent::Message(message) => {
                state.storage.enqueue(WriteJob::InsertChatMessage(message.clone()));
                let _ = state.hub.send(DashboardEvent::new(
                    "chat:message",
                    serde_json::to_value(message).unwrap_or(Value::Null),
                ));
            }
            warden_orchestrator::ChatEvent::Typing => {
                let _ = state.hub.send(DashboardEvent::new("chat:typing", json!({ "sessionId": id })));
            }
            warden_orchestrator::ChatEvent::ToolExecution(call) => {
                let _ = state.hub.send(DashboardEvent::new(
                    "chat:tool_execution",
                    serde_json::to_value(call).unwrap_or(Value::Null),
                ));
            }
            warden_orchestrator::ChatEvent::ToolResult(result) => {
                let _ = state.hub.send(DashboardEvent::new(
                    "chat:tool_result",
                    serde_json::to_value(result).unwrap_or(Value::Null),
                ));
            }
            warden_orchestrator::ChatEvent::ApprovalRequired(approval) => {
                state.storage.enqueue(WriteJob::UpsertApprovalRequest(approval.clone()));
                let _ = state.hub.send(from_approval_event(&warden_approval::ApprovalEvent::Created(approval.clone())));
            }
            warden_orchestrator::ChatEvent::Error(message) => {
                warn!(session_id = %id, error = %message, "chat turn reported an error event");
            }
        }
    }

    Ok(Json(json!({ "events": events_to_json(&events) })))
}

fn events_to_json(events: &[warden_orchestrator::ChatEvent]) -> Vec<Value> {
    events
        .iter()
        .map(|event| match event {
            warden_orchestrator::ChatEvent::Message(m) => json!({ "type": "message", "message": m }),
            warden_orchestrator::ChatEvent::Typing => json!({ "type": "typing" }),
            warden_orchestrator::ChatEvent::ToolExecution(c) => json!({ "type": "tool_execution", "call": c }),
            warden_orchestrator::ChatEvent::ToolResult(r) => json!({ "type": "tool_result", "result": r }),
            warden_orchestrator::ChatEvent::ApprovalRequired(a) => json!({ "type": "approval_required", "approval": a }),
            warden_orchestrator::ChatEvent::Error(e) => json!({ "type": "error", "message": e }),
        })
        .collect()
}

// -------------------------------------------------------------- approvals

#[derive(Debug, Deserialize)]
struct ListApprovalsQuery {
    server_id: Option<String>,
    status: Option<String>,
}

fn parse_status(raw: &str) -> Option<ApprovalStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Some(ApprovalStatus::Pending),
        "approved" => Some(ApprovalStatus::Approved),
        "rejected" => Some(ApprovalStatus::Rejected),
        "expired" => Some(ApprovalStatus::Expired),
        "cancelled" => Some(ApprovalStatus::Cancelled),
        _ => None,
    }
}

async fn list_approvals(State(state): State<SharedState>, Query(q): Query<ListApprovalsQuery>) -> impl IntoResponse {
    let status = q.status.as_deref().and_then(parse_status);
    Json(state.approvals.list(q.server_id.as_deref(), status))
}

async fn get_approval(State(state): State<SharedState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.approvals.get(&id).map(Json).ok_or_else(|| ApiError::not_found(format!("approval {id} not found")))
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    approved_by: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn approve_approval(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<impl IntoResponse, ApiError> {
    let approval = state.approvals.approve(&id, body.approved_by.clone(), body.reason, Utc::now())?;
    state.storage.enqueue(WriteJob::UpsertApprovalRequest(approval.clone()));
    let _ = state.hub.send(from_approval_event(&warden_approval::ApprovalEvent::Approved(approval.clone())));

    let started = Instant::now();
    let outcome = state.orchestrator.resolve_approved_tool_call(&approval).await;
    let (status, result, error) = match &outcome {
        Ok(r) if r.success => (AuditStatus::Success, r.output.clone(), None),
        Ok(r) => (AuditStatus::Failed, None, r.error.clone()),
        Err(e) => (AuditStatus::Failed, None, Some(e.to_string())),
    };

    let entry = state.audit.log_operation(
        LogOperation {
            server_id: approval.server_id.clone(),
            plugin_id: approval.plugin_id.clone(),
            session_id: approval.session_id.clone(),
            approval_id: Some(approval.id.clone()),
            operation: approval.operation.clone(),
            parameters: approval.parameters.clone(),
            risk_level: approval.risk_level,
            status,
            result,
            error,
            executed_by: body.approved_by,
            execution_time_ms: started.elapsed().as_millis() as u64,
        },
        Utc::now(),
    );
    state.storage.enqueue(WriteJob::InsertAuditLogEntry(entry));

    Ok(Json(approval))
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    rejected_by: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn reject_approval(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<impl IntoResponse, ApiError> {
    let approval = state.approvals.reject(&id, body.rejected_by.clone(), body.reason, Utc::now())?;
    state.storage.enqueue(WriteJob::UpsertApprovalRequest(approval.clone()));
    let _ = state.hub.send(from_approval_event(&warden_approval::ApprovalEvent::Rejected(approval.clone())));

    let entry = state.audit.log_operation(
        LogOperation {
            server_id: approval.server_id.clone(),
            plugin_id: approval.plugin_id.clone(),
            session_id: approval.session_id.clone(),
            approval_id: Some(approval.id.clone()),
            operation: approval.operation.clone(),
            parameters: approval.parameters.clone(),
            risk_level: approval.risk_level,
            status: AuditStatus::Denied,
            result: None,
            error: None,
            executed_by: body.rejected_by,
            execution_time_ms: 0,
        },
        Utc::now(),
    );
    state.storage.enqueue(WriteJob::InsertAuditLogEntry(entry));

    Ok(Json(approval))
}

// ------------------------------------------------------------------ audit

#[derive(Debug, Deserialize)]
struct AuditQuery {
    server_id: Option<String>,
    plugin_id: Option<String>,
    session_id: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
}

fn parse_audit_status(raw: &str) -> Option<AuditStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "success" => Some(AuditStatus::Success),
        "failed" => Some(AuditStatus::Failed),
        "denied" => Some(AuditStatus::Denied),
        "cancelled" => Some(AuditStatus::Cancelled),
        _ => None,
    }
}

async fn list_audit(State(state): State<SharedState>, Query(q): Query<AuditQuery>) -> impl IntoResponse {
    let filter = AuditLogFilter {
        server_id: q.server_id,
        plugin_id: q.plugin_id,
        session_id: q.session_id,
        risk_level: None,
        status: q.status.as_deref().and_then(parse_audit_status),
        since: None,
        limit: q.limit,
    };
    Json(state.audit.query(&filter))
}

async fn audit_stats(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.audit.stats(Utc::now()))
}

// -------------------------------------------------------------- realtime

#[derive(Debug, Serialize)]
struct StateSnapshot {
    active_alerts: Vec<warden_alerts::Alert>,
    issues: Vec<warden_issues::Issue>,
    pending_approvals: Vec<warden_approval::ApprovalRequest>,
}

async fn ws_upgrade(State(state): State<SharedState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection loop: forwards every hub
/// broadcast as a typed frame, and answers an inbound `request-state`
/// message with a one-shot `state` snapshot built from the in-memory
/// managers.
async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    let mut events = state.hub.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if socket.send(Message::Text(event.to_frame().to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.trim() == "request-state" || parse_request_state(&text) {
                            let snapshot = StateSnapshot {
                                active_alerts: state.alerts.active_alerts(),
                                issues: state.issues.list_for_server(&state.server_id),
                                pending_approvals: state.approvals.list(Some(&state.server_id), Some(ApprovalStatus::Pending)),
                            };
                            let frame = json!({ "type": "state", "payload": snapshot });
                            if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

fn parse_request_state(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(|t| t == "request-state"))
        .unwrap_or(false)
}
