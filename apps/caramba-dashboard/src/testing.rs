//! In-memory doubles for driving the dashboard without a panel or a terminal.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use caramba_shared::api::{Client, ClientUpdate, Inbound, InboundToggle, NewClient, NewInbound};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ApiError;
use crate::surface::Surface;
use crate::transport::{ApiRequest, Backend, RawResponse};
use crate::view::DashboardView;

/// Client fixture: enabled, unlimited, offline, subscription `"<remark>-sub"`.
pub fn client(id: i64, remark: &str) -> Client {
    Client {
        id,
        remark: remark.to_string(),
        sub_remark: format!("{}-sub", remark),
        enabled: true,
        total_gb: 0.0,
        used_traffic_bytes: 0,
        expiry_time: 0,
        online: false,
        config_link_domain: None,
        config_link_ip: None,
    }
}

pub fn inbound(id: i64, client_count: u32) -> Inbound {
    Inbound {
        id,
        remark: format!("inbound-{}", id),
        enabled: true,
        port: 10_000 + id as u16,
        protocol: "vless".to_string(),
        client_count,
    }
}

/// Surface that records everything and answers confirmations from a queue.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub renders: Vec<DashboardView>,
    pub alerts: Vec<String>,
    pub prompts: Vec<String>,
    /// Answers for upcoming confirmations; an empty queue answers yes.
    pub answers: VecDeque<bool>,
    pub redirects: Vec<String>,
    pub copied: Vec<String>,
}

impl RecordingSurface {
    pub fn last_view(&self) -> Option<&DashboardView> {
        self.renders.last()
    }
}

#[async_trait(?Send)]
impl Surface for RecordingSurface {
    fn render(&mut self, view: &DashboardView) {
        self.renders.push(view.clone());
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or(true)
    }

    fn redirect(&mut self, location: &str) {
        self.redirects.push(location.to_string());
    }

    fn copy(&mut self, text: &str) {
        self.copied.push(text.to_string());
    }
}

/// Backend replaying a fixed list of responses in order.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<RawResponse, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<RawResponse, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(ApiError::RequestFailed("no scripted response".to_string())))
    }
}

#[derive(Default)]
struct PanelState {
    inbounds: Vec<Inbound>,
    clients: BTreeMap<i64, Vec<Client>>,
    next_inbound_id: i64,
    next_client_id: i64,
    failures: Vec<(Method, String, String)>,
    session_expired: bool,
    calls: Vec<(Method, String)>,
}

/// Stateful in-memory panel answering every management route.
#[derive(Default)]
pub struct FakePanel {
    state: Mutex<PanelState>,
}

fn detail(status: u16, message: &str) -> RawResponse {
    RawResponse::json(status, &json!({ "detail": message }))
}

fn body<T: DeserializeOwned>(request: &ApiRequest) -> Result<T, RawResponse> {
    request
        .body
        .clone()
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or_else(|| detail(422, "Invalid request body"))
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound(self, remark: &str, port: u16) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.next_inbound_id += 1;
            let id = state.next_inbound_id;
            state.inbounds.push(Inbound {
                id,
                remark: remark.to_string(),
                enabled: true,
                port,
                protocol: "vless".to_string(),
                client_count: 0,
            });
            state.clients.insert(id, Vec::new());
        }
        self
    }

    pub fn with_client(self, inbound_id: i64, remark: &str, sub_remark: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.next_client_id += 1;
            let mut created = client(state.next_client_id, remark);
            created.sub_remark = sub_remark.to_string();
            state.clients.entry(inbound_id).or_default().push(created);
        }
        self
    }

    /// Fail the next `method` call on `path` with a 400 carrying `message`.
    pub fn fail_next(&self, method: Method, path: &str, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state
                .failures
                .push((method, path.to_string(), message.to_string()));
        }
    }

    /// Answer every later call with 401.
    pub fn expire_session(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.session_expired = true;
        }
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .map(|state| {
                state
                    .calls
                    .iter()
                    .filter(|(m, p)| *m == method && p == path)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn client(&self, client_id: i64) -> Option<Client> {
        let state = self.state.lock().ok()?;
        state
            .clients
            .values()
            .flatten()
            .find(|c| c.id == client_id)
            .cloned()
    }

    pub fn inbound(&self, inbound_id: i64) -> Option<Inbound> {
        let state = self.state.lock().ok()?;
        state.inbounds.iter().find(|i| i.id == inbound_id).cloned()
    }

    fn handle(state: &mut PanelState, request: &ApiRequest) -> RawResponse {
        let segments: Vec<&str> = request
            .path
            .trim_start_matches("/api/v1/")
            .split('/')
            .collect();
        let result = match (request.method.clone(), segments.as_slice()) {
            (Method::GET, ["inbounds"]) => Ok(list_inbounds(state)),
            (Method::POST, ["inbounds"]) => body(request).map(|new| create_inbound(state, new)),
            (Method::PUT, ["inbounds", id]) => body(request)
                .and_then(|toggle| with_id(id).map(|id| toggle_inbound(state, id, toggle))),
            (Method::DELETE, ["inbounds", id]) => with_id(id).map(|id| delete_inbound(state, id)),
            (Method::GET, ["inbounds", id, "stats"]) => with_id(id).map(|id| stats(state, id)),
            (Method::POST, ["inbounds", id, "clients"]) => body(request)
                .and_then(|new| with_id(id).map(|id| create_client(state, id, new))),
            (Method::PUT, ["clients", id]) => body(request)
                .and_then(|update| with_id(id).map(|id| update_client(state, id, update))),
            (Method::DELETE, ["clients", id]) => with_id(id).map(|id| delete_client(state, id)),
            _ => Err(detail(404, "Not Found")),
        };
        result.unwrap_or_else(|response| response)
    }
}

fn with_id(segment: &str) -> Result<i64, RawResponse> {
    segment.parse().map_err(|_| detail(422, "Invalid id"))
}

fn list_inbounds(state: &PanelState) -> RawResponse {
    let inbounds: Vec<Inbound> = state
        .inbounds
        .iter()
        .map(|inbound| Inbound {
            client_count: state.clients.get(&inbound.id).map_or(0, |c| c.len() as u32),
            ..inbound.clone()
        })
        .collect();
    RawResponse::json(200, &json!(inbounds))
}

fn create_inbound(state: &mut PanelState, new: NewInbound) -> RawResponse {
    if state
        .inbounds
        .iter()
        .any(|i| i.port == new.port || i.remark == new.remark)
    {
        return detail(400, "Port or Remark already in use.");
    }
    state.next_inbound_id += 1;
    let inbound = Inbound {
        id: state.next_inbound_id,
        remark: new.remark,
        enabled: true,
        port: new.port,
        protocol: new.protocol,
        client_count: 0,
    };
    state.clients.insert(inbound.id, Vec::new());
    state.inbounds.push(inbound.clone());
    RawResponse::json(200, &json!(inbound))
}

fn toggle_inbound(state: &mut PanelState, id: i64, toggle: InboundToggle) -> RawResponse {
    let count = state.clients.get(&id).map_or(0, |c| c.len() as u32);
    match state.inbounds.iter_mut().find(|i| i.id == id) {
        Some(inbound) => {
            inbound.enabled = toggle.enabled;
            inbound.client_count = count;
            RawResponse::json(200, &json!(inbound))
        }
        None => detail(404, "Inbound not found"),
    }
}

fn delete_inbound(state: &mut PanelState, id: i64) -> RawResponse {
    let before = state.inbounds.len();
    state.inbounds.retain(|i| i.id != id);
    if state.inbounds.len() == before {
        return detail(404, "Inbound not found");
    }
    state.clients.remove(&id);
    RawResponse::no_content()
}

fn stats(state: &PanelState, id: i64) -> RawResponse {
    match state.clients.get(&id) {
        Some(clients) => RawResponse::json(200, &json!(clients)),
        None => detail(404, "Inbound not found"),
    }
}

fn create_client(state: &mut PanelState, inbound_id: i64, new: NewClient) -> RawResponse {
    let Some(port) = state
        .inbounds
        .iter()
        .find(|i| i.id == inbound_id)
        .map(|i| i.port)
    else {
        return detail(404, "Inbound not found");
    };
    state.next_client_id += 1;
    let id = state.next_client_id;
    let created = Client {
        id,
        remark: new.remark,
        sub_remark: new.subscription_remark,
        enabled: true,
        total_gb: new.total_mb as f64 / 1024.0,
        used_traffic_bytes: 0,
        expiry_time: match new.expiry_days {
            0 => 0,
            days => chrono::Utc::now().timestamp() + i64::from(days) * 86_400,
        },
        online: false,
        config_link_domain: Some(format!("vless://client-{}@panel.example.com:{}", id, port)),
        config_link_ip: Some(format!("vless://client-{}@203.0.113.7:{}", id, port)),
    };
    state
        .clients
        .entry(inbound_id)
        .or_default()
        .push(created.clone());
    RawResponse::json(200, &json!(created))
}

fn update_client(state: &mut PanelState, id: i64, update: ClientUpdate) -> RawResponse {
    let Some(target) = state.clients.values_mut().flatten().find(|c| c.id == id) else {
        return detail(404, "Client not found");
    };
    if let Some(enabled) = update.enabled {
        target.enabled = enabled;
    }
    if let Some(total_mb) = update.total_mb {
        target.total_gb = total_mb as f64 / 1024.0;
    }
    if let Some(expiry_time) = update.expiry_time {
        target.expiry_time = expiry_time;
    }
    if update.reset_traffic == Some(true) {
        target.used_traffic_bytes = 0;
    }
    RawResponse::json(200, &json!(target))
}

fn delete_client(state: &mut PanelState, id: i64) -> RawResponse {
    let mut found = false;
    for clients in state.clients.values_mut() {
        let before = clients.len();
        clients.retain(|c| c.id != id);
        found |= clients.len() != before;
    }
    if found {
        RawResponse::no_content()
    } else {
        detail(404, "Client not found")
    }
}

#[async_trait]
impl Backend for FakePanel {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ApiError::RequestFailed("fake panel poisoned".to_string()))?;
        state.calls.push((request.method.clone(), request.path.clone()));

        if state.session_expired {
            return Ok(detail(401, "Not authenticated"));
        }
        if let Some(pos) = state
            .failures
            .iter()
            .position(|(m, p, _)| *m == request.method && *p == request.path)
        {
            let (_, _, message) = state.failures.remove(pos);
            return Ok(detail(400, &message));
        }

        Ok(FakePanel::handle(&mut state, request))
    }
}
