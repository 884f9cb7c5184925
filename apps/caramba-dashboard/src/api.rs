use caramba_shared::api::{Client, ClientUpdate, Inbound, InboundToggle, NewClient, NewInbound};

use crate::error::ApiError;
use crate::surface::Surface;
use crate::transport::{ApiRequest, Payload, Reporting, Transport};

pub mod paths {
    pub const INBOUNDS: &str = "/api/v1/inbounds";

    pub fn inbound(inbound_id: i64) -> String {
        format!("{}/{}", INBOUNDS, inbound_id)
    }

    pub fn inbound_stats(inbound_id: i64) -> String {
        format!("{}/{}/stats", INBOUNDS, inbound_id)
    }

    pub fn inbound_clients(inbound_id: i64) -> String {
        format!("{}/{}/clients", INBOUNDS, inbound_id)
    }

    pub fn client(client_id: i64) -> String {
        format!("/api/v1/clients/{}", client_id)
    }
}

/// Typed endpoints of the panel management API.
#[derive(Clone)]
pub struct PanelApi {
    transport: Transport,
}

impl PanelApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn list_inbounds(&self, surface: &mut dyn Surface) -> Result<Vec<Inbound>, ApiError> {
        self.transport
            .call_json(&ApiRequest::get(paths::INBOUNDS), surface, Reporting::Alert)
            .await
    }

    pub async fn create_inbound(
        &self,
        inbound: &NewInbound,
        surface: &mut dyn Surface,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(paths::INBOUNDS, inbound)?;
        self.mutate(&request, surface).await.map(|_| ())
    }

    /// Returns the server's copy of the inbound when the reply carries one.
    pub async fn set_inbound_enabled(
        &self,
        inbound_id: i64,
        enabled: bool,
        surface: &mut dyn Surface,
    ) -> Result<Option<Inbound>, ApiError> {
        let request = ApiRequest::put(paths::inbound(inbound_id), &InboundToggle { enabled })?;
        match self.mutate(&request, surface).await? {
            Payload::Json(value) => Ok(serde_json::from_value(value).ok()),
            Payload::Empty | Payload::Text(_) => Ok(None),
        }
    }

    pub async fn delete_inbound(
        &self,
        inbound_id: i64,
        surface: &mut dyn Surface,
    ) -> Result<(), ApiError> {
        self.mutate(&ApiRequest::delete(paths::inbound(inbound_id)), surface)
            .await
            .map(|_| ())
    }

    /// Current client snapshot of one inbound.
    pub async fn client_stats(
        &self,
        inbound_id: i64,
        surface: &mut dyn Surface,
        reporting: Reporting,
    ) -> Result<Vec<Client>, ApiError> {
        self.transport
            .call_json(&ApiRequest::get(paths::inbound_stats(inbound_id)), surface, reporting)
            .await
    }

    pub async fn create_client(
        &self,
        inbound_id: i64,
        client: &NewClient,
        surface: &mut dyn Surface,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(paths::inbound_clients(inbound_id), client)?;
        self.mutate(&request, surface).await.map(|_| ())
    }

    pub async fn update_client(
        &self,
        client_id: i64,
        update: &ClientUpdate,
        surface: &mut dyn Surface,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::put(paths::client(client_id), update)?;
        self.mutate(&request, surface).await.map(|_| ())
    }

    pub async fn delete_client(
        &self,
        client_id: i64,
        surface: &mut dyn Surface,
    ) -> Result<(), ApiError> {
        self.mutate(&ApiRequest::delete(paths::client(client_id)), surface)
            .await
            .map(|_| ())
    }

    /// Any 2xx reply counts as success; mutation bodies are not contractual.
    async fn mutate(
        &self,
        request: &ApiRequest,
        surface: &mut dyn Surface,
    ) -> Result<Payload, ApiError> {
        self.transport.call(request, surface, Reporting::Alert).await
    }
}
