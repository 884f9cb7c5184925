//! Pure mapping from dashboard state to what a surface draws.
//!
//! Nothing here talks to the network or mutates state, so rendering the same
//! state twice yields equal views.

use caramba_shared::api::{Client, Inbound};
use chrono::DateTime;

use crate::cache::ClientCache;
use crate::expansion::Expansion;
use crate::modal::{Modal, QrPanel};

pub const UNLIMITED: &str = "∞";
pub const NO_INBOUNDS: &str = "No inbounds found.";
pub const NO_CLIENTS: &str = "No clients for this inbound.";
pub const LOADING: &str = "Loading...";
pub const STATS_UNAVAILABLE: &str = "Live stats unavailable.";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary-unit size with up to two decimals: `0 B`, `1.5 KB`, `1 GB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, BYTE_UNITS[unit])
}

/// Calendar date (UTC, `YYYY-MM-DD`) of an epoch-seconds expiry; `∞` for 0.
pub fn format_expiry(expiry_time: i64) -> String {
    if expiry_time == 0 {
        return UNLIMITED.to_string();
    }
    match DateTime::from_timestamp(expiry_time, 0) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => expiry_time.to_string(),
    }
}

/// Share of the quota consumed, clamped to `[0, 100]`; 0 for unlimited quotas.
pub fn usage_percent(used_bytes: u64, total_gb: f64) -> f64 {
    if total_gb <= 0.0 {
        return 0.0;
    }
    let total_bytes = total_gb * BYTES_PER_GB;
    (used_bytes as f64 / total_bytes * 100.0).clamp(0.0, 100.0)
}

pub fn quota_text(total_gb: f64) -> String {
    if total_gb > 0.0 {
        format!("/ {:.2} GB", total_gb)
    } else {
        format!("/ {}", UNLIMITED)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundRow {
    pub inbound_id: i64,
    pub remark: String,
    pub enabled: bool,
    pub port: u16,
    pub protocol: String,
    pub client_count: u32,
    pub expanded: bool,
    pub affordance: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientRow {
    pub inbound_id: i64,
    pub client_id: i64,
    pub remark: String,
    pub enabled: bool,
    pub online: bool,
    pub status: &'static str,
    pub usage_percent: f64,
    pub traffic_text: String,
    pub expiry_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundTable {
    /// Nothing fetched yet.
    Pending,
    Empty,
    Failed(String),
    Rows(Vec<InboundRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientPanel {
    Loading,
    Unavailable,
    Empty,
    Rows(Vec<ClientRow>),
}

impl ClientPanel {
    /// Placeholder text for panels without rows.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ClientPanel::Loading => Some(LOADING),
            ClientPanel::Unavailable => Some(STATS_UNAVAILABLE),
            ClientPanel::Empty => Some(NO_CLIENTS),
            ClientPanel::Rows(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedPanel {
    pub inbound_id: i64,
    pub body: ClientPanel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModalView {
    None,
    AddInbound,
    AddClient {
        inbound_id: i64,
    },
    EditClient {
        inbound_id: i64,
        client_id: i64,
    },
    Qr {
        client_remark: String,
        subscription_url: String,
        link: Option<String>,
        use_ip: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub table: InboundTable,
    pub panel: Option<ExpandedPanel>,
    pub modal: ModalView,
}

/// Top-level list as last reported by the panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TableState {
    #[default]
    Unloaded,
    Loaded(Vec<Inbound>),
    Failed(String),
}

pub fn inbound_row(inbound: &Inbound, expansion: &Expansion) -> InboundRow {
    InboundRow {
        inbound_id: inbound.id,
        remark: inbound.remark.clone(),
        enabled: inbound.enabled,
        port: inbound.port,
        protocol: inbound.protocol.clone(),
        client_count: inbound.client_count,
        expanded: expansion.is_expanded(inbound.id),
        affordance: expansion.affordance(inbound.id),
    }
}

pub fn client_row(inbound_id: i64, client: &Client) -> ClientRow {
    ClientRow {
        inbound_id,
        client_id: client.id,
        remark: client.remark.clone(),
        enabled: client.enabled,
        online: client.online,
        status: if client.online { "Online" } else { "Offline" },
        usage_percent: usage_percent(client.used_traffic_bytes, client.total_gb),
        traffic_text: format!(
            "{} {}",
            format_bytes(client.used_traffic_bytes),
            quota_text(client.total_gb)
        ),
        expiry_text: format_expiry(client.expiry_time),
    }
}

pub fn inbound_table(state: &TableState, expansion: &Expansion) -> InboundTable {
    match state {
        TableState::Unloaded => InboundTable::Pending,
        TableState::Failed(message) => InboundTable::Failed(format!("Error: {}", message)),
        TableState::Loaded(inbounds) if inbounds.is_empty() => InboundTable::Empty,
        TableState::Loaded(inbounds) => InboundTable::Rows(
            inbounds
                .iter()
                .map(|inbound| inbound_row(inbound, expansion))
                .collect(),
        ),
    }
}

/// Freshness of the expanded inbound's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    /// First snapshot since expansion has not arrived yet.
    Loading,
    /// The refresh on expansion failed; whatever is cached is from an earlier open.
    Unavailable,
    Live,
}

pub fn client_panel(inbound_id: i64, cache: &ClientCache, status: PanelStatus) -> ClientPanel {
    match status {
        PanelStatus::Loading => return ClientPanel::Loading,
        PanelStatus::Unavailable => return ClientPanel::Unavailable,
        PanelStatus::Live => {}
    }
    match cache.get(inbound_id) {
        None => ClientPanel::Unavailable,
        Some([]) => ClientPanel::Empty,
        Some(clients) => ClientPanel::Rows(
            clients
                .iter()
                .map(|client| client_row(inbound_id, client))
                .collect(),
        ),
    }
}

pub fn modal_view(modal: &Modal) -> ModalView {
    match modal {
        Modal::Closed => ModalView::None,
        Modal::AddInbound { .. } => ModalView::AddInbound,
        Modal::AddClient { inbound_id, .. } => ModalView::AddClient {
            inbound_id: *inbound_id,
        },
        Modal::EditClient {
            inbound_id,
            client_id,
            ..
        } => ModalView::EditClient {
            inbound_id: *inbound_id,
            client_id: *client_id,
        },
        Modal::Qr(panel) => qr_view(panel),
    }
}

fn qr_view(panel: &QrPanel) -> ModalView {
    ModalView::Qr {
        client_remark: format!("Client: {}", panel.client_remark),
        subscription_url: panel.subscription_url.clone(),
        link: panel.active_link().map(str::to_string),
        use_ip: panel.use_ip,
    }
}

pub fn dashboard(
    table: &TableState,
    expansion: &Expansion,
    cache: &ClientCache,
    loading: Option<i64>,
    unavailable: Option<i64>,
    modal: &Modal,
) -> DashboardView {
    let rows_present = matches!(table, TableState::Loaded(_));
    let panel = expansion
        .expanded_id()
        .filter(|_| rows_present)
        .map(|inbound_id| {
            let status = if loading == Some(inbound_id) {
                PanelStatus::Loading
            } else if unavailable == Some(inbound_id) {
                PanelStatus::Unavailable
            } else {
                PanelStatus::Live
            };
            ExpandedPanel {
                inbound_id,
                body: client_panel(inbound_id, cache, status),
            }
        });

    DashboardView {
        table: inbound_table(table, expansion),
        panel,
        modal: modal_view(modal),
    }
}
