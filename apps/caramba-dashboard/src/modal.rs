use caramba_shared::api::{Client, ClientUpdate, Network, NewClient, NewInbound, StreamSettings};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct InboundForm {
    pub remark: String,
    pub port: u16,
    pub protocol: String,
    pub network: Network,
}

impl InboundForm {
    pub fn to_request(&self) -> NewInbound {
        NewInbound {
            remark: self.remark.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            stream_settings: StreamSettings::for_network(self.network),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientForm {
    pub remark: String,
    pub subscription_remark: String,
    pub total_mb: u64,
    /// `0` creates a client that never expires.
    pub expiry_days: u32,
}

impl ClientForm {
    pub fn to_request(&self) -> NewClient {
        NewClient {
            remark: self.remark.clone(),
            subscription_remark: self.subscription_remark.clone(),
            total_mb: self.total_mb,
            expiry_days: self.expiry_days,
        }
    }
}

/// Edit-client form. `expiry_days` holds the raw "days from now" input.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub enabled: bool,
    pub total_mb: u64,
    pub expiry_days: String,
    pub reset_traffic: bool,
}

impl EditForm {
    /// Current values of `client`, with a blank expiry and no traffic reset.
    pub fn prefill(client: &Client) -> Self {
        Self {
            enabled: client.enabled,
            total_mb: (client.total_gb * 1024.0).round().max(0.0) as u64,
            expiry_days: String::new(),
            reset_traffic: false,
        }
    }

    pub fn apply(&mut self, changes: &EditChanges) {
        if let Some(enabled) = changes.enabled {
            self.enabled = enabled;
        }
        if let Some(total_mb) = changes.total_mb {
            self.total_mb = total_mb;
        }
        if let Some(days) = &changes.expiry_days {
            self.expiry_days = days.clone();
        }
        if let Some(reset) = changes.reset_traffic {
            self.reset_traffic = reset;
        }
    }

    pub fn to_update(&self, now: i64) -> ClientUpdate {
        ClientUpdate {
            enabled: Some(self.enabled),
            total_mb: Some(self.total_mb),
            expiry_time: expiry_from_days(&self.expiry_days, now),
            reset_traffic: Some(self.reset_traffic),
        }
    }
}

/// Field edits applied on top of a prefilled [`EditForm`]. `None` keeps the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditChanges {
    pub enabled: Option<bool>,
    pub total_mb: Option<u64>,
    pub expiry_days: Option<String>,
    pub reset_traffic: Option<bool>,
}

/// Absolute expiry for a "days from now" input.
///
/// Blank, unparsable or negative input leaves the expiry unchanged (`None`);
/// `0` clears it to unlimited.
pub fn expiry_from_days(input: &str, now: i64) -> Option<i64> {
    let days: i64 = input.trim().parse().ok()?;
    match days {
        d if d < 0 => None,
        0 => Some(0),
        d => Some(now + d * SECONDS_PER_DAY),
    }
}

pub fn subscription_url(origin: &str, sub_remark: &str) -> String {
    format!(
        "{}/sub/{}",
        origin.trim_end_matches('/'),
        urlencoding::encode(sub_remark)
    )
}

fn non_blank(link: &Option<String>) -> Option<&str> {
    link.as_deref().filter(|l| !l.trim().is_empty())
}

/// Domain link when present, otherwise the IP link.
pub fn preferred_link(client: &Client) -> Option<&str> {
    non_blank(&client.config_link_domain).or_else(|| non_blank(&client.config_link_ip))
}

/// Subscription and config links of one client, as a QR code would encode them.
#[derive(Debug, Clone, PartialEq)]
pub struct QrPanel {
    pub inbound_id: i64,
    pub client_id: i64,
    pub client_remark: String,
    pub subscription_url: String,
    pub link_domain: Option<String>,
    pub link_ip: Option<String>,
    pub use_ip: bool,
}

impl QrPanel {
    pub fn for_client(origin: &str, inbound_id: i64, client: &Client) -> Self {
        let link_domain = non_blank(&client.config_link_domain).map(str::to_string);
        Self {
            inbound_id,
            client_id: client.id,
            client_remark: client.remark.clone(),
            subscription_url: subscription_url(origin, &client.sub_remark),
            use_ip: link_domain.is_none(),
            link_domain,
            link_ip: non_blank(&client.config_link_ip).map(str::to_string),
        }
    }

    pub fn active_link(&self) -> Option<&str> {
        if self.use_ip {
            self.link_ip.as_deref()
        } else {
            self.link_domain.as_deref().or(self.link_ip.as_deref())
        }
    }
}

/// The one dialog that may be open over the dashboard.
///
/// Create/edit dialogs keep the last submitted form while open so a
/// rejected submission can be corrected; closing drops it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Modal {
    #[default]
    Closed,
    AddInbound {
        draft: Option<InboundForm>,
    },
    AddClient {
        inbound_id: i64,
        draft: Option<ClientForm>,
    },
    EditClient {
        inbound_id: i64,
        client_id: i64,
        form: EditForm,
    },
    Qr(QrPanel),
}

impl Modal {
    pub fn is_open(&self) -> bool {
        !matches!(self, Modal::Closed)
    }
}
