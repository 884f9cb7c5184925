use std::time::Duration;

use caramba_shared::api::{ClientUpdate, Inbound};
use tracing::{debug, info, warn};

use crate::api::PanelApi;
use crate::cache::ClientCache;
use crate::error::ApiError;
use crate::expansion::Expansion;
use crate::modal::{ClientForm, EditChanges, EditForm, InboundForm, Modal, QrPanel, preferred_link};
use crate::scheduler::{DEFAULT_POLL_PERIOD, PollScheduler};
use crate::surface::Surface;
use crate::transport::Reporting;
use crate::view::{self, DashboardView, TableState};

pub const CONFIG_LINK_COPIED: &str = "Config link copied!";
pub const SUBSCRIPTION_LINK_COPIED: &str = "Subscription link copied!";

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub poll_period: Duration,
    /// Origin subscription links are built against.
    pub public_origin: String,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
            public_origin: String::new(),
        }
    }
}

/// Operator actions. Row-level commands carry the ids of the row they act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    ToggleExpand {
        inbound_id: i64,
    },
    Collapse,
    ToggleInbound {
        inbound_id: i64,
        enabled: bool,
    },
    DeleteInbound {
        inbound_id: i64,
    },
    OpenAddInbound,
    SubmitInbound(InboundForm),
    OpenAddClient {
        inbound_id: i64,
    },
    SubmitClient {
        inbound_id: i64,
        form: ClientForm,
    },
    ToggleClient {
        inbound_id: i64,
        client_id: i64,
        enabled: bool,
    },
    DeleteClient {
        inbound_id: i64,
        client_id: i64,
    },
    OpenEditClient {
        inbound_id: i64,
        client_id: i64,
    },
    SubmitEdit {
        inbound_id: i64,
        client_id: i64,
        changes: EditChanges,
    },
    ShowQr {
        inbound_id: Option<i64>,
        client_id: i64,
    },
    QrUseIp(bool),
    /// Config link of the open QR panel.
    CopyLink,
    CopyClientLink {
        inbound_id: i64,
        client_id: i64,
    },
    CopySubscriptionLink,
    CloseModal,
    Quit,
}

/// Dashboard controller: owns all state and is the only writer of the cache.
///
/// Every entry point runs to completion before the next one starts, so a
/// user action and its re-render never interleave with a poll tick.
pub struct Dashboard<S: Surface> {
    api: PanelApi,
    surface: S,
    cache: ClientCache,
    table: TableState,
    expansion: Expansion,
    scheduler: PollScheduler,
    /// Freshly expanded inbound whose first snapshot is still outstanding.
    loading: Option<i64>,
    /// Expanded inbound whose refresh on expansion failed.
    unavailable: Option<i64>,
    modal: Modal,
    public_origin: String,
    closed: bool,
}

impl<S: Surface> Dashboard<S> {
    pub fn new(api: PanelApi, surface: S, options: DashboardOptions) -> Self {
        Self {
            api,
            surface,
            cache: ClientCache::new(),
            table: TableState::default(),
            expansion: Expansion::default(),
            scheduler: PollScheduler::new(options.poll_period),
            loading: None,
            unavailable: None,
            modal: Modal::default(),
            public_origin: options.public_origin,
            closed: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn expansion(&self) -> Expansion {
        self.expansion
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn view(&self) -> DashboardView {
        view::dashboard(
            &self.table,
            &self.expansion,
            &self.cache,
            self.loading,
            self.unavailable,
            &self.modal,
        )
    }

    pub fn redraw(&mut self) {
        if self.closed {
            return;
        }
        let view = self.view();
        self.surface.render(&view);
    }

    /// Next poll tick; pending forever while nothing is expanded.
    pub async fn next_tick(&mut self) -> i64 {
        self.scheduler.tick().await
    }

    /// Timer callback: refresh the polled inbound's snapshot.
    pub async fn poll(&mut self, inbound_id: i64) {
        if !self.scheduler.is_polling(inbound_id) {
            debug!(inbound_id, "Dropping tick for inactive poll");
            return;
        }
        self.refresh_stats(inbound_id, Reporting::Quiet).await;
        self.redraw();
    }

    pub async fn dispatch(&mut self, command: Command) {
        if self.closed {
            return;
        }
        debug!(?command, "Dispatching");

        match command {
            Command::Refresh => self.refresh_inbounds(true).await,
            Command::ToggleExpand { inbound_id } => self.toggle_expand(inbound_id).await,
            Command::Collapse => self.collapse(),
            Command::ToggleInbound {
                inbound_id,
                enabled,
            } => self.toggle_inbound(inbound_id, enabled).await,
            Command::DeleteInbound { inbound_id } => self.delete_inbound(inbound_id).await,
            Command::OpenAddInbound => self.modal = Modal::AddInbound { draft: None },
            Command::SubmitInbound(form) => self.create_inbound(form).await,
            Command::OpenAddClient { inbound_id } => {
                self.modal = Modal::AddClient {
                    inbound_id,
                    draft: None,
                }
            }
            Command::SubmitClient { inbound_id, form } => {
                self.create_client(inbound_id, form).await
            }
            Command::ToggleClient {
                inbound_id,
                client_id,
                enabled,
            } => self.toggle_client(inbound_id, client_id, enabled).await,
            Command::DeleteClient {
                inbound_id,
                client_id,
            } => self.delete_client(inbound_id, client_id).await,
            Command::OpenEditClient {
                inbound_id,
                client_id,
            } => self.open_edit(inbound_id, client_id),
            Command::SubmitEdit {
                inbound_id,
                client_id,
                changes,
            } => self.submit_edit(inbound_id, client_id, changes).await,
            Command::ShowQr {
                inbound_id,
                client_id,
            } => self.show_qr(inbound_id, client_id),
            Command::QrUseIp(use_ip) => {
                if let Modal::Qr(panel) = &mut self.modal {
                    panel.use_ip = use_ip;
                }
            }
            Command::CopyLink => self.copy_qr_link(),
            Command::CopyClientLink {
                inbound_id,
                client_id,
            } => self.copy_client_link(inbound_id, client_id),
            Command::CopySubscriptionLink => self.copy_subscription_link(),
            Command::CloseModal => self.modal = Modal::Closed,
            Command::Quit => self.shutdown(),
        }

        self.redraw();
    }

    /// Fetch the inbound list. With `keep_expanded` the open panel survives
    /// when its inbound is still listed; otherwise it is collapsed.
    pub async fn refresh_inbounds(&mut self, keep_expanded: bool) {
        match self.api.list_inbounds(&mut self.surface).await {
            Ok(inbounds) => {
                let listed = self
                    .expansion
                    .expanded_id()
                    .is_some_and(|id| inbounds.iter().any(|i| i.id == id));
                info!(count = inbounds.len(), "Inbounds loaded");
                self.table = TableState::Loaded(inbounds);
                if !(keep_expanded && listed) {
                    self.collapse();
                }
            }
            Err(err) => {
                self.table = TableState::Failed(err.to_string());
                self.collapse();
                self.absorb(&err);
            }
        }
    }

    /// Replace the cached snapshot of `inbound_id` with the panel's current one.
    /// A failure ends polling of that inbound.
    async fn refresh_stats(&mut self, inbound_id: i64, reporting: Reporting) -> bool {
        let result = self
            .api
            .client_stats(inbound_id, &mut self.surface, reporting)
            .await;
        if self.loading == Some(inbound_id) {
            self.loading = None;
        }

        match result {
            Ok(clients) => {
                debug!(inbound_id, clients = clients.len(), "Snapshot refreshed");
                self.cache.put(inbound_id, clients);
                if self.unavailable == Some(inbound_id) {
                    self.unavailable = None;
                }
                true
            }
            Err(err) => {
                if self.scheduler.stop_if(inbound_id) {
                    warn!(inbound_id, "Stats polling disabled after failure: {}", err);
                }
                self.absorb(&err);
                false
            }
        }
    }

    async fn toggle_expand(&mut self, inbound_id: i64) {
        let transition = self.expansion.toggle(inbound_id);
        if let Some(collapsed) = transition.collapsed {
            self.scheduler.stop_if(collapsed);
            if self.loading == Some(collapsed) {
                self.loading = None;
            }
            if self.unavailable == Some(collapsed) {
                self.unavailable = None;
            }
        }

        let Some(expanded) = transition.expanded else {
            return;
        };
        self.loading = Some(expanded);
        self.redraw();

        let refreshed = self.refresh_stats(expanded, Reporting::Quiet).await;
        if !self.expansion.is_expanded(expanded) || self.closed {
            return;
        }
        if refreshed {
            self.scheduler.start(expanded);
        } else {
            self.unavailable = Some(expanded);
        }
    }

    fn collapse(&mut self) {
        if let Some(inbound_id) = self.expansion.collapse() {
            self.scheduler.stop_if(inbound_id);
            debug!(inbound_id, "Collapsed");
        }
        self.loading = None;
        self.unavailable = None;
    }

    fn inbound_mut(&mut self, inbound_id: i64) -> Option<&mut Inbound> {
        match &mut self.table {
            TableState::Loaded(inbounds) => inbounds.iter_mut().find(|i| i.id == inbound_id),
            _ => None,
        }
    }

    async fn toggle_inbound(&mut self, inbound_id: i64, enabled: bool) {
        let Some(row) = self.inbound_mut(inbound_id) else {
            self.surface
                .alert(&format!("Inbound #{} is not listed.", inbound_id));
            return;
        };
        let previous = row.enabled;
        row.enabled = enabled;
        self.redraw();

        match self
            .api
            .set_inbound_enabled(inbound_id, enabled, &mut self.surface)
            .await
        {
            Ok(Some(updated)) => {
                if let Some(row) = self.inbound_mut(inbound_id) {
                    *row = Inbound {
                        client_count: row.client_count,
                        ..updated
                    };
                }
            }
            Ok(None) => debug!(inbound_id, enabled, "Inbound toggled"),
            Err(err) => {
                if let Some(row) = self.inbound_mut(inbound_id) {
                    row.enabled = previous;
                }
                self.absorb(&err);
            }
        }
    }

    async fn delete_inbound(&mut self, inbound_id: i64) {
        let prompt = format!("Delete inbound #{}?", inbound_id);
        if !self.surface.confirm(&prompt).await {
            return;
        }

        match self.api.delete_inbound(inbound_id, &mut self.surface).await {
            Ok(()) => {
                info!(inbound_id, "Inbound deleted");
                if self.expansion.is_expanded(inbound_id) {
                    self.collapse();
                }
                self.scheduler.stop_if(inbound_id);
                self.refresh_inbounds(true).await;
            }
            Err(err) => self.absorb(&err),
        }
    }

    async fn create_inbound(&mut self, form: InboundForm) {
        let request = form.to_request();
        self.modal = Modal::AddInbound { draft: Some(form) };

        match self.api.create_inbound(&request, &mut self.surface).await {
            Ok(()) => {
                info!(remark = %request.remark, port = request.port, "Inbound created");
                self.modal = Modal::Closed;
                self.refresh_inbounds(true).await;
            }
            Err(err) => self.absorb(&err),
        }
    }

    async fn create_client(&mut self, inbound_id: i64, form: ClientForm) {
        let request = form.to_request();
        self.modal = Modal::AddClient {
            inbound_id,
            draft: Some(form),
        };

        match self
            .api
            .create_client(inbound_id, &request, &mut self.surface)
            .await
        {
            Ok(()) => {
                info!(inbound_id, remark = %request.remark, "Client created");
                self.modal = Modal::Closed;
                if let Some(open) = self.expansion.expanded_id() {
                    self.refresh_stats(open, Reporting::Alert).await;
                }
                if !self.closed {
                    self.refresh_inbounds(true).await;
                }
            }
            Err(err) => self.absorb(&err),
        }
    }

    async fn toggle_client(&mut self, inbound_id: i64, client_id: i64, enabled: bool) {
        let patches = self.cache.set_client_enabled(inbound_id, client_id, enabled);
        if patches.is_empty() {
            self.surface.alert(&format!(
                "Client #{} of inbound #{} is not loaded.",
                client_id, inbound_id
            ));
            return;
        }
        self.redraw();

        let update = ClientUpdate {
            enabled: Some(enabled),
            ..Default::default()
        };
        if let Err(err) = self
            .api
            .update_client(client_id, &update, &mut self.surface)
            .await
        {
            debug!(client_id, copies = patches.len(), "Reverting optimistic toggle");
            self.cache.revert(&patches);
            self.absorb(&err);
        }
    }

    async fn delete_client(&mut self, inbound_id: i64, client_id: i64) {
        let prompt = format!("Delete client #{}?", client_id);
        if !self.surface.confirm(&prompt).await {
            return;
        }

        match self.api.delete_client(client_id, &mut self.surface).await {
            Ok(()) => {
                info!(inbound_id, client_id, "Client deleted");
                self.refresh_stats(inbound_id, Reporting::Alert).await;
                if !self.closed {
                    self.refresh_inbounds(true).await;
                }
            }
            Err(err) => self.absorb(&err),
        }
    }

    fn open_edit(&mut self, inbound_id: i64, client_id: i64) {
        match self.cache.find_client(inbound_id, client_id) {
            Some(client) => {
                self.modal = Modal::EditClient {
                    inbound_id,
                    client_id,
                    form: EditForm::prefill(client),
                }
            }
            None => self.surface.alert(&format!(
                "Client #{} of inbound #{} is not loaded.",
                client_id, inbound_id
            )),
        }
    }

    async fn submit_edit(&mut self, inbound_id: i64, client_id: i64, changes: EditChanges) {
        let open_form = match &self.modal {
            Modal::EditClient {
                inbound_id: open_inbound,
                client_id: open_client,
                form,
            } if *open_inbound == inbound_id && *open_client == client_id => Some(form.clone()),
            _ => None,
        };
        let Some(mut form) = open_form.or_else(|| {
            self.cache
                .find_client(inbound_id, client_id)
                .map(EditForm::prefill)
        }) else {
            self.surface.alert(&format!(
                "Client #{} of inbound #{} is not loaded.",
                client_id, inbound_id
            ));
            return;
        };

        form.apply(&changes);
        let update = form.to_update(chrono::Utc::now().timestamp());
        self.modal = Modal::EditClient {
            inbound_id,
            client_id,
            form,
        };

        match self
            .api
            .update_client(client_id, &update, &mut self.surface)
            .await
        {
            Ok(()) => {
                info!(inbound_id, client_id, "Client updated");
                self.modal = Modal::Closed;
                self.refresh_stats(inbound_id, Reporting::Alert).await;
            }
            Err(err) => self.absorb(&err),
        }
    }

    fn show_qr(&mut self, inbound_id: Option<i64>, client_id: i64) {
        let found = match inbound_id {
            Some(inbound_id) => self
                .cache
                .find_client(inbound_id, client_id)
                .map(|client| (inbound_id, client)),
            None => self.cache.find_client_across_all(client_id),
        };
        match found {
            Some((owner, client)) => {
                self.modal = Modal::Qr(QrPanel::for_client(&self.public_origin, owner, client));
            }
            None => self
                .surface
                .alert(&format!("Client #{} is not loaded.", client_id)),
        }
    }

    fn copy_qr_link(&mut self) {
        let Modal::Qr(panel) = &self.modal else {
            self.surface.alert("No client selected.");
            return;
        };
        match panel.active_link() {
            Some(link) => {
                self.surface.copy(link);
                self.surface.alert(CONFIG_LINK_COPIED);
            }
            None => self.surface.alert("No config link available."),
        }
    }

    fn copy_client_link(&mut self, inbound_id: i64, client_id: i64) {
        let link = self
            .cache
            .find_client(inbound_id, client_id)
            .and_then(preferred_link);
        match link {
            Some(link) => {
                self.surface.copy(link);
                self.surface.alert(CONFIG_LINK_COPIED);
            }
            None => self.surface.alert("No config link available."),
        }
    }

    fn copy_subscription_link(&mut self) {
        match &self.modal {
            Modal::Qr(panel) => {
                self.surface.copy(&panel.subscription_url);
                self.surface.alert(SUBSCRIPTION_LINK_COPIED);
            }
            _ => self.surface.alert("No client selected."),
        }
    }

    fn absorb(&mut self, err: &ApiError) {
        if err.is_session_expired() {
            self.shutdown();
        }
    }

    /// Stop polling and refuse further commands.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.scheduler.stop();
        self.expansion.collapse();
        self.loading = None;
        self.unavailable = None;
        self.closed = true;
        info!("Dashboard closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use caramba_shared::api::Network;
    use reqwest::Method;
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::scheduler::PollState;
    use crate::testing::{FakePanel, RecordingSurface, ScriptedBackend, client, inbound};
    use crate::transport::{RawResponse, Transport};
    use crate::view::{ClientPanel, InboundTable, NO_CLIENTS};

    const ORIGIN: &str = "https://panel.example.com";

    fn dashboard(panel: &Arc<FakePanel>) -> Dashboard<RecordingSurface> {
        let api = PanelApi::new(Transport::new(panel.clone()));
        Dashboard::new(
            api,
            RecordingSurface::default(),
            DashboardOptions {
                poll_period: Duration::from_secs(5),
                public_origin: ORIGIN.to_string(),
            },
        )
    }

    fn scripted(responses: Vec<RawResponse>) -> Dashboard<RecordingSurface> {
        let backend = ScriptedBackend::new(responses.into_iter().map(Ok).collect());
        Dashboard::new(
            PanelApi::new(Transport::new(Arc::new(backend))),
            RecordingSurface::default(),
            DashboardOptions::default(),
        )
    }

    fn two_inbounds() -> Arc<FakePanel> {
        Arc::new(
            FakePanel::new()
                .with_inbound("edge", 443)
                .with_inbound("backup", 8443)
                .with_client(1, "alice", "alice")
                .with_client(1, "bob", "bob")
                .with_client(2, "alice-backup", "alice"),
        )
    }

    fn client_rows(view: &DashboardView) -> Vec<(i64, bool)> {
        match view.panel.as_ref().map(|p| &p.body) {
            Some(ClientPanel::Rows(rows)) => rows.iter().map(|r| (r.client_id, r.enabled)).collect(),
            _ => Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expanding_another_inbound_moves_the_single_timer() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;

        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        assert_eq!(dash.scheduler().state(), PollState::Polling(1));

        dash.dispatch(Command::ToggleExpand { inbound_id: 2 }).await;
        assert_eq!(dash.scheduler().state(), PollState::Polling(2));
        assert_eq!(dash.scheduler().live_timers(), 1);
        assert_eq!(dash.expansion(), Expansion::Expanded(2));

        let InboundTable::Rows(rows) = dash.view().table else {
            panic!("expected inbound rows");
        };
        assert_eq!(rows[0].affordance, "+");
        assert_eq!(rows[1].affordance, "−");

        let polled = timeout(Duration::from_secs(6), dash.next_tick()).await;
        assert_eq!(polled, Ok(2));
    }

    #[tokio::test]
    async fn expansion_shows_loading_before_the_first_snapshot() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        let bodies: Vec<ClientPanel> = dash
            .surface()
            .renders
            .iter()
            .filter_map(|v| v.panel.as_ref().map(|p| p.body.clone()))
            .collect();
        assert_eq!(bodies.first(), Some(&ClientPanel::Loading));
        assert_eq!(client_rows(dash.surface().last_view().unwrap()), vec![(1, true), (2, true)]);
    }

    #[tokio::test]
    async fn toggling_the_open_inbound_collapses_it() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert!(dash.view().panel.is_none());
    }

    #[tokio::test]
    async fn client_toggle_is_optimistic_and_reverts_on_failure() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 2 }).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        panel.fail_next(Method::PUT, "/api/v1/clients/1", "Failed to restart Xray.");

        let renders_before = dash.surface().renders.len();
        dash.dispatch(Command::ToggleClient {
            inbound_id: 1,
            client_id: 1,
            enabled: false,
        })
        .await;

        let optimistic = &dash.surface().renders[renders_before];
        assert_eq!(client_rows(optimistic), vec![(1, false), (2, true)]);

        assert_eq!(client_rows(dash.surface().last_view().unwrap()), vec![(1, true), (2, true)]);
        assert!(dash.cache().find_client(2, 3).unwrap().enabled);
        assert_eq!(dash.surface().alerts, vec!["API Error: Failed to restart Xray."]);
    }

    #[tokio::test]
    async fn client_toggle_flips_every_copy_of_the_subscription() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 2 }).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        dash.dispatch(Command::ToggleClient {
            inbound_id: 1,
            client_id: 1,
            enabled: false,
        })
        .await;

        assert!(!dash.cache().find_client(1, 1).unwrap().enabled);
        assert!(!dash.cache().find_client(2, 3).unwrap().enabled);
        assert!(dash.cache().find_client(1, 2).unwrap().enabled);
        assert!(!panel.client(1).unwrap().enabled);
        assert!(dash.surface().alerts.is_empty());
    }

    #[tokio::test]
    async fn inbound_toggle_reverts_on_failure() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        panel.fail_next(Method::PUT, "/api/v1/inbounds/2", "Failed to restart Xray.");

        dash.dispatch(Command::ToggleInbound {
            inbound_id: 2,
            enabled: false,
        })
        .await;

        let TableState::Loaded(inbounds) = dash.table() else {
            panic!("expected loaded table");
        };
        assert!(inbounds.iter().all(|i| i.enabled));
        assert_eq!(dash.surface().alerts.len(), 1);

        dash.dispatch(Command::ToggleInbound {
            inbound_id: 2,
            enabled: false,
        })
        .await;
        assert!(!panel.inbound(2).unwrap().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_expanded_inbound_stops_its_timer() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        dash.dispatch(Command::DeleteInbound { inbound_id: 1 }).await;

        assert_eq!(dash.surface().prompts, vec!["Delete inbound #1?"]);
        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert_eq!(dash.expansion(), Expansion::Collapsed);
        assert!(timeout(Duration::from_secs(30), dash.next_tick()).await.is_err());
        assert_eq!(panel.calls_to(Method::GET, "/api/v1/inbounds/1/stats"), 1);

        let TableState::Loaded(inbounds) = dash.table() else {
            panic!("expected loaded table");
        };
        assert_eq!(inbounds.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn declined_delete_sends_nothing() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.surface_mut().answers.push_back(false);

        dash.dispatch(Command::DeleteClient {
            inbound_id: 1,
            client_id: 2,
        })
        .await;

        assert_eq!(dash.surface().prompts, vec!["Delete client #2?"]);
        assert_eq!(panel.calls_to(Method::DELETE, "/api/v1/clients/2"), 0);
    }

    #[tokio::test]
    async fn deleting_a_client_resyncs_its_inbound() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        dash.dispatch(Command::DeleteClient {
            inbound_id: 1,
            client_id: 2,
        })
        .await;

        assert_eq!(client_rows(&dash.view()), vec![(1, true)]);
        let TableState::Loaded(inbounds) = dash.table() else {
            panic!("expected loaded table");
        };
        assert_eq!(inbounds[0].client_count, 1);
        assert_eq!(dash.scheduler().state(), PollState::Polling(1));
    }

    #[tokio::test]
    async fn client_without_expiry_days_never_expires() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 2 }).await;

        dash.dispatch(Command::SubmitClient {
            inbound_id: 2,
            form: ClientForm {
                remark: "carol".into(),
                subscription_remark: "carol".into(),
                total_mb: 0,
                expiry_days: 0,
            },
        })
        .await;

        let created = panel.client(4).unwrap();
        assert_eq!(created.expiry_time, 0);
        assert_eq!(dash.modal(), &Modal::Closed);
        let Some(ClientPanel::Rows(rows)) = dash.view().panel.map(|p| p.body) else {
            panic!("expected client rows");
        };
        assert_eq!(rows.last().unwrap().expiry_text, "∞");
    }

    #[tokio::test]
    async fn rejected_inbound_keeps_the_modal_and_draft() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::OpenAddInbound).await;

        let form = InboundForm {
            remark: "edge".into(),
            port: 443,
            protocol: "vless".into(),
            network: Network::Ws,
        };
        dash.dispatch(Command::SubmitInbound(form.clone())).await;

        assert_eq!(dash.modal(), &Modal::AddInbound { draft: Some(form) });
        assert_eq!(dash.surface().alerts, vec!["API Error: Port or Remark already in use."]);
    }

    #[tokio::test]
    async fn edit_prefills_and_submits_absolute_expiry() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::OpenEditClient {
            inbound_id: 1,
            client_id: 2,
        })
        .await;
        assert!(matches!(dash.modal(), Modal::EditClient { client_id: 2, .. }));

        let before = chrono::Utc::now().timestamp();
        dash.dispatch(Command::SubmitEdit {
            inbound_id: 1,
            client_id: 2,
            changes: EditChanges {
                total_mb: Some(2048),
                expiry_days: Some("10".into()),
                ..Default::default()
            },
        })
        .await;

        let edited = panel.client(2).unwrap();
        assert_eq!(edited.total_gb, 2.0);
        assert!(edited.expiry_time >= before + 10 * 86_400);
        assert_eq!(dash.modal(), &Modal::Closed);
        assert_eq!(dash.cache().find_client(1, 2).unwrap().total_gb, 2.0);
    }

    #[tokio::test]
    async fn qr_panel_copies_links() {
        let panel = Arc::new(FakePanel::new().with_inbound("edge", 443));
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::SubmitClient {
            inbound_id: 1,
            form: ClientForm {
                remark: "dave".into(),
                subscription_remark: "dave home".into(),
                total_mb: 1024,
                expiry_days: 30,
            },
        })
        .await;

        dash.dispatch(Command::ShowQr {
            inbound_id: None,
            client_id: 1,
        })
        .await;
        dash.dispatch(Command::CopyLink).await;
        dash.dispatch(Command::QrUseIp(true)).await;
        dash.dispatch(Command::CopyLink).await;
        dash.dispatch(Command::CopySubscriptionLink).await;

        assert_eq!(
            dash.surface().copied,
            vec![
                "vless://client-1@panel.example.com:443",
                "vless://client-1@203.0.113.7:443",
                "https://panel.example.com/sub/dave%20home",
            ]
        );
        assert_eq!(
            dash.surface().alerts,
            vec![CONFIG_LINK_COPIED, CONFIG_LINK_COPIED, SUBSCRIPTION_LINK_COPIED]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_disables_the_timer_quietly() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        panel.fail_next(Method::GET, "/api/v1/inbounds/1/stats", "Database is locked");
        let polled = dash.next_tick().await;
        dash.poll(polled).await;

        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert!(dash.surface().alerts.is_empty());
        // The last good snapshot stays on screen.
        assert_eq!(client_rows(&dash.view()), vec![(1, true), (2, true)]);
        assert!(timeout(Duration::from_secs(30), dash.next_tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_refresh_arms_no_timer() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        panel.fail_next(Method::GET, "/api/v1/inbounds/2/stats", "boom");

        dash.dispatch(Command::ToggleExpand { inbound_id: 2 }).await;

        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert_eq!(dash.expansion(), Expansion::Expanded(2));
        assert_eq!(
            dash.view().panel.map(|p| p.body),
            Some(ClientPanel::Unavailable)
        );
        assert!(dash.surface().alerts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn session_expiry_while_polling_closes_the_dashboard() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        panel.expire_session();
        let polled = dash.next_tick().await;
        dash.poll(polled).await;

        assert!(dash.is_closed());
        assert_eq!(dash.scheduler().live_timers(), 0);
        assert_eq!(dash.surface().redirects, vec!["/"]);
        assert!(dash.surface().alerts.is_empty());

        dash.dispatch(Command::Refresh).await;
        assert_eq!(panel.calls_to(Method::GET, "/api/v1/inbounds"), 1);
    }

    #[tokio::test]
    async fn failed_list_collapses_and_shows_the_error() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        panel.fail_next(Method::GET, "/api/v1/inbounds", "boom");

        dash.dispatch(Command::Refresh).await;

        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert_eq!(dash.view().table, InboundTable::Failed("Error: boom".into()));
        assert_eq!(dash.surface().alerts, vec!["API Error: boom"]);
    }

    #[tokio::test]
    async fn empty_inbound_shows_placeholder() {
        let panel = Arc::new(FakePanel::new().with_inbound("edge", 443));
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        let body = dash.view().panel.map(|p| p.body).unwrap();
        assert_eq!(body.message(), Some(NO_CLIENTS));
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_after_a_failed_refresh_hides_the_old_snapshot() {
        let panel = two_inbounds();
        let mut dash = dashboard(&panel);
        dash.dispatch(Command::Refresh).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::Collapse).await;
        panel.fail_next(Method::GET, "/api/v1/inbounds/1/stats", "Database is locked");

        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;

        assert_eq!(dash.scheduler().state(), PollState::Idle);
        assert_eq!(
            dash.view().panel.map(|p| p.body),
            Some(ClientPanel::Unavailable)
        );
        assert!(dash.surface().alerts.is_empty());

        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        assert_eq!(client_rows(&dash.view()), vec![(1, true), (2, true)]);
        assert_eq!(dash.scheduler().state(), PollState::Polling(1));
    }

    #[tokio::test]
    async fn status_only_replies_count_as_success() {
        let success = json!({"status": "success"});
        let mut dash = scripted(vec![
            RawResponse::json(200, &json!([inbound(1, 1)])),
            RawResponse::json(200, &success),
            RawResponse::json(200, &json!([client(7, "alice")])),
            RawResponse::json(200, &success),
            RawResponse::json(200, &success),
            RawResponse::json(200, &json!([inbound(1, 1), inbound(2, 0)])),
        ]);
        dash.dispatch(Command::Refresh).await;

        dash.dispatch(Command::ToggleInbound {
            inbound_id: 1,
            enabled: false,
        })
        .await;
        let TableState::Loaded(inbounds) = dash.table() else {
            panic!("expected loaded table");
        };
        assert!(!inbounds[0].enabled);
        assert_eq!(inbounds[0].client_count, 1);

        dash.dispatch(Command::ToggleExpand { inbound_id: 1 }).await;
        dash.dispatch(Command::ToggleClient {
            inbound_id: 1,
            client_id: 7,
            enabled: false,
        })
        .await;
        assert!(!dash.cache().find_client(1, 7).unwrap().enabled);

        dash.dispatch(Command::OpenAddInbound).await;
        dash.dispatch(Command::SubmitInbound(InboundForm {
            remark: "backup".into(),
            port: 8443,
            protocol: "vless".into(),
            network: Network::Tcp,
        }))
        .await;
        assert_eq!(dash.modal(), &Modal::Closed);

        assert!(dash.surface().alerts.is_empty());
    }
}
