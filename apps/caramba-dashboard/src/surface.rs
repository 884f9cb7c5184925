use async_trait::async_trait;
use console::style;
use tracing::info;

use crate::console::ConsoleInput;
use crate::view::{ClientPanel, ClientRow, DashboardView, InboundRow, InboundTable, LOADING, ModalView, NO_INBOUNDS};

/// Where the dashboard draws itself and talks to the operator.
#[async_trait(?Send)]
pub trait Surface {
    fn render(&mut self, view: &DashboardView);

    /// Blocking notice; the operator sees it before anything else happens.
    fn alert(&mut self, message: &str);

    async fn confirm(&mut self, prompt: &str) -> bool;

    /// Leave the dashboard for another location (the login page on 401).
    fn redirect(&mut self, location: &str);

    fn copy(&mut self, text: &str);
}

const BAR_WIDTH: usize = 20;

/// Interactive surface on the controlling terminal.
pub struct TerminalSurface {
    input: ConsoleInput,
    last_view: Option<DashboardView>,
}

impl TerminalSurface {
    pub fn new(input: ConsoleInput) -> Self {
        Self {
            input,
            last_view: None,
        }
    }
}

fn usage_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn print_inbound(row: &InboundRow) {
    let state = if row.enabled {
        style("on ").green()
    } else {
        style("off").red()
    };
    println!(
        " {} #{:<4} {:<20} {} {:>5}  {:<8} {} clients",
        style(row.affordance).bold(),
        row.inbound_id,
        row.remark,
        state,
        row.port,
        row.protocol,
        row.client_count
    );
}

fn print_client(row: &ClientRow) {
    let status = if row.online {
        style(row.status).green()
    } else {
        style(row.status).dim()
    };
    let enabled = if row.enabled { "on " } else { "off" };
    println!(
        "     #{:<4} {:<18} {} {:<7} {} {:<22} exp {}",
        row.client_id,
        row.remark,
        enabled,
        status,
        usage_bar(row.usage_percent),
        row.traffic_text,
        row.expiry_text
    );
}

fn print_modal(modal: &ModalView) {
    match modal {
        ModalView::None => {}
        ModalView::AddInbound => {
            println!("{}", style("[add inbound] submit with `add-inbound`, `close` to cancel").cyan());
        }
        ModalView::AddClient { inbound_id } => {
            println!(
                "{}",
                style(format!("[add client to #{}] submit with `add-client`, `close` to cancel", inbound_id)).cyan()
            );
        }
        ModalView::EditClient {
            inbound_id,
            client_id,
        } => {
            println!(
                "{}",
                style(format!("[edit client #{} of inbound #{}] submit with `edit`", client_id, inbound_id)).cyan()
            );
        }
        ModalView::Qr {
            client_remark,
            subscription_url,
            link,
            use_ip,
        } => {
            println!("{}", style(client_remark).bold());
            println!("  subscription: {}", subscription_url);
            let via = if *use_ip { "ip" } else { "domain" };
            match link {
                Some(link) => println!("  config ({}): {}", via, link),
                None => println!("  config ({}): {}", via, style("unavailable").dim()),
            }
        }
    }
}

#[async_trait(?Send)]
impl Surface for TerminalSurface {
    fn render(&mut self, view: &DashboardView) {
        if self.last_view.as_ref() == Some(view) {
            return;
        }

        println!();
        match &view.table {
            InboundTable::Pending => println!("{}", style(LOADING).dim()),
            InboundTable::Empty => println!("{}", style(NO_INBOUNDS).dim()),
            InboundTable::Failed(message) => println!("{}", style(message).red()),
            InboundTable::Rows(rows) => {
                for row in rows {
                    print_inbound(row);
                    let Some(panel) = view.panel.as_ref().filter(|p| p.inbound_id == row.inbound_id)
                    else {
                        continue;
                    };
                    match &panel.body {
                        ClientPanel::Rows(clients) => clients.iter().for_each(print_client),
                        other => {
                            if let Some(message) = other.message() {
                                println!("     {}", style(message).dim());
                            }
                        }
                    }
                }
            }
        }
        print_modal(&view.modal);

        self.last_view = Some(view.clone());
    }

    fn alert(&mut self, message: &str) {
        println!("{} {}", style("!").red().bold(), message);
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        println!("{} {}", style(prompt).yellow(), style("[y/N]").dim());
        let answer = self.input.lock().await.recv().await;
        matches!(
            answer.as_deref().map(|a| a.trim().to_ascii_lowercase()).as_deref(),
            Some("y" | "yes")
        )
    }

    fn redirect(&mut self, location: &str) {
        info!(location, "Redirecting");
        println!("{} {}", style("Session expired. Sign in again at").yellow(), location);
        self.last_view = None;
    }

    fn copy(&mut self, text: &str) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_bar_fills_proportionally() {
        assert_eq!(usage_bar(0.0), format!("[{}]", ".".repeat(BAR_WIDTH)));
        assert_eq!(usage_bar(100.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(usage_bar(50.0), format!("[{}{}]", "#".repeat(10), ".".repeat(10)));
    }
}
