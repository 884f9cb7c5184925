use std::io::BufRead;
use std::sync::Arc;

use caramba_shared::api::Network;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info};

use crate::dashboard::{Command, Dashboard};
use crate::modal::{ClientForm, EditChanges, InboundForm};
use crate::surface::Surface;

/// Operator input lines, shared by the command loop and confirmation prompts.
pub type ConsoleInput = Arc<Mutex<UnboundedReceiver<String>>>;

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Reload the inbound list
    Refresh,
    /// Expand an inbound's clients, or collapse it when already open
    Open { inbound: i64 },
    /// Collapse the open inbound
    Close,
    InboundOn { inbound: i64 },
    InboundOff { inbound: i64 },
    RmInbound { inbound: i64 },
    /// Open the add-inbound dialog
    NewInbound,
    AddInbound {
        remark: String,
        port: u16,
        #[arg(long, default_value = "vless")]
        protocol: String,
        #[arg(long, default_value = "tcp")]
        network: Network,
    },
    /// Open the add-client dialog for an inbound
    NewClient { inbound: i64 },
    AddClient {
        inbound: i64,
        remark: String,
        subscription: String,
        #[arg(long, default_value_t = 0)]
        total_mb: u64,
        /// Days until expiry, 0 for never
        #[arg(long, default_value_t = 0)]
        days: u32,
    },
    ClientOn { inbound: i64, client: i64 },
    ClientOff { inbound: i64, client: i64 },
    RmClient { inbound: i64, client: i64 },
    /// Open the edit dialog, or submit it when any field is given
    Edit {
        inbound: i64,
        client: i64,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        total_mb: Option<u64>,
        /// Days from now, 0 for never; blank or negative keeps the current expiry
        #[arg(long, allow_hyphen_values = true)]
        days: Option<String>,
        #[arg(long)]
        reset: bool,
    },
    /// Show subscription and config links of a client
    Qr {
        client: i64,
        #[arg(long)]
        inbound: Option<i64>,
    },
    UseIp { state: Switch },
    /// Copy the config link of a client row, or of the open QR panel
    CopyLink {
        inbound: Option<i64>,
        client: Option<i64>,
    },
    CopySub,
    CloseModal,
    #[command(alias = "exit")]
    Quit,
}

impl Action {
    fn into_command(self) -> Command {
        match self {
            Action::Refresh => Command::Refresh,
            Action::Open { inbound } => Command::ToggleExpand { inbound_id: inbound },
            Action::Close => Command::Collapse,
            Action::InboundOn { inbound } => Command::ToggleInbound {
                inbound_id: inbound,
                enabled: true,
            },
            Action::InboundOff { inbound } => Command::ToggleInbound {
                inbound_id: inbound,
                enabled: false,
            },
            Action::RmInbound { inbound } => Command::DeleteInbound { inbound_id: inbound },
            Action::NewInbound => Command::OpenAddInbound,
            Action::AddInbound {
                remark,
                port,
                protocol,
                network,
            } => Command::SubmitInbound(InboundForm {
                remark,
                port,
                protocol,
                network,
            }),
            Action::NewClient { inbound } => Command::OpenAddClient { inbound_id: inbound },
            Action::AddClient {
                inbound,
                remark,
                subscription,
                total_mb,
                days,
            } => Command::SubmitClient {
                inbound_id: inbound,
                form: ClientForm {
                    remark,
                    subscription_remark: subscription,
                    total_mb,
                    expiry_days: days,
                },
            },
            Action::ClientOn { inbound, client } => Command::ToggleClient {
                inbound_id: inbound,
                client_id: client,
                enabled: true,
            },
            Action::ClientOff { inbound, client } => Command::ToggleClient {
                inbound_id: inbound,
                client_id: client,
                enabled: false,
            },
            Action::RmClient { inbound, client } => Command::DeleteClient {
                inbound_id: inbound,
                client_id: client,
            },
            Action::Edit {
                inbound,
                client,
                enabled,
                total_mb,
                days,
                reset,
            } => {
                let changes = EditChanges {
                    enabled,
                    total_mb,
                    expiry_days: days,
                    reset_traffic: reset.then_some(true),
                };
                if changes == EditChanges::default() {
                    Command::OpenEditClient {
                        inbound_id: inbound,
                        client_id: client,
                    }
                } else {
                    Command::SubmitEdit {
                        inbound_id: inbound,
                        client_id: client,
                        changes,
                    }
                }
            }
            Action::Qr { client, inbound } => Command::ShowQr {
                inbound_id: inbound,
                client_id: client,
            },
            Action::UseIp { state } => Command::QrUseIp(state == Switch::On),
            Action::CopyLink {
                inbound: Some(inbound),
                client: Some(client),
            } => Command::CopyClientLink {
                inbound_id: inbound,
                client_id: client,
            },
            Action::CopyLink { .. } => Command::CopyLink,
            Action::CopySub => Command::CopySubscriptionLink,
            Action::CloseModal => Command::CloseModal,
            Action::Quit => Command::Quit,
        }
    }
}

/// Split a console line into words; double quotes group words with spaces.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        words.push(current);
    }
    words
}

/// Parse one console line. Blank lines yield no command.
pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
    let words = split_words(line);
    if words.is_empty() {
        return Ok(None);
    }
    let parsed = ConsoleLine::try_parse_from(words)?;
    Ok(Some(parsed.action.into_command()))
}

/// Forward stdin lines from a blocking reader thread.
pub fn spawn_stdin_pump() -> ConsoleInput {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

async fn next_line(input: &ConsoleInput) -> Option<String> {
    input.lock().await.recv().await
}

async fn handle_line<S: Surface>(dashboard: &mut Dashboard<S>, line: &str) {
    match parse_line(line) {
        Ok(Some(command)) => dashboard.dispatch(command).await,
        Ok(None) => {}
        Err(err) => {
            debug!("Rejected console line: {}", line);
            dashboard.surface_mut().alert(err.to_string().trim_end());
        }
    }
}

/// Load the dashboard and serve operator input and poll ticks until the
/// operator quits, input ends or the session expires.
pub async fn run<S: Surface>(dashboard: &mut Dashboard<S>, input: ConsoleInput) {
    dashboard.refresh_inbounds(false).await;
    dashboard.redraw();

    while !dashboard.is_closed() {
        tokio::select! {
            line = next_line(&input) => match line {
                Some(line) => handle_line(dashboard, &line).await,
                None => {
                    info!("Console input closed");
                    dashboard.shutdown();
                }
            },
            inbound_id = dashboard.next_tick() => dashboard.poll(inbound_id).await,
        }
    }
}
