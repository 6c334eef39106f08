use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use tippin_core::amount::DEFAULT_MAX_INVOICE_AMOUNT;

use crate::node::lnd::LndNodeSettings;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opts {
    #[clap(flatten)]
    pub server: ServerConfig,
    #[clap(flatten)]
    pub invoice: InvoiceConfig,
    #[clap(flatten)]
    pub page: PageConfig,

    #[clap(long, default_value = "Default", env = "TIPPIN_NODE_BINDING")]
    pub node_binding: NodeBindingVariant,

    #[clap(flatten)]
    pub lnd: LndNodeSettings,

    /// Hosts a visitor may point the faucet at when node binding is `PerRequest`
    #[clap(long, env = "TIPPIN_ALLOWED_NODE_HOSTS", value_delimiter = ',')]
    pub allowed_node_hosts: Vec<String>,
}

/// Where the faucet takes the node it creates invoices on from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeBindingVariant {
    /// A single node configured at startup, shared by all requests.
    #[default]
    Default,
    /// Every submission brings its own node address, TLS certificate and macaroon.
    PerRequest,
}

impl FromStr for NodeBindingVariant {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(Self::Default),
            "PerRequest" => Ok(Self::PerRequest),
            _ => Err("no match"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TippinConfig {
    pub server: ServerConfig,
    pub invoice: InvoiceConfig,
    pub page: PageConfig,
    pub node_binding: NodeBindingVariant,
    pub lnd: LndNodeSettings,
    pub allowed_node_hosts: Vec<String>,
}

impl From<Opts> for TippinConfig {
    fn from(opts: Opts) -> Self {
        Self {
            server: opts.server,
            invoice: opts.invoice,
            page: opts.page,
            node_binding: opts.node_binding,
            lnd: opts.lnd,
            allowed_node_hosts: opts
                .allowed_node_hosts
                .into_iter()
                .map(|host| host.trim().to_owned())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }
}

impl TippinConfig {
    pub fn read_config_with_defaults() -> Self {
        Opts::parse().into()
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ServerConfig {
    #[clap(long, default_value = "[::]:8000", env = "TIPPIN_HOST_PORT")]
    pub host_port: SocketAddr,
    #[clap(long, default_value = "static", env = "TIPPIN_STATIC_DIR")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host_port: "[::]:8000".to_string().parse().expect("invalid host port"),
            static_dir: PathBuf::from("static"),
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct InvoiceConfig {
    /// Minimum time between two invoice attempts, in seconds
    #[clap(long, default_value_t = 60, env = "TIPPIN_INVOICE_COOLDOWN_SECS")]
    pub cooldown_secs: u64,
    /// Largest amount in coins a single invoice may request
    #[clap(long, default_value_t = DEFAULT_MAX_INVOICE_AMOUNT, env = "TIPPIN_INVOICE_MAX_AMOUNT")]
    pub max_amount: f64,
    /// Deadline for connecting to the node and creating the invoice, in seconds
    #[clap(long, default_value_t = 30, env = "TIPPIN_INVOICE_TIMEOUT_SECS")]
    pub timeout_secs: u64,
}

impl InvoiceConfig {
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            max_amount: DEFAULT_MAX_INVOICE_AMOUNT,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Parser)]
pub struct PageConfig {
    /// Public `<pubkey>@host:port` of the faucet node, shown on the home page
    #[clap(long, env = "TIPPIN_NODE_ADDR")]
    pub node_addr: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildParams {
    pub commit_hash: Option<String>,
    pub build_time: Option<String>,
}

impl BuildParams {
    pub fn from_env() -> Self {
        Self {
            commit_hash: env::var("COMMITHASH").ok(),
            build_time: env::var("BUILDTIME").ok(),
        }
    }
}
