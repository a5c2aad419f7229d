//! wireloom daemon entry point: wires the DNS/flow/net handlers into a
//! default policy, drives its rotation ticker, and serves the HTTP scrape
//! surface (spec.md §6) until shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wireloom::config::{DnsHandlerConfig, FlowHandlerConfig, WindowConfig};
use wireloom::handlers::{DnsHandler, FlowHandler, NetHandler};
use wireloom::{http, Policy, PolicyManager};

/// Network observability aggregation core.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the HTTP scrape surface binds to.
    #[arg(long, default_value = "0.0.0.0:10853")]
    bind: SocketAddr,

    /// Bucket period, in seconds, shared by every handler's window.
    #[arg(long, default_value = "60")]
    period_secs: u64,

    /// Number of buckets kept in each handler's sliding window.
    #[arg(long, default_value = "5")]
    window_count: usize,

    /// Fraction of events chosen for deep sampling, in [0.0, 1.0].
    #[arg(long, default_value = "1.0")]
    deep_sample_rate: f64,

    /// Name of the single policy every handler is registered under.
    #[arg(long, default_value = "default")]
    policy_name: String,
}

fn build_window_config(args: &Args) -> WindowConfig {
    WindowConfig {
        window_count: args.window_count,
        period: Duration::from_secs(args.period_secs),
        deep_sample_rate: args.deep_sample_rate,
        ..WindowConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let window = build_window_config(&args);
    window.validate()?;

    let dns_config = DnsHandlerConfig {
        window: window.clone(),
        ..DnsHandlerConfig::default()
    };
    let flow_config = FlowHandlerConfig {
        window: window.clone(),
        ..FlowHandlerConfig::default()
    };

    let policy = Policy::new(args.policy_name.clone());
    policy.add_handler("dns", Box::new(DnsHandler::new(dns_config)));
    policy.add_handler("flow", Box::new(FlowHandler::new(flow_config)));
    policy.add_handler("net", Box::new(NetHandler::new(window.clone())));

    let policies = Arc::new(PolicyManager::new());
    policies.add(policy)?;

    let rotation_period = window.period;
    let rotation_policies = policies.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(rotation_period);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            for name in rotation_policies.names() {
                if let Ok(policy) = rotation_policies.get(&name) {
                    policy.rotate_all();
                }
            }
        }
    });

    let bind_addr = args.bind;
    let serve_policies = policies.clone();
    let server = tokio::spawn(async move {
        if let Err(err) = http::serve(serve_policies, bind_addr).await {
            error!(error = %err, "HTTP server exited with an error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        result = server => {
            if let Err(err) = result {
                error!(error = %err, "HTTP server task panicked");
            }
        }
    }

    Ok(())
}
