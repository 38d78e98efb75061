//! CLI demonstrating the `evm-client` SDK: chain id and balance lookups,
//! a signed EIP-1559 transfer, and an `eth_subscribe` stream.

mod args;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser as _;
use evm_client::chains::Chain;
use evm_client::client::Provider;
use evm_client::http::{HttpClient, HttpClientConfig};
use evm_client::metrics::TracingMetrics;
use evm_client::signer::LocalSigner;
use evm_client::tx::{AccessList, Address};
use evm_client::ws::subscriptions::SubscriptionEvent;
use evm_client::ws::{WsClientConfig, WsConnection};
use serde_json::json;

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let chain = Chain::from(cli.chain_id);
    let url = url::Url::parse(&cli.rpc_url).context("invalid --rpc-url")?;

    match cli.command {
        Command::ChainId => {
            let (provider, _ws) = connect_http_or_ws(&url, chain).await?;
            let chain_id = provider.chain_id().await?;
            println!("chain id: {chain_id}");
        }
        Command::Balance { address } => {
            let (provider, _ws) = connect_http_or_ws(&url, chain).await?;
            let address = parse_address(&address)?;
            let balance = provider.get_balance(address).await?;
            println!(
                "balance (wei, big-endian hex): 0x{}",
                evm_client::hex::encode(&balance, false)
            );
        }
        Command::Transfer {
            private_key,
            to,
            value,
            nonce,
            gas_limit,
            max_priority_fee_per_gas,
            max_fee_per_gas,
        } => {
            let (provider, _ws) = connect_http_or_ws(&url, chain).await?;
            let secret_key_bytes = parse_secret_key(&private_key)?;
            let signer = Arc::new(LocalSigner::from_secret_key_bytes(&secret_key_bytes)?);
            let sender = signer.address();
            let provider = provider.with_signer(signer);

            let to = parse_address(&to)?;
            let nonce = match nonce {
                Some(n) => n,
                None => provider.get_transaction_count(sender).await?,
            };

            let request = evm_client::tx::Eip1559TransactionRequest {
                chain_id: chain.chain_id(),
                nonce,
                max_priority_fee_per_gas: evm_client::client::amount_from_u128(
                    max_priority_fee_per_gas,
                ),
                max_fee_per_gas: evm_client::client::amount_from_u128(max_fee_per_gas),
                gas_limit,
                destination: Some(to),
                amount: evm_client::client::amount_from_u128(value),
                data: Vec::new(),
                access_list: AccessList::new(),
            };

            let hash = provider.send_transaction(request).await?;
            println!("submitted: 0x{}", evm_client::hex::encode(&hash, false));
        }
        Command::Subscribe { kind, count } => {
            if url.scheme() != "ws" && url.scheme() != "wss" {
                bail!("subscribe requires a ws:// or wss:// --rpc-url");
            }
            let config = WsClientConfig::new(url);
            let connection = WsConnection::connect(config, Arc::new(TracingMetrics)).await?;

            let subscription_id = connection
                .dispatcher()
                .send_async("eth_subscribe", json!([kind]), None)
                .await?;
            let subscription_id = subscription_id
                .as_str()
                .context("eth_subscribe did not return a subscription id")?
                .to_string();
            println!("subscribed: {subscription_id}");

            let mut receiver = connection.subscriptions().register(subscription_id);
            let mut seen = 0usize;
            while let Some(event) = receiver.recv().await {
                match event {
                    SubscriptionEvent::Notification(value) => {
                        println!("{value}");
                        seen += 1;
                        if count.is_some_and(|limit| seen >= limit) {
                            break;
                        }
                    }
                    SubscriptionEvent::SubscriptionLost => {
                        println!("subscription lost; the connection dropped and was not resumed");
                        break;
                    }
                }
            }
            connection.close().await;
        }
    }

    Ok(())
}

/// Builds a [`Provider`] over HTTP or the WebSocket dispatch engine
/// depending on the URL scheme. Returns the live [`WsConnection`] alongside
/// the provider so callers keep it alive for as long as they need it; once
/// it drops, the socket it owns and the slot table backing the provider's
/// transport go with it.
async fn connect_http_or_ws(
    url: &url::Url,
    chain: Chain,
) -> anyhow::Result<(Provider, Option<WsConnection>)> {
    match url.scheme() {
        "http" | "https" => {
            let transport = HttpClient::new(HttpClientConfig::new(url.clone()))?;
            Ok((Provider::new(Arc::new(transport), chain), None))
        }
        "ws" | "wss" => {
            let config = WsClientConfig::new(url.clone());
            let connection = WsConnection::connect(config, Arc::new(TracingMetrics)).await?;
            let dispatcher = connection.dispatcher().clone();
            Ok((Provider::new(Arc::new(dispatcher), chain), Some(connection)))
        }
        other => bail!("unsupported --rpc-url scheme: {other}"),
    }
}

fn parse_address(text: &str) -> anyhow::Result<Address> {
    let bytes = evm_client::hex::decode(text).context("invalid address")?;
    if bytes.len() != 20 {
        bail!("address must be 20 bytes, got {}", bytes.len());
    }
    let mut address = [0u8; 20];
    address.copy_from_slice(&bytes);
    Ok(address)
}

fn parse_secret_key(text: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = evm_client::hex::decode(text).context("invalid private key")?;
    if bytes.len() != 32 {
        bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
