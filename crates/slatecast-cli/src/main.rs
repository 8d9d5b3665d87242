use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use slatecast_crypto::identity::IdentityPublicKey;
use slatecast_relay::dm::{self, ReplyRefs};
use slatecast_relay::event::KIND_ENCRYPTED_DM;
use slatecast_relay::{Filter, RelayTransport, SubscribeOptions};
use slatecast_vault::identity::{self, IdentityOrigin};
use slatecast_vault::{session, DataDir, VaultError};

mod rpc;

use rpc::{WalletRpc, DEFAULT_API_URL};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "slatecast")]
#[command(about = "Exchange slatepacks with a counterparty through public relays", long_about = None)]
struct Cli {
    /// Wallet owner API endpoint
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Data directory (default: $SLATECAST_DATA_PATH, else ~/.slatecast)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a wallet and store its session token locally (encrypted)
    Open {
        /// Wallet name
        #[arg(long)]
        wallet: String,
    },

    /// Send an unfinalized transaction's slatepack to a counterparty
    Send {
        /// Wallet name
        #[arg(long)]
        wallet: String,

        /// Transaction id whose slatepack should be sent
        #[arg(long)]
        id: u64,

        /// Recipient identity public key (hex)
        #[arg(long)]
        recipient: String,

        /// Relay to connect to (repeat for multiple relays)
        #[arg(long = "relay", required = true)]
        relays: Vec<String>,
    },

    /// Grab pending slatepacks addressed to this wallet from relays
    Receive {
        /// Wallet name
        #[arg(long)]
        wallet: String,

        /// Relay to connect to (repeat for multiple relays)
        #[arg(long = "relay", required = true)]
        relays: Vec<String>,

        /// Sign each received slatepack and send it back to its sender
        #[arg(long)]
        reply: bool,
    },

    /// Finalize a fully-signed slatepack and post the transaction
    Finalize {
        /// Wallet name
        #[arg(long)]
        wallet: String,

        /// File holding the armored slatepack to finalize
        #[arg(long)]
        slatepack_file: PathBuf,
    },

    /// Close an open wallet session
    Close {
        /// Wallet name
        #[arg(long)]
        wallet: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let data_dir = match &cli.data_dir {
        Some(path) => DataDir::at(path)?,
        None => DataDir::resolve()?,
    };
    let rpc = WalletRpc::new(cli.api_url.clone());
    match cli.command {
        Commands::Open { wallet } => open_command(&rpc, &data_dir, &wallet).await,
        Commands::Send {
            wallet,
            id,
            recipient,
            relays,
        } => send_command(&rpc, &data_dir, &wallet, id, &recipient, relays).await,
        Commands::Receive {
            wallet,
            relays,
            reply,
        } => receive_command(&rpc, &data_dir, &wallet, relays, reply).await,
        Commands::Finalize {
            wallet,
            slatepack_file,
        } => finalize_command(&rpc, &data_dir, &wallet, &slatepack_file).await,
        Commands::Close { wallet } => close_command(&rpc, &data_dir, &wallet).await,
    }
}

fn prompt_password() -> Result<String> {
    Ok(rpassword::prompt_password("Password: ")?)
}

/// Load the stored session token, translating an authentication failure
/// into the one user-facing message it means.
fn session_token(data_dir: &DataDir, wallet: &str, password: &str) -> Result<String> {
    match session::load_token(data_dir, wallet, password) {
        Ok(token) => Ok(token.to_string()),
        Err(VaultError::Authentication) => Err(anyhow!("invalid password")),
        Err(VaultError::MissingSecret(_)) => Err(anyhow!(
            "wallet {wallet:?} has no stored session — run `slatecast open` first"
        )),
        Err(err) => Err(err.into()),
    }
}

/// Load (or mint) the wallet's relay identity, warning loudly when an
/// existing identity had to be replaced.
fn relay_identity(
    data_dir: &DataDir,
    wallet: &str,
    address: &str,
    password: &str,
) -> Result<slatecast_crypto::identity::IdentityKeypair> {
    let (keypair, origin) = identity::load_or_create(data_dir, wallet, address, password)?;
    match origin {
        IdentityOrigin::Opened => {}
        IdentityOrigin::Created => {
            info!(wallet, pubkey = %keypair.public().to_hex(), "created new relay identity");
        }
        IdentityOrigin::Regenerated(reason) => {
            warn!(
                wallet,
                ?reason,
                "stored relay identity was replaced — counterparties must use the new key"
            );
        }
    }
    Ok(keypair)
}

async fn open_command(rpc: &WalletRpc, data_dir: &DataDir, wallet: &str) -> Result<()> {
    let password = prompt_password()?;
    let token = rpc.login(wallet, &password).await?;
    session::store_token(data_dir, wallet, &password, &token)?;

    let address = rpc.slatepack_address(&token).await?;
    let keypair = relay_identity(data_dir, wallet, &address, &password)?;

    println!("Wallet {wallet} open");
    println!("Slatepack address: {address}");
    println!("Relay pubkey:      {}", keypair.public().to_hex());
    Ok(())
}

async fn send_command(
    rpc: &WalletRpc,
    data_dir: &DataDir,
    wallet: &str,
    tx_id: u64,
    recipient_hex: &str,
    relays: Vec<String>,
) -> Result<()> {
    let recipient = IdentityPublicKey::from_hex(recipient_hex)
        .map_err(|_| anyhow!("invalid recipient public key"))?;

    let password = prompt_password()?;
    let token = session_token(data_dir, wallet, &password)?;
    let slatepack = rpc.armored_slatepack(&token, tx_id).await?;
    info!(tx_id, "transaction found");

    let address = rpc.slatepack_address(&token).await?;
    let keypair = relay_identity(data_dir, wallet, &address, &password)?;

    let event = dm::seal_message(&keypair, &recipient, &slatepack, None)?;
    let mut transport = RelayTransport::new(relays);
    transport.publish(&event, PUBLISH_TIMEOUT).await?;

    println!("Slatepack for transaction {tx_id} sent (event {})", event.id);
    Ok(())
}

async fn receive_command(
    rpc: &WalletRpc,
    data_dir: &DataDir,
    wallet: &str,
    relays: Vec<String>,
    reply: bool,
) -> Result<()> {
    let password = prompt_password()?;
    let token = session_token(data_dir, wallet, &password)?;
    let address = rpc.slatepack_address(&token).await?;
    let keypair = relay_identity(data_dir, wallet, &address, &password)?;

    let filter = Filter::new()
        .kinds(vec![KIND_ENCRYPTED_DM])
        .until(chrono::Utc::now().timestamp())
        .pubkey_ref(keypair.public().to_hex());
    let mut transport = RelayTransport::new(relays);
    let events = transport
        .subscribe(&filter, &SubscribeOptions::default())
        .await?;
    println!("Slatepacks found: {}", events.len());

    let mut accepted = 0usize;
    for event in &events {
        let slatepack = match dm::open_message(&keypair, event) {
            Ok(cleartext) => cleartext,
            Err(err) => {
                // Not for us, or garbage — relay noise, skip it.
                tracing::debug!(id = %event.id, %err, "could not open message");
                continue;
            }
        };
        let signed = match rpc.receive_slatepack(&token, &slatepack).await {
            Ok(signed) => signed,
            Err(err) => {
                // Already received, or not addressed to this wallet.
                tracing::debug!(id = %event.id, %err, "wallet did not accept slatepack");
                continue;
            }
        };
        accepted += 1;
        info!(sender = %event.pubkey, "slatepack signed");

        if reply {
            let sender = IdentityPublicKey::from_hex(&event.pubkey)
                .map_err(|_| anyhow!("event carries an invalid sender key"))?;
            let refs = ReplyRefs {
                event_id: event.id.clone(),
                sender_pubkey: event.pubkey.clone(),
            };
            let response = dm::seal_message(&keypair, &sender, &signed, Some(&refs))?;
            transport.publish(&response, PUBLISH_TIMEOUT).await?;
            println!("Signed slatepack returned to {}", event.pubkey);
        }
    }

    println!("New transactions received: {accepted}");
    Ok(())
}

async fn finalize_command(
    rpc: &WalletRpc,
    data_dir: &DataDir,
    wallet: &str,
    slatepack_file: &Path,
) -> Result<()> {
    let slatepack = std::fs::read_to_string(slatepack_file)?;
    let password = prompt_password()?;
    let token = session_token(data_dir, wallet, &password)?;
    rpc.finalize_slatepack(&token, &slatepack).await?;
    println!("Transaction finalized");
    Ok(())
}

async fn close_command(rpc: &WalletRpc, data_dir: &DataDir, wallet: &str) -> Result<()> {
    let password = prompt_password()?;
    let token = session_token(data_dir, wallet, &password)?;
    rpc.logout(&token).await?;
    println!("Wallet {wallet} closed");
    Ok(())
}
