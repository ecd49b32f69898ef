//! redeem binary: build redemption proofs from the published allocation tree

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use zeroize::Zeroize;

use redeem_client::ClientBuilder;
use redeem_core::{
    AllocationKey, ArtifactKind, CiphertextBucket, Event, EventSink, FaucetList, KeyOrigin,
    MainTree, NetworkParams, ProofMapping, RedeemSecret, Redeemer, TargetAddress, TracingSink,
    TransformMode,
};

#[derive(Parser)]
#[command(name = "redeem")]
#[command(about = "Prove eligibility to redeem a one-time reward", long_about = None)]
struct Cli {
    /// Which published dataset to redeem against
    #[arg(long, value_enum, default_value_t = NetworkArg::Main)]
    network: NetworkArg,

    /// Override network parameters with a JSON file
    #[arg(long)]
    params: Option<PathBuf>,

    /// Mirror serving the published artifacts
    #[arg(long, default_value = "https://artifacts.redeem.tools")]
    base_url: String,

    /// Local artifact cache directory
    #[arg(long, default_value = "./redeem-data")]
    cache_dir: PathBuf,

    /// Registered key origin
    #[arg(long, value_enum, default_value_t = OriginArg::Pgp)]
    origin: OriginArg,

    /// Normalized secp256k1 secret key, hex; "-" reads from stdin.
    /// Required for pgp/ssh origins.
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Target redemption address (bech32); for address origin this is
    /// also the registered address
    #[arg(short = 'a', long)]
    address: String,

    /// Requested fee in 1e-6 units
    #[arg(short = 'f', long, default_value_t = 10_000)]
    fee: u64,

    /// Publish the nonce verbatim instead of tweaking (linkable)
    #[arg(long)]
    bare: bool,

    /// Write the structured proof JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Main,
    Test,
}

#[derive(Clone, Copy, ValueEnum)]
enum OriginArg {
    Pgp,
    Ssh,
    Address,
}

impl From<OriginArg> for KeyOrigin {
    fn from(origin: OriginArg) -> Self {
        match origin {
            OriginArg::Pgp => KeyOrigin::Pgp,
            OriginArg::Ssh => KeyOrigin::Ssh,
            OriginArg::Address => KeyOrigin::Address,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let params = match &cli.params {
        Some(path) => NetworkParams::load(path)
            .with_context(|| format!("loading network params from {}", path.display()))?,
        None => match cli.network {
            NetworkArg::Main => NetworkParams::mainnet(),
            NetworkArg::Test => NetworkParams::testnet(),
        },
    };

    // reject a bad target before any tree work
    let target = TargetAddress::parse(&params, &cli.address).context("invalid target address")?;

    let client = ClientBuilder::new(params.clone(), &cli.base_url)
        .cache_dir(&cli.cache_dir)
        .build()?;
    let sink = TracingSink;

    let proofs = match cli.origin {
        OriginArg::Address => {
            let mapping_bytes = client.fetch(ArtifactKind::ProofMapping).await?;
            let mapping = ProofMapping::parse(&params, &mapping_bytes)?;
            sink.emit(Event::ArtifactVerified {
                kind: ArtifactKind::ProofMapping,
                bytes: mapping_bytes.len(),
            });

            let faucet_bytes = client.fetch(ArtifactKind::FaucetList).await?;
            let faucet = FaucetList::parse(&params, &faucet_bytes)?;
            sink.emit(Event::ArtifactVerified {
                kind: ArtifactKind::FaucetList,
                bytes: faucet_bytes.len(),
            });

            let entry = mapping
                .get(&target.to_string())
                .ok_or(redeem_core::Error::MappingEntryNotFound)?;
            let key = AllocationKey::from_address(target.clone(), entry);

            let redeemer = Redeemer::new(&params, &sink);
            vec![redeemer.redeem_address(&faucet, &key, cli.fee)?]
        }
        OriginArg::Pgp | OriginArg::Ssh => {
            let secret = read_secret(cli.key.as_deref())?;
            let key = AllocationKey::from_public_key(cli.origin.into(), secret.public_key())?;

            let tree_bytes = client.fetch(ArtifactKind::MainTree).await?;
            let tree = MainTree::parse(&params, &tree_bytes)?;
            sink.emit(Event::ArtifactVerified {
                kind: ArtifactKind::MainTree,
                bytes: tree_bytes.len(),
            });

            let bucket_kind = ArtifactKind::NonceBucket(key.bucket());
            let bucket_bytes = client.fetch(bucket_kind).await?;
            let bucket = CiphertextBucket::parse(&params, key.bucket(), &bucket_bytes)?;
            sink.emit(Event::ArtifactVerified {
                kind: bucket_kind,
                bytes: bucket_bytes.len(),
            });

            let mode = if cli.bare {
                TransformMode::Bare
            } else {
                TransformMode::Tweaked
            };
            let redeemer = Redeemer::new(&params, &sink);
            let outcome =
                redeemer.redeem_key(&tree, &bucket, &key, &secret, mode, &target, cli.fee)?;

            for diff in &outcome.diffs {
                for (slot, hash) in &diff.genuine {
                    let own = diff.own_slot == Some(*slot);
                    tracing::info!(slot, hash = hex::encode(hash), own, "genuine subtree entry");
                }
            }
            outcome.proofs
        }
    };

    let json = serde_json::to_string_pretty(&proofs).context("serializing proofs")?;
    match &cli.output {
        Some(path) => {
            write_file_atomic(path, &json)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), count = proofs.len(), "proofs written");
        }
        None => println!("{json}"),
    }

    // the base64 string is what the chain-submission tool consumes
    for proof in &proofs {
        println!("{}", proof.to_base64());
    }

    Ok(())
}

/// Read and parse the secret key, wiping intermediate buffers.
fn read_secret(arg: Option<&str>) -> Result<RedeemSecret> {
    let arg = arg.ok_or(redeem_core::Error::SecretRequired("pgp/ssh redemption"))?;
    let mut key_str = if arg == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_line(&mut buffer)
            .context("reading key from stdin")?;
        let trimmed = buffer.trim().to_string();
        buffer.zeroize();
        trimmed
    } else {
        arg.to_string()
    };

    let stripped = key_str.strip_prefix("0x").unwrap_or(&key_str).to_string();
    key_str.zeroize();
    if stripped.is_empty() {
        bail!("secret key is empty");
    }
    let mut bytes = hex::decode(&stripped).context("secret key is not valid hex")?;
    if bytes.len() != 32 {
        let got = bytes.len();
        bytes.zeroize();
        bail!("secret key must be 32 bytes, got {got}");
    }
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(RedeemSecret::from_bytes(&mut scalar)?)
}

fn write_file_atomic(path: &PathBuf, content: &str) -> Result<()> {
    use std::io::Write;
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
