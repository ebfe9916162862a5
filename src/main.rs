use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{Address, Bytes};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ops_governor_client::abi::{
    encode_call, render_call, value_tree, CallCodec, DecodedCall, SignatureRegistry,
};
use ops_governor_client::governor::{
    load_overview, ActiveProposals, GovernorActions, GovernorError, GovernorReader,
    ProposalPaginator, ProposalView, QueryPlan, SubmitOutcome, ViewUpdate,
};
use ops_governor_client::rpc::{RateLimitConfig, RpcClient, RpcClientConfig};
use ops_governor_client::types::config::app::AppConfig;
use ops_governor_client::types::config::chain::ChainConfig;
use ops_governor_client::types::proposal::{ProposalRecord, VoteDirection};

const USAGE: &str = "\
usage: ops-governor [--config <path>] [--chain <name>] [--from <address>] <command>

commands:
  functions                           list callable functions
  encode <function> <json-args>       build call data
  decode <hex>                        show call data as arguments
  proposals [pages]                   list proposals, newest first
  active                              list proposals open for voting
  proposal <id> [--watch]             show a proposal and its votes
  overview                            managers, operators and registries
  vote <id> for|against               vote on a proposal
  execute <id>                        execute a proposal
  create <description> <blocks> <call-data>";

struct Cli {
    config_path: PathBuf,
    chain: Option<String>,
    from: Option<Address>,
    watch: bool,
    command: Vec<String>,
}

impl Cli {
    fn parse(args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut cli = Cli {
            config_path: PathBuf::from("config/config.json"),
            chain: None,
            from: None,
            watch: false,
            command: Vec::new(),
        };

        let mut args = args.peekable();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    cli.config_path = args.next().context("--config needs a path")?.into();
                }
                "--chain" => cli.chain = Some(args.next().context("--chain needs a name")?),
                "--from" => {
                    let from = args.next().context("--from needs an address")?;
                    cli.from = Some(from.parse().context("invalid --from address")?);
                }
                "--watch" => cli.watch = true,
                _ => cli.command.push(arg),
            }
        }

        Ok(cli)
    }

    fn arg(&self, index: usize, name: &str) -> anyhow::Result<&str> {
        self.command
            .get(index)
            .map(String::as_str)
            .with_context(|| format!("missing <{}>\n\n{}", name, USAGE))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse(env::args().skip(1))?;
    let Some(command) = cli.command.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = AppConfig::load(&cli.config_path)?;
    let chain = config.chain(cli.chain.as_deref())?.clone();
    tracing::info!("Using chain {} ({})", chain.name, chain.chain_id);

    let registry = Arc::new(
        SignatureRegistry::from_file(&config.abi_path)
            .with_context(|| format!("loading ABI from {}", config.abi_path.display()))?,
    );
    let codec = CallCodec::new(registry.clone());

    // Commands that only need the ABI.
    match command.as_str() {
        "functions" => return list_functions(&registry),
        "encode" => return encode(&cli, &registry),
        "decode" => return decode(&cli, &codec),
        _ => {}
    }

    let client = connect(&config, &chain)?;
    let plan = match QueryPlan::for_client(client.as_deref(), &config.chains).await {
        Ok(plan) => plan,
        Err(e) if e.is_capability_unavailable() => {
            println!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if plan.chain_id != chain.chain_id {
        tracing::warn!(
            "Endpoint for {} serves chain {}, using that chain's deployment",
            chain.name,
            plan.chain_id
        );
    }
    let client = client.context("no ledger client")?;
    let reader = Arc::new(
        GovernorReader::new(client.clone(), plan)
            .with_windows(config.event_window_blocks, config.window_concurrency),
    );

    let result = match command.as_str() {
        "proposals" => {
            let pages: usize = match cli.command.get(1) {
                Some(pages) => pages.parse().context("invalid page count")?,
                None => 1,
            };
            list_proposals(reader, &codec, config.page_size, pages).await
        }
        "active" => list_active(reader, &codec).await,
        "proposal" => {
            let id = cli.arg(1, "id")?.parse().context("invalid proposal id")?;
            show_proposal(reader, &codec, id, cli.from, cli.watch).await
        }
        "overview" => show_overview(&reader).await,
        "vote" | "execute" | "create" => {
            let signer = cli.from.context("--from <address> is required to submit")?;
            let actions = GovernorActions::new(client, plan, signer);
            submit(&cli, &command, &actions).await
        }
        other => anyhow::bail!("unknown command '{}'\n\n{}", other, USAGE),
    };

    match result {
        Err(e) => match e.downcast_ref::<GovernorError>() {
            Some(ge) if ge.is_capability_unavailable() => {
                println!("{}", ge);
                Ok(())
            }
            _ => Err(e),
        },
        ok => ok,
    }
}

/// Build the RPC client for `chain`, loading .env if its URL is missing.
/// `None` means no connection is available.
fn connect(config: &AppConfig, chain: &ChainConfig) -> anyhow::Result<Option<Arc<RpcClient>>> {
    if env::var(&chain.rpc_url_env_var).is_err() {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
    }

    let url = match chain.rpc_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("{}", e);
            return Ok(None);
        }
    };
    let url = url::Url::parse(&url)
        .with_context(|| format!("invalid URL in {}", chain.rpc_url_env_var))?;

    let mut rpc_config = RpcClientConfig::new(url)
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .with_max_log_window(config.event_window_blocks);
    if let Some(rps) = chain.requests_per_second.and_then(NonZeroU32::new) {
        rpc_config = rpc_config.with_rate_limit(RateLimitConfig {
            requests_per_second: rps,
            ..Default::default()
        });
    }

    Ok(Some(Arc::new(RpcClient::new(rpc_config)?)))
}

fn list_functions(registry: &SignatureRegistry) -> anyhow::Result<()> {
    for signature in registry.signatures() {
        println!(
            "{}  {}",
            hex::encode_prefixed(signature.selector),
            signature.canonical_signature()
        );
    }
    Ok(())
}

fn encode(cli: &Cli, registry: &SignatureRegistry) -> anyhow::Result<()> {
    let name = cli.arg(1, "function")?;
    let signature = registry
        .find(name)
        .with_context(|| format!("no callable function '{}'", name))?;
    let json: serde_json::Value = match cli.command.get(2) {
        Some(args) => serde_json::from_str(args).context("arguments must be a JSON array")?,
        None => serde_json::Value::Array(Vec::new()),
    };

    let values = value_tree::from_json(&signature.inputs, &json)?;
    let payload = encode_call(signature, &values)?;
    println!("{}", hex::encode_prefixed(payload));
    Ok(())
}

fn decode(cli: &Cli, codec: &CallCodec) -> anyhow::Result<()> {
    let payload = hex::decode(cli.arg(1, "hex")?).context("call data must be hex")?;
    print_call(&codec.decode(&payload), "");
    Ok(())
}

fn print_call(call: &DecodedCall, indent: &str) {
    println!("{}{}", indent, call.function_name);
    for arg in render_call(call) {
        println!("{}  {} ({}): {}", indent, arg.name, arg.type_label, arg.value);
    }
}

fn print_proposal(proposal: &ProposalRecord, codec: &CallCodec) {
    println!("#{} [{}] {}", proposal.id, proposal.status, proposal.description);
    println!(
        "  proposer {}  blocks {}-{}  for {}  against {}",
        proposal.proposer,
        proposal.start_block,
        proposal.end_block,
        proposal.votes_for,
        proposal.votes_against
    );
    if proposal.is_executed() {
        println!("  executed in block {}", proposal.executed_block);
    }
    print_call(&codec.decode(&proposal.call_data), "  ");
}

async fn list_proposals(
    reader: Arc<GovernorReader<RpcClient>>,
    codec: &CallCodec,
    page_size: u64,
    pages: usize,
) -> anyhow::Result<()> {
    let mut paginator = ProposalPaginator::new(reader).with_page_size(page_size);
    paginator.refresh().await?;
    for _ in 1..pages {
        if !paginator.has_more() {
            break;
        }
        paginator.load_more().await?;
    }

    for proposal in paginator.items() {
        print_proposal(proposal, codec);
    }
    println!(
        "{} of {} proposal(s){}",
        paginator.items().len(),
        paginator.total(),
        if paginator.has_more() { ", more available" } else { "" }
    );
    Ok(())
}

async fn list_active(reader: Arc<GovernorReader<RpcClient>>, codec: &CallCodec) -> anyhow::Result<()> {
    let active = ActiveProposals::load(reader).await?;
    if active.is_empty() {
        println!("No active proposals");
    }
    for proposal in active.proposals() {
        print_proposal(proposal, codec);
    }
    Ok(())
}

async fn show_proposal(
    reader: Arc<GovernorReader<RpcClient>>,
    codec: &CallCodec,
    id: u64,
    user: Option<Address>,
    watch: bool,
) -> anyhow::Result<()> {
    let mut view = ProposalView::load(reader, id).await?;
    print_proposal(view.proposal(), codec);
    println!(
        "  block {}  voting power {}  executable {}",
        view.current_block(),
        view.total_voting_power(),
        view.is_executable()
    );
    for vote in view.votes() {
        let me = if Some(vote.voter) == user { " (me)" } else { "" };
        println!("  {} {}{}", vote.direction, vote.voter, me);
    }
    if let Some(user) = user {
        println!("  voted: {}", view.has_user_voted(&user));
    }

    if !watch {
        return Ok(());
    }

    println!("Watching for votes and execution, Ctrl-C to stop");
    loop {
        let update = tokio::select! {
            update = view.next_update() => update?,
            _ = tokio::signal::ctrl_c() => None,
        };
        match update {
            Some(ViewUpdate::VoteAdded(vote)) => {
                println!("  {} {} (block {})", vote.direction, vote.voter, view.current_block());
            }
            Some(ViewUpdate::VoteRedelivered) => {}
            Some(ViewUpdate::Executed { block }) => {
                println!("  executed in block {} [{}]", block, view.proposal().status);
            }
            None => break,
        }
    }

    view.teardown();
    Ok(())
}

async fn show_overview(reader: &GovernorReader<RpcClient>) -> anyhow::Result<()> {
    let overview = load_overview(reader).await?;
    let sections = [
        ("Managers", &overview.managers),
        ("Operators", &overview.operators),
        ("Tokens", &overview.tokens),
        ("Protocols", &overview.protocols),
        ("Utils", &overview.utils),
    ];
    for (title, entries) in sections {
        println!("{} ({})", title, entries.len());
        for entry in entries {
            println!("  {}", entry);
        }
    }
    Ok(())
}

async fn submit(
    cli: &Cli,
    command: &str,
    actions: &GovernorActions<RpcClient>,
) -> anyhow::Result<()> {
    let outcome = match command {
        "vote" => {
            let id = cli.arg(1, "id")?.parse().context("invalid proposal id")?;
            let direction: VoteDirection = cli
                .arg(2, "for|against")?
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            actions.cast_vote(id, direction).await?
        }
        "execute" => {
            let id = cli.arg(1, "id")?.parse().context("invalid proposal id")?;
            actions.execute(id).await?
        }
        _ => {
            let description = cli.arg(1, "description")?.to_string();
            let blocks = cli.arg(2, "blocks")?.parse().context("invalid block count")?;
            let call_data: Bytes = cli.arg(3, "call-data")?.parse().context("call data must be hex")?;
            actions.create_proposal(description, blocks, call_data).await?
        }
    };

    match outcome {
        SubmitOutcome::Submitted(tx) => println!(
            "{} transaction {} in block {}",
            if tx.success { "Mined" } else { "Reverted" },
            tx.hash,
            tx.block_number.map_or_else(|| "?".to_string(), |b| b.to_string())
        ),
        SubmitOutcome::Rejected => {}
    }
    Ok(())
}
