use std::process::ExitCode;

use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subpay::account::SmartAccount;
use subpay::config::SubpayConfig;
use subpay::executor::ProviderExecutor;
use subpay::plans::{
    format_date, format_native_amount, format_subscription_period, plan_by_id, transaction_url,
    SUBSCRIPTION_PLANS,
};
use subpay::service::SubscriptionService;
use subpay::store::{DelegationStore, SqliteStore};
use subpay::{SubpayError, DEFAULT_MAX_RENEWALS};

const USAGE: &str = "usage: subpay <plans | subscribe <plan-id> [max-renewals] | status | charge>";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let (action, result) = match command {
        "plans" => ("list plans", list_plans()),
        "subscribe" => ("create subscription", subscribe(&args[1..]).await),
        "status" => ("load subscription", status()),
        "charge" => ("process payment", charge().await),
        other => {
            eprintln!("unknown command '{other}'\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, command, "command failed");
            eprintln!("{}", e.user_message(action));
            ExitCode::FAILURE
        }
    }
}

fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

type Service = SubscriptionService<SqliteStore, ProviderExecutor<DynProvider>>;

fn rpc_url(config: &SubpayConfig) -> Result<Url, SubpayError> {
    config
        .chain
        .rpc_url
        .parse::<Url>()
        .map_err(|e| SubpayError::ConfigError(format!("invalid SUBPAY_RPC_URL: {e}")))
}

fn service(config: &SubpayConfig) -> Result<Service, SubpayError> {
    let delegate = config.delegate_signer()?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(delegate))
        .connect_http(rpc_url(config)?)
        .erased();

    Ok(SubscriptionService::new(
        config.chain.clone(),
        DelegationStore::new(SqliteStore::open(&config.db_path)?),
        ProviderExecutor::new(provider),
    ))
}

fn list_plans() -> Result<(), SubpayError> {
    let chain = subpay::ChainConfig::default();
    for plan in &SUBSCRIPTION_PLANS {
        println!(
            "[{}] {:<8} {} {}",
            plan.id,
            plan.name,
            format_native_amount(plan.price, chain.native_decimals, &chain.native_symbol),
            format_subscription_period(plan.period_secs),
        );
        println!("    {}", plan.description);
        for feature in plan.features {
            println!("    - {feature}");
        }
    }
    Ok(())
}

async fn subscribe(args: &[String]) -> Result<(), SubpayError> {
    let plan_id: u32 = args
        .first()
        .ok_or_else(|| SubpayError::Precondition(USAGE.to_string()))?
        .parse()
        .map_err(|_| SubpayError::Precondition("Selected plan not found".to_string()))?;
    let max_renewals = match args.get(1) {
        Some(raw) => raw
            .parse()
            .map_err(|_| SubpayError::ConfigError(format!("invalid max-renewals: {raw}")))?,
        None => DEFAULT_MAX_RENEWALS,
    };

    let config = SubpayConfig::from_env()?;
    let account = config
        .delegator_account()?
        .with_provider(ProviderBuilder::new().connect_http(rpc_url(&config)?).erased());
    let delegate = config.delegate_signer()?.address();
    let mut service = service(&config)?;

    // Signing works offline; payments need the account's code on-chain.
    match account.is_deployed().await {
        Ok(true) => {}
        Ok(false) => println!(
            "Note: {} has no code on-chain yet. Payments will be refused until it is deployed.",
            account.address()
        ),
        Err(e) => tracing::warn!(error = %e, "could not check subscriber deployment"),
    }

    let signed = service
        .subscribe(&account, delegate, plan_id, max_renewals, now())
        .await?;

    println!("Subscription created");
    println!("  Subscriber: {}", account.address());
    println!("  Delegate:   {delegate}");
    if let Some(plan) = plan_by_id(plan_id) {
        println!("  Plan:       {}", plan.name);
    }
    if let Some(meta) = signed.metadata() {
        println!("  Renewals:   {}", meta.max_renewals);
    }
    Ok(())
}

fn status() -> Result<(), SubpayError> {
    let config = SubpayConfig::from_env()?;
    let delegate = config.delegate_signer()?.address();
    let store = DelegationStore::new(SqliteStore::open(&config.db_path)?);

    let Some(signed) = store.get(delegate)? else {
        println!("No subscription stored for {delegate}");
        return Ok(());
    };
    let details = subpay::lifecycle::Subscription::from_signed(&signed)?.details(now());

    let plan_name = details
        .plan_id
        .and_then(plan_by_id)
        .map(|p| p.name)
        .unwrap_or("unknown");
    println!("Subscription for {delegate}");
    println!("  Subscriber:   {}", signed.delegator());
    println!("  Plan:         {plan_name}");
    println!("  Status:       {}", details.status);
    println!("  Started:      {}", format_date(details.start_date));
    println!("  Next payment: {}", format_date(details.next_payment_date));
    println!("  Expires:      {}", format_date(details.expires_at));
    println!(
        "  Renewals:     {}/{}",
        details.current_renewals, details.max_renewals
    );
    Ok(())
}

async fn charge() -> Result<(), SubpayError> {
    let config = SubpayConfig::from_env()?;
    let merchant = config.merchant()?;
    let delegate = config.delegate_signer()?.address();
    let mut service = service(&config)?;

    let record = service.process_payment(delegate, merchant, now()).await?;

    println!("Payment processed");
    println!(
        "  Amount: {}",
        format_native_amount(
            record.amount,
            config.chain.native_decimals,
            &config.chain.native_symbol
        )
    );
    println!(
        "  Tx:     {}",
        transaction_url(&config.chain.explorer_base, &record.tx_hash.to_string())
    );
    Ok(())
}
