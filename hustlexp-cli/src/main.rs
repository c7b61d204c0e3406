//! Operator CLI, mirroring the teacher's `eltris-cli` shape: a thin
//! `clap` front end over the transactional core for the ad hoc operations an
//! admin runs out-of-band (trust promotion/ban, dispute resolution,
//! capability recompute).

use clap::{Parser, Subcommand};
use hustlexp_core::config::CoreConfig;
use hustlexp_core::engine::dispute::ResolutionOutcome;
use hustlexp_core::engine::{DisputeEngine, RecomputeService, TrustEngine};
use hustlexp_core::models::TrustTier;
use hustlexp_core::storage::Storage;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hustlexp")]
#[command(about = "HustleXP operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a user's trust tier and the requirements missing for promotion.
    EvaluatePromotion { user_id: Uuid },
    /// Apply a trust-tier promotion. Requires the user to already satisfy
    /// the target tier's thresholds.
    Promote {
        user_id: Uuid,
        #[arg(value_enum)]
        tier: TierArg,
    },
    /// Ban a user and cancel their active tasks.
    Ban { user_id: Uuid, reason: String },
    /// Resolve a dispute in the worker's favor (release escrow).
    ResolveRelease { dispute_id: Uuid, resolved_by: Uuid },
    /// Resolve a dispute in the poster's favor (refund escrow).
    ResolveRefund { dispute_id: Uuid, resolved_by: Uuid },
    /// Resolve a dispute with a split refund/release.
    ResolveSplit { dispute_id: Uuid, resolved_by: Uuid, refund_cents: i64, release_cents: i64 },
    /// Recompute a user's capability profile.
    Recompute { user_id: Uuid },
}

#[derive(Clone, clap::ValueEnum)]
enum TierArg {
    Verified,
    Trusted,
    Elite,
}

impl From<TierArg> for TrustTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Verified => TrustTier::Verified,
            TierArg::Trusted => TrustTier::Trusted,
            TierArg::Elite => TrustTier::Elite,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = CoreConfig::load()?;
    let storage = Storage::connect(&config).await?;

    match cli.command {
        Commands::EvaluatePromotion { user_id } => {
            let evaluation = TrustEngine::new(storage).evaluate_promotion(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Commands::Promote { user_id, tier } => {
            let result = TrustEngine::new(storage).apply_promotion(user_id, tier.into(), "operator_cli").await?;
            println!("promoted to {result:?}");
        }
        Commands::Ban { user_id, reason } => {
            TrustEngine::new(storage).ban_user(user_id, &reason).await?;
            println!("user {user_id} banned");
        }
        Commands::ResolveRelease { dispute_id, resolved_by } => {
            let dispute = DisputeEngine::new(storage).resolve(dispute_id, resolved_by, ResolutionOutcome::Release).await?;
            println!("{}", serde_json::to_string_pretty(&dispute)?);
        }
        Commands::ResolveRefund { dispute_id, resolved_by } => {
            let dispute = DisputeEngine::new(storage).resolve(dispute_id, resolved_by, ResolutionOutcome::Refund).await?;
            println!("{}", serde_json::to_string_pretty(&dispute)?);
        }
        Commands::ResolveSplit { dispute_id, resolved_by, refund_cents, release_cents } => {
            let outcome = ResolutionOutcome::Split { refund_cents, release_cents };
            let dispute = DisputeEngine::new(storage).resolve(dispute_id, resolved_by, outcome).await?;
            println!("{}", serde_json::to_string_pretty(&dispute)?);
        }
        Commands::Recompute { user_id } => {
            let profile = RecomputeService::new(storage).recompute_for_user(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
    }

    Ok(())
}
