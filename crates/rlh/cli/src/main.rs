//! rlhctl - operator tool for Router Label Headers
//!
//! - Decode a packed header or frame into its JSON admin form
//! - Verify or produce HMAC tags with a link key
//! - Run one forwarding step with a processor built from router config
//! - Print the capability advertisement for the default overhead model

use clap::{Parser, Subcommand};
use rlh_router::{init_tracing, LoggingConfig};

mod commands;

/// rlhctl application
#[derive(Parser)]
#[command(name = "rlhctl")]
#[command(about = "Inspect, sign and forward Router Label Headers", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level
    #[arg(long, env = "RLH_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Decode a hex-encoded header or frame
    Decode {
        /// Packed header or frame, hex encoded
        packed: String,
    },

    /// Check the HMAC of a hex-encoded header or frame
    Verify {
        /// Link key, hex encoded
        #[arg(long, env = "RLH_LINK_KEY")]
        key: String,

        /// Packed header or frame, hex encoded
        packed: String,
    },

    /// Create a signed header and print it packed
    Sign {
        /// Link key, hex encoded
        #[arg(long, env = "RLH_LINK_KEY")]
        key: String,

        /// Destination router id
        #[arg(long)]
        dst: String,

        /// Egress agent handle
        #[arg(long, default_value_t = 0)]
        egress: u64,

        /// QoS tier (gold, silver, bronze)
        #[arg(long, default_value = "silver")]
        qos: String,

        #[arg(long, default_value_t = 64)]
        ttl: u64,

        #[arg(long, default_value_t = 1000)]
        tokens: u64,

        #[arg(long, default_value_t = 10_000)]
        usd: u64,
    },

    /// Run one forwarding step on a packed frame
    Forward {
        /// Router configuration file
        #[arg(short, long, env = "RLH_CONFIG")]
        config: Option<String>,

        /// Packed frame, hex encoded
        packed: String,

        /// Next hop router id
        #[arg(long)]
        next_hop: String,

        #[arg(long, default_value_t = 0)]
        payload_tokens: u64,

        #[arg(long, default_value_t = 0)]
        payload_usd: u64,

        /// Mark congestion experienced
        #[arg(long)]
        congested: bool,
    },

    /// Print the default capability advertisement
    Model,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&LoggingConfig {
        level: cli.log_level.clone(),
        json: cli.json,
    });

    let output = match cli.command {
        Commands::Decode { packed } => commands::decode(&packed)?,
        Commands::Verify { key, packed } => commands::verify(&key, &packed)?,
        Commands::Sign {
            key,
            dst,
            egress,
            qos,
            ttl,
            tokens,
            usd,
        } => commands::sign(
            &key,
            &dst,
            egress,
            &qos,
            commands::allowance(ttl, tokens, usd),
        )?,
        Commands::Forward {
            config,
            packed,
            next_hop,
            payload_tokens,
            payload_usd,
            congested,
        } => commands::forward(
            config.as_deref(),
            &packed,
            &next_hop,
            (payload_tokens, payload_usd),
            congested,
        )?,
        Commands::Model => commands::model()?,
    };

    println!("{}", output);
    Ok(())
}
