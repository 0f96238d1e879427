//! `comfymeta` -- generation metadata extractor and A1111 → ComfyUI converter.
//!
//! # Environment variables
//!
//! | Variable                  | Default                      | Description                         |
//! |---------------------------|------------------------------|-------------------------------------|
//! | `COMFYMETA_FFPROBE`       | `ffprobe`                    | Probe tool for video containers     |
//! | `COMFYMETA_OUTPUT_DIR`    | --                           | Directory for `--save` output       |
//! | `COMFYMETA_DEFAULT_MODEL` | `sd_xl_base_1.0.safetensors` | Checkpoint when none is given       |
//! | `COMFYMETA_DEFAULT_SIZE`  | `512x512`                    | Canvas size when none is given      |
//! | `COMFYMETA_START_ID`      | `1`                          | First node id of converted graphs   |

use clap::Parser;
use comfymeta_cli::args::Args;
use comfymeta_cli::config::CliConfig;
use comfymeta_cli::runner;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfymeta=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = CliConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let settings = args.into_settings(config);
    let stats = runner::run(&settings, &mut std::io::stdout().lock()).await;

    if stats.exit_code() != 0 {
        std::process::exit(stats.exit_code());
    }
    Ok(())
}
