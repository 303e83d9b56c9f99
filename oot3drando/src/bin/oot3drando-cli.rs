use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use oot3drando::randomize::fill;
use oot3drando::settings::{parse_randomizer_settings, RandomizerSettings};
use oot3drando_game::GameData;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "data/sample")]
    data: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_attempts: Option<usize>,

    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,

    #[arg(long)]
    output_assignment: Option<PathBuf>,
}

fn load_settings(args: &Args) -> Result<RandomizerSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let settings_str = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read {}", path.display()))?;
            parse_randomizer_settings(&settings_str)
                .with_context(|| format!("Unable to parse {}", path.display()))?
        }
        None => RandomizerSettings::default(),
    };
    if let Some(max_attempts) = args.max_attempts {
        settings.generation.max_attempts = max_attempts;
    }
    Ok(settings)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let game_data = GameData::load(&args.data)?;
    let settings = load_settings(&args)?;
    let seed = match args.seed {
        Some(s) => s,
        None => rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF,
    };
    info!("Seed: {seed}");

    let randomization = fill(&game_data, &settings, seed).context("Randomization failed")?;
    info!(
        "Placed {} items ({} required spheres)",
        randomization.table.locations.len(),
        randomization.spoiler_log.required_playthrough.len()
    );

    if let Some(output_spoiler_log_path) = &args.output_spoiler_log {
        info!(
            "Writing spoiler log to {}",
            output_spoiler_log_path.display()
        );
        let spoiler_str = serde_json::to_string_pretty(&randomization.spoiler_log)?;
        std::fs::write(output_spoiler_log_path, spoiler_str)?;
    }

    if let Some(output_assignment_path) = &args.output_assignment {
        info!(
            "Writing item assignment to {}",
            output_assignment_path.display()
        );
        let assignment_str = serde_json::to_string_pretty(&randomization.table)?;
        std::fs::write(output_assignment_path, assignment_str)?;
    }

    Ok(())
}
