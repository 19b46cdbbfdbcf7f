use anyhow::Context;
use celestial_healpix::fits::write_maps;
use celestial_healpix::HealpixMap;
use celestial_mapper::{Mapper, SurveyConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "skymap")]
#[command(about = "Produce masked, rotated and downgraded survey maps")]
struct Cli {
    /// Path to the survey configuration (TOML)
    #[arg(long)]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration
    Info,
    /// Write the analysis mask
    Mask {
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the signal map
    Signal {
        #[arg(long)]
        output: PathBuf,
    },
    /// Write both half-split maps as two columns
    Halfsplit {
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the half-difference noise map
    Noise {
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = SurveyConfig::from_toml_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let mut mapper = Mapper::new(config);

    match cli.command {
        Commands::Info => print_info(mapper.config()),
        Commands::Mask { output } => {
            let mask = mapper.get_mask()?;
            let kept = mask.values().iter().filter(|&&v| v > 0.0).count();
            write(&output, &[("MASK", &mask)], &mapper)?;
            println!(
                "Sky fraction: {:.4} ({} of {} pixels)",
                kept as f64 / mask.npix() as f64,
                kept,
                mask.npix()
            );
        }
        Commands::Signal { output } => {
            let signal = mapper.get_signal_map()?;
            write(&output, &[("SIGNAL", &signal)], &mapper)?;
        }
        Commands::Halfsplit { output } => {
            let pair = mapper.get_half_split_maps()?;
            write(&output, &[("HM1", pair.first()), ("HM2", pair.second())], &mapper)?;
        }
        Commands::Noise { output } => {
            let noise = mapper.get_noise_map()?;
            write(&output, &[("NOISE", &noise)], &mapper)?;
        }
    }

    Ok(())
}

fn print_info(config: &SurveyConfig) {
    println!("Survey:      {}", config.map_name());
    println!("Dtype:       {}", config.dtype());
    println!("Nside:       {}", config.nside);
    println!(
        "Frame:       {} (native {})",
        config.coords, config.variant.native_frame
    );
    println!("Map:         {}", config.file_map.display());
    match config.half_split_sources() {
        Ok([hm1, hm2]) => {
            println!("Half 1:      {} [layer {}]", hm1.path.display(), hm1.layer);
            println!("Half 2:      {} [layer {}]", hm2.path.display(), hm2.layer);
        }
        Err(e) => println!("Half-split:  {}", e),
    }
    println!("GP modes:    {}", config.gp_mask_mode.join(", "));
    println!("PS modes:    {}", config.ps_mask_mode.join(", "));
    println!("Mask name:   {}", config.mask_name);
    for component in config.beam.components() {
        println!("Beam:        {:?}", component);
    }
    match &config.path_rerun {
        Some(path) => println!("Rerun path:  {}", path.display()),
        None => println!("Rerun path:  (none, products are not persisted)"),
    }
}

fn write(path: &Path, columns: &[(&str, &HealpixMap)], mapper: &Mapper) -> anyhow::Result<()> {
    let compress = path.extension().is_some_and(|ext| ext == "gz");
    write_maps(path, columns, Some(mapper.config().coords), compress)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote output");
    Ok(())
}
