// src/main.rs
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use ndarray::Array2;
use neurocoupling::connectivity::{
    render_connectivity_png, ManualSource, PlotStyle, SyntheticSource,
};
use neurocoupling::{
    ConnectivityConfig, ConnectivityPipeline, ConnectivitySettings, DebiasedSquaredWpli, Network,
    TrialData,
};
#[derive(Parser)]
#[command(author, version, about = "Phase-lag connectivity networks from multi-channel trials")]
struct Cli {
    /// JSON run configuration; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Trials as JSON, `[trial][channel][sample]`; synthetic trials when omitted
    #[arg(long)]
    trials: Option<PathBuf>,
    /// Node positions as JSON, one `[x, y, z]` per channel
    #[arg(long)]
    positions: Option<PathBuf>,
    /// Channels per synthetic trial
    #[arg(long, default_value_t = 8)]
    channels: usize,
    /// Samples per synthetic trial
    #[arg(long, default_value_t = 256)]
    samples: usize,
    /// Number of synthetic trials
    #[arg(long, default_value_t = 20)]
    count: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Feed trials one by one through the rolling trial window
    #[arg(long)]
    stream: bool,
    /// Where to write the network JSON; stdout when omitted
    #[arg(long)]
    out: Option<PathBuf>,
    /// Also render the connectivity matrix as a PNG heat map
    #[arg(long)]
    png: Option<PathBuf>,
}
// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConnectivityConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConnectivityConfig::default(),
    };
    let trials = match &cli.trials {
        Some(path) => load_trials(path)?,
        None => {
            let mut source = SyntheticSource::new(cli.channels, cli.samples, cli.count, cli.seed)
                .with_sampling_frequency(config.sampling_frequency_hz);
            (0..cli.count).map(|_| source.generate()).collect()
        }
    };
    let positions = cli.positions.as_deref().map(load_positions).transpose()?;
    info!("{} trials loaded", trials.len());
    let network = if cli.stream {
        let mut pipeline = ConnectivityPipeline::new(ManualSource::new(trials), &config)?;
        if let Some(positions) = positions {
            pipeline = pipeline.with_node_positions(positions)?;
        }
        pipeline
            .drain()?
            .unwrap_or_else(|| Network::new(DebiasedSquaredWpli::NAME))
    } else {
        batch_network(&config, trials, positions)?
    };
    info!(
        "network: {} nodes, {} edges, weights in {:?}",
        network.nodes().len(),
        network.edges().len(),
        network.min_max_full_weights()
    );
    let json = serde_json::to_string_pretty(&network)?;
    match &cli.out {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("writing network to {}", path.display()))?,
        None => println!("{json}"),
    }
    if let Some(path) = &cli.png {
        let png = render_connectivity_png(&network, PlotStyle::default())?;
        fs::write(path, png).with_context(|| format!("writing plot to {}", path.display()))?;
    }
    Ok(())
}
fn batch_network(
    config: &ConnectivityConfig,
    trials: Vec<TrialData>,
    positions: Option<Array2<f32>>,
) -> Result<Network> {
    let mut settings = ConnectivitySettings::from_config(config, trials)?;
    if let Some(positions) = positions {
        settings = settings.with_node_positions(positions)?;
    }
    let mut network = DebiasedSquaredWpli::calculate(&mut settings)?;
    if let Some((from_hz, to_hz)) = config.frequency_range_hz {
        network.set_frequency_range(from_hz, to_hz)?;
    }
    if let Some(threshold) = config.threshold {
        network.set_threshold(threshold);
    }
    Ok(network)
}
fn load_trials(path: &Path) -> Result<Vec<TrialData>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading trials {}", path.display()))?;
    let raw: Vec<Vec<Vec<f64>>> = serde_json::from_str(&text)
        .with_context(|| format!("parsing trials {}", path.display()))?;
    raw.iter()
        .enumerate()
        .map(|(index, rows)| {
            TrialData::from_rows(rows).map_err(|kind| anyhow!("trial {index}: {kind}"))
        })
        .collect()
}
fn load_positions(path: &Path) -> Result<Array2<f32>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading positions {}", path.display()))?;
    let rows: Vec<[f32; 3]> = serde_json::from_str(&text)
        .with_context(|| format!("parsing positions {}", path.display()))?;
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((rows.len(), 3), flat)?)
}
