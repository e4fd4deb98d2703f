// A small command-line runner for the `flowlens` library. It stands in for the
// webcam page: frames come from image files instead of a camera, and results go
// to PNG files and the log instead of a canvas.

use anyhow::{Context, bail};
use flowlens::core_modules::face_region::{BoundingBox, FaceFilter};
use flowlens::core_modules::filter::Filter;
use flowlens::image_helper::{load_frame, save_frame};
use flowlens::parallel_pipeline::ParallelPipeline;
use flowlens::pipeline::FilterPipeline;
use flowlens::EngineConfig;
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const USAGE: &str = "\
Usage: flowlens [--config <config.json>] <command>

Commands:
  filters <input> <out_dir>                                  write every filter view as PNG
  flow <previous> <current> [out.png]                        estimate optical flow between two frames
  face <input> <x> <y> <w> <h> <filter> <output> [mask]      filter one face box (greyscale|blur|hsv|pixelate|mask)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config = if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config needs a path\n\n{USAGE}");
        }
        let path = args.remove(1);
        args.remove(0);
        EngineConfig::from_path(&path).with_context(|| format!("loading config {path}"))?
    } else {
        EngineConfig::default()
    };

    match args.first().map(String::as_str) {
        Some("filters") if args.len() == 3 => run_filters(config, &args[1], &args[2]).await,
        Some("flow") if args.len() == 3 || args.len() == 4 => run_flow(config, &args[1], &args[2], args.get(3)),
        Some("face") if args.len() == 8 || args.len() == 9 => run_face(config, &args[1..]),
        _ => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

async fn run_filters(config: EngineConfig, input: &str, out_dir: &str) -> anyhow::Result<()> {
    let frame = Arc::new(load_frame(input).with_context(|| format!("reading {input}"))?);
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {out_dir}"))?;

    let block_size = config.pixelate_block_size;
    let pipeline = ParallelPipeline::new(config)?;
    let mut views = pipeline.gallery(Arc::clone(&frame)).await?;
    views.extend(
        pipeline
            .process_frame(Arc::clone(&frame), vec![Filter::BoxBlur, Filter::Pixelate { block_size }])
            .await?,
    );

    for (filter, output) in &views {
        let path: PathBuf = Path::new(out_dir).join(format!("{}.png", filter.label()));
        save_frame(&path, output).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    pipeline.shutdown().await?;
    println!("{} views written to {out_dir}", views.len());
    Ok(())
}

fn run_flow(config: EngineConfig, previous: &str, current: &str, output: Option<&String>) -> anyhow::Result<()> {
    let previous = load_frame(previous).with_context(|| format!("reading {previous}"))?;
    let current = load_frame(current).with_context(|| format!("reading {current}"))?;

    let mut pipeline = FilterPipeline::new(config)?;
    pipeline.track_flow(previous.view())?;
    let Some(report) = pipeline.track_flow(current.view())? else {
        println!("frames are identical, no flow");
        return Ok(());
    };

    for zone in &report.flow.zones {
        info!("zone ({}, {}): u={:.3} v={:.3}", zone.x, zone.y, zone.u, zone.v);
    }
    println!(
        "{} zones, mean u={:.3} v={:.3}; {} significant (total u={:.3} v={:.3})",
        report.flow.zones.len(),
        report.flow.u,
        report.flow.v,
        report.summary.count,
        report.summary.total_u,
        report.summary.total_v
    );

    if let Some(path) = output {
        let canvas = pipeline.render_flow(current.view(), &report.flow);
        save_frame(path, &canvas).with_context(|| format!("writing {path}"))?;
    }
    Ok(())
}

fn run_face(config: EngineConfig, args: &[String]) -> anyhow::Result<()> {
    let frame = load_frame(&args[0]).with_context(|| format!("reading {}", args[0]))?;
    let face = BoundingBox::new(
        args[1].parse().context("x must be an integer")?,
        args[2].parse().context("y must be an integer")?,
        args[3].parse().context("w must be a non-negative integer")?,
        args[4].parse().context("h must be a non-negative integer")?,
    );
    let filter: FaceFilter = args[5].parse()?;
    let mask = args
        .get(7)
        .map(|path| load_frame(path).with_context(|| format!("reading mask {path}")))
        .transpose()?;

    let pipeline = FilterPipeline::new(config)?;
    let output = pipeline.face_filter(frame.view(), &[face], filter, mask.as_ref())?;
    save_frame(&args[6], &output).with_context(|| format!("writing {}", args[6]))?;
    println!("wrote {}", args[6]);
    Ok(())
}
