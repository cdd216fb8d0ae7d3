// src/main.rs - demo driver: landmark source -> mapper -> armature -> CSV
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use pose_rig::{
    Armature, BoneId, BoneSink, JsonlReplaySource, LandmarkSource, MapperConfig, PoseMapper,
    RotationExporter, Segment, Side, SimulatedSource,
};

struct Options {
    config: Option<PathBuf>,
    replay: Option<PathBuf>,
    frames: usize,
    output_dir: PathBuf,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            config: None,
            replay: None,
            frames: 300,
            output_dir: PathBuf::from("output"),
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    options.config = Some(PathBuf::from(
                        args.next().context("--config needs a path")?,
                    ));
                }
                "--replay" => {
                    options.replay = Some(PathBuf::from(
                        args.next().context("--replay needs a path")?,
                    ));
                }
                "--frames" => {
                    options.frames = args
                        .next()
                        .context("--frames needs a count")?
                        .parse()
                        .context("--frames needs a number")?;
                }
                "--output" => {
                    options.output_dir =
                        PathBuf::from(args.next().context("--output needs a path")?);
                }
                other => anyhow::bail!("unknown argument: {other}"),
            }
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let options = Options::parse(std::env::args().skip(1))?;

    let config = match &options.config {
        Some(path) => MapperConfig::load(path)?,
        None => MapperConfig::default(),
    };
    let mapper = PoseMapper::new(config)?;

    let mut armature = Armature::humanoid_arms();
    info!(bones = armature.resolved_count(), "armature ready");

    let mut source: Box<dyn LandmarkSource> = match &options.replay {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening replay {}", path.display()))?;
            info!(path = %path.display(), "replaying recorded session");
            Box::new(JsonlReplaySource::new(BufReader::new(file)))
        }
        None => {
            info!(frames = options.frames, "running simulated arm swing");
            Box::new(SimulatedSource::with_frame_limit(options.frames))
        }
    };

    let mut exporter = RotationExporter::new(&options.output_dir, None);

    let frame_step = 0.033;
    let mut frame_index = 0usize;
    while let Some(frame) = source.next_frame()? {
        mapper.map_pose(&frame, &mut armature);
        exporter.add_frame(frame_index, frame_index as f64 * frame_step, &armature);

        if frame_index % 30 == 0 {
            let upper = BoneId::new(Side::Right, Segment::UpperArm);
            if let Some(euler) = armature.local_euler(upper) {
                debug!(frame = frame_index, y = euler.y, z = euler.z, "right upper arm");
            }
        }
        frame_index += 1;
    }

    let path = exporter.export_csv()?;
    info!(frames = exporter.len(), path = %path.display(), "session exported");
    Ok(())
}
