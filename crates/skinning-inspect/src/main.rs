use std::{convert::Infallible, env, path::PathBuf, process::ExitCode, time::Duration};

use glam::Mat4;
use log::{error, info, warn};
use skinning_asset::{
    index::{AnimationHandle, SkeletonHandle},
    mesh::Mesh,
    render::{GpuHandle, RenderBackend},
    texture::Texture,
    LoadParams, Model,
};
use skinning_perf_tracker::TickTracker;
use web_time::Instant;

const USAGE: &str = "usage: skinning-inspect <model.gltf|model.glb> [animation-index] [ticks] [tick-seconds]";

struct Args {
    model: PathBuf,
    animation: usize,
    ticks: usize,
    tick_seconds: f32,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let model = args.next().map(PathBuf::from).ok_or_else(|| USAGE.to_string())?;
    let animation = match args.next() {
        Some(arg) => arg
            .parse()
            .map_err(|_| format!("Bad animation index: {}", arg))?,
        None => 0,
    };
    let ticks = match args.next() {
        Some(arg) => arg.parse().map_err(|_| format!("Bad tick count: {}", arg))?,
        None => 10,
    };
    let tick_seconds = match args.next() {
        Some(arg) => arg
            .parse()
            .map_err(|_| format!("Bad tick length: {}", arg))?,
        None => 1.0 / 30.0,
    };
    Ok(Args {
        model,
        animation,
        ticks,
        tick_seconds,
    })
}

/// Hands out handles without touching a GPU, counting the bytes it was given.
#[derive(Debug, Default)]
struct DryRunBackend {
    next_handle: u64,
    buffer_bytes: usize,
    texture_bytes: usize,
}

impl DryRunBackend {
    fn handle(&mut self) -> GpuHandle {
        self.next_handle += 1;
        GpuHandle(self.next_handle)
    }
}

impl RenderBackend for DryRunBackend {
    type Error = Infallible;

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(GpuHandle, GpuHandle), Self::Error> {
        self.buffer_bytes += mesh.vertex_bytes().len() + mesh.index_bytes().len();
        Ok((self.handle(), self.handle()))
    }

    fn create_texture_view(&mut self, texture: &Texture) -> Result<GpuHandle, Self::Error> {
        self.texture_bytes += texture.pixels.len();
        Ok(self.handle())
    }
}

fn print_summary(model: &Model) {
    for (index, mesh) in model.meshes.iter().enumerate() {
        println!(
            "mesh #{} {:?}: {} vertices, {} indices, {} texture(s)",
            index,
            mesh.name,
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.textures.len()
        );
    }
    for (index, skeleton) in model.skeletons.iter().enumerate() {
        println!(
            "skeleton #{} {:?}: {} joints, root joint #{}",
            index,
            skeleton.name,
            skeleton.joints.len(),
            skeleton.root
        );
    }
    for (index, animation) in model.animations.iter().enumerate() {
        println!(
            "animation #{} {:?}: {} channel(s), {:.3}s",
            index,
            animation.name,
            animation.channels.len(),
            animation.duration
        );
    }
}

fn print_palette(palette: &[Mat4]) {
    for (joint, matrix) in palette.iter().enumerate() {
        let columns = matrix.to_cols_array_2d();
        println!("  joint #{}", joint);
        for row in 0..4 {
            println!(
                "    [{:>9.4} {:>9.4} {:>9.4} {:>9.4}]",
                columns[0][row], columns[1][row], columns[2][row], columns[3][row]
            );
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let mut model = match Model::load(&args.model, &LoadParams::default()) {
        Ok(model) => model,
        Err(err) => {
            error!("Failed to load {}: {}", args.model.display(), err);
            return ExitCode::FAILURE;
        }
    };
    print_summary(&model);

    let mut backend = DryRunBackend::default();
    match model.upload(&mut backend) {
        Ok(()) => (),
        Err(never) => match never {},
    }
    info!(
        "Dry-run upload: {} buffer byte(s), {} texture byte(s), {} handle(s)",
        backend.buffer_bytes, backend.texture_bytes, backend.next_handle
    );

    if model.skeletons.is_empty() || model.animations.is_empty() {
        info!("Nothing to play");
        return ExitCode::SUCCESS;
    }
    if let Err(err) = model.play(SkeletonHandle(0), AnimationHandle(args.animation), 1.0, true) {
        error!("Cannot play animation #{}: {}", args.animation, err);
        return ExitCode::FAILURE;
    }

    let mut tracker = TickTracker::new(60);
    for _ in 0..args.ticks {
        let start = Instant::now();
        if let Err(err) = model.update(args.tick_seconds) {
            error!("Animation tick failed: {}", err);
            return ExitCode::FAILURE;
        }
        tracker.add_sample(start.elapsed(), start);
    }

    let Some(animator) = model.animator() else {
        return ExitCode::SUCCESS;
    };
    println!(
        "after {} tick(s) of {:.4}s: t = {:.4}s, {:?}",
        args.ticks,
        args.tick_seconds,
        animator.current_time(),
        animator.state()
    );
    let joints = model
        .skeleton(SkeletonHandle(0))
        .map_or(0, |skeleton| skeleton.joints.len());
    print_palette(&animator.final_bone_transforms()[..joints]);
    if let Some(tick_time) = tracker.avg_tick_time() {
        info!(
            "Average tick {:?}, {:.1} ticks/s",
            tick_time,
            tracker.ticks_per_second().unwrap_or_default()
        );
    }
    if let (Some(last), Ok(budget)) = (
        tracker.last_tick_time(),
        Duration::try_from_secs_f32(args.tick_seconds),
    ) {
        if *last > budget {
            warn!("Last tick took {:?}, longer than the simulated {:?}", last, budget);
        }
    }
    ExitCode::SUCCESS
}
