use clap::Parser;
use metallic_reflections::args::Args;
use metallic_reflections::resources::HdrImage;
use metallic_reflections::scene::load_scene;
use metallic_reflections::{window, RenderError, RenderResult, RendererConfig};
use std::process::ExitCode;

fn run(args: &Args) -> RenderResult<()> {
    let config = RendererConfig::from(args);

    let scene = load_scene(&args.model).map_err(|source| RenderError::SceneLoad {
        path: args.model.clone(),
        source,
    })?;
    let environment = HdrImage::from_file(&args.environment_map)?;

    window::run(scene, environment, config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage errors exit with clap's status 2
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
