//! Command line arguments

use crate::environment::EnvironmentConfig;
use crate::scene::ControlConfig;
use crate::RendererConfig;
use clap::Parser;
use std::path::PathBuf;

/// Metallic Reflections application arguments.
#[derive(Parser, Debug)]
#[command(
    name = "metallic-reflections",
    about = "Deferred metal renderer with image-based lighting and screen-space reflections",
    long_about = "Renders a glTF model as polished metal inside an HDR environment.\n\n\
        CONTROLS:\n\
          W / Up      zoom in\n\
          S / Down    zoom out\n\
          Escape      quit\n\
        \n\
        EXAMPLES:\n\
          metallic-reflections helmet.glb studio.hdr\n\
          metallic-reflections helmet.glb studio.hdr --env-size 512 --no-auto-rotate",
    version
)]
pub struct Args {
    /// Model to render (.gltf or .glb).
    pub model: PathBuf,

    /// Equirectangular environment map (.hdr or any supported image).
    pub environment_map: PathBuf,

    /// Window width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Window height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Keep the camera still unless zooming.
    #[arg(long)]
    pub no_auto_rotate: bool,

    /// Orbit speed in degrees per second.
    #[arg(long, default_value = "30")]
    pub rotate_speed: f32,

    /// Zoom speed in units per second.
    #[arg(long, default_value = "2")]
    pub zoom_speed: f32,

    /// Edge length of the environment cubemap in texels.
    #[arg(long, default_value = "1024", value_parser = clap::value_parser!(u32).range(1..))]
    pub env_size: u32,

    /// Linear exposure applied before tonemapping.
    #[arg(long, default_value = "1.0")]
    pub exposure: f32,
}

impl From<&Args> for RendererConfig {
    fn from(args: &Args) -> Self {
        Self {
            width: args.width.max(1),
            height: args.height.max(1),
            controls: ControlConfig {
                auto_rotate: !args.no_auto_rotate,
                rotate_speed: args.rotate_speed,
                zoom_speed: args.zoom_speed,
            },
            environment: EnvironmentConfig {
                base_size: args.env_size,
                ..Default::default()
            },
            exposure: args.exposure,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let args = Args::try_parse_from(["metallic-reflections", "model.glb", "sky.hdr"]).unwrap();
        let config = RendererConfig::from(&args);
        let default = RendererConfig::default();

        assert_eq!((config.width, config.height), (default.width, default.height));
        assert_eq!(config.controls, default.controls);
        assert_eq!(config.environment, default.environment);
        assert_eq!(config.exposure, default.exposure);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "metallic-reflections",
            "model.glb",
            "sky.hdr",
            "--no-auto-rotate",
            "--env-size",
            "256",
            "--exposure",
            "2.5",
        ])
        .unwrap();
        let config = RendererConfig::from(&args);
        assert!(!config.controls.auto_rotate);
        assert_eq!(config.environment.base_size, 256);
        assert_eq!(config.exposure, 2.5);
    }

    #[test]
    fn test_missing_environment_is_usage_error() {
        let err = Args::try_parse_from(["metallic-reflections", "model.glb"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
