pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "pano-tour")]
#[command(about = "Build virtual tours from tiled panoramas")]
pub struct CliConfig {
    #[arg(long, short, default_value = "pano-tour.toml", help = "TOML settings file")]
    pub config: PathBuf,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub log_json: bool,

    #[arg(long, help = "Override application.active_profiles (e.g. dev)")]
    pub profile: Option<String>,

    #[arg(long, help = "Report time and memory per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Tile every equirectangular image of a tour
    Convert { tour: String },

    /// Create a tour from its multires directory
    Create {
        tour: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        north_offset: i32,
        #[arg(long, help = "Overview map image to install with the tour")]
        map: Option<PathBuf>,
        #[arg(long, help = "Convert equirectangular images first")]
        convert: bool,
    },

    /// Add the scenes of a multires directory to an existing tour
    Add {
        tour: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        north_offset: i32,
        #[arg(long, help = "Convert equirectangular images first")]
        convert: bool,
    },

    /// Remove one scene from a tour
    DeleteScene { tour: String, scene: String },

    /// Remove a tour
    Delete { tour: String },

    /// List tours without their scenes
    List {
        #[arg(long)]
        group: Option<String>,
    },

    /// Print a tour as JSON
    Show {
        tour: String,
        #[arg(long, help = "Print the viewer tour document instead of the stored aggregate")]
        viewer: bool,
    },
}
