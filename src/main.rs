use anyhow::Context;
use clap::Parser;
use pano_tour::utils::error::{ErrorSeverity, TourError};
use pano_tour::utils::{logger, validation::Validate};
use pano_tour::{
    CliConfig, Commands, IngestEngine, IngestMode, IngestRequest, JsonFileTourStore, TomlConfig,
    TourAssembler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting pano-tour CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let monitor_enabled = cli.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let store = JsonFileTourStore::new(config.store_location());
    let assembler = TourAssembler::new(store, &config);
    let engine = IngestEngine::new_with_monitoring(assembler, monitor_enabled);

    match run(&engine, cli.command).await {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {}
        Err(CommandFailure::Tour(e)) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
        Err(CommandFailure::Output(e)) => return Err(e),
    }

    Ok(())
}

fn load_config(cli: &CliConfig) -> Result<TomlConfig, TourError> {
    let mut config = TomlConfig::from_file(&cli.config)?;
    if let Some(profile) = &cli.profile {
        config.application.active_profiles = Some(profile.clone());
    }
    config.validate()?;
    Ok(config)
}

enum CommandFailure {
    Tour(TourError),
    Output(anyhow::Error),
}

impl From<TourError> for CommandFailure {
    fn from(e: TourError) -> Self {
        Self::Tour(e)
    }
}

impl From<anyhow::Error> for CommandFailure {
    fn from(e: anyhow::Error) -> Self {
        Self::Output(e)
    }
}

async fn run(
    engine: &IngestEngine<JsonFileTourStore>,
    command: Commands,
) -> Result<Option<String>, CommandFailure> {
    let assembler = engine.assembler();

    let output = match command {
        Commands::Convert { tour } => {
            let meta = assembler
                .convert_to_multires_from_equirectangular(&tour)
                .await?;
            format!("✅ Converted tour {} ({} panoramas with metadata)", tour, meta.len())
        }
        Commands::Create {
            tour,
            north_offset,
            map,
            convert,
        } => {
            let created = engine
                .run(IngestRequest {
                    tour_name: tour,
                    north_offset,
                    mode: IngestMode::Create { map_file: map },
                    convert,
                })
                .await?;
            format!(
                "✅ Created tour {} with scenes: {}",
                created.name,
                created.scene_ids().join(", ")
            )
        }
        Commands::Add {
            tour,
            north_offset,
            convert,
        } => {
            let updated = engine
                .run(IngestRequest {
                    tour_name: tour,
                    north_offset,
                    mode: IngestMode::Add,
                    convert,
                })
                .await?;
            format!(
                "✅ Tour {} now has scenes: {}",
                updated.name,
                updated.scene_ids().join(", ")
            )
        }
        Commands::DeleteScene { tour, scene } => {
            match assembler.delete_scene(&tour, &scene).await? {
                Some(updated) => format!(
                    "✅ Removed {} from {} (first scene: {})",
                    scene,
                    updated.name,
                    updated.first_scene_id.as_deref().unwrap_or("-")
                ),
                None => format!("Tour {} not found, nothing removed", tour),
            }
        }
        Commands::Delete { tour } => match assembler.find_one(&tour).await? {
            Some(existing) => {
                assembler.delete(&existing).await?;
                format!("✅ Deleted tour {}", tour)
            }
            None => return Err(TourError::TourNotFound(tour).into()),
        },
        Commands::List { group } => {
            let tours = match group {
                Some(group) => assembler.find_tours_by_group_with_basic(&group).await?,
                None => assembler.find_all_tours_with_basic().await?,
            };
            serde_json::to_string_pretty(&tours).context("failed to render tour list")?
        }
        Commands::Show { tour, viewer } => {
            let found = assembler
                .find_one(&tour)
                .await?
                .ok_or_else(|| TourError::TourNotFound(tour.clone()))?;
            if viewer {
                serde_json::to_string_pretty(&found.viewer_config())
                    .context("failed to render viewer config")?
            } else {
                serde_json::to_string_pretty(&found).context("failed to render tour")?
            }
        }
    };

    Ok(Some(output))
}
