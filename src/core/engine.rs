use crate::core::assembler::TourAssembler;
use crate::domain::model::{PhotoMetaMap, Tour};
use crate::domain::ports::TourStore;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestMode {
    /// 建立新的 tour，可附帶總覽地圖檔
    Create { map_file: Option<PathBuf> },
    /// 加入既有 tour
    Add,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub tour_name: String,
    pub north_offset: i32,
    pub mode: IngestMode,
    /// 先把 equirectangular 影像切成 multires
    pub convert: bool,
}

/// Runs convert → assemble for one tour and reports per-phase stats.
pub struct IngestEngine<S: TourStore> {
    assembler: TourAssembler<S>,
    monitor: SystemMonitor,
}

impl<S: TourStore> IngestEngine<S> {
    pub fn new(assembler: TourAssembler<S>) -> Self {
        Self::new_with_monitoring(assembler, false)
    }

    pub fn new_with_monitoring(assembler: TourAssembler<S>, monitor_enabled: bool) -> Self {
        Self {
            assembler,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn assembler(&self) -> &TourAssembler<S> {
        &self.assembler
    }

    pub async fn run(&self, request: IngestRequest) -> Result<Tour> {
        tracing::info!("🚀 Starting ingestion for tour {}", request.tour_name);

        // Convert
        let meta = if request.convert {
            let converted = self
                .assembler
                .convert_to_multires_from_equirectangular(&request.tour_name)
                .await?;
            tracing::info!("Converted {} panoramas with metadata", converted.len());
            self.monitor.log_stats("Convert");
            self.merged_meta(&request.tour_name, converted)
        } else {
            self.merged_meta(&request.tour_name, PhotoMetaMap::new())
        };

        // Assemble
        let tour = match request.mode {
            IngestMode::Create { map_file } => {
                let map_path = self
                    .assembler
                    .map_path(&request.tour_name, map_file.as_deref());
                let tour = self
                    .assembler
                    .create_tour_from_multires(
                        &request.tour_name,
                        &meta,
                        map_path,
                        request.north_offset,
                    )
                    .await?;
                // a conflicting create must leave the existing map untouched
                if let Some(file) = &map_file {
                    self.assembler.install_map(&tour.name, file)?;
                }
                tour
            }
            IngestMode::Add => {
                self.assembler
                    .add_to_tour_from_multires(&request.tour_name, &meta, request.north_offset)
                    .await?
            }
        };
        self.monitor.log_stats("Assemble");
        self.monitor.log_final_stats();

        tracing::info!(
            "✅ Tour {} ready with {} scenes (version {})",
            tour.name,
            tour.scenes.len(),
            tour.version
        );
        Ok(tour)
    }

    /// Ledger entries from earlier conversions, overridden by fresh ones.
    fn merged_meta(&self, tour_name: &str, fresh: PhotoMetaMap) -> PhotoMetaMap {
        let mut meta = match self.assembler.load_photo_meta(tour_name) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Ignoring unreadable photo metadata for {}: {}", tour_name, e);
                PhotoMetaMap::new()
            }
        };
        meta.extend(fresh);
        meta
    }
}
