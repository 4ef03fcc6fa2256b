//! External pretrained mask-generation model.
//!
//! The composite is rendered to a visual tile in the run's scratch directory,
//! handed to a configurable command, and the mask image it writes is read back
//! as a label raster on the composite grid.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agriboundary_core::error::{BoundaryError, Result, Stage};
use agriboundary_core::models::{
    Composite, Device, LabelRaster, MaskMode, ModelVariant, SegmentationOutput,
    SegmentationParameters, NO_LABEL,
};
use agriboundary_core::ports::Segmenter;
use async_trait::async_trait;
use image::DynamicImage;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::tile::write_visual_tile;

const TILE_FILE: &str = "tile.png";
const MASK_FILE: &str = "mask.png";
const STDERR_TAIL_LINES: usize = 20;

const OOM_MARKERS: [&str; 4] =
    ["out of memory", "outofmemoryerror", "memoryerror", "cannot allocate memory"];

/// Runs `<program> [args..] --input --output --model --device --mode`
#[derive(Debug, Clone)]
pub struct ModelSegmenter {
    program: String,
    args: Vec<String>,
}

impl ModelSegmenter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Split a whitespace-separated command line such as `python segment_masks.py`
    pub fn from_command(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| BoundaryError::ConfigInvalid {
            key: "model_command".to_string(),
            reason: "Model command is empty".to_string(),
        })?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(
        &self,
        input: &Path,
        output: &Path,
        variant: ModelVariant,
        device: Device,
        mode: MaskMode,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .arg("--model")
            .arg(variant.as_str())
            .arg("--device")
            .arg(device.as_str())
            .arg("--mode")
            .arg(mode.as_str())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Segmenter for ModelSegmenter {
    async fn segment(
        &self,
        composite: &Composite,
        params: &SegmentationParameters,
        scratch: &Path,
    ) -> Result<SegmentationOutput> {
        let SegmentationParameters::Model { variant, device, mode } = params else {
            return Err(BoundaryError::invalid(
                "backend",
                format!("the model backend cannot run with {} parameters", params.backend()),
            ));
        };
        let device = resolve_device(*device);

        let tile = scratch.join(TILE_FILE);
        let mask = scratch.join(MASK_FILE);
        write_visual_tile(composite, &tile)?;

        info!(
            program = %self.program,
            model = %variant,
            device = %device,
            "Running mask generation"
        );
        let output = self
            .command(&tile, &mask, *variant, device, *mode)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, *variant, output.status.code()));
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Model finished");

        let labels = read_mask(&mask, composite)?;
        info!(masks = labels.unique_labels().len(), "Read model masks");
        Ok(SegmentationOutput::Labels(labels))
    }

    fn name(&self) -> &str {
        "pretrained model"
    }
}

impl ModelSegmenter {
    fn spawn_error(&self, e: std::io::Error) -> BoundaryError {
        let reason = if e.kind() == ErrorKind::NotFound {
            format!("model program '{}' was not found", self.program)
        } else {
            format!("failed to start '{}': {}", self.program, e)
        };
        BoundaryError::service(Stage::Segmentation, "pretrained model", reason)
    }
}

/// GPU when one is visible to this process, CPU otherwise
pub fn resolve_device(device: Device) -> Device {
    match device {
        Device::Auto => {
            let visible = std::env::var("CUDA_VISIBLE_DEVICES")
                .map(|v| !v.trim().is_empty() && v.trim() != "-1")
                .unwrap_or(false);
            if visible || Path::new("/dev/nvidia0").exists() {
                Device::Cuda
            } else {
                Device::Cpu
            }
        }
        explicit => explicit,
    }
}

/// Map a failed run to a segmentation error, recognising memory exhaustion
pub fn classify_failure(stderr: &str, variant: ModelVariant, code: Option<i32>) -> BoundaryError {
    let lower = stderr.to_lowercase();
    if OOM_MARKERS.iter().any(|m| lower.contains(m)) {
        let remediation = match variant.smaller() {
            Some(smaller) => format!(
                "Reduce the area or choose a smaller model variant (try {})",
                smaller
            ),
            None => "Reduce the area or choose a smaller model variant, or run on a device \
                     with more memory"
                .to_string(),
        };
        warn!(model = %variant, "Model ran out of memory");
        return BoundaryError::SegmentationFailure {
            reason: format!("{} ran out of memory", variant),
            remediation,
        };
    }

    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
    BoundaryError::SegmentationFailure {
        reason: format!(
            "model exited with {}: {}",
            code.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()),
            tail.trim()
        ),
        remediation: "Check the model command and its Python environment".to_string(),
    }
}

/// Read an 8- or 16-bit grayscale mask; pixel value is the mask id, 0 is background
pub fn read_mask(path: &Path, composite: &Composite) -> Result<LabelRaster> {
    let image = image::open(path).map_err(|e| BoundaryError::SegmentationFailure {
        reason: format!("Failed to read mask {}: {}", path.display(), e),
        remediation: "Check that the model writes a PNG mask to --output".to_string(),
    })?;

    let grid = &composite.grid;
    if (image.width() as usize, image.height() as usize) != (grid.width, grid.height) {
        return Err(BoundaryError::SegmentationFailure {
            reason: format!(
                "mask is {}x{} but the tile is {}x{}",
                image.width(),
                image.height(),
                grid.width,
                grid.height
            ),
            remediation: "Check that the backend writes masks at the tile resolution".to_string(),
        });
    }

    let mut labels: Vec<u32> = match image {
        DynamicImage::ImageLuma8(img) => img.into_raw().into_iter().map(u32::from).collect(),
        DynamicImage::ImageLuma16(img) => img.into_raw().into_iter().map(u32::from).collect(),
        other => other.into_luma16().into_raw().into_iter().map(u32::from).collect(),
    };

    for (idx, label) in labels.iter_mut().enumerate() {
        if !composite.is_valid(idx) {
            *label = NO_LABEL;
        }
    }

    LabelRaster::new(grid.clone(), labels)
}

/// Paths the segmenter materializes inside a scratch directory
pub fn scratch_files(scratch: &Path) -> [PathBuf; 2] {
    [scratch.join(TILE_FILE), scratch.join(MASK_FILE)]
}
