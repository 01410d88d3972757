//! Issuing layer content into render targets.

use common::geometry::{IRect, Rect, Transform};
use common::{HoistError, HoistResult, LayerKey};
use gpu::TextureId;
use scene::{Canvas, Color, Scene};
use std::collections::HashSet;

/// One layer to render.
pub struct PaintJob<'a> {
    pub key: LayerKey,
    pub scene: &'a Scene,
    pub layer: u32,
    /// Texture being rendered into.
    pub target: TextureId,
    /// Region of `target` reserved for the layer.
    pub dst: IRect,
    /// Maps the layer's scene coordinates into `dst`.
    pub transform: Transform,
}

/// Executes the drawing commands of hoisted layers.
///
/// Layers sharing a target are rendered within one pass.
pub trait LayerPainter {
    fn begin_pass(&mut self, target: TextureId) -> HoistResult<()>;

    fn paint_layer(&mut self, job: &PaintJob<'_>) -> HoistResult<()>;

    fn end_pass(&mut self);
}

/// A command recorded by [`RecordingPainter`].
#[derive(Clone, Debug, PartialEq)]
pub enum PaintCommand {
    BeginPass(TextureId),
    Clear { target: TextureId, rect: IRect },
    Fill { target: TextureId, rect: Rect, color: Color },
    EndPass,
}

/// Painter that records commands instead of submitting them to a device.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    commands: Vec<PaintCommand>,
    painted: Vec<LayerKey>,
    failing_layers: HashSet<LayerKey>,
    failing_passes: usize,
    in_pass: Option<TextureId>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every paint of `key` fail.
    pub fn fail_layer(&mut self, key: LayerKey) {
        self.failing_layers.insert(key);
    }

    /// Make the next `count` passes fail to begin.
    pub fn fail_next_passes(&mut self, count: usize) {
        self.failing_passes = count;
    }

    pub fn commands(&self) -> &[PaintCommand] {
        &self.commands
    }

    /// Layers painted successfully, in order.
    pub fn painted(&self) -> &[LayerKey] {
        &self.painted
    }

    pub fn passes(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PaintCommand::BeginPass(_)))
            .count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.painted.clear();
    }
}

struct TargetCanvas<'a> {
    target: TextureId,
    commands: &'a mut Vec<PaintCommand>,
}

impl Canvas for TargetCanvas<'_> {
    fn fill_rect(&mut self, rect: Rect, color: Color, ctm: &Transform) {
        self.commands.push(PaintCommand::Fill {
            target: self.target,
            rect: ctm.transform_rect(rect),
            color,
        });
    }
}

impl LayerPainter for RecordingPainter {
    fn begin_pass(&mut self, target: TextureId) -> HoistResult<()> {
        if self.failing_passes > 0 {
            self.failing_passes -= 1;
            return Err(HoistError::render(format!("could not begin pass on {target}")));
        }
        self.in_pass = Some(target);
        self.commands.push(PaintCommand::BeginPass(target));
        Ok(())
    }

    fn paint_layer(&mut self, job: &PaintJob<'_>) -> HoistResult<()> {
        if self.in_pass != Some(job.target) {
            return Err(HoistError::invalid(format!("no pass open on {}", job.target)));
        }
        if self.failing_layers.contains(&job.key) {
            return Err(HoistError::render(format!("failed to paint {}", job.key)));
        }

        // Record into a scratch list so a missing layer leaves no trace.
        let mut recorded = vec![PaintCommand::Clear { target: job.target, rect: job.dst }];
        let mut canvas = TargetCanvas {
            target: job.target,
            commands: &mut recorded,
        };
        if !job.scene.playback_layer(job.layer, &job.transform, &mut canvas) {
            return Err(HoistError::render(format!("{} not found in scene", job.key)));
        }
        self.commands.extend(recorded);
        self.painted.push(job.key);
        Ok(())
    }

    fn end_pass(&mut self) {
        if self.in_pass.take().is_some() {
            self.commands.push(PaintCommand::EndPass);
        }
    }
}
