//! Presentation side of the pacer

use crate::frame::Frame;

/// Capability flags reported by a [`Renderer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RendererAttributes(u32);

impl RendererAttributes {
    pub const NONE: Self = Self(0);
    /// Presentation calls must happen on the embedding application's thread
    pub const REQUIRES_MAIN_THREAD: Self = Self(1 << 0);
    /// The renderer can present on demand on a variable refresh display
    pub const VRR_TIMING: Self = Self(1 << 1);
    /// Pace frames even if the user did not ask for it (e.g. vsync is on and
    /// the presentation call would otherwise block the render thread)
    pub const FORCE_PACING: Self = Self(1 << 2);
    /// The renderer does not buffer frames in the graphics pipeline
    pub const NO_BUFFERING: Self = Self(1 << 3);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for RendererAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for RendererAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Presents decoded frames
///
/// Implementations are shared between the pacer and its render thread, hence
/// `&self` receivers; keep any GPU state behind interior mutability.
pub trait Renderer: Send + Sync {
    /// Present one frame. A failure only affects this frame.
    fn render_frame(&self, frame: &Frame) -> anyhow::Result<()>;

    fn attributes(&self) -> RendererAttributes;

    /// Called right before every `render_frame`
    fn prepare_to_render(&self) {}
}
