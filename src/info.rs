//! Frame statistics.

use crate::driver::DrawMode;

/// Counters for the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Draw calls issued this frame
    pub calls: u32,

    /// Triangles submitted this frame (instances included)
    pub triangles: u32,

    /// Line segments submitted this frame
    pub lines: u32,

    /// Points submitted this frame
    pub points: u32,

    /// Draws skipped because their program is not runnable
    pub skipped: u32,

    /// Programs alive in the cache after the frame
    pub programs: u32,

    /// Frames rendered since the renderer was created
    pub frame: u64,
}

impl RenderInfo {
    /// Clears the per-frame counters and advances the frame number.
    pub fn begin_frame(&mut self) {
        *self = Self {
            programs: self.programs,
            frame: self.frame + 1,
            ..Self::default()
        };
    }

    /// Accounts for one draw of `count` vertices (or indices).
    pub fn record_draw(&mut self, mode: DrawMode, count: u32, instances: u32) {
        self.calls += 1;
        let primitives = match mode {
            DrawMode::Triangles => count / 3,
            DrawMode::Lines => count / 2,
            DrawMode::LineStrip => count.saturating_sub(1),
            DrawMode::LineLoop | DrawMode::Points => count,
        };
        let primitives = primitives * instances.max(1);
        match mode {
            DrawMode::Triangles => self.triangles += primitives,
            DrawMode::Lines | DrawMode::LineStrip | DrawMode::LineLoop => self.lines += primitives,
            DrawMode::Points => self.points += primitives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_counts() {
        let mut info = RenderInfo::default();
        info.record_draw(DrawMode::Triangles, 36, 1);
        info.record_draw(DrawMode::Triangles, 6, 3);
        info.record_draw(DrawMode::LineStrip, 5, 1);
        info.record_draw(DrawMode::Points, 10, 1);
        assert_eq!(info.calls, 4);
        assert_eq!(info.triangles, 18);
        assert_eq!(info.lines, 4);
        assert_eq!(info.points, 10);

        info.programs = 2;
        info.begin_frame();
        assert_eq!(info.calls, 0);
        assert_eq!(info.programs, 2);
        assert_eq!(info.frame, 1);
    }
}
