use core_events::{SpriteCommand, SPRITE_BATCH_IDLE, SPRITE_BATCH_MAX_ENTRIES};
use core_value::{BasicError, ErrorCode};
use std::collections::HashMap;
use std::time::Instant;

/// Highest sprite id a program may use; bounds the registry's memory
/// footprint the same way the FOR/GOSUB stacks are depth-bounded.
pub const MAX_SPRITE_ID: u32 = 255;

struct SpriteState {
    x: f64,
    y: f64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    visible: bool,
}

impl SpriteState {
    fn bbox(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.width as f64, self.y + self.height as f64)
    }
}

/// Pixel cache behind `SPRITE`/`SPRITE UPDATE`/`SPRITE VIRTUAL`, also
/// answering `COLLISION(id[, other])` queries (spec.md §4.I: bounding-box
/// overlap first, then overlapping non-zero pixel).
#[derive(Default)]
pub struct SpriteRegistry {
    sprites: HashMap<u32, SpriteState>,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_id(id: u32) -> Result<(), BasicError> {
        if id > MAX_SPRITE_ID {
            return Err(BasicError::new(ErrorCode::IllegalArgument, format!("sprite id {id} exceeds the maximum of {MAX_SPRITE_ID}")));
        }
        Ok(())
    }

    pub fn define(&mut self, id: u32, width: u32, height: u32, pixels: Vec<u8>) -> Result<(), BasicError> {
        Self::check_id(id)?;
        if pixels.len() != (width * height) as usize {
            return Err(BasicError::new(
                ErrorCode::IllegalArgument,
                format!("sprite {id} pixel data length {} does not match {width}x{height}", pixels.len()),
            ));
        }
        self.sprites.insert(id, SpriteState { x: 0.0, y: 0.0, width, height, pixels, visible: true });
        Ok(())
    }

    pub fn update(&mut self, id: u32, x: f64, y: f64, visible: bool) -> Result<(), BasicError> {
        let sprite = self
            .sprites
            .get_mut(&id)
            .ok_or_else(|| BasicError::new(ErrorCode::IllegalArgument, format!("sprite {id} has not been defined")))?;
        sprite.x = x;
        sprite.y = y;
        sprite.visible = visible;
        Ok(())
    }

    /// `COLLISION(id)` tests against every other visible sprite;
    /// `COLLISION(id, other)` tests against exactly one.
    pub fn collision(&self, id: u32, other: Option<u32>) -> Result<bool, BasicError> {
        let a = self.sprites.get(&id).ok_or_else(|| BasicError::new(ErrorCode::IllegalArgument, format!("sprite {id} has not been defined")))?;
        if !a.visible {
            return Ok(false);
        }
        match other {
            Some(other_id) => {
                let b = self
                    .sprites
                    .get(&other_id)
                    .ok_or_else(|| BasicError::new(ErrorCode::IllegalArgument, format!("sprite {other_id} has not been defined")))?;
                Ok(b.visible && sprites_collide(a, b))
            }
            None => Ok(self.sprites.iter().any(|(&oid, b)| oid != id && b.visible && sprites_collide(a, b))),
        }
    }
}

fn sprites_collide(a: &SpriteState, b: &SpriteState) -> bool {
    let (ax0, ay0, ax1, ay1) = a.bbox();
    let (bx0, by0, bx1, by1) = b.bbox();
    if ax1 <= bx0 || bx1 <= ax0 || ay1 <= by0 || by1 <= ay0 {
        return false;
    }
    let ox0 = ax0.max(bx0).floor() as i64;
    let oy0 = ay0.max(by0).floor() as i64;
    let ox1 = ax1.min(bx1).ceil() as i64;
    let oy1 = ay1.min(by1).ceil() as i64;
    for py in oy0..oy1 {
        for px in ox0..ox1 {
            let a_local_x = px - a.x as i64;
            let a_local_y = py - a.y as i64;
            let b_local_x = px - b.x as i64;
            let b_local_y = py - b.y as i64;
            if let (Some(av), Some(bv)) = (
                pixel_at(&a.pixels, a.width, a.height, a_local_x, a_local_y),
                pixel_at(&b.pixels, b.width, b.height, b_local_x, b_local_y),
            ) {
                if av != 0 && bv != 0 {
                    return true;
                }
            }
        }
    }
    false
}

fn pixel_at(pixels: &[u8], width: u32, height: u32, x: i64, y: i64) -> Option<u8> {
    if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
        return None;
    }
    pixels.get((y as u32 * width + x as u32) as usize).copied()
}

/// Batches `SpriteCommand`s emitted in one program, flushing at
/// `SPRITE_BATCH_MAX_ENTRIES` entries or after `SPRITE_BATCH_IDLE` of no
/// new pushes (spec.md §4.I). The idle window is checked by the caller
/// (the cooperative execution loop, which already polls for cancellation
/// on a similar cadence) via `flush_if_idle`.
pub struct MessageBatcher {
    pending: Vec<SpriteCommand>,
    last_push: Instant,
}

impl MessageBatcher {
    pub fn new() -> Self {
        Self { pending: Vec::new(), last_push: Instant::now() }
    }

    /// Returns the batch to flush immediately if this push reached the
    /// size threshold, otherwise `None`.
    pub fn push(&mut self, cmd: SpriteCommand) -> Option<Vec<SpriteCommand>> {
        self.pending.push(cmd);
        self.last_push = Instant::now();
        if self.pending.len() >= SPRITE_BATCH_MAX_ENTRIES {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    pub fn flush_if_idle(&mut self, now: Instant) -> Option<Vec<SpriteCommand>> {
        if !self.pending.is_empty() && now.duration_since(self.last_push) >= SPRITE_BATCH_IDLE {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<Vec<SpriteCommand>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

impl Default for MessageBatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_overlapping_bounding_boxes_never_collide() {
        let mut reg = SpriteRegistry::new();
        reg.define(1, 4, 4, vec![1; 16]).unwrap();
        reg.define(2, 4, 4, vec![1; 16]).unwrap();
        reg.update(1, 0.0, 0.0, true).unwrap();
        reg.update(2, 100.0, 100.0, true).unwrap();
        assert!(!reg.collision(1, Some(2)).unwrap());
    }

    #[test]
    fn overlapping_boxes_collide_only_where_both_pixels_are_opaque() {
        let mut reg = SpriteRegistry::new();
        let mut p1 = vec![0u8; 16];
        p1[15] = 1; // bottom-right pixel only
        let mut p2 = vec![0u8; 16];
        p2[0] = 1; // top-left pixel only
        reg.define(1, 4, 4, p1).unwrap();
        reg.define(2, 4, 4, p2).unwrap();
        reg.update(1, 0.0, 0.0, true).unwrap();
        reg.update(2, 3.0, 3.0, true).unwrap(); // boxes overlap only at one cell, which is opaque on both
        assert!(reg.collision(1, Some(2)).unwrap());
    }

    #[test]
    fn invisible_sprite_never_reports_collision() {
        let mut reg = SpriteRegistry::new();
        reg.define(1, 2, 2, vec![1; 4]).unwrap();
        reg.define(2, 2, 2, vec![1; 4]).unwrap();
        reg.update(1, 0.0, 0.0, false).unwrap();
        reg.update(2, 0.0, 0.0, true).unwrap();
        assert!(!reg.collision(1, Some(2)).unwrap());
    }

    #[test]
    fn batcher_flushes_at_max_entries() {
        let mut batcher = MessageBatcher::new();
        let mut flushed = None;
        for _ in 0..SPRITE_BATCH_MAX_ENTRIES {
            flushed = batcher.push(SpriteCommand::UpdateSprite { id: 1, x: 0.0, y: 0.0, rotation_rad: 0.0, visible: true });
        }
        assert_eq!(flushed.unwrap().len(), SPRITE_BATCH_MAX_ENTRIES);
    }

    #[test]
    fn sprite_id_beyond_ceiling_is_rejected() {
        let mut reg = SpriteRegistry::new();
        assert!(reg.define(MAX_SPRITE_ID + 1, 1, 1, vec![1]).is_err());
    }
}
