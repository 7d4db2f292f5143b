//! External I/O commands (spec component I): `PRINT`/`INPUT` formatting,
//! color resolution, sprite/collision state, batched sprite message
//! emission, and the file-handle table behind `OPEN`/`CLOSE`/`PRINT#`/
//! `INPUT#`/`LINE INPUT#`/`EOF`.

mod color;
mod files;
mod print;
mod sprite;

pub use color::resolve_color;
pub use files::{normalize_program_filename, FileMode, FileSystem, FileTable, StdFileSystem};
pub use print::{format_print, PrintSep};
pub use sprite::{MessageBatcher, SpriteRegistry, MAX_SPRITE_ID};

use core_events::VectorCommand;

/// Rotation commands carry degrees at the BASIC call site but radians on
/// the wire (spec.md §4.I: "rotations convert degrees -> radians at emit
/// time").
pub fn degrees_to_radians(deg: f64) -> f64 {
    deg.to_radians()
}

/// Builds the `UPDATE_VECTOR` message for `VECTOR`/`PYRAMID`/`CYLINDER`/
/// `VECFLOOR`/`VECNODE`, converting the rotation triple at the boundary so
/// every caller passes degrees the way a BASIC author would type them.
#[allow(clippy::too_many_arguments)]
pub fn update_vector_command(
    id: u32,
    shape: &str,
    x: f64,
    y: f64,
    z: f64,
    rotation_deg: (f64, f64, f64),
    scale: f64,
    visible: bool,
    brightness: u8,
    custom: Option<serde_json::Value>,
) -> VectorCommand {
    VectorCommand::UpdateVector {
        id,
        shape: shape.to_string(),
        x,
        y,
        z,
        rotation_rad: (
            degrees_to_radians(rotation_deg.0),
            degrees_to_radians(rotation_deg.1),
            degrees_to_radians(rotation_deg.2),
        ),
        scale,
        visible,
        brightness,
        custom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_to_radians_matches_std_conversion() {
        assert!((degrees_to_radians(180.0) - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn update_vector_command_converts_all_three_rotation_axes() {
        let cmd = update_vector_command(1, "CUBE", 0.0, 0.0, 0.0, (90.0, 0.0, 180.0), 1.0, true, 15, None);
        match cmd {
            VectorCommand::UpdateVector { rotation_rad, .. } => {
                assert!((rotation_rad.0 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
                assert!((rotation_rad.2 - std::f64::consts::PI).abs() < 1e-12);
            }
        }
    }
}
