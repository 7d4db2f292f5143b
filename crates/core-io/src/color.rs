use core_events::Color;
use core_value::{BasicError, ErrorCode, Value};

/// Resolves a `PLOT`/`LINE`/`RECT`/`CIRCLE` color argument. A numeric 0–15
/// brightness is converted to a hex gray string at this boundary, so every
/// `Color` the rest of the system ever constructs is already in its final
/// emit form; a string argument passes through as a named color unless it
/// already looks like a hex string.
pub fn resolve_color(v: &Value) -> Result<Color, BasicError> {
    match v {
        Value::Num(n) => {
            let level = *n as i64;
            if !(0..=15).contains(&level) {
                return Err(BasicError::new(ErrorCode::IllegalArgument, "color brightness must be 0-15"));
            }
            Ok(Color::Hex(brightness_to_hex(level as u8)))
        }
        Value::Str(s) => {
            if s.starts_with('#') {
                Ok(Color::Hex(s.to_string()))
            } else {
                Ok(Color::Named(s.to_string()))
            }
        }
    }
}

fn brightness_to_hex(level: u8) -> String {
    let value = (level as u32 * 255 / 15) as u8;
    format!("#{value:02X}{value:02X}{value:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_zero_and_max_map_to_black_and_white() {
        assert_eq!(resolve_color(&Value::Num(0.0)).unwrap(), Color::Hex("#000000".into()));
        assert_eq!(resolve_color(&Value::Num(15.0)).unwrap(), Color::Hex("#FFFFFF".into()));
    }

    #[test]
    fn out_of_range_brightness_is_rejected() {
        assert!(resolve_color(&Value::Num(16.0)).is_err());
        assert!(resolve_color(&Value::Num(-1.0)).is_err());
    }

    #[test]
    fn string_colors_pass_through_named_or_hex() {
        assert_eq!(resolve_color(&Value::Str("RED".into())).unwrap(), Color::Named("RED".into()));
        assert_eq!(resolve_color(&Value::Str("#112233".into())).unwrap(), Color::Hex("#112233".into()));
    }
}
