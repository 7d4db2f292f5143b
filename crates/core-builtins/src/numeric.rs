use core_value::{BasicError, ErrorCode};

pub fn abs(n: f64) -> f64 {
    n.abs()
}

/// Classic BASIC `SGN`: -1, 0, or 1.
pub fn sgn(n: f64) -> f64 {
    if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn int(n: f64) -> f64 {
    n.floor()
}

pub fn sin(n: f64) -> f64 {
    n.sin()
}
pub fn cos(n: f64) -> f64 {
    n.cos()
}
pub fn tan(n: f64) -> f64 {
    n.tan()
}
/// `ATN` is the classic-BASIC name for arctangent; `ATAN` is accepted as a
/// synonym since both appear in the function-name table.
pub fn atn(n: f64) -> f64 {
    n.atan()
}

pub fn asin(n: f64) -> f64 {
    n.asin()
}
pub fn acos(n: f64) -> f64 {
    n.acos()
}

pub fn exp(n: f64) -> f64 {
    n.exp()
}

pub fn log(n: f64) -> Result<f64, BasicError> {
    if n <= 0.0 {
        return Err(BasicError::new(ErrorCode::IllegalArgument, "LOG argument must be positive"));
    }
    Ok(n.ln())
}

pub fn log10(n: f64) -> Result<f64, BasicError> {
    if n <= 0.0 {
        return Err(BasicError::new(ErrorCode::IllegalArgument, "LOG10 argument must be positive"));
    }
    Ok(n.log10())
}

pub fn sqr(n: f64) -> Result<f64, BasicError> {
    if n < 0.0 {
        return Err(BasicError::new(ErrorCode::IllegalArgument, "SQR argument must be non-negative"));
    }
    Ok(n.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgn_matches_classic_three_way_sign() {
        assert_eq!(sgn(5.0), 1.0);
        assert_eq!(sgn(-5.0), -1.0);
        assert_eq!(sgn(0.0), 0.0);
    }

    #[test]
    fn int_floors_toward_negative_infinity() {
        assert_eq!(int(3.9), 3.0);
        assert_eq!(int(-3.1), -4.0);
    }

    #[test]
    fn log_rejects_non_positive_input() {
        assert!(log(0.0).is_err());
        assert!(log(-1.0).is_err());
        assert!(log(1.0).is_ok());
    }

    #[test]
    fn sqr_rejects_negative_input() {
        assert!(sqr(-1.0).is_err());
        assert_eq!(sqr(4.0).unwrap(), 2.0);
    }
}
