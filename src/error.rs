use crate::types::{Ball, Sphere};

/// Error type for contact and triangulation construction.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)] // All variants represent invalid input conditions
pub enum ContactsError {
    /// Probe radius must be positive and finite.
    InvalidProbe(f64),
    /// Contour subdivision step must be positive and finite.
    InvalidStep(f64),
    /// Number of projections onto the hyperboloid must be at least 1.
    InvalidProjections(usize),
    /// A ball has invalid coordinates or radius.
    InvalidBall {
        /// Index of the invalid ball.
        index: usize,
        /// Description of why the ball is invalid.
        reason: &'static str,
    },
    /// Triangulation without an artificial boundary needs at least four spheres.
    NotEnoughBalls { required: usize, found: usize },
}

impl std::fmt::Display for ContactsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProbe(v) => {
                write!(f, "invalid probe radius: {v} (must be positive and finite)")
            }
            Self::InvalidStep(v) => {
                write!(f, "invalid step: {v} (must be positive and finite)")
            }
            Self::InvalidProjections(v) => {
                write!(f, "invalid number of projections: {v} (must be at least 1)")
            }
            Self::InvalidBall { index, reason } => {
                write!(f, "invalid ball at index {index}: {reason}")
            }
            Self::NotEnoughBalls { required, found } => {
                write!(f, "not enough balls: {found} given, at least {required} required")
            }
        }
    }
}

impl std::error::Error for ContactsError {}

pub(crate) fn validate_probe(probe: f64) -> Result<(), ContactsError> {
    if !probe.is_finite() || probe <= 0.0 {
        return Err(ContactsError::InvalidProbe(probe));
    }
    Ok(())
}

pub(crate) fn validate_contour_params(step: f64, projections: usize) -> Result<(), ContactsError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(ContactsError::InvalidStep(step));
    }
    if projections < 1 {
        return Err(ContactsError::InvalidProjections(projections));
    }
    Ok(())
}

/// Validate input balls.
pub(crate) fn validate_balls(balls: &[Ball]) -> Result<(), ContactsError> {
    for (i, ball) in balls.iter().enumerate() {
        if !ball.x.is_finite() || !ball.y.is_finite() || !ball.z.is_finite() {
            return Err(ContactsError::InvalidBall {
                index: i,
                reason: "coordinates must be finite",
            });
        }
        if !ball.r.is_finite() || ball.r <= 0.0 {
            return Err(ContactsError::InvalidBall {
                index: i,
                reason: "radius must be positive and finite",
            });
        }
    }
    Ok(())
}

/// Validate generator spheres; zero radii are allowed.
pub(crate) fn validate_spheres(spheres: &[Sphere]) -> Result<(), ContactsError> {
    for (i, s) in spheres.iter().enumerate() {
        if !s.center.coords.iter().all(|c| c.is_finite()) {
            return Err(ContactsError::InvalidBall {
                index: i,
                reason: "coordinates must be finite",
            });
        }
        if !s.r.is_finite() || s.r < 0.0 {
            return Err(ContactsError::InvalidBall {
                index: i,
                reason: "radius must be non-negative and finite",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(validate_probe(0.0), Err(ContactsError::InvalidProbe(0.0)));
        assert!(validate_probe(f64::NAN).is_err());
        assert!(validate_probe(1.4).is_ok());
        assert_eq!(validate_contour_params(-0.1, 5), Err(ContactsError::InvalidStep(-0.1)));
        assert_eq!(validate_contour_params(0.2, 0), Err(ContactsError::InvalidProjections(0)));
    }

    #[test]
    fn rejects_bad_balls() {
        let balls = [Ball::new(0.0, 0.0, 0.0, 1.0), Ball::new(f64::INFINITY, 0.0, 0.0, 1.0)];
        let err = validate_balls(&balls).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid ball at index 1: coordinates must be finite"
        );
        assert!(validate_spheres(&[Sphere::from_coords(0.0, 0.0, 0.0, 0.0)]).is_ok());
        assert!(validate_spheres(&[Sphere::from_coords(0.0, 0.0, 0.0, -1.0)]).is_err());
    }
}
