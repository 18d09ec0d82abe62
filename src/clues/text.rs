use std::fmt::Write as _;

use thiserror::Error;

use super::geo::{bearing_degrees, compass_point, haversine_meters};
use crate::catalog::ClueType;
use crate::game::TeamLocation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClueTextError {
    #[error("clue type {0} has no text generator")]
    Unsupported(String),

    #[error("clue generator failed: {0}")]
    Failed(String),
}

/// A hider team the clue is about
#[derive(Debug, Clone, PartialEq)]
pub struct HiderSighting {
    pub team_id: String,
    pub team_name: String,
    pub location: TeamLocation,
}

#[derive(Debug, Clone, Copy)]
pub struct ClueRequest<'a> {
    pub clue_type: &'a ClueType,
    pub seeker: &'a TeamLocation,
    pub hiders: &'a [HiderSighting],
}

/// Produces clue text for a purchase. Any error is reported to the buyer and
/// leaves the game unchanged.
pub trait ClueTextGenerator: Send + Sync {
    fn generate_clue_text(&self, request: &ClueRequest<'_>) -> Result<String, ClueTextError>;
}

/// Geometry based clue text for the location, direction and distance clue types
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardClueText;

impl StandardClueText {
    fn exact_location(hiders: &[HiderSighting]) -> String {
        match hiders {
            [only] => format!(
                "Exact location of {}: {:.6}, {:.6}",
                only.team_name, only.location.latitude, only.location.longitude
            ),
            _ => {
                let mut text = format!("Exact locations of {} hiders:", hiders.len());
                for (i, hider) in hiders.iter().enumerate() {
                    let _ = write!(
                        text,
                        "\n{}. {}: {:.6}, {:.6}",
                        i + 1,
                        hider.team_name,
                        hider.location.latitude,
                        hider.location.longitude
                    );
                }
                text
            }
        }
    }

    fn relative_direction(seeker: &TeamLocation, hiders: &[HiderSighting]) -> String {
        let describe = |hider: &HiderSighting| {
            let bearing = bearing_degrees(
                seeker.latitude,
                seeker.longitude,
                hider.location.latitude,
                hider.location.longitude,
            );
            let distance = distance_to(seeker, hider);
            (compass_point(bearing), distance)
        };

        match hiders {
            [only] => {
                let (direction, _) = describe(only);
                format!(
                    "The hider ({}) is generally to the {} of your current position.",
                    only.team_name, direction
                )
            }
            _ => {
                let mut text = format!("Found {} hiders within range:", hiders.len());
                for hider in hiders {
                    let (direction, distance) = describe(hider);
                    let _ = write!(text, "\n• {}: {} ({:.0}m away)", hider.team_name, direction, distance);
                }
                text
            }
        }
    }

    fn distance(seeker: &TeamLocation, hiders: &[HiderSighting]) -> String {
        match hiders {
            [only] => format!(
                "Your distance to the hider ({}) is approximately {:.0} meters.",
                only.team_name,
                distance_to(seeker, only)
            ),
            _ => {
                let mut text = format!("Found {} hiders within range:", hiders.len());
                for hider in hiders {
                    let _ = write!(
                        text,
                        "\n• {}: {:.0}m away",
                        hider.team_name,
                        distance_to(seeker, hider)
                    );
                }
                text
            }
        }
    }
}

pub(crate) fn distance_to(seeker: &TeamLocation, hider: &HiderSighting) -> f64 {
    haversine_meters(
        seeker.latitude,
        seeker.longitude,
        hider.location.latitude,
        hider.location.longitude,
    )
}

impl ClueTextGenerator for StandardClueText {
    fn generate_clue_text(&self, request: &ClueRequest<'_>) -> Result<String, ClueTextError> {
        if request.hiders.is_empty() {
            return Err(ClueTextError::Failed("no hiders to describe".to_string()));
        }

        match request.clue_type.id.as_str() {
            "exact-location" => Ok(Self::exact_location(request.hiders)),
            "relative-direction" => Ok(Self::relative_direction(request.seeker, request.hiders)),
            "distance-from-seekers" => Ok(Self::distance(request.seeker, request.hiders)),
            other => Err(ClueTextError::Unsupported(other.to_string())),
        }
    }
}
