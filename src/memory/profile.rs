//! Heuristic profile extraction from free text

use crate::models::{Experience, Profile, RiskTolerance};

const EXPERIENCE_CUES: &[(&str, Experience)] = &[
    ("beginner", Experience::Beginner),
    ("intermediate", Experience::Intermediate),
    ("advanced", Experience::Advanced),
];

const RISK_CUES: &[(&str, RiskTolerance)] = &[
    ("aggressive", RiskTolerance::Aggressive),
    ("conservative", RiskTolerance::Conservative),
    ("moderate", RiskTolerance::Moderate),
];

/// Update profile attributes mentioned in the message. Later cues win.
pub fn update_profile(mut profile: Profile, message: &str) -> Profile {
    let text = message.to_lowercase();

    for (cue, experience) in EXPERIENCE_CUES {
        if text.contains(cue) {
            profile.experience = Some(*experience);
        }
    }

    for (cue, risk) in RISK_CUES {
        if text.contains(cue) {
            profile.risk_tolerance = Some(*risk);
        }
    }

    profile
}
