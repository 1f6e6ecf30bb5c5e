//! Deterministic scenarios exercising the viewer runtime.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIM-001: generate, autoplay to the end, restart and seek
    SolarSystem,

    /// SIM-002: a new document lands while the old one is playing
    MidSwap,

    /// SIM-003: seeded random pointer, wheel, zoom and preset input
    CameraStorm,

    /// SIM-004: garbage values, unknown actors and unparseable responses
    MalformedDocument,

    /// SIM-005: a document without steps
    EmptyTimeline,

    /// SIM-006: assistant failures, empty replies and overlapping sends
    ChatOutage,

    /// SIM-007: generator failures keep the previous scene
    GenerationFailure,

    /// SIM-008: overlapping generations, only the latest may land
    StaleGeneration,
}

impl ScenarioId {
    /// Returns all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SolarSystem,
            ScenarioId::MidSwap,
            ScenarioId::CameraStorm,
            ScenarioId::MalformedDocument,
            ScenarioId::EmptyTimeline,
            ScenarioId::ChatOutage,
            ScenarioId::GenerationFailure,
            ScenarioId::StaleGeneration,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SolarSystem => "solar_system",
            ScenarioId::MidSwap => "mid_swap",
            ScenarioId::CameraStorm => "camera_storm",
            ScenarioId::MalformedDocument => "malformed_document",
            ScenarioId::EmptyTimeline => "empty_timeline",
            ScenarioId::ChatOutage => "chat_outage",
            ScenarioId::GenerationFailure => "generation_failure",
            ScenarioId::StaleGeneration => "stale_generation",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SolarSystem => "Four-step orbit: autoplay, camera focus, restart, seek clamping",
            ScenarioId::MidSwap => "Replace the document mid-playback, old deadlines must not fire",
            ScenarioId::CameraStorm => "Extreme drag/wheel/zoom input, clamps hold and presets converge",
            ScenarioId::MalformedDocument => "Coercion of bad values, skipped actions, parse failures",
            ScenarioId::EmptyTimeline => "No steps: play is a no-op and the chrome shows placeholders",
            ScenarioId::ChatOutage => "Assistant failures become fallback replies, one send at a time",
            ScenarioId::GenerationFailure => "Failed generations surface an error and keep the old scene",
            ScenarioId::StaleGeneration => "Overlapping generations, stale responses are dropped",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solar_system" | "solarsystem" | "sim-001" => Ok(ScenarioId::SolarSystem),
            "mid_swap" | "midswap" | "sim-002" => Ok(ScenarioId::MidSwap),
            "camera_storm" | "camerastorm" | "sim-003" => Ok(ScenarioId::CameraStorm),
            "malformed_document" | "malformed" | "sim-004" => Ok(ScenarioId::MalformedDocument),
            "empty_timeline" | "emptytimeline" | "sim-005" => Ok(ScenarioId::EmptyTimeline),
            "chat_outage" | "chatoutage" | "sim-006" => Ok(ScenarioId::ChatOutage),
            "generation_failure" | "generationfailure" | "sim-007" => Ok(ScenarioId::GenerationFailure),
            "stale_generation" | "stalegeneration" | "sim-008" => Ok(ScenarioId::StaleGeneration),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("SIM-004".parse::<ScenarioId>(), Ok(ScenarioId::MalformedDocument));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
