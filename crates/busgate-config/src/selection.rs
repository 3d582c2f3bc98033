use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Policy for completing a flow target when the caller leaves the server or
/// process unspecified.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TargetSelection {
    /// Pick a random live peer matching whatever half was specified.
    #[default]
    Random,
    /// Require both server and process; never guess.
    Explicit,
}

/// Error returned when a [`TargetSelection`] name is not recognised.
pub type TargetSelectionParseError = strum::ParseError;
