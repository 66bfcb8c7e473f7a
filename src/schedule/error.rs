use thiserror::Error;

/// Failures of the pure scheduling computations.
///
/// `SettingsPending` and `NoDate` are transient form states; the rest are
/// data or programming errors a normal UI flow never triggers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid operating window: {0}")]
    InvalidWindow(&'static str),
    #[error("facility slot settings not loaded yet")]
    SettingsPending,
    #[error("no valid date selected")]
    NoDate,
    #[error("invalid recurrence scope: {0}")]
    InvalidScope(&'static str),
}
