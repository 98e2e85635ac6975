use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::ApplicationError;

pub const MIN_TRIP_DAYS: u32 = 1;
pub const MAX_TRIP_DAYS: u32 = 21;
pub const MIN_BUDGET_USD: u32 = 100;
pub const MAX_BUDGET_USD: u32 = 20_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    pub num_days: u32,
    pub budget: u32,
    #[serde(default = "default_preferences")]
    pub preferences: String,
    pub start_date: NaiveDate,
}

fn default_preferences() -> String {
    "General sightseeing".to_string()
}

impl TripRequest {
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.destination.trim().is_empty() {
            return Err(ApplicationError::BadRequest("destination cannot be empty".to_string()));
        }
        if !(MIN_TRIP_DAYS..=MAX_TRIP_DAYS).contains(&self.num_days) {
            return Err(ApplicationError::BadRequest(format!(
                "num_days must be in range {MIN_TRIP_DAYS}..={MAX_TRIP_DAYS}"
            )));
        }
        if !(MIN_BUDGET_USD..=MAX_BUDGET_USD).contains(&self.budget) {
            return Err(ApplicationError::BadRequest(format!(
                "budget must be in range {MIN_BUDGET_USD}..={MAX_BUDGET_USD}"
            )));
        }
        Ok(())
    }

    pub fn destination(&self) -> &str {
        self.destination.trim()
    }

    /// Single user message describing the trip to the agent.
    pub fn prompt(&self) -> String {
        let preferences = match self.preferences.trim() {
            "" => "General sightseeing",
            value => value,
        };
        format!(
            "Plan a {days}-day trip to {destination} starting {start}.\n\
             Total budget: ${budget} USD.\n\
             Preferences: {preferences}.\n\
             Give a day-by-day itinerary with accommodation, dining and transport suggestions.",
            days = self.num_days,
            destination = self.destination(),
            start = self.start_date.format("%Y-%m-%d"),
            budget = self.budget,
        )
    }
}
