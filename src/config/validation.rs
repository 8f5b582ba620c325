//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check unit ids have the `<app>/<n>` shape
//! - Check the relation name and timeout are usable
//!
//! # Design Decisions
//! - Returns all problems, not just the first
//! - Proxy requests are not checked here; the Consumer validates them on
//!   `configure`, which is part of what the simulator exercises

use crate::config::schema::Settings;
use crate::relation::UnitId;

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if settings.driver.relation_name.trim().is_empty() {
        problems.push("driver.relation_name must not be empty".to_string());
    }
    if settings.driver.relation_name.contains(':') {
        problems.push(format!(
            "driver.relation_name must not contain ':' (got \"{}\")",
            settings.driver.relation_name
        ));
    }

    let scenario = &settings.scenario;
    for (field, unit) in [
        ("scenario.consumer_unit", &scenario.consumer_unit),
        ("scenario.provider_unit", &scenario.provider_unit),
    ] {
        if !UnitId::from(unit.as_str()).is_well_formed() {
            problems.push(format!("{} must look like <app>/<n> (got \"{}\")", field, unit));
        }
    }
    if scenario.consumer_unit == scenario.provider_unit {
        problems.push("scenario.consumer_unit and scenario.provider_unit must differ".to_string());
    }
    if scenario.timeout_secs == 0 {
        problems.push("scenario.timeout_secs must be greater than 0".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
