use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One sensor sample as published by the greenhouse node. Field renames
/// track the device's wire names; readings carry no timestamp of their
/// own, the database assigns one at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "temp")]
    pub temperature: f32,
    pub humidity: f32,
    #[serde(rename = "lux")]
    pub light: i32,
    pub soil_raw: i32,
    pub soil_percent: i32,
}

pub fn parse_reading_payload(payload: &[u8]) -> Result<Reading> {
    let reading = serde_json::from_slice(payload)?;
    Ok(reading)
}
