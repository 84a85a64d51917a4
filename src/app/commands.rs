//! CLI command handlers: thin consumers of the tracker client that render
//! display records as JSON or CSV on stdout.

use serde::Serialize;

use crate::config::OutputFormat;
use crate::core::client::TrackerClient;
use crate::domain::model::BatteryReading;
use crate::utils::error::Result;

pub struct Commands {
    client: TrackerClient,
}

impl Commands {
    pub fn new(client: TrackerClient) -> Self {
        Self { client }
    }

    pub async fn login_test(&mut self) -> Result<()> {
        self.client.login().await?;
        println!("OK");
        Ok(())
    }

    pub async fn trackers(&mut self, format: OutputFormat, battery_only: bool) -> Result<()> {
        let trackers = self.client.trackers().await?;
        if trackers.is_empty() {
            println!("No trackers found");
            return Ok(());
        }

        if battery_only {
            let rows: Vec<BatteryReading> = trackers.iter().map(BatteryReading::from).collect();
            render(format, &rows)
        } else {
            render(format, &trackers)
        }
    }

    pub async fn latest(&mut self, tracker_id: &str, format: OutputFormat) -> Result<()> {
        let position = self.client.latest_position(tracker_id).await?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&position)?),
            OutputFormat::Csv => print!("{}", to_csv(std::slice::from_ref(&position))?),
        }
        Ok(())
    }

    pub async fn history(
        &mut self,
        tracker_id: &str,
        from_time: &str,
        to_time: &str,
        format: OutputFormat,
        max_points: Option<usize>,
    ) -> Result<()> {
        let positions = self
            .client
            .position_history(tracker_id, from_time, to_time, max_points)
            .await?;
        if positions.is_empty() {
            println!("No position history found");
            return Ok(());
        }
        render(format, &positions)
    }

    pub async fn geofences(&mut self, tracker_id: &str) -> Result<()> {
        let geofences = self.client.geofences(tracker_id).await?;
        if geofences.is_empty() {
            println!("No geofences found");
            return Ok(());
        }
        // Coordinate lists do not flatten into CSV rows; geofences are JSON only.
        println!("{}", serde_json::to_string_pretty(&geofences)?);
        Ok(())
    }

    pub async fn live(&mut self, tracker_id: &str, enable: bool) -> Result<()> {
        let state = self.client.set_live_tracking(tracker_id, enable).await?;
        println!("{}", serde_json::to_string_pretty(&state)?);
        Ok(())
    }
}

fn render<T: Serialize>(format: OutputFormat, rows: &[T]) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Csv => print!("{}", to_csv(rows)?),
    }
    Ok(())
}

/// Render rows as CSV with a header derived from the record type.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(String::from_utf8(bytes).map_err(std::io::Error::other)?)
}
