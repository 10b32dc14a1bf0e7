use crate::model::AggregateReport;
use anyhow::Result;

pub fn print_json(report: &AggregateReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}
