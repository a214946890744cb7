use patientrl_core::event::OutcomeEvent;
use patientrl_core::RewardTable;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let rewards = RewardTable::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: OutcomeEvent = serde_json::from_str(&line)?;
        let severity = event.state_inputs().severity();
        let reward = rewards.reward(event.works, severity);

        println!(
            "{}\t{reward}\t{}",
            severity.level(),
            event.patient_id
        );
    }

    Ok(())
}
