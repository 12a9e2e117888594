use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use actuator_core::actuator::{Actuator, Brake, Steering, Throttle};
use session::{Session, TranscriptLogger};

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record::<Throttle>(
        "throttle-override.log",
        &[
            "enable",
            "command 0.4",
            "advance 50",
            "sensors 300 600",
            "advance 150",
            "status",
            "enable",
            "sensors 72 147",
            "advance 20",
            "enable",
            "command 0.1",
            "status",
        ],
    )?;
    record::<Brake>(
        "brake-timeout.log",
        &[
            "enable",
            "command 0.6",
            "advance 100",
            "status",
            "advance 300",
            "status",
        ],
    )?;
    record::<Steering>(
        "steering-faults.log",
        &[
            "config",
            "enable",
            "command 1200 100",
            "advance 150",
            "status",
            "sensors 10 900",
            "command 1200 100",
            "advance 1000",
            "sensors 522 501",
            "advance 400",
            "fault brake",
            "send 0x082 05 cc",
            "config report-hz 10",
            "config fault-check-hz 0",
            "advance 300",
        ],
    )?;
    Ok(())
}

fn record<A: Actuator + Default>(file: &str, script: &[&str]) -> io::Result<()> {
    let path = Path::new(TRANSCRIPT_DIR).join(file);
    let header = format!("{} actuator bench scenario", A::MODULE);
    let mut session = Session::<A>::new(Some(TranscriptLogger::create(&path, &header)?))?;

    let _ = session.boot_messages()?;
    for line in script {
        let _ = session.handle_command(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
