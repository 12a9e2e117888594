mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use actuator_core::actuator::{Actuator, Brake, Steering, Throttle};
use session::{ActuatorProfile, Session, TranscriptLogger};

const USAGE: &str =
    "Usage: actuator-emulator [--actuator <brake|throttle|steering>] [--transcript <path>]";

struct Options {
    profile: ActuatorProfile,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    match options.profile {
        ActuatorProfile::Brake => run::<Brake>(&options),
        ActuatorProfile::Throttle => run::<Throttle>(&options),
        ActuatorProfile::Steering => run::<Steering>(&options),
    }
}

fn run<A: Actuator + Default>(options: &Options) -> io::Result<()> {
    let transcript = match &options.transcript {
        Some(path) => Some(TranscriptLogger::create(
            path,
            &format!("{} actuator bench transcript", A::MODULE),
        )?),
        None => None,
    };

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::<A>::new(transcript)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Actuator Bench Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for message in session.boot_messages()? {
        writeln!(writer, "{message}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: ActuatorProfile::Throttle,
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--actuator=") {
            options.profile = ActuatorProfile::from_tag(value)?;
        } else if arg == "--actuator" {
            let value = args.next().ok_or("Expected value after --actuator")?;
            options.profile = ActuatorProfile::from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected value after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            options.profile = ActuatorProfile::from_tag(&arg)?;
        }
    }

    Ok(options)
}
