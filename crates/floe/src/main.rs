//! Floe CLI: watches partitioned change streams and emits every record.

use std::process::ExitCode;

use floe::{Application, Config};

fn main() -> ExitCode {
    Application::<Config>::run()
}
