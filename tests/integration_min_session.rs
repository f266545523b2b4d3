// Drives the compiled binary through a PTY so the real event loop and
// crossterm input handling are exercised end to end.
//
// Requires a TTY; ignored by default.
// Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

const TEXT: &str = "tiny custom practice text";

#[test]
#[ignore]
fn custom_session_completes_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("quickkeys");
    let cmd = format!(
        "{} --mode custom --seconds 30 --text \"{}\"",
        bin.display(),
        TEXT
    );

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    p.send(TEXT)?;
    std::thread::sleep(Duration::from_millis(200));

    // results screen: q quits
    p.send("q")?;
    p.expect(Eof)?;
    Ok(())
}

#[test]
#[ignore]
fn short_custom_text_is_rejected_before_the_tui() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("quickkeys");
    let mut p = spawn(format!("{} --mode custom --text short", bin.display()))?;
    p.expect("at least 20 characters")?;
    Ok(())
}
