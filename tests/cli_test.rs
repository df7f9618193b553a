mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use std::process::Command;

fn pixgate() -> Command {
    let mut cmd = Command::new(cargo_bin!("pixgate"));
    for var in [
        "RUST_LOG",
        "PIXGATE_DB_PATH",
        "PIXGATE_ADMIN",
        "PIXGATE_TRANSFORM_URL",
        "PIXGATE_WATERMARK_TEXT",
        "DOKU_API_URL",
        "DOKU_CLIENT_ID",
        "DOKU_SECRET_KEY",
        "DOKU_WEBHOOK_SECRET",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_script(dir: &Path, rows: &[&str]) -> std::path::PathBuf {
    let path = dir.join("script.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "kind,user,text,image,signature").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    path
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = pixgate();
    cmd.arg("tests/fixtures/script.csv")
        .arg("--admin")
        .arg("6281241000250@c.us")
        .arg("--webhook-secret")
        .arg("replay-secret");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("628111@c.us <- Welcome"))
        .stdout(predicate::str::contains("Free edits left: 2"))
        .stdout(predicate::str::contains(
            "6281241000250@c.us <- Approval for 628222@c.us: settled",
        ))
        .stdout(predicate::str::contains(
            "628222@c.us <- Your payment was successful!",
        ))
        .stdout(predicate::str::contains(
            "user,trials_used,trials_left,package,quota,package_expiry,pending_order",
        ))
        .stdout(predicate::str::contains("628222@c.us,0,2,pro,300,"))
        .stderr(predicate::str::contains("webhook rejected"));

    Ok(())
}

#[test]
fn test_cli_delivers_watermarked_trial() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("photo.png"), common::png(40, 80)).unwrap();
    let script = write_script(
        dir.path(),
        &[
            "message,628111@c.us,bosku",
            "message,628111@c.us,1",
            "message,628111@c.us,,photo.png",
        ],
    );
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let mut cmd = pixgate();
    cmd.arg(&script)
        .arg("--image-dir")
        .arg(&out_dir)
        .arg("--retry-base-ms")
        .arg("1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "628111@c.us <- Your photo has been queued",
        ))
        .stdout(predicate::str::contains("628111-1.jpg] Here you go!"))
        .stdout(predicate::str::contains("628111@c.us,1,1,,0,,"));

    let delivered = std::fs::read(out_dir.join("628111-1.jpg")).unwrap();
    assert_eq!(
        image::guess_format(&delivered).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[test]
fn test_cli_skips_bad_rows() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        &[
            "message,,bosku",
            "refund,628111@c.us,1",
            "message,628111@c.us,,missing.png",
            "message,628222@c.us,basic",
            "message,628333@c.us,bosku",
            "message,628333@c.us,basic",
        ],
    );

    let mut cmd = pixgate();
    cmd.arg(&script);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("skipping script row"))
        .stdout(predicate::str::contains("628333@c.us <- Package BASIC - Rp 75000"))
        .stdout(predicate::str::contains("628333@c.us,0,2,,0,,ORDER_"))
        .stdout(predicate::str::contains("628222@c.us").not());
}

#[test]
fn test_cli_webhook_without_secret_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        &[r#"webhook,,"{""order"":{""invoice_number"":""ORDER_1_628111""},""transaction"":{""status"":""SUCCESS""}}",,HMACSHA256=abc"#],
    );

    let mut cmd = pixgate();
    cmd.arg(&script);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("no signing secret is configured"))
        .stdout(predicate::str::diff(
            "user,trials_used,trials_left,package,quota,package_expiry,pending_order\n",
        ));
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = pixgate();
    cmd.arg("tests/fixtures/does-not-exist.csv");
    cmd.assert().failure();
}
