//! Scenario: `ftr fetch` against a mocked historian.
//!
//! GREEN when:
//! - the token is read from the env var named by `source.token_env`
//! - signals-file tags are filtered, resolved and downloaded
//! - a tag the view does not know is reported, not fatal
//! - `all_minutes_<ts>.csv` lands in `io.minute_dir`
//! - a missing token env var aborts before any request

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

const TOKEN_VAR: &str = "FTR_TEST_HISTORIAN_TOKEN";

fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
    std::fs::write(dir.join("signals.txt"), "A_TOT\nPRESSURE_1\nZ_TOT\n").unwrap();
    let cfg = dir.join("site.yaml");
    std::fs::write(
        &cfg,
        format!(
            "source:\n  base_url: {base_url}\n  view: FTR\n  token_env: {TOKEN_VAR}\n  \
             filter: _TOT\n  signals_file: signals.txt\n  period:\n    \
             start: '2025-12-04 09:00:00'\n    end: '2025-12-04 10:00:00'\n\
             io:\n  minute_dir: out_minutes\n"
        ),
    )
    .unwrap();
    cfg
}

#[test]
fn fetch_writes_minute_table() -> anyhow::Result<()> {
    let server = MockServer::start();

    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/Documents/tagviews/FTR")
            .header("nexustoken", "tok-xyz");
        then.status(200).json_body(json!({
            "columns": [{"name": "CL_CAT_A_TOT", "uid": "uid-a"}]
        }));
    });
    let historic = server.mock(|when, then| {
        when.method(POST)
            .path("/Documents/tagviews/FTR/historic")
            .header("nexustoken", "tok-xyz")
            .json_body_partial(r#"{"uids": ["uid-a"], "startTs": 1764838800}"#);
        then.status(200).json_body(json!([
            {"timeStamp": 1764838800, "value": 100.5},
            {"timeStamp": 1764838860, "value": 101}
        ]));
    });

    let work = tempfile::tempdir()?;
    let cfg = write_config(work.path(), &server.base_url());

    Command::cargo_bin("ftr")?
        .current_dir(work.path())
        .env(TOKEN_VAR, "tok-xyz")
        .args(["fetch", "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch_ok=true source=tagview"))
        .stdout(predicate::str::contains("tags=1 rows=2 missing=1 failed=0 empty=0"))
        .stdout(predicate::str::contains("missing_tag=Z_TOT"))
        .stdout(predicate::str::contains("tok-xyz").not());

    listing.assert();
    historic.assert();

    let files: Vec<_> = std::fs::read_dir(work.path().join("out_minutes"))?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    assert_eq!(files.len(), 1);
    let text = std::fs::read_to_string(&files[0])?;
    assert_eq!(
        text,
        "timeStamp,A_TOT\n2025-12-04 09:00:00,100.5\n2025-12-04 09:01:00,101\n"
    );
    Ok(())
}

#[test]
fn fetch_without_token_env_fails_before_request() -> anyhow::Result<()> {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/Documents/tagviews/FTR");
        then.status(200).json_body(json!({"columns": []}));
    });

    let work = tempfile::tempdir()?;
    let cfg = write_config(work.path(), &server.base_url());

    Command::cargo_bin("ftr")?
        .current_dir(work.path())
        .env_remove(TOKEN_VAR)
        .args(["fetch", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING mode=FETCH"))
        .stderr(predicate::str::contains(TOKEN_VAR));

    listing.assert_hits(0);
    Ok(())
}
