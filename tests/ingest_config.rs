// tests/ingest_config.rs
use reddit_corpus_ingest::config::ingest::{IngestConfig, ENV_CONFIG_PATH};
use reddit_corpus_ingest::TimeFilter;
use std::{env, fs};

const FULL: &str = r#"
[credentials]
client_id = "abc"
client_secret = "s3cr3t"
user_agent = "nba-corpus/0.1 by someone"

[endpoints]
search_base = "http://localhost:8080/"

[fetch]
page_size = 5000
max_attempts = 4
backoff_base_ms = 10

[run]
output_name = "nba_posts"
output_dir = "/tmp/corpus"
subreddit = "nba"
time_filter = "year"
limit = 0
"#;

#[test]
fn parses_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("ingest.toml");
    fs::write(&p, FULL).unwrap();

    let cfg = IngestConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.credentials.client_id, "abc");
    assert_eq!(cfg.endpoints.auth_base, "https://www.reddit.com");
    assert_eq!(cfg.endpoints.search_base, "http://localhost:8080/");
    assert_eq!(cfg.fetch.page_size, 1000);
    assert_eq!(cfg.fetch.retry_policy().max_attempts, 4);
    assert_eq!(cfg.run.time_filter, TimeFilter::Year);
    assert_eq!(cfg.run.limit(), None);

    let q = cfg.run.query().unwrap();
    assert_eq!(q.subreddit(), Some("nba"));
    assert_eq!(q.author(), None);
}

#[test]
fn missing_credentials_section_is_error() {
    let e = IngestConfig::from_toml_str("[run]\nsubreddit = \"nba\"\n").unwrap_err();
    assert!(format!("{e:#}").contains("credentials"));
}

#[serial_test::serial]
#[test]
fn env_placeholders_resolve_from_environment() {
    env::set_var("REDDIT_CLIENT_ID", "from-env-id");
    env::set_var("REDDIT_CLIENT_SECRET", "from-env-secret");
    env::set_var("REDDIT_USER_AGENT", "from-env-ua");

    let cfg = IngestConfig::from_toml_str(
        r#"
[credentials]
client_id = "ENV"
client_secret = "env"
user_agent = "ENV"
"#,
    )
    .unwrap();
    assert_eq!(cfg.credentials.client_id, "from-env-id");
    assert_eq!(cfg.credentials.client_secret, "from-env-secret");
    assert_eq!(cfg.credentials.user_agent, "from-env-ua");

    env::remove_var("REDDIT_CLIENT_SECRET");
    let e = IngestConfig::from_toml_str(
        r#"
[credentials]
client_id = "ENV"
client_secret = "ENV"
user_agent = "ENV"
"#,
    )
    .unwrap_err();
    assert!(e.to_string().contains("REDDIT_CLIENT_SECRET"));

    env::remove_var("REDDIT_CLIENT_ID");
    env::remove_var("REDDIT_USER_AGENT");
}

#[serial_test::serial]
#[test]
fn default_uses_env_path_then_fallback() {
    // Isolate CWD so the test never reads a real config/ in the repo.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) Nothing anywhere -> error naming the default path
    let e = IngestConfig::load_default().unwrap_err();
    assert!(format!("{e:#}").contains("config/ingest.toml"));

    // 2) Fallback ./config/ingest.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/ingest.toml"), FULL).unwrap();
    let cfg = IngestConfig::load_default().unwrap();
    assert_eq!(cfg.run.output_name, "nba_posts");

    // 3) Env wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, FULL.replace("nba_posts", "from_env")).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = IngestConfig::load_default().unwrap();
    assert_eq!(cfg.run.output_name, "from_env");

    // 4) Env pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
    assert!(IngestConfig::load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}

#[test]
fn time_filter_in_config_is_case_insensitive() {
    let base = "[credentials]\nclient_id = \"a\"\nclient_secret = \"b\"\nuser_agent = \"c\"\n\n[run]\nsubreddit = \"nba\"\n";

    let cfg = IngestConfig::from_toml_str(&format!("{base}time_filter = \"Year\"\n")).unwrap();
    assert_eq!(cfg.run.time_filter, TimeFilter::Year);

    let cfg = IngestConfig::from_toml_str(&format!("{base}time_filter = \"HOUR\"\n")).unwrap();
    assert_eq!(cfg.run.time_filter, TimeFilter::Hour);

    let e = IngestConfig::from_toml_str(&format!("{base}time_filter = \"decade\"\n")).unwrap_err();
    assert!(format!("{e:#}").contains("decade"));
}
