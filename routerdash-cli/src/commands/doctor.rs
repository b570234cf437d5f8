use std::path::Path;

use anyhow::{Result, bail};

use routerdash_core::config::DashConfig;
use routerdash_core::session::{FileSessionStore, SessionStore};

use super::CommandEnv;

#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            hint: None,
        }
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub async fn run_doctor(env: &CommandEnv) -> Result<()> {
    println!("routerdash doctor\n");

    match &env.config_path {
        Some(path) => println!("Configuration: {}", path.display()),
        None => println!("Configuration: not found, using defaults"),
    }
    println!();

    let checks = collect_checks(env).await;
    for check in &checks {
        print_check(check);
    }
    println!();

    let failed: Vec<_> = checks.iter().filter(|c| !c.passed).collect();
    if failed.is_empty() {
        println!("All checks passed!");
        return Ok(());
    }

    println!("Issues found:");
    for check in &failed {
        println!("  - {}: {}", check.name, check.message);
        if let Some(hint) = &check.hint {
            println!("    Hint: {}", hint);
        }
    }
    bail!("{} check(s) failed", failed.len())
}

async fn collect_checks(env: &CommandEnv) -> Vec<Check> {
    vec![
        check_config(&env.config),
        check_accounts(&env.config),
        check_session(env),
        check_log_dir(&env.config.log_dir),
        check_backend(env).await,
    ]
}

fn print_check(check: &Check) {
    let icon = if check.passed { "✓" } else { "✗" };
    let color = if check.passed { "\x1b[32m" } else { "\x1b[31m" };
    let reset = "\x1b[0m";

    println!(
        "  {}{}{} {}: {}",
        color, icon, reset, check.name, check.message
    );

    if let Some(hint) = &check.hint {
        println!("    └─ {}", hint);
    }
}

fn check_config(config: &DashConfig) -> Check {
    match config.validate() {
        Ok(()) => Check::ok(
            "config",
            format!(
                "api {} · page size {} · {} day window",
                config.base_url(),
                config.table.page_size,
                config.chart.default_days
            ),
        ),
        Err(e) => Check::fail("config", e.to_string())
            .with_hint("Fix routerdash.yaml or point ROUTERDASH_CONFIG at another file"),
    }
}

fn check_accounts(config: &DashConfig) -> Check {
    match config.accounts.len() {
        0 => Check::fail("accounts", "no accounts configured")
            .with_hint("Add at least one entry under `accounts:`"),
        n => Check::ok("accounts", format!("{} configured", n)),
    }
}

fn check_session(env: &CommandEnv) -> Check {
    if env.demo {
        return Check::ok("session", "demo mode keeps the session in memory");
    }
    let store = FileSessionStore::new(env.config.session_path.clone());
    match store.load() {
        Ok(Some(user)) => Check::ok("session", format!("logged in as {}", user)),
        Ok(None) => Check::ok("session", "not logged in"),
        Err(e) => Check::fail("session", e.to_string()).with_hint(format!(
            "Delete {} or run `routerdash logout`",
            store.path().display()
        )),
    }
}

fn check_log_dir(dir: &Path) -> Check {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Check::ok("logs", dir.display().to_string()),
        Err(e) => Check::fail("logs", format!("{}: {}", dir.display(), e))
            .with_hint("Set `log_dir` to a writable directory"),
    }
}

async fn check_backend(env: &CommandEnv) -> Check {
    match env.api.health().await {
        Ok(()) => Check::ok("backend", format!("{} is healthy", env.api.describe())),
        Err(e) => Check::fail("backend", format!("{}: {}", env.api.describe(), e))
            .with_hint("Is the telemetry API running? Try `--api <url>` or `--demo`"),
    }
}
