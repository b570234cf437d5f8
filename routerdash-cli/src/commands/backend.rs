use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use tracing::info;

use routerdash_core::api::{DeviceDirectory, MetricsFetcher};
use routerdash_core::auth::authenticate;
use routerdash_core::model::{DateRange, Device, SortOrder};
use routerdash_core::time::today_kst;

use super::CommandEnv;
use crate::runner::export_file_name;

/// Logged-in user, or an error telling how to log in.
/// Demo runs have no real backend to protect.
fn require_session(env: &CommandEnv) -> Result<String> {
    if env.demo {
        return Ok("demo".into());
    }
    match env.session.load().context("failed to read session")? {
        Some(user) => Ok(user),
        None => bail!("not logged in; run `routerdash login <id> --password <password>` first"),
    }
}

pub fn run_login(env: &CommandEnv, id: &str, password: &str) -> Result<()> {
    let user = authenticate(&env.config.accounts, id, password)?;
    env.session.save(&user).context("failed to save session")?;
    info!(%user, "logged in");
    println!("Logged in as {}", user);
    Ok(())
}

pub fn run_logout(env: &CommandEnv) -> Result<()> {
    env.session.clear().context("failed to clear session")?;
    info!("logged out");
    println!("Logged out");
    Ok(())
}

fn status_label(device: &Device) -> &'static str {
    if device.dormant {
        "dormant"
    } else if device.has_recent {
        "active"
    } else {
        "stale"
    }
}

fn device_lines(devices: &[Device]) -> Vec<String> {
    let width = devices
        .iter()
        .map(|d| d.alias().chars().count())
        .max()
        .unwrap_or(0)
        .max("ALIAS".len());
    let mut lines = vec![format!("{:<14} {:<width$} {}", "MSISDN", "ALIAS", "STATUS")];
    for d in devices {
        lines.push(format!(
            "{:<14} {:<width$} {}",
            d.msisdn,
            d.alias(),
            status_label(d)
        ));
    }
    lines
}

pub async fn run_devices(env: &CommandEnv, all: bool) -> Result<()> {
    require_session(env)?;
    let devices = DeviceDirectory::new(env.api.clone())
        .list(all)
        .await
        .context("failed to list devices")?;
    if devices.is_empty() {
        println!("No devices.");
        return Ok(());
    }
    for line in device_lines(&devices) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn run_alias(env: &CommandEnv, msisdn: &str, alias: &str) -> Result<()> {
    require_session(env)?;
    DeviceDirectory::new(env.api.clone())
        .set_alias(msisdn, alias)
        .await
        .with_context(|| format!("failed to save alias for {}", msisdn))?;
    println!("Alias saved for {}", msisdn);
    Ok(())
}

pub async fn run_dormant(env: &CommandEnv, msisdn: &str, yes: bool) -> Result<()> {
    require_session(env)?;
    if !yes {
        bail!("marking {} dormant hides it from the dashboard; pass --yes to confirm", msisdn);
    }
    DeviceDirectory::new(env.api.clone())
        .set_dormant(msisdn)
        .await
        .with_context(|| format!("failed to mark {} dormant", msisdn))?;
    println!("{} marked dormant", msisdn);
    Ok(())
}

pub async fn run_activate(env: &CommandEnv, msisdn: &str) -> Result<()> {
    require_session(env)?;
    DeviceDirectory::new(env.api.clone())
        .activate(msisdn)
        .await
        .with_context(|| format!("failed to activate {}", msisdn))?;
    println!("{} activated", msisdn);
    Ok(())
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

/// Range from optional bounds; missing ends default to the configured window ending today
fn export_range(
    start: Option<&str>,
    end: Option<&str>,
    default_days: u32,
    today: NaiveDate,
) -> Result<DateRange> {
    let fallback = DateRange::last_days(today, default_days);
    let start = start.map(parse_day).transpose()?.unwrap_or(fallback.start);
    let end = end.map(parse_day).transpose()?.unwrap_or(fallback.end);
    Ok(DateRange::new(start, end))
}

pub async fn run_export(
    env: &CommandEnv,
    msisdn: &str,
    start: Option<&str>,
    end: Option<&str>,
    order: SortOrder,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    require_session(env)?;
    let range = export_range(start, end, env.config.chart.default_days, today_kst(Utc::now()))?;
    let bytes = MetricsFetcher::new(env.api.clone())
        .export_csv(msisdn, &range, order)
        .await
        .context("export failed")?
        .context("no device given")?;

    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(msisdn, &range)));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "csv exported");
    println!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use routerdash_core::api::DashboardApi;
    use routerdash_core::config::DashConfig;
    use routerdash_core::fake::FakeApi;
    use routerdash_core::session::{MemorySessionStore, SessionStore};

    fn env(demo: bool) -> (CommandEnv, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        let env = CommandEnv {
            config: DashConfig::default(),
            config_path: None,
            api: api.clone(),
            session: Arc::new(MemorySessionStore::default()),
            demo,
        };
        (env, api)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_backend_commands_need_session() {
        let (env, api) = env(false);
        let err = run_devices(&env, false).await.unwrap_err();
        assert!(err.to_string().contains("not logged in"));
        assert_eq!(api.call_count(), 0);

        run_login(&env, " rcn ", "rcn!!").unwrap();
        assert_eq!(env.session.load().unwrap().as_deref(), Some("rcn"));
        run_devices(&env, true).await.unwrap();
        assert_eq!(api.call_count(), 1);

        run_logout(&env).unwrap();
        assert!(run_alias(&env, "01000000001", "x").await.is_err());
    }

    #[test]
    fn test_login_rejects_bad_password() {
        let (env, _) = env(false);
        assert!(run_login(&env, "webons", "nope").is_err());
        assert_eq!(env.session.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_dormant_requires_confirmation() {
        let (env, api) = env(true);
        assert!(run_dormant(&env, "01000000001", false).await.is_err());
        assert_eq!(api.call_count(), 0);

        run_dormant(&env, "01000000001", true).await.unwrap();
        let active = api.list_devices(false).await.unwrap();
        assert!(active.iter().all(|d| d.msisdn != "01000000001"));

        run_activate(&env, "01000000001").await.unwrap();
        let active = api.list_devices(false).await.unwrap();
        assert!(active.iter().any(|d| d.msisdn == "01000000001"));
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let (env, _) = env(true);
        let out = std::env::temp_dir().join(format!("routerdash-export-{}.csv", std::process::id()));
        let path = run_export(
            &env,
            "01000000001",
            Some("2025-01-01"),
            Some("2025-01-02"),
            SortOrder::Asc,
            Some(out.clone()),
        )
        .await
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ts_kst,"));
        std::fs::remove_file(out).ok();

        assert!(run_export(&env, "", None, None, SortOrder::Desc, None).await.is_err());
    }

    #[test]
    fn test_export_range_defaults() {
        let today = day(2025, 1, 15);
        let r = export_range(None, None, 7, today).unwrap();
        assert_eq!(r, DateRange::new(day(2025, 1, 8), today));

        let r = export_range(Some("2025-01-10"), None, 7, today).unwrap();
        assert_eq!(r.start, day(2025, 1, 10));
        assert_eq!(r.end, today);

        assert!(export_range(Some("15/01/2025"), None, 7, today).is_err());
    }

    #[test]
    fn test_device_lines() {
        let devices = vec![
            Device {
                msisdn: "01000000001".into(),
                alias: Some("Mokdong C1".into()),
                dormant: false,
                has_recent: true,
            },
            Device {
                msisdn: "01000000005".into(),
                alias: None,
                dormant: false,
                has_recent: false,
            },
        ];
        let lines = device_lines(&devices);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("MSISDN"));
        assert!(lines[1].contains("Mokdong C1") && lines[1].ends_with("active"));
        assert!(lines[2].ends_with("stale"));
    }
}
