use anyhow::Result;

use crate::config::Config;
use crate::progress::format_delay;

pub fn list_profiles(config: &Config) -> Result<()> {
    println!(
        "{:<10} {:>8} {:>8} {:>6} {:>8} {:<6} WORST CASE",
        "PROFILE", "ATTEMPTS", "BASE", "FACTOR", "CAP", "POLL"
    );
    for (name, profile) in &config.webhook.profiles {
        let marker = if *name == config.webhook.profile { "*" } else { "" };
        let cap = profile
            .max_delay_ms
            .map(format_delay)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:>8} {:>8} {:>6} {:>8} {:<6} {}",
            format!("{}{}", name, marker),
            profile.max_attempts,
            format_delay(profile.base_delay_ms),
            profile.backoff_factor,
            cap,
            profile.poll_strategy.as_str(),
            format_delay(profile.worst_case_wait().as_millis() as u64)
        );
    }
    println!();
    println!("* default profile. Worst case excludes time spent in HTTP calls.");

    Ok(())
}
