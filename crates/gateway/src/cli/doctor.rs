use gw_domain::config::{Config, ConfigSeverity};

/// Run diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("gateway doctor");
    println!("==============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_upstream(config, &mut all_passed).await;
    check_storage_root("Transcripts root", &config.transcripts.storage_root, config.transcripts.enabled, &mut all_passed);
    check_storage_root("Feedback root", &config.feedback.storage_root, config.feedback.enabled, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_upstream(config: &Config, all_passed: &mut bool) {
    let client = gw_upstream::UpstreamClient::new(
        config.llm.upstream_url.clone(),
        std::time::Duration::from_millis(config.llm.default_timeout_ms),
    );
    let ok = match client {
        Ok(client) => match client.version().await {
            Ok(version) => {
                print_check("Upstream reachable", true, format!("{} (version {version})", config.llm.upstream_url));
                true
            }
            Err(e) => {
                print_check("Upstream reachable", false, format!("{}: {e}", config.llm.upstream_url));
                false
            }
        },
        Err(e) => {
            print_check("Upstream reachable", false, format!("could not build client: {e}"));
            false
        }
    };
    if !ok {
        *all_passed = false;
    }
}

fn check_storage_root(name: &str, root: &str, enabled: bool, all_passed: &mut bool) {
    if !enabled {
        print_check(name, true, "disabled".into());
        return;
    }

    let path = std::path::Path::new(root);
    let created = std::fs::create_dir_all(path).is_ok();
    let writable = if created {
        let probe = path.join(".gateway_doctor_probe");
        let w = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        w
    } else {
        false
    };

    let ok = created && writable;
    let detail = if ok {
        format!("{root} (writable)")
    } else {
        format!("{root} (not writable)")
    };
    print_check(name, ok, detail);

    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
