use anyhow::{bail, Context};
use gre_flags::IpVersion;
use std::process::Command;

/// Name of the iptables binary managing `family`.
fn binary(family: IpVersion) -> &'static str {
    match family {
        IpVersion::V4 => "iptables",
        IpVersion::V6 => "ip6tables",
    }
}

/// Sends GRE packets of `chain` in the mangle table to the queue.
fn queue_rule(chain: &str, queue_num: u16) -> String {
    format!(
        "{} -t mangle --protocol gre -j NFQUEUE --queue-num {} --queue-bypass",
        chain, queue_num
    )
}

fn run_iptables_rule(iptables: &str, operation: &str, rule: &str) -> anyhow::Result<()> {
    debug!("executing: {} {} {}", iptables, operation, rule);
    let output = Command::new(iptables)
        .args(std::iter::once(operation).chain(rule.split_whitespace()))
        .output()
        .with_context(|| format!("could not run {}", iptables))?;
    if !output.status.success() {
        bail!(
            "{} {} {} failed ({}): {}",
            iptables,
            operation,
            rule,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Install the queue rule for every family, stopping at the first failure.
pub fn add_rules(families: &[IpVersion], chain: &str, queue_num: u16) -> anyhow::Result<()> {
    let rule = queue_rule(chain, queue_num);
    for family in families {
        run_iptables_rule(binary(*family), "-I", &rule)?;
    }
    Ok(())
}

/// Remove the queue rules; rules that are not installed are skipped.
pub fn clear_rules(families: &[IpVersion], chain: &str, queue_num: u16) {
    let rule = queue_rule(chain, queue_num);
    for family in families {
        if let Err(err) = run_iptables_rule(binary(*family), "-D", &rule) {
            debug!("{:#}", err);
        }
    }
}
