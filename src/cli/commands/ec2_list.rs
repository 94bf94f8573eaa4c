use crate::aws::{ec2, AwsCli};
use crate::checks;
use crate::config::ResolvedConfig;
use crate::ui::create_spinner;
use crate::Result;

pub async fn execute(config: &ResolvedConfig) -> Result<()> {
    checks::require_binaries(&["aws"])?;

    let aws = AwsCli::from_config(config);
    let spinner = create_spinner("Listing EC2 instances...");
    let instances = ec2::list_instances(&aws).await;
    spinner.finish_and_clear();
    let instances = instances?;

    if instances.is_empty() {
        println!("No instances found in {}.", aws.region());
        return Ok(());
    }

    println!(
        "{:<22} {:<30} {:<16} {:<14}",
        "INSTANCE ID", "NAME", "PRIVATE IP", "TYPE"
    );
    println!("{}", "-".repeat(85));

    for instance in &instances {
        println!(
            "{:<22} {:<30} {:<16} {:<14}",
            instance.instance_id,
            instance.name.as_deref().unwrap_or("-"),
            instance.private_ip_address.as_deref().unwrap_or("-"),
            instance.instance_type.as_deref().unwrap_or("-")
        );
    }

    println!();
    println!("Total: {} instance(s)", instances.len());

    Ok(())
}
